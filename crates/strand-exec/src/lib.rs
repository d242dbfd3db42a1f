pub mod error;
pub mod local;
pub mod preflight;
pub mod shell;
pub mod ssh;

use std::path::Path;
use std::sync::Arc;

use strand_core::settings::ExecutionMode;

pub use error::{ExecError, Result};
pub use local::LocalExecutionService;
pub use ssh::SshExecutionService;

/// Outcome of one executed command. Command-level non-zero exit is data,
/// not an orchestration error; unreachable hosts and auth failures surface
/// the same way, with the cause on stderr.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub exit_code: i32,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

impl ExecutionResult {
    pub fn successful(&self) -> bool {
        self.exit_code == 0
    }

    pub fn from_output(output: std::process::Output) -> Self {
        ExecutionResult {
            exit_code: output.status.code().unwrap_or(255),
            stdout: lines(&output.stdout),
            stderr: lines(&output.stderr),
        }
    }

    /// Result for a command that could not even be spawned or reached.
    pub fn spawn_failure(message: String) -> Self {
        ExecutionResult {
            exit_code: 127,
            stdout: Vec::new(),
            stderr: vec![message],
        }
    }

    pub fn first_stdout_line(&self) -> Option<&str> {
        self.stdout.iter().map(String::as_str).find(|l| !l.trim().is_empty())
    }
}

fn lines(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(String::from)
        .collect()
}

/// Runs a shell command on the submission host, local or remote. Stateless
/// between calls apart from the reusable ssh session, so one instance can be
/// shared across contexts.
pub trait ExecutionService: Send + Sync {
    fn execute(&self, command: &str, working_dir: Option<&Path>) -> ExecutionResult;

    /// Host label for logging ("localhost" or the ssh address).
    fn host(&self) -> &str;
}

/// Backend selection is a configuration concern, not a call-site concern.
pub fn build_execution_service(mode: &ExecutionMode) -> Arc<dyn ExecutionService> {
    match mode {
        ExecutionMode::Local => Arc::new(LocalExecutionService::new()),
        ExecutionMode::Ssh {
            address,
            key_file,
            compression,
        } => Arc::new(SshExecutionService::new(
            address.clone(),
            key_file.clone(),
            *compression,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_successful_flag() {
        let ok = ExecutionResult {
            exit_code: 0,
            stdout: vec![],
            stderr: vec![],
        };
        let bad = ExecutionResult {
            exit_code: 2,
            stdout: vec![],
            stderr: vec![],
        };
        assert!(ok.successful());
        assert!(!bad.successful());
    }

    #[test]
    fn test_spawn_failure_is_unsuccessful() {
        let r = ExecutionResult::spawn_failure("host unreachable".into());
        assert!(!r.successful());
        assert_eq!(r.exit_code, 127);
        assert_eq!(r.stderr, vec!["host unreachable".to_string()]);
    }

    #[test]
    fn test_first_stdout_line_skips_blanks() {
        let r = ExecutionResult {
            exit_code: 0,
            stdout: vec!["".into(), "  ".into(), "12345.server".into()],
            stderr: vec![],
        };
        assert_eq!(r.first_stdout_line(), Some("12345.server"));
    }

    #[test]
    fn test_build_execution_service_local() {
        let svc = build_execution_service(&ExecutionMode::Local);
        assert_eq!(svc.host(), "localhost");
    }
}
