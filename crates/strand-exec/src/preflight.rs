use crate::shell::ShellLine;
use crate::{ExecError, ExecutionService, Result};

/// Auxiliary binaries every submission host must provide: unzip for tool
/// archives, lockfile (procmail) for cross-job locking.
pub const REQUIRED_TOOLS: &[&str] = &["unzip", "lockfile"];

/// Probes the submission host for the required auxiliary binaries. A missing
/// tool is a fatal startup error; all missing tools are reported at once.
pub fn verify_execution_requirements(service: &dyn ExecutionService) -> Result<()> {
    let mut missing = Vec::new();

    for tool in REQUIRED_TOOLS {
        let probe = ShellLine::new("which").raw(tool).to_shell_string();
        let result = service.execute(&probe, None);
        if !result.successful() {
            missing.push(tool.to_string());
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ExecError::MissingTools {
            host: service.host().to_string(),
            tools: missing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ExecutionResult;
    use std::path::Path;
    use std::sync::Mutex;

    struct FixedOutcomes {
        calls: Mutex<Vec<String>>,
        missing: Vec<&'static str>,
    }

    impl ExecutionService for FixedOutcomes {
        fn execute(&self, command: &str, _wd: Option<&Path>) -> ExecutionResult {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(command.to_string());
            }
            let found = !self.missing.iter().any(|m| command.ends_with(m));
            ExecutionResult {
                exit_code: if found { 0 } else { 1 },
                stdout: vec![],
                stderr: vec![],
            }
        }

        fn host(&self) -> &str {
            "testhost"
        }
    }

    #[test]
    fn test_all_tools_present() {
        let svc = FixedOutcomes {
            calls: Mutex::new(vec![]),
            missing: vec![],
        };
        assert!(verify_execution_requirements(&svc).is_ok());
        assert_eq!(svc.calls.lock().unwrap().len(), REQUIRED_TOOLS.len());
    }

    #[test]
    fn test_all_missing_tools_reported_at_once() {
        let svc = FixedOutcomes {
            calls: Mutex::new(vec![]),
            missing: vec!["unzip", "lockfile"],
        };
        match verify_execution_requirements(&svc) {
            Err(ExecError::MissingTools { host, tools }) => {
                assert_eq!(host, "testhost");
                assert_eq!(tools, vec!["unzip", "lockfile"]);
            }
            other => panic!("expected MissingTools, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_error_message_lists_each_tool() {
        let err = ExecError::MissingTools {
            host: "h".into(),
            tools: vec!["lockfile".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("Tool lockfile not found."));
        assert!(msg.contains("submission and execution hosts"));
    }
}
