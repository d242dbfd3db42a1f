use crate::shell::ShellLine;
use crate::{ExecutionResult, ExecutionService};
use std::path::{Path, PathBuf};
use std::process::Command;
use strand_core::logging;

/// Runs commands on a remote submission host through the ssh binary. The
/// session is multiplexed via ControlMaster, so authentication happens once
/// and later calls reuse the open connection.
pub struct SshExecutionService {
    address: String,
    key_file: Option<PathBuf>,
    compression: bool,
    control_persist_secs: u32,
}

impl SshExecutionService {
    pub fn new(address: String, key_file: Option<PathBuf>, compression: bool) -> Self {
        SshExecutionService {
            address,
            key_file,
            compression,
            control_persist_secs: 600,
        }
    }

    fn base_command(&self) -> Command {
        let mut cmd = Command::new("ssh");
        cmd.arg("-o")
            .arg("BatchMode=yes")
            .arg("-o")
            .arg("ControlMaster=auto")
            .arg("-o")
            .arg("ControlPath=~/.ssh/strand-%r@%h:%p")
            .arg("-o")
            .arg(format!("ControlPersist={}", self.control_persist_secs));
        if self.compression {
            cmd.arg("-C");
        }
        if let Some(key) = &self.key_file {
            let expanded = shellexpand::tilde(&key.to_string_lossy().into_owned()).into_owned();
            cmd.arg("-i").arg(expanded);
        }
        cmd.arg(&self.address);
        cmd
    }

    fn remote_command_string(command: &str, working_dir: Option<&Path>) -> String {
        match working_dir {
            Some(dir) => ShellLine::new("cd")
                .arg(dir.to_string_lossy())
                .and(ShellLine::new(command))
                .to_shell_string(),
            None => command.to_string(),
        }
    }
}

impl ExecutionService for SshExecutionService {
    fn execute(&self, command: &str, working_dir: Option<&Path>) -> ExecutionResult {
        let remote = Self::remote_command_string(command, working_dir);
        logging::log_command(&self.address, &remote);

        let mut cmd = self.base_command();
        cmd.arg(&remote);

        match cmd.output() {
            Ok(output) => ExecutionResult::from_output(output),
            Err(e) => {
                tracing::warn!("Could not reach '{}' via ssh: {}", self.address, e);
                ExecutionResult::spawn_failure(format!(
                    "Failed to reach '{}' via ssh: {}",
                    self.address, e
                ))
            }
        }
    }

    fn host(&self) -> &str {
        &self.address
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_command_with_working_dir() {
        let remote = SshExecutionService::remote_command_string(
            "qstat -f 123",
            Some(Path::new("/work/dir with space")),
        );
        assert_eq!(remote, "cd '/work/dir with space' && qstat -f 123");
    }

    #[test]
    fn test_remote_command_without_working_dir() {
        let remote = SshExecutionService::remote_command_string("qstat", None);
        assert_eq!(remote, "qstat");
    }

    #[test]
    fn test_host_label() {
        let svc = SshExecutionService::new("user@cluster".to_string(), None, false);
        assert_eq!(svc.host(), "user@cluster");
    }
}
