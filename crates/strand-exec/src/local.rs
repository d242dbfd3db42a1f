use crate::{ExecutionResult, ExecutionService};
use std::path::Path;
use std::process::Command;
use strand_core::logging;

/// Spawns commands as subprocesses on the controlling host.
#[derive(Debug, Default)]
pub struct LocalExecutionService {
    host: String,
}

impl LocalExecutionService {
    pub fn new() -> Self {
        LocalExecutionService {
            host: "localhost".to_string(),
        }
    }
}

impl ExecutionService for LocalExecutionService {
    fn execute(&self, command: &str, working_dir: Option<&Path>) -> ExecutionResult {
        logging::log_command(&self.host, command);

        let mut cmd = Command::new("bash");
        cmd.arg("-c").arg(command);
        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }

        match cmd.output() {
            Ok(output) => ExecutionResult::from_output(output),
            Err(e) => {
                tracing::warn!("Could not spawn '{}' locally: {}", command, e);
                ExecutionResult::spawn_failure(format!(
                    "Failed to spawn '{}' locally: {}",
                    command, e
                ))
            }
        }
    }

    fn host(&self) -> &str {
        &self.host
    }
}
