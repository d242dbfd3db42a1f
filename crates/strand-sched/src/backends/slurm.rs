use std::collections::HashMap;

use strand_core::model::{BackendId, Command, JobState};
use strand_exec::shell::ShellLine;
use strand_exec::ExecutionResult;

use crate::backend::{SchedulerBackend, TrackingOptions};

/// Slurm adapter: submits with sbatch --parsable, polls with squeue. Jobs
/// that already left the queue are resolved through sacct by the caller's
/// absent-job handling.
#[derive(Debug, Default)]
pub struct SlurmBackend;

impl SlurmBackend {
    pub fn new() -> Self {
        SlurmBackend
    }

    fn state_from_code(code: &str) -> JobState {
        // sacct suffixes cancelled states, e.g. "CANCELLED by 1000".
        let code = code.split_whitespace().next().unwrap_or(code);
        match code {
            "PENDING" | "CONFIGURING" | "REQUEUED" | "RESIZING" | "SUSPENDED" => JobState::Queued,
            "RUNNING" | "COMPLETING" => JobState::Running,
            "COMPLETED" => JobState::CompletedSuccessful,
            "FAILED" | "TIMEOUT" | "OUT_OF_MEMORY" | "NODE_FAIL" | "BOOT_FAIL" => JobState::Failed,
            "CANCELLED" | "PREEMPTED" | "DEADLINE" => JobState::Aborted,
            _ => JobState::Unknown,
        }
    }
}

impl SchedulerBackend for SlurmBackend {
    fn name(&self) -> &'static str {
        "slurm"
    }

    fn submission_command(&self, command: &Command, parents: &[BackendId]) -> String {
        let mut line = ShellLine::new("sbatch")
            .raw("--parsable")
            .raw("-J")
            .arg(&command.job_name);

        if let Some(queue) = &command.resources.queue {
            line = line.raw("-p").arg(queue);
        }
        if let Some(nodes) = command.resources.nodes {
            line = line.raw(format!("--nodes={nodes}"));
        }
        if let Some(cores) = command.resources.cores {
            line = line.raw(format!("--cpus-per-task={cores}"));
        }
        if let Some(mem) = command.resources.memory_mb {
            line = line.raw(format!("--mem={mem}M"));
        }
        if let Some(walltime) = &command.resources.walltime {
            line = line.raw(format!("--time={walltime}"));
        }
        if !parents.is_empty() {
            let ids: Vec<&str> = parents.iter().map(|p| p.0.as_str()).collect();
            line = line.raw(format!("--dependency=afterok:{}", ids.join(":")));
        }
        if !command.parameters.is_empty() {
            let assignments: Vec<String> = command
                .parameters
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            line = line.arg(format!("--export=ALL,{}", assignments.join(",")));
        }

        line.arg(command.executable.to_string_lossy())
            .args(&command.arguments)
            .to_shell_string()
    }

    fn parse_job_id(&self, result: &ExecutionResult) -> Option<BackendId> {
        // --parsable prints "jobid" or "jobid;cluster".
        result
            .first_stdout_line()
            .map(|l| l.trim().split(';').next().unwrap_or("").to_string())
            .filter(|id| !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()))
            .map(BackendId::from)
    }

    fn status_command(&self, ids: &[BackendId], tracking: &TrackingOptions) -> String {
        let base = "squeue -h -o '%i %T'";
        if tracking.only_started_jobs && !ids.is_empty() {
            let ids: Vec<&str> = ids.iter().map(|i| i.0.as_str()).collect();
            format!("{} -j {}", base, ids.join(","))
        } else if tracking.user_jobs_only {
            format!("{} -u {}", base, tracking.user)
        } else {
            base.to_string()
        }
    }

    fn fallback_status_command(&self, ids: &[BackendId]) -> Option<String> {
        if ids.is_empty() {
            return None;
        }
        let ids: Vec<&str> = ids.iter().map(|i| i.0.as_str()).collect();
        Some(format!("sacct -n -X -o JobID,State -j {}", ids.join(",")))
    }

    fn parse_states(&self, result: &ExecutionResult) -> HashMap<BackendId, JobState> {
        let mut states = HashMap::new();
        for line in &result.stdout {
            let mut fields = line.split_whitespace();
            let (Some(id), Some(code)) = (fields.next(), fields.next()) else {
                continue;
            };
            if !id.chars().all(|c| c.is_ascii_digit()) {
                continue;
            }
            states.insert(BackendId::from(id), Self::state_from_code(code));
        }
        states
    }

    fn job_id_variable(&self) -> &'static str {
        "SLURM_JOB_ID"
    }

    fn queue_variable(&self) -> &'static str {
        "SLURM_JOB_PARTITION"
    }
}
