use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use strand_core::model::{BackendId, Command, JobState};
use strand_exec::shell::ShellLine;
use strand_exec::ExecutionResult;

use crate::backend::{SchedulerBackend, TrackingOptions};

// "Job <12345> is submitted to queue <fast>."
static SUBMIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Job <(\d+)> is submitted").expect("submit regex must compile"));

/// IBM LSF adapter: submits with bsub, polls with bjobs.
#[derive(Debug, Default)]
pub struct LsfBackend;

impl LsfBackend {
    pub fn new() -> Self {
        LsfBackend
    }

    fn state_from_code(code: &str) -> JobState {
        match code {
            "PEND" | "WAIT" | "PSUSP" | "USUSP" | "SSUSP" => JobState::Queued,
            "RUN" => JobState::Running,
            "DONE" => JobState::CompletedSuccessful,
            "EXIT" => JobState::Failed,
            _ => JobState::Unknown,
        }
    }
}

impl SchedulerBackend for LsfBackend {
    fn name(&self) -> &'static str {
        "lsf"
    }

    fn submission_command(&self, command: &Command, parents: &[BackendId]) -> String {
        let mut line = ShellLine::new("bsub").raw("-J").arg(&command.job_name);

        if let Some(queue) = &command.resources.queue {
            line = line.raw("-q").arg(queue);
        }
        if let Some(cores) = command.resources.cores {
            line = line.raw("-n").raw(cores.to_string());
        }
        if let Some(mem) = command.resources.memory_mb {
            line = line.raw("-M").raw(mem.to_string());
        }
        if let Some(walltime) = &command.resources.walltime {
            line = line.raw("-W").arg(walltime);
        }
        if !parents.is_empty() {
            let expr: Vec<String> = parents.iter().map(|p| format!("done({})", p.0)).collect();
            line = line.raw("-w").arg(expr.join(" && "));
        }
        if !command.parameters.is_empty() {
            let assignments: Vec<String> = command
                .parameters
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            line = line.raw("-env").arg(format!("all, {}", assignments.join(", ")));
        }

        line.arg(command.executable.to_string_lossy())
            .args(&command.arguments)
            .to_shell_string()
    }

    fn parse_job_id(&self, result: &ExecutionResult) -> Option<BackendId> {
        result.stdout.iter().find_map(|line| {
            SUBMIT_RE
                .captures(line)
                .and_then(|c| c.get(1))
                .map(|m| BackendId::from(m.as_str()))
        })
    }

    fn status_command(&self, ids: &[BackendId], tracking: &TrackingOptions) -> String {
        let base = "bjobs -noheader -o 'jobid stat'";
        if tracking.only_started_jobs && !ids.is_empty() {
            let ids: Vec<&str> = ids.iter().map(|i| i.0.as_str()).collect();
            format!("{} {}", base, ids.join(" "))
        } else if tracking.user_jobs_only {
            format!("{} -u {}", base, tracking.user)
        } else {
            format!("{} -u all", base)
        }
    }

    fn parse_states(&self, result: &ExecutionResult) -> HashMap<BackendId, JobState> {
        let mut states = HashMap::new();
        for line in &result.stdout {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 2 || !fields[0].chars().all(|c| c.is_ascii_digit()) {
                continue;
            }
            states.insert(BackendId::from(fields[0]), Self::state_from_code(fields[1]));
        }
        states
    }

    fn job_id_variable(&self) -> &'static str {
        "LSB_JOBID"
    }

    fn queue_variable(&self) -> &'static str {
        "LSB_QUEUE"
    }
}
