use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use strand_core::model::{BackendId, Command, JobState};
use strand_exec::shell::ShellLine;
use strand_exec::ExecutionResult;

use crate::backend::{SchedulerBackend, TrackingOptions};

// "Your job 12345 ("strand_align") has been submitted"
static SUBMIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Your job (\d+)").expect("submit regex must compile"));

/// Sun/Univa Grid Engine adapter. Shares the qsub/qstat names with PBS but
/// speaks a different flag dialect, so it gets its own adapter.
#[derive(Debug, Default)]
pub struct SgeBackend;

impl SgeBackend {
    pub fn new() -> Self {
        SgeBackend
    }

    fn state_from_code(code: &str) -> JobState {
        // Eqw must match before the plain qw/hqw pending codes.
        if code.contains('E') {
            return JobState::Failed;
        }
        match code {
            "qw" | "hqw" | "hRwq" => JobState::Queued,
            "r" | "t" | "Rr" | "Rt" => JobState::Running,
            "d" | "dr" | "dt" => JobState::Aborted,
            _ => JobState::Unknown,
        }
    }
}

impl SchedulerBackend for SgeBackend {
    fn name(&self) -> &'static str {
        "sge"
    }

    fn submission_command(&self, command: &Command, parents: &[BackendId]) -> String {
        let mut line = ShellLine::new("qsub").raw("-N").arg(&command.job_name);

        if let Some(queue) = &command.resources.queue {
            line = line.raw("-q").arg(queue);
        }
        if let Some(cores) = command.resources.cores {
            line = line.raw("-pe").raw("smp").raw(cores.to_string());
        }
        if let Some(mem) = command.resources.memory_mb {
            line = line.raw("-l").raw(format!("h_vmem={mem}M"));
        }
        if let Some(walltime) = &command.resources.walltime {
            line = line.raw("-l").raw(format!("h_rt={walltime}"));
        }
        if !parents.is_empty() {
            let ids: Vec<&str> = parents.iter().map(|p| p.0.as_str()).collect();
            line = line.raw("-hold_jid").raw(ids.join(","));
        }
        for (key, value) in &command.parameters {
            line = line.raw("-v").arg(format!("{key}={value}"));
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

    fn status_command(&self, _ids: &[BackendId], tracking: &TrackingOptions) -> String {
        // qstat cannot filter by id list; jobs absent from the output are
        // treated as finished by the caller.
        if tracking.user_jobs_only || tracking.only_started_jobs {
            format!("qstat -u {}", tracking.user)
        } else {
            "qstat -u '*'".to_string()
        }
    }

    fn parse_states(&self, result: &ExecutionResult) -> HashMap<BackendId, JobState> {
        let mut states = HashMap::new();
        for line in &result.stdout {
            // job-ID prio name user state submit/start-at queue slots
            if !line.trim_start().chars().next().is_some_and(|c| c.is_ascii_digit()) {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 5 {
                continue;
            }
            states.insert(BackendId::from(fields[0]), Self::state_from_code(fields[4]));
        }
        states
    }

    fn job_id_variable(&self) -> &'static str {
        "JOB_ID"
    }

    fn queue_variable(&self) -> &'static str {
        "QUEUE"
    }
}
