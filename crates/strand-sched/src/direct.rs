use std::collections::HashMap;
use std::sync::Arc;

use strand_core::model::{BackendId, Command, Job, JobState};
use strand_exec::shell::{shell_quote, ShellLine};
use strand_exec::ExecutionService;
use tracing::debug;

use crate::error::Result;
use crate::manager::JobManager;
use crate::wait::{run_exit_code, WaitSettings};

/// Runs jobs inline on the execution host, without any scheduler. Submission
/// blocks until the command finished, so dependencies hold trivially and the
/// wait loop has nothing left to do.
pub struct DirectJobManager {
    service: Arc<dyn ExecutionService>,
    jobs: Vec<Job>,
    next_id: u64,
}

impl DirectJobManager {
    pub fn new(service: Arc<dyn ExecutionService>) -> Self {
        DirectJobManager {
            service,
            jobs: Vec::new(),
            next_id: 1,
        }
    }

    fn command_line(command: &Command, id: &BackendId) -> String {
        // Environment assignments prefix the command, bourne-shell style.
        let mut line = ShellLine::new(format!("STRAND_JOB_ID={}", shell_quote(&id.0)));
        for (key, value) in &command.parameters {
            line = line.raw(format!("{}={}", key, shell_quote(value)));
        }
        line.arg(command.executable.to_string_lossy())
            .args(&command.arguments)
            .to_shell_string()
    }
}

impl JobManager for DirectJobManager {
    fn submit(&mut self, command: &Command, parents: &[BackendId]) -> Result<Job> {
        let id = BackendId(self.next_id.to_string());
        self.next_id += 1;

        let mut job = Job::unstarted(command, parents.to_vec());
        job.mark_submitted(id.clone());

        let line = Self::command_line(command, &id);
        debug!("Running '{}' inline as job {}", job.name, id);
        let result = self.service.execute(&line, None);

        job.exit_code = Some(result.exit_code);
        job.state = if result.successful() {
            JobState::CompletedSuccessful
        } else {
            JobState::Failed
        };
        self.jobs.push(job.clone());
        Ok(job)
    }

    fn query_states(&mut self, ids: &[BackendId]) -> Result<HashMap<BackendId, JobState>> {
        // Everything is terminal the moment submit returns.
        Ok(self
            .jobs
            .iter()
            .filter(|j| j.backend_id.as_ref().is_some_and(|id| ids.contains(id)))
            .filter_map(|j| j.backend_id.clone().map(|id| (id, j.state)))
            .collect())
    }

    fn job_id_variable(&self) -> &'static str {
        "STRAND_JOB_ID"
    }

    fn queue_variable(&self) -> &'static str {
        "STRAND_QUEUE"
    }

    fn executes_without_job_system(&self) -> bool {
        true
    }

    fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    fn jobs_mut(&mut self) -> &mut Vec<Job> {
        &mut self.jobs
    }

    fn wait_for_jobs_to_finish(&mut self, _settings: &WaitSettings) -> i32 {
        run_exit_code(&self.jobs)
    }
}
