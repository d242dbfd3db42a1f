use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use strand_core::model::{BackendId, Command, Job, JobState};
use strand_exec::ExecutionService;
use tracing::{debug, warn};

use crate::backend::{BackendKind, SchedulerBackend, TrackingOptions};
use crate::direct::DirectJobManager;
use crate::error::{Result, SchedError};
use crate::wait::{run_exit_code, WaitSettings};

/// One workflow run's window onto a scheduling backend. Owns the run's job
/// list; nothing is shared between concurrently running contexts except the
/// ExecutionService underneath.
pub trait JobManager: Send {
    /// Submits one command, depending on the given already-submitted parents.
    /// On failure the job is still recorded, in state Failed and without an
    /// id, so it shows up in the run report.
    fn submit(&mut self, command: &Command, parents: &[BackendId]) -> Result<Job>;

    /// One batched status query for the given ids. A failed query maps every
    /// queried id to Unknown rather than erroring; the next tick recovers.
    fn query_states(&mut self, ids: &[BackendId]) -> Result<HashMap<BackendId, JobState>>;

    fn job_id_variable(&self) -> &'static str;

    fn queue_variable(&self) -> &'static str;

    /// True when submission runs the command to completion inline, so there
    /// is nothing to poll afterwards.
    fn executes_without_job_system(&self) -> bool;

    fn jobs(&self) -> &[Job];

    fn jobs_mut(&mut self) -> &mut Vec<Job>;

    /// Polls until every tracked job is terminal or the deadline elapses.
    /// Returns the run exit code, the capped count of failed jobs.
    fn wait_for_jobs_to_finish(&mut self, settings: &WaitSettings) -> i32;
}

pub fn create_job_manager(
    kind: BackendKind,
    service: Arc<dyn ExecutionService>,
    tracking: TrackingOptions,
) -> Box<dyn JobManager> {
    match kind.scheduler() {
        Some(backend) => Box::new(ClusterJobManager::new(backend, service, tracking)),
        None => Box::new(DirectJobManager::new(service)),
    }
}

/// Drives a cluster scheduler through its command-line tools. All scheduler
/// interaction goes through the ExecutionService, so the same manager works
/// locally and over ssh.
pub struct ClusterJobManager {
    backend: Box<dyn SchedulerBackend>,
    service: Arc<dyn ExecutionService>,
    tracking: TrackingOptions,
    jobs: Vec<Job>,
    /// Ids the scheduler dropped without a completion record. Polling them
    /// again cannot yield anything, so the wait loop skips them.
    gone: HashSet<BackendId>,
}

impl ClusterJobManager {
    pub fn new(
        backend: Box<dyn SchedulerBackend>,
        service: Arc<dyn ExecutionService>,
        tracking: TrackingOptions,
    ) -> Self {
        ClusterJobManager {
            backend,
            service,
            tracking,
            jobs: Vec::new(),
            gone: HashSet::new(),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    // A failed query maps every queried id to Unknown, so an id absent from
    // `states` was dropped by a *successful* query and not confirmed by the
    // backend's fallback either. Without a completion record the job is
    // Unknown, never a success.
    fn apply_states(&mut self, states: &HashMap<BackendId, JobState>) {
        for job in &mut self.jobs {
            let Some(id) = &job.backend_id else { continue };
            if job.state.is_terminal() {
                continue;
            }
            match states.get(id) {
                Some(state) => job.state = *state,
                None => {
                    if self.gone.insert(id.clone()) {
                        warn!(
                            "Job {} ('{}') left the scheduler without a completion record; its state stays unknown",
                            id, job.name
                        );
                    }
                    job.state = JobState::Unknown;
                }
            }
        }
    }

    fn pending_ids(&self) -> Vec<BackendId> {
        self.jobs
            .iter()
            .filter(|j| !j.state.is_terminal())
            .filter_map(|j| j.backend_id.clone())
            .filter(|id| !self.gone.contains(id))
            .collect()
    }
}

impl JobManager for ClusterJobManager {
    fn submit(&mut self, command: &Command, parents: &[BackendId]) -> Result<Job> {
        let line = self.backend.submission_command(command, parents);
        let result = self.service.execute(&line, None);
        let mut job = Job::unstarted(command, parents.to_vec());

        if !result.successful() {
            job.state = JobState::Failed;
            self.jobs.push(job);
            return Err(SchedError::SubmissionFailed {
                job_name: command.job_name.clone(),
                exit_code: result.exit_code,
                stderr: result.stderr.join("; "),
            });
        }

        match self.backend.parse_job_id(&result) {
            Some(id) => {
                debug!("Submitted '{}' as {} job {}", job.name, self.backend.name(), id);
                job.mark_submitted(id);
                self.jobs.push(job.clone());
                Ok(job)
            }
            None => {
                job.state = JobState::Failed;
                self.jobs.push(job);
                Err(SchedError::JobIdParse {
                    output: result.stdout.join("\n"),
                })
            }
        }
    }

    fn query_states(&mut self, ids: &[BackendId]) -> Result<HashMap<BackendId, JobState>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let line = self.backend.status_command(ids, &self.tracking);
        let result = self.service.execute(&line, None);
        if !result.successful() {
            warn!(
                "Status query on '{}' failed with exit {}; treating {} job(s) as unknown until the next poll",
                self.service.host(),
                result.exit_code,
                ids.len()
            );
            return Ok(ids.iter().map(|id| (id.clone(), JobState::Unknown)).collect());
        }

        let mut states = self.backend.parse_states(&result);
        states.retain(|id, _| ids.contains(id));

        let absent: Vec<BackendId> = ids
            .iter()
            .filter(|id| !states.contains_key(*id))
            .cloned()
            .collect();
        if !absent.is_empty() {
            if let Some(fallback) = self.backend.fallback_status_command(&absent) {
                let result = self.service.execute(&fallback, None);
                if result.successful() {
                    for (id, state) in self.backend.parse_states(&result) {
                        if absent.contains(&id) {
                            states.insert(id, state);
                        }
                    }
                }
            }
        }

        Ok(states)
    }

    fn job_id_variable(&self) -> &'static str {
        self.backend.job_id_variable()
    }

    fn queue_variable(&self) -> &'static str {
        self.backend.queue_variable()
    }

    fn executes_without_job_system(&self) -> bool {
        false
    }

    fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    fn jobs_mut(&mut self) -> &mut Vec<Job> {
        &mut self.jobs
    }

    fn wait_for_jobs_to_finish(&mut self, settings: &WaitSettings) -> i32 {
        if self.pending_ids().is_empty() {
            return run_exit_code(&self.jobs);
        }

        std::thread::sleep(settings.initial_delay);
        let started = Instant::now();

        loop {
            let pending = self.pending_ids();
            if pending.is_empty() {
                break;
            }

            match self.query_states(&pending) {
                Ok(states) => self.apply_states(&states),
                Err(error) => warn!("Status query error: {}", error),
            }

            if self.pending_ids().is_empty() {
                break;
            }
            if let Some(deadline) = settings.deadline {
                if started.elapsed() >= deadline {
                    let unresolved = self
                        .jobs
                        .iter()
                        .filter(|j| !j.state.is_terminal())
                        .count();
                    warn!(
                        "Deadline reached with {} job(s) not terminal; their state stays unknown",
                        unresolved
                    );
                    for job in &mut self.jobs {
                        if !job.state.is_terminal() {
                            job.state = JobState::Unknown;
                        }
                    }
                    break;
                }
            }
            std::thread::sleep(settings.poll_interval);
        }

        run_exit_code(&self.jobs)
    }
}
