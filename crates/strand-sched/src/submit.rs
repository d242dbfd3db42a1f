use std::collections::HashMap;
use std::time::Duration;

use strand_core::constants::timing;
use strand_core::model::{BackendId, Job, JobState};
use tracing::{debug, warn};

use crate::error::Result;
use crate::manager::JobManager;
use crate::plan::{plan_submission_order, JobRequest};

/// How often a rejected submission is retried and how long to pause between
/// attempts. The wait is clamped so bursts of resubmissions cannot hammer a
/// scheduler that just refused a job.
#[derive(Debug, Clone)]
pub struct ResubmissionPolicy {
    /// Total attempts per job; 1 disables resubmission.
    pub max_attempts: u32,
    pub wait: Duration,
}

impl Default for ResubmissionPolicy {
    fn default() -> Self {
        ResubmissionPolicy {
            max_attempts: 1,
            wait: Duration::from_secs(timing::MIN_RESUBMISSION_WAIT_SECS),
        }
    }
}

impl ResubmissionPolicy {
    pub fn new(max_attempts: u32, wait: Duration) -> Self {
        ResubmissionPolicy {
            max_attempts: max_attempts.max(1),
            wait: clamped_wait(wait),
        }
    }

    pub fn enabled(&self) -> bool {
        self.max_attempts > 1
    }
}

/// Fixed-interval resubmission wait, never below the scheduler-friendly
/// minimum.
pub fn clamped_wait(requested: Duration) -> Duration {
    requested.max(Duration::from_secs(timing::MIN_RESUBMISSION_WAIT_SECS))
}

/// Submits all requests in dependency order. A request whose parent did not
/// end successfully is recorded as Aborted without touching the backend;
/// failure of one job leaves independent siblings untouched. Returns the
/// final Job per request, in submission order.
pub fn submit_all(
    manager: &mut dyn JobManager,
    requests: &[JobRequest],
    policy: &ResubmissionPolicy,
) -> Result<Vec<Job>> {
    let order = plan_submission_order(requests)?;

    let mut ids_by_key: HashMap<&str, BackendId> = HashMap::new();
    let mut dead_keys: Vec<&str> = Vec::new();
    let mut submitted = Vec::with_capacity(requests.len());

    for index in order {
        let request = &requests[index];

        let parents: Vec<BackendId> = request
            .parents
            .iter()
            .filter_map(|p| ids_by_key.get(p.as_str()).cloned())
            .collect();

        if request
            .parents
            .iter()
            .any(|p| dead_keys.contains(&p.as_str()))
        {
            debug!(
                "Not submitting '{}': a parent already failed or was aborted",
                request.key
            );
            let mut job = Job::unstarted(&request.command, parents);
            job.state = JobState::Aborted;
            manager.jobs_mut().push(job.clone());
            dead_keys.push(request.key.as_str());
            submitted.push(job);
            continue;
        }

        let mut outcome = manager.submit(&request.command, &parents);
        let mut attempts = 1;
        while outcome.is_err() && attempts < policy.max_attempts {
            warn!(
                "Submission of '{}' failed (attempt {}/{}), retrying in {:?}",
                request.key, attempts, policy.max_attempts, policy.wait
            );
            // Drop the failed record; the retry produces the job's one record.
            manager.jobs_mut().pop();
            std::thread::sleep(policy.wait);
            attempts += 1;
            outcome = manager.submit(&request.command, &parents);
        }

        match outcome {
            Ok(mut job) => {
                job.resubmissions = attempts - 1;
                if let Some(record) = manager.jobs_mut().last_mut() {
                    record.resubmissions = job.resubmissions;
                }
                if let Some(id) = &job.backend_id {
                    ids_by_key.insert(request.key.as_str(), id.clone());
                }
                // Direct backends run the job inline; a failure there poisons
                // children exactly like a failed submission.
                if job.state == JobState::Failed || job.state == JobState::Aborted {
                    dead_keys.push(request.key.as_str());
                }
                submitted.push(job);
            }
            Err(error) => {
                warn!("Giving up on '{}': {}", request.key, error);
                dead_keys.push(request.key.as_str());
                if let Some(record) = manager.jobs_mut().last_mut() {
                    record.resubmissions = attempts - 1;
                    submitted.push(record.clone());
                }
            }
        }
    }

    Ok(submitted)
}
