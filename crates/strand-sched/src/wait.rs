use std::time::Duration;

use strand_core::constants::{exit, timing};
use strand_core::model::{Job, JobState};

/// Timing for the post-submission polling loop. Schedulers need a moment to
/// register fresh jobs, hence the initial delay before the first query.
#[derive(Debug, Clone)]
pub struct WaitSettings {
    pub initial_delay: Duration,
    pub poll_interval: Duration,
    /// Upper bound on total waiting. None waits until every job is terminal.
    pub deadline: Option<Duration>,
}

impl Default for WaitSettings {
    fn default() -> Self {
        WaitSettings {
            initial_delay: Duration::from_secs(timing::DEFAULT_PRE_POLL_DELAY_SECS),
            poll_interval: Duration::from_secs(timing::DEFAULT_POLL_INTERVAL_SECS),
            deadline: None,
        }
    }
}

impl WaitSettings {
    /// Zero-delay settings for synchronous backends and tests.
    pub fn immediate() -> Self {
        WaitSettings {
            initial_delay: Duration::ZERO,
            poll_interval: Duration::ZERO,
            deadline: None,
        }
    }
}

/// Aggregate exit code for a finished run: the number of failed jobs, capped
/// so it stays a valid process exit code. Aborted and Unknown jobs are not
/// successes, but only Failed counts here.
pub fn run_exit_code(jobs: &[Job]) -> i32 {
    let failed = jobs.iter().filter(|j| j.state == JobState::Failed).count() as i32;
    failed.min(exit::MAX_RUN_EXIT_CODE)
}
