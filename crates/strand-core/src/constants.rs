pub mod cvalues {
    pub const JOB_ID_VARIABLE: &str = "STRAND_JOBID";
    pub const QUEUE_VARIABLE: &str = "STRAND_QUEUE";
    pub const SCRATCH_DIR: &str = "STRAND_SCRATCH";
    pub const SCRATCH_BASE_DIRECTORY: &str = "scratchBaseDirectory";
    pub const INPUT_BASE_DIRECTORY: &str = "inputBaseDirectory";
    pub const OUTPUT_BASE_DIRECTORY: &str = "outputBaseDirectory";
    pub const USED_RESOURCES_SIZE: &str = "usedResourcesSize";
    pub const DEFAULT_QUEUE: &str = "defaultQueue";
}

pub mod layers {
    pub const APPLICATION: &str = "application";
    pub const PROJECT: &str = "project";
    pub const ANALYSIS: &str = "analysis";
    pub const WORKFLOW: &str = "workflow";
    pub const CLI: &str = "cli";
}

pub mod timing {
    /// Lower bound applied to the resubmission wait. Schedulers tend to be
    /// rate-sensitive to burst resubmission, so the wait never drops below this.
    pub const MIN_RESUBMISSION_WAIT_SECS: u64 = 2;
    /// Delay before the first status query after submission, so the scheduler
    /// has time to register new jobs.
    pub const DEFAULT_PRE_POLL_DELAY_SECS: u64 = 15;
    pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
}

pub mod exit {
    /// Process exit codes must stay within 0..=255; the failed-job count is
    /// capped below that so distinct codes remain available for fatal errors.
    pub const MAX_RUN_EXIT_CODE: i32 = 250;
    pub const FATAL: i32 = 1;
}

pub const DEFAULT_SCRATCH_BASE: &str = "/tmp";
pub const DEFAULT_AUTOSUBMIT_BATCH_COUNT: usize = 4;
pub const SETTINGS_FILE_NAME: &str = "strand.toml";
