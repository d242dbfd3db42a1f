pub mod backend;
pub mod backends;
pub mod direct;
pub mod error;
pub mod manager;
pub mod plan;
pub mod submit;
pub mod wait;

pub use backend::{BackendKind, SchedulerBackend, TrackingOptions};
pub use direct::DirectJobManager;
pub use error::{Result, SchedError};
pub use manager::{create_job_manager, ClusterJobManager, JobManager};
pub use plan::{plan_submission_order, JobRequest};
pub use submit::{clamped_wait, submit_all, ResubmissionPolicy};
pub use wait::{run_exit_code, WaitSettings};
