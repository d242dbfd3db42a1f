pub mod batch;
pub mod cli;
pub mod context;
pub mod error;
pub mod report;
pub mod workflow;

pub use batch::{run_batch, BatchSettings};
pub use context::{ContextOverrides, ExecutionContext, RunResult};
pub use error::{Result, RunnerError};
pub use workflow::{JobSpec, WorkflowSpec};
