use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error(transparent)]
    Config(#[from] strand_core::errors::ConfigError),

    #[error(transparent)]
    Exec(#[from] strand_exec::ExecError),

    #[error(transparent)]
    Sched(#[from] strand_sched::SchedError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not read workflow file '{path}': {source}")]
    WorkflowRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Workflow file '{path}' is not valid TOML: {source}")]
    WorkflowParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Workflow '{0}' declares no jobs")]
    EmptyWorkflow(String),

    #[error("Invalid value for {flag}: '{value}'. {hint}")]
    InvalidFlag {
        flag: &'static str,
        value: String,
        hint: String,
    },
}

pub type Result<T> = std::result::Result<T, RunnerError>;
