use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchedError {
    #[error("Submission of job '{job_name}' failed (exit {exit_code}): {stderr}")]
    SubmissionFailed {
        job_name: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("Could not extract a job identifier from the submission output: '{output}'")]
    JobIdParse { output: String },

    #[error("Job requests form a dependency cycle: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    #[error("Job request '{child}' depends on unknown request '{parent}'")]
    UnknownDependency { child: String, parent: String },

    #[error("Unknown backend '{0}'. Available backends are: pbs, lsf, sge, slurm, direct")]
    UnknownBackend(String),
}

pub type Result<T> = std::result::Result<T, SchedError>;
