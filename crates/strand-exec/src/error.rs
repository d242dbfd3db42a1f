use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("Requirements for job execution are not fulfilled on '{host}':\n{}\nPlease make sure that the dependencies are installed on the submission and execution hosts.", tools.iter().map(|t| format!("\tTool {} not found.", t)).collect::<Vec<_>>().join("\n"))]
    MissingTools { host: String, tools: Vec<String> },
}

pub type Result<T> = std::result::Result<T, ExecError>;
