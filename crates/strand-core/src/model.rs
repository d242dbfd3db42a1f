use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Scheduler-assigned job identifier. Opaque; formats differ per backend
/// ("12345.pbs-server", "987654", ...).
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, Ord, PartialOrd)]
pub struct BackendId(pub String);

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for BackendId {
    fn from(s: String) -> Self {
        BackendId(s)
    }
}

impl From<&str> for BackendId {
    fn from(s: &str) -> Self {
        BackendId(s.to_string())
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum JobState {
    #[default]
    Unstarted,
    Submitted,
    Queued,
    Running,
    CompletedSuccessful,
    Failed,
    Aborted,
    /// The backend could not classify the job, e.g. because it aged out of
    /// the scheduler history. Never treated as success.
    Unknown,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::CompletedSuccessful | JobState::Failed | JobState::Aborted
        )
    }

    pub fn is_successful(&self) -> bool {
        matches!(self, JobState::CompletedSuccessful)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Unstarted => write!(f, "unstarted"),
            JobState::Submitted => write!(f, "submitted"),
            JobState::Queued => write!(f, "queued"),
            JobState::Running => write!(f, "running"),
            JobState::CompletedSuccessful => write!(f, "completed-successful"),
            JobState::Failed => write!(f, "failed"),
            JobState::Aborted => write!(f, "aborted"),
            JobState::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseJobStateError(pub String);

impl fmt::Display for ParseJobStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid job state: '{}'", self.0)
    }
}

impl std::error::Error for ParseJobStateError {}

impl FromStr for JobState {
    type Err = ParseJobStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unstarted" => Ok(JobState::Unstarted),
            "submitted" => Ok(JobState::Submitted),
            "queued" => Ok(JobState::Queued),
            "running" => Ok(JobState::Running),
            "completed-successful" => Ok(JobState::CompletedSuccessful),
            "failed" => Ok(JobState::Failed),
            "aborted" => Ok(JobState::Aborted),
            "unknown" => Ok(JobState::Unknown),
            _ => Err(ParseJobStateError(s.to_string())),
        }
    }
}

/// Resource-size preset selectable with --used-resources-size. Workflows may
/// declare per-size resource sets; the preset picks which one applies.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceSetSize {
    T,
    S,
    M,
    L,
    Xl,
}

impl fmt::Display for ResourceSetSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceSetSize::T => write!(f, "t"),
            ResourceSetSize::S => write!(f, "s"),
            ResourceSetSize::M => write!(f, "m"),
            ResourceSetSize::L => write!(f, "l"),
            ResourceSetSize::Xl => write!(f, "xl"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseResourceSetSizeError(pub String);

impl fmt::Display for ParseResourceSetSizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid resource set size: '{}'. Valid values are: t, s, m, l, xl",
            self.0
        )
    }
}

impl std::error::Error for ParseResourceSetSizeError {}

impl FromStr for ResourceSetSize {
    type Err = ParseResourceSetSizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "t" => Ok(ResourceSetSize::T),
            "s" => Ok(ResourceSetSize::S),
            "m" => Ok(ResourceSetSize::M),
            "l" => Ok(ResourceSetSize::L),
            "xl" => Ok(ResourceSetSize::Xl),
            _ => Err(ParseResourceSetSizeError(s.to_string())),
        }
    }
}

/// Resource request attached to a Command. Rendered into backend-native
/// directives by the scheduler backends.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cores: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<u64>,

    /// Walltime in scheduler format, e.g. "01:00:00".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub walltime: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub nodes: Option<u32>,
}

/// One concrete invocation to be scheduled. Immutable once handed to a
/// JobManager; one Command produces exactly one Job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub tool_id: String,
    pub job_name: String,
    pub executable: PathBuf,
    #[serde(default)]
    pub arguments: Vec<String>,
    /// Named parameters, exported to the job as environment assignments.
    #[serde(default)]
    pub parameters: Vec<(String, String)>,
    #[serde(default)]
    pub resources: ResourceSet,
}

impl Command {
    pub fn new(tool_id: impl Into<String>, executable: impl Into<PathBuf>) -> Self {
        let tool_id = tool_id.into();
        Command {
            job_name: format!("strand_{tool_id}"),
            tool_id,
            executable: executable.into(),
            arguments: Vec::new(),
            parameters: Vec::new(),
            resources: ResourceSet::default(),
        }
    }

    pub fn with_arguments(mut self, arguments: Vec<String>) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.push((key.into(), value.into()));
        self
    }

    pub fn with_resources(mut self, resources: ResourceSet) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_job_name(mut self, name: impl Into<String>) -> Self {
        self.job_name = name.into();
        self
    }
}

/// One scheduled unit of work. Kept for the life of the run for reporting;
/// re-execution requires a new Job from a new Command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unset until the backend accepted the submission.
    pub backend_id: Option<BackendId>,
    pub name: String,
    pub tool_id: String,
    /// Backend ids of jobs this one depends on. They must have been
    /// submitted through the same JobManager beforehand.
    pub parents: Vec<BackendId>,
    pub state: JobState,
    pub exit_code: Option<i32>,
    pub submitted_at: Option<DateTime<Local>>,
    pub resubmissions: u32,
}

impl Job {
    pub fn unstarted(command: &Command, parents: Vec<BackendId>) -> Self {
        Job {
            backend_id: None,
            name: command.job_name.clone(),
            tool_id: command.tool_id.clone(),
            parents,
            state: JobState::Unstarted,
            exit_code: None,
            submitted_at: None,
            resubmissions: 0,
        }
    }

    pub fn mark_submitted(&mut self, backend_id: BackendId) {
        self.backend_id = Some(backend_id);
        self.state = JobState::Submitted;
        self.submitted_at = Some(Local::now());
    }
}
