use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use strand_core::model::{Command, ResourceSet, ResourceSetSize};
use strand_sched::JobRequest;

use crate::error::{Result, RunnerError};

/// A workflow definition file: declared configuration values plus the job
/// graph. Datasets are not part of the workflow; the same workflow runs once
/// per dataset.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowSpec {
    pub name: String,

    /// Values added to the workflow configuration layer.
    #[serde(default)]
    pub values: BTreeMap<String, String>,

    #[serde(default)]
    pub jobs: Vec<JobSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobSpec {
    pub key: String,
    pub executable: PathBuf,

    #[serde(default)]
    pub arguments: Vec<String>,

    #[serde(default)]
    pub parameters: BTreeMap<String, String>,

    /// Keys of jobs this one depends on.
    #[serde(default)]
    pub parents: Vec<String>,

    #[serde(default)]
    pub resources: ResourceSet,

    /// Per-size resource overrides, selected with --used-resources-size.
    /// Sizes without an entry fall back to the default resources.
    #[serde(default)]
    pub resources_by_size: HashMap<ResourceSetSize, ResourceSet>,
}

impl JobSpec {
    pub fn resources_for(&self, size: Option<ResourceSetSize>) -> &ResourceSet {
        size.and_then(|s| self.resources_by_size.get(&s))
            .unwrap_or(&self.resources)
    }
}

impl WorkflowSpec {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs_err::read_to_string(path).map_err(|e| RunnerError::WorkflowRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let spec: WorkflowSpec = toml::from_str(&text).map_err(|e| RunnerError::WorkflowParse {
            path: path.to_path_buf(),
            source: e,
        })?;
        if spec.jobs.is_empty() {
            return Err(RunnerError::EmptyWorkflow(spec.name));
        }
        Ok(spec)
    }

    /// Expands the job graph into submission requests. `environment` is
    /// prepended to every job's parameters; `default_queue` fills in jobs
    /// that request no queue of their own.
    pub fn to_requests(
        &self,
        environment: &[(String, String)],
        default_queue: Option<&str>,
        size: Option<ResourceSetSize>,
    ) -> Vec<JobRequest> {
        self.jobs
            .iter()
            .map(|job| {
                let mut resources = job.resources_for(size).clone();
                if resources.queue.is_none() {
                    resources.queue = default_queue.map(String::from);
                }

                let mut command = Command::new(&job.key, &job.executable)
                    .with_job_name(format!("{}_{}", self.name, job.key))
                    .with_arguments(job.arguments.clone())
                    .with_resources(resources);
                for (key, value) in environment {
                    command = command.with_parameter(key, value);
                }
                for (key, value) in &job.parameters {
                    command = command.with_parameter(key, value);
                }

                let mut request = JobRequest::new(&job.key, command);
                for parent in &job.parents {
                    request = request.after(parent);
                }
                request
            })
            .collect()
    }
}
