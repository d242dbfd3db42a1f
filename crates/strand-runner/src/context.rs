use std::collections::BTreeMap;
use std::path::PathBuf;

use strand_core::config::{ConfigStore, ConfigValue};
use strand_core::constants::{cvalues, layers};
use strand_core::model::{Job, ResourceSetSize};
use strand_core::settings::Settings;
use strand_sched::run_exit_code;

use crate::cli::IoDirOverride;
use crate::error::Result;

/// Everything one workflow run against one dataset needs: the layered
/// configuration and, once the run happened, the jobs it produced. Contexts
/// are independent of each other; nothing here is shared.
pub struct ExecutionContext {
    dataset_id: String,
    store: ConfigStore,
    jobs: Vec<Job>,
}

/// CLI-side configuration input for a context, already parsed.
#[derive(Debug, Clone, Default)]
pub struct ContextOverrides {
    pub cvalues: Vec<(String, String)>,
    pub io_dir: Option<IoDirOverride>,
    pub used_resources_size: Option<ResourceSetSize>,
}

/// Outcome summary of one context's run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunResult {
    pub success: bool,
    pub failed: usize,
    pub exit_code: i32,
}

impl ExecutionContext {
    /// Assembles the layer stack, least specific first: application defaults
    /// (settings file plus the backend-derived variables), project, analysis,
    /// workflow values, then the CLI overrides.
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        dataset_id: impl Into<String>,
        settings: &Settings,
        job_id_variable: &str,
        queue_variable: &str,
        project: &BTreeMap<String, String>,
        analysis: &BTreeMap<String, String>,
        workflow_values: &BTreeMap<String, String>,
        overrides: &ContextOverrides,
    ) -> Self {
        let mut store = ConfigStore::new();

        store.add_layer(layers::APPLICATION);
        for (key, value) in &settings.defaults {
            store.add(layers::APPLICATION, ConfigValue::new(key, value));
        }
        store.add(
            layers::APPLICATION,
            ConfigValue::new(cvalues::SCRATCH_BASE_DIRECTORY, &settings.scratch_base_directory),
        );
        if let Some(queue) = &settings.default_queue {
            store.add(layers::APPLICATION, ConfigValue::new(cvalues::DEFAULT_QUEUE, queue));
        }
        // These stay unresolved on purpose: the scheduler expands them inside
        // the job's own environment.
        store.add(
            layers::APPLICATION,
            ConfigValue::new(cvalues::JOB_ID_VARIABLE, format!("${job_id_variable}")),
        );
        store.add(
            layers::APPLICATION,
            ConfigValue::new(cvalues::QUEUE_VARIABLE, format!("${queue_variable}")),
        );
        store.add(
            layers::APPLICATION,
            ConfigValue::new(
                cvalues::SCRATCH_DIR,
                format!("{}/${}", settings.scratch_base_directory, job_id_variable),
            ),
        );

        store.add_layer(layers::PROJECT);
        for (key, value) in project {
            store.add(layers::PROJECT, ConfigValue::new(key, value));
        }

        store.add_layer(layers::ANALYSIS);
        for (key, value) in analysis {
            store.add(layers::ANALYSIS, ConfigValue::new(key, value));
        }

        store.add_layer(layers::WORKFLOW);
        for (key, value) in workflow_values {
            store.add(layers::WORKFLOW, ConfigValue::new(key, value));
        }

        store.add_layer(layers::CLI);
        for (key, value) in &overrides.cvalues {
            store.add(layers::CLI, ConfigValue::new(key, value));
        }
        if let Some(io) = &overrides.io_dir {
            store.add(
                layers::CLI,
                ConfigValue::new(
                    cvalues::INPUT_BASE_DIRECTORY,
                    io.input.to_string_lossy().into_owned(),
                ),
            );
            if let Some(output) = &io.output {
                store.add(
                    layers::CLI,
                    ConfigValue::new(
                        cvalues::OUTPUT_BASE_DIRECTORY,
                        output.to_string_lossy().into_owned(),
                    ),
                );
            }
        }
        if let Some(size) = overrides.used_resources_size {
            store.add(
                layers::CLI,
                ConfigValue::new(cvalues::USED_RESOURCES_SIZE, size.to_string()),
            );
        }

        ExecutionContext {
            dataset_id: dataset_id.into(),
            store,
            jobs: Vec::new(),
        }
    }

    pub fn dataset_id(&self) -> &str {
        &self.dataset_id
    }

    pub fn configuration(&self) -> &ConfigStore {
        &self.store
    }

    pub fn input_dir(&self) -> Result<Option<PathBuf>> {
        match self.store.contains(cvalues::INPUT_BASE_DIRECTORY) {
            true => Ok(Some(self.store.get_path(cvalues::INPUT_BASE_DIRECTORY)?)),
            false => Ok(None),
        }
    }

    pub fn output_dir(&self) -> Result<Option<PathBuf>> {
        match self.store.contains(cvalues::OUTPUT_BASE_DIRECTORY) {
            true => Ok(Some(self.store.get_path(cvalues::OUTPUT_BASE_DIRECTORY)?)),
            false => Ok(None),
        }
    }

    pub fn default_queue(&self) -> Option<String> {
        self.store.get(cvalues::DEFAULT_QUEUE).ok()
    }

    pub fn used_resources_size(&self) -> Option<ResourceSetSize> {
        self.store
            .get(cvalues::USED_RESOURCES_SIZE)
            .ok()
            .and_then(|v| v.parse().ok())
    }

    /// Environment assignments handed to every job: the dataset id plus the
    /// scheduler-expanded variables, passed through unresolved.
    pub fn job_environment(&self) -> Vec<(String, String)> {
        let mut env = vec![("STRAND_DATASET".to_string(), self.dataset_id.clone())];
        for key in [
            cvalues::JOB_ID_VARIABLE,
            cvalues::QUEUE_VARIABLE,
            cvalues::SCRATCH_DIR,
        ] {
            if let Some(raw) = self.store.get_raw(key) {
                env.push((key.to_string(), raw.to_string()));
            }
        }
        for (key, dir) in [
            (cvalues::INPUT_BASE_DIRECTORY, self.input_dir()),
            (cvalues::OUTPUT_BASE_DIRECTORY, self.output_dir()),
        ] {
            if let Ok(Some(dir)) = dir {
                env.push((key.to_string(), dir.to_string_lossy().into_owned()));
            }
        }
        env
    }

    pub fn record_jobs(&mut self, jobs: Vec<Job>) {
        self.jobs = jobs;
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn run_result(&self) -> RunResult {
        let failed = self
            .jobs
            .iter()
            .filter(|j| j.state == strand_core::model::JobState::Failed)
            .count();
        RunResult {
            success: failed == 0,
            failed,
            exit_code: run_exit_code(&self.jobs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strand_core::model::{Command, JobState};
    use strand_core::settings::Settings;

    fn settings() -> Settings {
        Settings::parse("backend = \"pbs\"\ndefault_queue = \"normal\"\n").unwrap()
    }

    fn build(overrides: &ContextOverrides) -> ExecutionContext {
        ExecutionContext::build(
            "pid_01",
            &settings(),
            "PBS_JOBID",
            "PBS_QUEUE",
            &BTreeMap::new(),
            &BTreeMap::new(),
            &BTreeMap::new(),
            overrides,
        )
    }

    #[test]
    fn test_cli_layer_wins_over_application_defaults() {
        let overrides = ContextOverrides {
            cvalues: vec![(cvalues::DEFAULT_QUEUE.to_string(), "fast".to_string())],
            ..Default::default()
        };
        let context = build(&overrides);

        assert_eq!(context.default_queue().as_deref(), Some("fast"));
        assert_eq!(
            context.configuration().provenance(cvalues::DEFAULT_QUEUE),
            Some("cli")
        );
        // Untouched defaults keep their application-layer values.
        assert_eq!(
            context.configuration().get(cvalues::SCRATCH_BASE_DIRECTORY).unwrap(),
            "/tmp"
        );
    }

    #[test]
    fn test_scratch_dir_keeps_scheduler_variable_unresolved() {
        let context = build(&ContextOverrides::default());
        assert_eq!(
            context.configuration().get_raw(cvalues::SCRATCH_DIR),
            Some("/tmp/$PBS_JOBID")
        );
    }

    #[test]
    fn test_io_dir_override_sets_both_directories() {
        let overrides = ContextOverrides {
            io_dir: Some(IoDirOverride {
                input: PathBuf::from("/data/in"),
                output: Some(PathBuf::from("/data/out")),
            }),
            ..Default::default()
        };
        let context = build(&overrides);
        assert_eq!(context.input_dir().unwrap(), Some(PathBuf::from("/data/in")));
        assert_eq!(context.output_dir().unwrap(), Some(PathBuf::from("/data/out")));
    }

    #[test]
    fn test_job_environment_contains_dataset_and_variables() {
        let context = build(&ContextOverrides::default());
        let env = context.job_environment();
        assert!(env.contains(&("STRAND_DATASET".to_string(), "pid_01".to_string())));
        assert!(env.contains(&(cvalues::JOB_ID_VARIABLE.to_string(), "$PBS_JOBID".to_string())));
        assert!(env.contains(&(cvalues::SCRATCH_DIR.to_string(), "/tmp/$PBS_JOBID".to_string())));
    }

    #[test]
    fn test_run_result_counts_failures() {
        let mut context = build(&ContextOverrides::default());
        let command = Command::new("x", "/bin/true");
        let mut ok = Job::unstarted(&command, vec![]);
        ok.state = JobState::CompletedSuccessful;
        let mut bad = Job::unstarted(&command, vec![]);
        bad.state = JobState::Failed;
        context.record_jobs(vec![ok, bad]);

        let result = context.run_result();
        assert!(!result.success);
        assert_eq!(result.failed, 1);
        assert_eq!(result.exit_code, 1);
    }

    #[test]
    fn test_used_resources_size_from_cli() {
        let overrides = ContextOverrides {
            used_resources_size: Some(ResourceSetSize::Xl),
            ..Default::default()
        };
        let context = build(&overrides);
        assert_eq!(context.used_resources_size(), Some(ResourceSetSize::Xl));
    }
}
