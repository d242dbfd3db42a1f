use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use strand_core::model::ResourceSetSize;
use strand_sched::ResubmissionPolicy;

use crate::error::{Result, RunnerError};

#[derive(Parser, Debug)]
#[command(
    name = "strand",
    version,
    about = "Submits workflow job graphs to cluster schedulers.",
    long_about = "Reads a workflow definition and submits its jobs, in dependency order, \
                  to a PBS, LSF, SGE or Slurm scheduler, or runs them directly."
)]
pub struct Cli {
    #[arg(help = "Workflow definition file (TOML)")]
    pub workflow: PathBuf,

    #[arg(help = "Dataset identifiers to run the workflow for", required = true)]
    pub datasets: Vec<String>,

    #[arg(long, help = "Path to strand.toml (defaults to ./strand.toml, then the XDG config dir)")]
    pub settings: Option<PathBuf>,

    #[arg(long, help = "Scheduler backend: pbs, lsf, sge, slurm or direct. Overrides the settings file.")]
    pub backend: Option<String>,

    #[arg(long, help = "Block until every submitted job reached a terminal state")]
    pub wait_for_jobs: bool,

    #[arg(
        long,
        num_args = 0..=2,
        value_names = ["ATTEMPTS", "WAIT_SECONDS"],
        help = "Resubmit rejected jobs, up to ATTEMPTS times total, pausing WAIT_SECONDS between tries"
    )]
    pub resubmit_on_error: Option<Vec<u64>>,

    #[arg(
        long,
        value_name = "IN[,OUT]",
        help = "Override the input (and optionally output) base directory"
    )]
    pub use_io_dir: Option<String>,

    #[arg(long, value_name = "SIZE", help = "Resource preset: t, s, m, l or xl")]
    pub used_resources_size: Option<String>,

    #[arg(
        long,
        num_args = 0..=1,
        default_missing_value = "4",
        value_name = "COUNT",
        help = "Run up to COUNT datasets concurrently"
    )]
    pub autosubmit: Option<usize>,

    #[arg(long, help = "Restrict status queries to jobs owned by the current user")]
    pub track_user_jobs_only: bool,

    #[arg(long, help = "Restrict status queries to jobs started by this run")]
    pub track_only_started_jobs: bool,

    #[arg(
        long,
        value_delimiter = ',',
        value_name = "KEY=VALUE",
        help = "Configuration value overrides, most specific layer"
    )]
    pub cvalues: Vec<String>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true, help = "Increase verbosity level (-v for debug, -vv for trace)")]
    pub verbose: u8,
}

/// Parsed form of --use-io-dir.
#[derive(Debug, Clone)]
pub struct IoDirOverride {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
}

impl Cli {
    pub fn io_dir_override(&self) -> Option<IoDirOverride> {
        self.use_io_dir.as_ref().map(|raw| {
            let (input, output) = match raw.split_once(',') {
                Some((i, o)) => (i, Some(PathBuf::from(o))),
                None => (raw.as_str(), None),
            };
            IoDirOverride {
                input: PathBuf::from(input),
                output,
            }
        })
    }

    pub fn parsed_cvalues(&self) -> Result<Vec<(String, String)>> {
        self.cvalues
            .iter()
            .map(|entry| {
                entry
                    .split_once('=')
                    .map(|(k, v)| (k.trim().to_string(), v.to_string()))
                    .ok_or_else(|| RunnerError::InvalidFlag {
                        flag: "--cvalues",
                        value: entry.clone(),
                        hint: "Expected KEY=VALUE pairs separated by commas.".to_string(),
                    })
            })
            .collect()
    }

    pub fn parsed_resources_size(&self) -> Result<Option<ResourceSetSize>> {
        self.used_resources_size
            .as_deref()
            .map(|raw| {
                raw.parse().map_err(|e| RunnerError::InvalidFlag {
                    flag: "--used-resources-size",
                    value: raw.to_string(),
                    hint: format!("{e}"),
                })
            })
            .transpose()
    }

    /// Resubmission policy from --resubmit-on-error. The bare flag enables
    /// one retry; the wait is clamped to the scheduler-friendly minimum.
    pub fn resubmission_policy(&self, default_wait: Duration) -> ResubmissionPolicy {
        match &self.resubmit_on_error {
            None => ResubmissionPolicy::default(),
            Some(values) => {
                let attempts = values.first().copied().unwrap_or(2).max(1) as u32;
                let wait = values
                    .get(1)
                    .map(|w| Duration::from_secs(*w))
                    .unwrap_or(default_wait);
                ResubmissionPolicy::new(attempts, wait)
            }
        }
    }
}
