use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use strand_core::model::{BackendId, Command, JobState};
use strand_exec::ExecutionResult;

use crate::backends::{lsf::LsfBackend, pbs::PbsBackend, sge::SgeBackend, slurm::SlurmBackend};
use crate::error::SchedError;

/// Controls which jobs a status query covers. Restricting the query keeps
/// qstat/bjobs output small on busy clusters.
#[derive(Debug, Clone)]
pub struct TrackingOptions {
    /// Query only jobs owned by `user` instead of the whole queue.
    pub user_jobs_only: bool,
    pub user: String,
    /// Query only jobs started by this run, by explicit id list.
    pub only_started_jobs: bool,
}

impl Default for TrackingOptions {
    fn default() -> Self {
        TrackingOptions {
            user_jobs_only: false,
            user: whoami::username().unwrap_or_default(),
            only_started_jobs: false,
        }
    }
}

/// Everything strand needs to know about one cluster scheduler's command-line
/// surface. Backends build command strings and parse the tool output; they
/// never execute anything themselves.
pub trait SchedulerBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Full submission command line for `command`, holding the job until all
    /// `parents` finished successfully.
    fn submission_command(&self, command: &Command, parents: &[BackendId]) -> String;

    /// Extracts the scheduler-assigned id from a successful submission.
    fn parse_job_id(&self, result: &ExecutionResult) -> Option<BackendId>;

    /// Status query covering `ids` as far as the tracking options allow.
    fn status_command(&self, ids: &[BackendId], tracking: &TrackingOptions) -> String;

    /// Parses a status query's output into per-job states. Jobs absent from
    /// the output are simply absent from the map.
    fn parse_states(&self, result: &ExecutionResult) -> HashMap<BackendId, JobState>;

    /// Secondary query for jobs the primary one no longer lists, e.g. sacct
    /// for jobs that left the Slurm queue. Output is fed back through
    /// `parse_states`.
    fn fallback_status_command(&self, _ids: &[BackendId]) -> Option<String> {
        None
    }

    /// Environment variable the scheduler sets to the job's own id.
    fn job_id_variable(&self) -> &'static str;

    /// Environment variable the scheduler sets to the job's queue.
    fn queue_variable(&self) -> &'static str;
}

/// The closed set of supported backends. Selected by name in strand.toml or
/// with --backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Pbs,
    Lsf,
    Sge,
    Slurm,
    Direct,
}

impl BackendKind {
    /// Scheduler CLI adapter for cluster kinds; Direct has no scheduler and
    /// is handled by its own job manager.
    pub fn scheduler(&self) -> Option<Box<dyn SchedulerBackend>> {
        match self {
            BackendKind::Pbs => Some(Box::new(PbsBackend::new())),
            BackendKind::Lsf => Some(Box::new(LsfBackend::new())),
            BackendKind::Sge => Some(Box::new(SgeBackend::new())),
            BackendKind::Slurm => Some(Box::new(SlurmBackend::new())),
            BackendKind::Direct => None,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Pbs => write!(f, "pbs"),
            BackendKind::Lsf => write!(f, "lsf"),
            BackendKind::Sge => write!(f, "sge"),
            BackendKind::Slurm => write!(f, "slurm"),
            BackendKind::Direct => write!(f, "direct"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = SchedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pbs" | "torque" => Ok(BackendKind::Pbs),
            "lsf" => Ok(BackendKind::Lsf),
            "sge" => Ok(BackendKind::Sge),
            "slurm" => Ok(BackendKind::Slurm),
            "direct" | "local" => Ok(BackendKind::Direct),
            _ => Err(SchedError::UnknownBackend(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_from_str() {
        assert_eq!("PBS".parse::<BackendKind>().unwrap(), BackendKind::Pbs);
        assert_eq!("torque".parse::<BackendKind>().unwrap(), BackendKind::Pbs);
        assert_eq!("local".parse::<BackendKind>().unwrap(), BackendKind::Direct);
        assert!(matches!(
            "condor".parse::<BackendKind>(),
            Err(SchedError::UnknownBackend(_))
        ));
    }

    #[test]
    fn test_default_tracking_is_unrestricted() {
        let tracking = TrackingOptions::default();
        assert!(!tracking.user_jobs_only);
        assert!(!tracking.only_started_jobs);
    }

    #[test]
    fn test_cluster_kinds_have_schedulers() {
        for kind in [
            BackendKind::Pbs,
            BackendKind::Lsf,
            BackendKind::Sge,
            BackendKind::Slurm,
        ] {
            assert!(kind.scheduler().is_some(), "{kind} should have a scheduler");
        }
        assert!(BackendKind::Direct.scheduler().is_none());
    }
}
