use std::collections::HashMap;

use strand_core::model::{BackendId, Command, JobState};
use strand_exec::shell::ShellLine;
use strand_exec::ExecutionResult;

use crate::backend::{SchedulerBackend, TrackingOptions};

/// PBS/Torque adapter: submits with qsub, polls with qstat.
#[derive(Debug, Default)]
pub struct PbsBackend;

impl PbsBackend {
    pub fn new() -> Self {
        PbsBackend
    }

    fn state_from_code(code: &str) -> JobState {
        match code {
            "Q" | "H" | "W" | "T" => JobState::Queued,
            "R" | "E" => JobState::Running,
            "C" => JobState::CompletedSuccessful,
            _ => JobState::Unknown,
        }
    }
}

impl SchedulerBackend for PbsBackend {
    fn name(&self) -> &'static str {
        "pbs"
    }

    fn submission_command(&self, command: &Command, parents: &[BackendId]) -> String {
        let mut line = ShellLine::new("qsub").raw("-N").arg(&command.job_name);

        if let Some(queue) = &command.resources.queue {
            line = line.raw("-q").arg(queue);
        }
        if command.resources.nodes.is_some() || command.resources.cores.is_some() {
            let nodes = command.resources.nodes.unwrap_or(1);
            let ppn = command.resources.cores.unwrap_or(1);
            line = line.raw("-l").raw(format!("nodes={nodes}:ppn={ppn}"));
        }
        if let Some(mem) = command.resources.memory_mb {
            line = line.raw("-l").raw(format!("mem={mem}m"));
        }
        if let Some(walltime) = &command.resources.walltime {
            line = line.raw("-l").raw(format!("walltime={walltime}"));
        }
        if !parents.is_empty() {
            let ids: Vec<&str> = parents.iter().map(|p| p.0.as_str()).collect();
            line = line.raw("-W").raw(format!("depend=afterok:{}", ids.join(":")));
        }
        if !command.parameters.is_empty() {
            let assignments: Vec<String> = command
                .parameters
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            line = line.raw("-v").arg(assignments.join(","));
        }

        line.arg(command.executable.to_string_lossy())
            .args(&command.arguments)
            .to_shell_string()
    }

    fn parse_job_id(&self, result: &ExecutionResult) -> Option<BackendId> {
        // qsub prints the full id alone on stdout, e.g. "12345.pbs-server".
        result
            .first_stdout_line()
            .map(str::trim)
            .filter(|l| l.chars().next().is_some_and(|c| c.is_ascii_digit()))
            .map(BackendId::from)
    }

    fn status_command(&self, ids: &[BackendId], tracking: &TrackingOptions) -> String {
        if tracking.only_started_jobs && !ids.is_empty() {
            let ids: Vec<&str> = ids.iter().map(|i| i.0.as_str()).collect();
            format!("qstat {}", ids.join(" "))
        } else if tracking.user_jobs_only {
            format!("qstat -u {}", tracking.user)
        } else {
            "qstat".to_string()
        }
    }

    fn parse_states(&self, result: &ExecutionResult) -> HashMap<BackendId, JobState> {
        let mut states = HashMap::new();
        for line in &result.stdout {
            // Header and separator lines never start with a digit.
            if !line.trim_start().chars().next().is_some_and(|c| c.is_ascii_digit()) {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 5 {
                continue;
            }
            states.insert(BackendId::from(fields[0]), Self::state_from_code(fields[4]));
        }
        states
    }

    fn job_id_variable(&self) -> &'static str {
        "PBS_JOBID"
    }

    fn queue_variable(&self) -> &'static str {
        "PBS_QUEUE"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strand_core::model::ResourceSet;

    fn sample_command() -> Command {
        Command::new("align", "/opt/tools/align.sh")
            .with_resources(ResourceSet {
                cores: Some(4),
                memory_mb: Some(2048),
                walltime: Some("01:00:00".to_string()),
                queue: Some("fast".to_string()),
                nodes: None,
            })
            .with_parameter("SAMPLE", "tumor01")
    }

    #[test]
    fn test_submission_command_renders_all_directives() {
        let backend = PbsBackend::new();
        let cmd = backend.submission_command(
            &sample_command(),
            &[BackendId::from("11.s"), BackendId::from("12.s")],
        );
        assert!(cmd.starts_with("qsub -N 'strand_align'"));
        assert!(cmd.contains("-q 'fast'"));
        assert!(cmd.contains("-l nodes=1:ppn=4"));
        assert!(cmd.contains("-l mem=2048m"));
        assert!(cmd.contains("-l walltime=01:00:00"));
        assert!(cmd.contains("-W depend=afterok:11.s:12.s"));
        assert!(cmd.contains("-v 'SAMPLE=tumor01'"));
        assert!(cmd.ends_with("'/opt/tools/align.sh'"));
    }

    #[test]
    fn test_no_dependency_flag_without_parents() {
        let backend = PbsBackend::new();
        let cmd = backend.submission_command(&Command::new("x", "/bin/true"), &[]);
        assert!(!cmd.contains("depend="));
    }

    #[test]
    fn test_parse_job_id() {
        let backend = PbsBackend::new();
        let result = ExecutionResult {
            exit_code: 0,
            stdout: vec!["".to_string(), "12345.pbs-server".to_string()],
            stderr: vec![],
        };
        assert_eq!(
            backend.parse_job_id(&result),
            Some(BackendId::from("12345.pbs-server"))
        );
    }

    #[test]
    fn test_parse_job_id_rejects_noise() {
        let backend = PbsBackend::new();
        let result = ExecutionResult {
            exit_code: 0,
            stdout: vec!["qsub: waiting for job".to_string()],
            stderr: vec![],
        };
        assert_eq!(backend.parse_job_id(&result), None);
    }

    #[test]
    fn test_parse_states_skips_header() {
        let backend = PbsBackend::new();
        let result = ExecutionResult {
            exit_code: 0,
            stdout: vec![
                "Job ID    Name      User   Time Use S Queue".to_string(),
                "--------- --------- ------ -------- - -----".to_string(),
                "11.s      strand_a  user1  00:01:02 R fast".to_string(),
                "12.s      strand_b  user1  0        Q fast".to_string(),
                "13.s      strand_c  user1  00:05:00 C fast".to_string(),
            ],
            stderr: vec![],
        };
        let states = backend.parse_states(&result);
        assert_eq!(states[&BackendId::from("11.s")], JobState::Running);
        assert_eq!(states[&BackendId::from("12.s")], JobState::Queued);
        assert_eq!(
            states[&BackendId::from("13.s")],
            JobState::CompletedSuccessful
        );
    }

    #[test]
    fn test_status_command_variants() {
        let backend = PbsBackend::new();
        let ids = [BackendId::from("11.s")];
        let started_only = TrackingOptions {
            only_started_jobs: true,
            ..Default::default()
        };
        assert_eq!(backend.status_command(&ids, &started_only), "qstat 11.s");
        assert_eq!(
            backend.status_command(&ids, &TrackingOptions::default()),
            "qstat"
        );
    }
}
