use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::{presets, Attribute, Cell, Color, Table};
use strand_core::model::{Job, JobState};

use crate::context::ExecutionContext;

fn state_color(state: JobState) -> Color {
    match state {
        JobState::CompletedSuccessful => Color::Green,
        JobState::Failed => Color::Red,
        JobState::Aborted => Color::DarkYellow,
        JobState::Unknown => Color::Magenta,
        _ => Color::Grey,
    }
}

/// End-of-run job table for one dataset.
pub fn job_table(jobs: &[Job]) -> String {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Job ID").add_attribute(Attribute::Bold).fg(Color::Cyan),
            Cell::new("Name").add_attribute(Attribute::Bold).fg(Color::Cyan),
            Cell::new("State").add_attribute(Attribute::Bold).fg(Color::Cyan),
            Cell::new("Exit").add_attribute(Attribute::Bold).fg(Color::Cyan),
            Cell::new("Resubmissions").add_attribute(Attribute::Bold).fg(Color::Cyan),
        ]);

    for job in jobs {
        let id = job
            .backend_id
            .as_ref()
            .map(|i| i.0.clone())
            .unwrap_or_else(|| "-".to_string());
        let exit = job
            .exit_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            Cell::new(id).fg(Color::Yellow),
            Cell::new(&job.name),
            Cell::new(job.state.to_string()).fg(state_color(job.state)),
            Cell::new(exit),
            Cell::new(job.resubmissions.to_string()),
        ]);
    }
    table.to_string()
}

/// One summary line per dataset plus the aggregate tally.
pub fn run_summary(contexts: &[ExecutionContext]) -> String {
    let mut lines = Vec::new();
    let mut total = 0usize;
    let mut failed = 0usize;

    for context in contexts {
        let result = context.run_result();
        total += context.jobs().len();
        failed += result.failed;
        let verdict = if result.success { "ok" } else { "FAILED" };
        lines.push(format!(
            "  {}: {} job(s), {} failed [{}]",
            context.dataset_id(),
            context.jobs().len(),
            result.failed,
            verdict
        ));
    }

    lines.push(format!("{failed} of {total} job(s) failed."));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use strand_core::model::{BackendId, Command};

    fn job(state: JobState, id: Option<&str>) -> Job {
        let mut job = Job::unstarted(&Command::new("align", "/opt/tools/align.sh"), vec![]);
        job.state = state;
        job.backend_id = id.map(BackendId::from);
        job
    }

    #[test]
    fn test_job_table_lists_every_job() {
        let rendered = job_table(&[
            job(JobState::CompletedSuccessful, Some("11.server")),
            job(JobState::Failed, None),
        ]);
        assert!(rendered.contains("11.server"));
        assert!(rendered.contains("completed-successful"));
        assert!(rendered.contains("failed"));
        assert!(rendered.contains("strand_align"));
    }

    #[test]
    fn test_table_renders_placeholder_for_missing_id() {
        let rendered = job_table(&[job(JobState::Aborted, None)]);
        assert!(rendered.contains('-'));
    }
}
