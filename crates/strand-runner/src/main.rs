use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use strand_core::constants::exit;
use strand_core::logging::{self, LogLevel, LoggingConfig};
use strand_core::settings::Settings;
use strand_exec::preflight::verify_execution_requirements;
use strand_exec::{build_execution_service, ExecutionService};
use strand_runner::cli::Cli;
use strand_runner::context::{ContextOverrides, ExecutionContext};
use strand_runner::error::Result;
use strand_runner::workflow::WorkflowSpec;
use strand_runner::{report, run_batch, BatchSettings};
use strand_sched::{
    create_job_manager, submit_all, BackendKind, JobManager, ResubmissionPolicy, TrackingOptions,
    WaitSettings,
};

fn main() {
    let cli = Cli::parse();

    logging::set_log_level_from_env();
    match cli.verbose {
        0 => {}
        1 => logging::set_log_level(LogLevel::Debug),
        _ => logging::set_log_level(LogLevel::Trace),
    }
    if logging::init_session_logger(&LoggingConfig::default()).is_err() {
        logging::init_stderr_logger();
    }

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            eprintln!("{} {}", "error:".red().bold(), error);
            std::process::exit(exit::FATAL);
        }
    }
}

fn backend_variables(kind: BackendKind) -> (&'static str, &'static str) {
    match kind.scheduler() {
        Some(backend) => (backend.job_id_variable(), backend.queue_variable()),
        None => ("STRAND_JOB_ID", "STRAND_QUEUE"),
    }
}

fn run(cli: Cli) -> Result<i32> {
    let settings = Settings::load(cli.settings.as_deref())?;
    let backend: BackendKind = cli
        .backend
        .as_deref()
        .unwrap_or(&settings.backend)
        .parse()?;

    let service = build_execution_service(&settings.execution);
    verify_execution_requirements(service.as_ref())?;

    let workflow = WorkflowSpec::load(&cli.workflow)?;
    // Reject malformed job graphs before anything reaches a backend; the
    // topology is the same for every dataset.
    strand_sched::plan_submission_order(&workflow.to_requests(&[], None, None))?;

    let overrides = ContextOverrides {
        cvalues: cli.parsed_cvalues()?,
        io_dir: cli.io_dir_override(),
        used_resources_size: cli.parsed_resources_size()?,
    };

    let default_wait = Duration::from_secs(settings.resubmission.wait_seconds);
    let policy = if cli.resubmit_on_error.is_some() {
        cli.resubmission_policy(default_wait)
    } else if settings.resubmission.attempts > 1 {
        ResubmissionPolicy::new(settings.resubmission.attempts, default_wait)
    } else {
        ResubmissionPolicy::default()
    };

    let wait_settings = WaitSettings {
        initial_delay: Duration::from_secs(settings.wait.initial_delay_seconds),
        poll_interval: Duration::from_secs(settings.wait.poll_interval_seconds),
        deadline: settings.wait.deadline_seconds.map(Duration::from_secs),
    };
    let tracking = TrackingOptions {
        user_jobs_only: cli.track_user_jobs_only,
        only_started_jobs: cli.track_only_started_jobs,
        ..Default::default()
    };

    let (job_id_variable, queue_variable) = backend_variables(backend);
    let contexts: Vec<ExecutionContext> = cli
        .datasets
        .iter()
        .map(|dataset| {
            ExecutionContext::build(
                dataset,
                &settings,
                job_id_variable,
                queue_variable,
                &settings.project,
                &settings.analysis,
                &workflow.values,
                &overrides,
            )
        })
        .collect();

    let batch = match cli.autosubmit {
        Some(count) => BatchSettings::with_max_active(count),
        None => BatchSettings::sequential(),
    };

    let wait_for_jobs = cli.wait_for_jobs;
    let worker_workflow = workflow.clone();
    let worker_service: Arc<dyn ExecutionService> = Arc::clone(&service);
    let contexts = run_batch(
        contexts,
        batch,
        Arc::new(move |mut context| {
            let mut manager: Box<dyn JobManager> = create_job_manager(
                backend,
                Arc::clone(&worker_service),
                tracking.clone(),
            );
            let environment = context.job_environment();
            let requests = worker_workflow.to_requests(
                &environment,
                context.default_queue().as_deref(),
                context.used_resources_size(),
            );
            match submit_all(manager.as_mut(), &requests, &policy) {
                Ok(_) => {
                    if wait_for_jobs || manager.executes_without_job_system() {
                        manager.wait_for_jobs_to_finish(&wait_settings);
                    }
                }
                Err(error) => {
                    tracing::error!("Dataset '{}': {}", context.dataset_id(), error);
                }
            }
            context.record_jobs(manager.jobs().to_vec());
            context
        }),
    );

    for context in &contexts {
        println!();
        println!("Dataset {}", context.dataset_id().bold());
        println!("{}", report::job_table(context.jobs()));
    }
    println!("{}", report::run_summary(&contexts));

    let failed: usize = contexts.iter().map(|c| c.run_result().failed).sum();
    Ok((failed as i32).min(exit::MAX_RUN_EXIT_CODE))
}
