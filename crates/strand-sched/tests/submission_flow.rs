use std::sync::Arc;
use std::time::Duration;

use strand_core::model::{BackendId, Command, JobState};
use strand_sched::backend::BackendKind;
use strand_sched::{
    create_job_manager, submit_all, DirectJobManager, JobManager, JobRequest, ResubmissionPolicy,
    SchedError, TrackingOptions, WaitSettings,
};
use strand_test_utils::{failure, success, ScriptedExecutionService};

fn request(key: &str, parents: &[&str]) -> JobRequest {
    let mut r = JobRequest::new(key, Command::new(key, format!("/opt/tools/{key}.sh")));
    for p in parents {
        r = r.after(*p);
    }
    r
}

#[test]
fn test_direct_backend_runs_single_command_to_completion() {
    let service = Arc::new(ScriptedExecutionService::new());
    let mut manager = DirectJobManager::new(service.clone());

    let jobs = submit_all(
        &mut manager,
        &[request("align", &[])],
        &ResubmissionPolicy::default(),
    )
    .unwrap();

    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].state, JobState::CompletedSuccessful);
    assert_eq!(jobs[0].exit_code, Some(0));
    assert_eq!(service.call_count(), 1);
    assert_eq!(
        manager.wait_for_jobs_to_finish(&WaitSettings::immediate()),
        0
    );
}

#[test]
fn test_direct_failure_aborts_children_but_not_siblings() {
    let service = Arc::new(ScriptedExecutionService::new());
    service.on("/opt/tools/broken.sh", failure(3, &["boom"]));
    let mut manager = DirectJobManager::new(service.clone());

    let jobs = submit_all(
        &mut manager,
        &[
            request("broken", &[]),
            request("child", &["broken"]),
            request("independent", &[]),
        ],
        &ResubmissionPolicy::default(),
    )
    .unwrap();

    assert_eq!(jobs[0].state, JobState::Failed);
    assert_eq!(jobs[0].exit_code, Some(3));
    assert_eq!(jobs[1].state, JobState::Aborted);
    // The aborted child still reports which job it was waiting on.
    assert_eq!(jobs[1].parents, vec![BackendId::from("1")]);
    assert_eq!(jobs[2].state, JobState::CompletedSuccessful);
    // The aborted child never reached the execution host.
    assert_eq!(service.call_count(), 2);
    assert_eq!(
        manager.wait_for_jobs_to_finish(&WaitSettings::immediate()),
        1
    );
}

#[test]
fn test_cluster_submission_failure_records_failed_and_aborted() {
    let service = Arc::new(ScriptedExecutionService::new());
    service.on("strand_first", failure(1, &["qsub: rejected"]));
    service.on("qsub", success(&["20.server"]));
    let mut manager =
        create_job_manager(BackendKind::Pbs, service.clone(), TrackingOptions::default());

    submit_all(
        manager.as_mut(),
        &[request("first", &[]), request("second", &["first"])],
        &ResubmissionPolicy::default(),
    )
    .unwrap();

    let jobs = manager.jobs();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0].state, JobState::Failed);
    assert!(jobs[0].backend_id.is_none());
    assert_eq!(jobs[1].state, JobState::Aborted);
    assert_eq!(
        manager.wait_for_jobs_to_finish(&WaitSettings::immediate()),
        1
    );
}

#[test]
fn test_resubmission_retries_until_success() {
    let service = Arc::new(ScriptedExecutionService::new());
    service.on("qsub", failure(1, &["busy"]));
    service.on("qsub", failure(1, &["busy"]));
    service.on("qsub", success(&["77.server"]));
    let mut manager =
        create_job_manager(BackendKind::Pbs, service.clone(), TrackingOptions::default());

    let policy = ResubmissionPolicy {
        max_attempts: 3,
        wait: Duration::ZERO,
    };
    let jobs = submit_all(manager.as_mut(), &[request("align", &[])], &policy).unwrap();

    assert_eq!(service.call_count(), 3);
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].state, JobState::Submitted);
    assert_eq!(jobs[0].resubmissions, 2);
    assert_eq!(manager.jobs().len(), 1);
    assert_eq!(manager.jobs()[0].resubmissions, 2);
}

#[test]
fn test_cycle_is_rejected_before_any_submission() {
    let service = Arc::new(ScriptedExecutionService::new());
    let mut manager =
        create_job_manager(BackendKind::Pbs, service.clone(), TrackingOptions::default());

    let result = submit_all(
        manager.as_mut(),
        &[request("a", &["b"]), request("b", &["a"])],
        &ResubmissionPolicy::default(),
    );

    assert!(matches!(result, Err(SchedError::DependencyCycle(_))));
    assert_eq!(service.call_count(), 0);
    assert!(manager.jobs().is_empty());
}

#[test]
fn test_dependencies_are_rendered_from_assigned_ids() {
    let service = Arc::new(ScriptedExecutionService::new());
    service.on("qsub", success(&["31.server"]));
    service.on("qsub", success(&["32.server"]));
    let mut manager =
        create_job_manager(BackendKind::Pbs, service.clone(), TrackingOptions::default());

    submit_all(
        manager.as_mut(),
        &[request("parent", &[]), request("child", &["parent"])],
        &ResubmissionPolicy::default(),
    )
    .unwrap();

    let commands = service.commands();
    assert_eq!(commands.len(), 2);
    assert!(commands[1].contains("depend=afterok:31.server"));
}
