use std::sync::Arc;

use strand_core::model::{Command, JobState};
use strand_sched::backend::BackendKind;
use strand_sched::{
    create_job_manager, submit_all, JobManager, JobRequest, ResubmissionPolicy, TrackingOptions,
    WaitSettings,
};
use strand_test_utils::{failure, success, ScriptedExecutionService};

#[test]
fn test_wait_loop_polls_until_jobs_leave_the_queue() {
    let service = Arc::new(ScriptedExecutionService::new());
    service.on("qsub", success(&["11.server"]));
    service.on("qsub", success(&["12.server"]));
    service.on(
        "qstat",
        success(&[
            "Job ID     Name      User  Time Use S Queue",
            "---------- --------- ----- -------- - -----",
            "11.server  strand_a  user  00:00:01 R fast",
            "12.server  strand_b  user  0        Q fast",
        ]),
    );
    // Second tick: both jobs report completed.
    service.on(
        "qstat",
        success(&[
            "Job ID     Name      User  Time Use S Queue",
            "---------- --------- ----- -------- - -----",
            "11.server  strand_a  user  00:00:09 C fast",
            "12.server  strand_b  user  00:00:04 C fast",
        ]),
    );

    let mut manager =
        create_job_manager(BackendKind::Pbs, service.clone(), TrackingOptions::default());
    submit_all(
        manager.as_mut(),
        &[
            JobRequest::new("a", Command::new("a", "/opt/tools/a.sh")),
            JobRequest::new("b", Command::new("b", "/opt/tools/b.sh")),
        ],
        &ResubmissionPolicy::default(),
    )
    .unwrap();

    let exit = manager.wait_for_jobs_to_finish(&WaitSettings::immediate());

    assert_eq!(exit, 0);
    for job in manager.jobs() {
        assert_eq!(job.state, JobState::CompletedSuccessful);
    }
    assert_eq!(service.calls_matching("qstat"), 2);
}

#[test]
fn test_job_gone_without_completion_record_stays_unknown() {
    let service = Arc::new(ScriptedExecutionService::new());
    service.on("qsub", success(&["11.server"]));
    // The queue answers, but no longer knows the job at all.
    service.on(
        "qstat",
        success(&[
            "Job ID     Name      User  Time Use S Queue",
            "---------- --------- ----- -------- - -----",
        ]),
    );

    let mut manager =
        create_job_manager(BackendKind::Pbs, service.clone(), TrackingOptions::default());
    submit_all(
        manager.as_mut(),
        &[JobRequest::new("a", Command::new("a", "/opt/tools/a.sh"))],
        &ResubmissionPolicy::default(),
    )
    .unwrap();

    let exit = manager.wait_for_jobs_to_finish(&WaitSettings::immediate());

    // Gone without a record is never a success, but it is not a failure
    // either, and the wait loop must not poll such a job forever.
    assert_eq!(exit, 0);
    assert_eq!(manager.jobs()[0].state, JobState::Unknown);
    assert_eq!(service.calls_matching("qstat"), 1);
}

#[test]
fn test_failed_status_query_degrades_to_unknown_then_recovers() {
    let service = Arc::new(ScriptedExecutionService::new());
    service.on("sbatch", success(&["100"]));
    service.on("squeue", failure(1, &["slurm_load_jobs error"]));
    service.on("squeue", success(&["100 COMPLETED"]));

    let mut manager = create_job_manager(
        BackendKind::Slurm,
        service.clone(),
        TrackingOptions::default(),
    );
    submit_all(
        manager.as_mut(),
        &[JobRequest::new("a", Command::new("a", "/opt/tools/a.sh"))],
        &ResubmissionPolicy::default(),
    )
    .unwrap();

    let exit = manager.wait_for_jobs_to_finish(&WaitSettings::immediate());

    assert_eq!(exit, 0);
    assert_eq!(manager.jobs()[0].state, JobState::CompletedSuccessful);
    // First tick failed, so a second one was needed.
    assert_eq!(service.calls_matching("squeue"), 2);
}

#[test]
fn test_slurm_jobs_gone_from_queue_are_resolved_through_sacct() {
    let service = Arc::new(ScriptedExecutionService::new());
    service.on("sbatch", success(&["100"]));
    service.on("sbatch", success(&["101"]));
    service.on("sbatch", success(&["102"]));
    service.on("squeue", success(&[]));
    // sacct confirms two of the three; 102 has no record anywhere.
    service.on("sacct", success(&["100 COMPLETED", "101 FAILED"]));

    let mut manager = create_job_manager(
        BackendKind::Slurm,
        service.clone(),
        TrackingOptions::default(),
    );
    submit_all(
        manager.as_mut(),
        &[
            JobRequest::new("a", Command::new("a", "/opt/tools/a.sh")),
            JobRequest::new("b", Command::new("b", "/opt/tools/b.sh")),
            JobRequest::new("c", Command::new("c", "/opt/tools/c.sh")),
        ],
        &ResubmissionPolicy::default(),
    )
    .unwrap();

    let exit = manager.wait_for_jobs_to_finish(&WaitSettings::immediate());

    assert_eq!(exit, 1);
    assert_eq!(manager.jobs()[0].state, JobState::CompletedSuccessful);
    assert_eq!(manager.jobs()[1].state, JobState::Failed);
    assert_eq!(manager.jobs()[2].state, JobState::Unknown);
}

#[test]
fn test_deadline_leaves_unresolved_jobs_unknown_not_failed() {
    let service = Arc::new(ScriptedExecutionService::new());
    service.on("qsub", success(&["11.server"]));
    // The job never progresses past the queue.
    service.on(
        "qstat",
        success(&[
            "Job ID     Name      User  Time Use S Queue",
            "11.server  strand_a  user  0        Q fast",
        ]),
    );

    let mut manager =
        create_job_manager(BackendKind::Pbs, service.clone(), TrackingOptions::default());
    submit_all(
        manager.as_mut(),
        &[JobRequest::new("a", Command::new("a", "/opt/tools/a.sh"))],
        &ResubmissionPolicy::default(),
    )
    .unwrap();

    let settings = WaitSettings {
        deadline: Some(std::time::Duration::ZERO),
        ..WaitSettings::immediate()
    };
    let exit = manager.wait_for_jobs_to_finish(&settings);

    assert_eq!(exit, 0);
    assert_eq!(manager.jobs()[0].state, JobState::Unknown);
}
