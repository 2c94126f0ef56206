//! Assignment lifecycle against SQLite: job mirroring, events, rollbacks

mod common;

use common::{as_contractor, contractor, dispatcher, job, monday_at, Harness};
use fieldops_core::domain::{AssignmentEventKind, AssignmentStatus, JobStatus};
use fieldops_core::port::AssignmentRepository;

async fn booked() -> (Harness, String) {
    let h = Harness::new().await;
    h.add_contractor(contractor("c-1", "plumbing", 40.0)).await;
    h.add_contractor(contractor("c-2", "plumbing", 40.1)).await;
    h.add_job(job("job-1", "plumbing", monday_at(10, 0), 120)).await;
    let created = h
        .state_machine
        .create_assignment(&"job-1".to_string(), &"c-1".to_string(), &dispatcher())
        .await
        .unwrap();
    (h, created.id)
}

#[tokio::test]
async fn test_happy_path_mirrors_job_status() {
    let (h, id) = booked().await;
    let c1 = as_contractor("c-1");

    assert_eq!(h.job_of("job-1").await.status, JobStatus::Assigned);

    h.state_machine.accept(&id, &c1).await.unwrap();
    assert_eq!(h.job_of("job-1").await.status, JobStatus::Assigned);

    h.state_machine.start(&id, &c1).await.unwrap();
    assert_eq!(h.job_of("job-1").await.status, JobStatus::InProgress);

    let done = h.state_machine.complete(&id, &c1).await.unwrap();
    assert_eq!(done.status, AssignmentStatus::Completed);
    assert!(done.accepted_at.is_some());
    assert!(done.started_at.is_some());
    assert!(done.completed_at.is_some());

    let stored_job = h.job_of("job-1").await;
    assert_eq!(stored_job.status, JobStatus::Completed);
    assert_eq!(stored_job.assigned_contractor_id.as_deref(), Some("c-1"));

    assert_eq!(
        h.events.kinds(),
        vec![
            AssignmentEventKind::AssignmentCreated,
            AssignmentEventKind::AssignmentAccepted,
            AssignmentEventKind::AssignmentStarted,
            AssignmentEventKind::AssignmentCompleted,
        ]
    );
}

#[tokio::test]
async fn test_out_of_order_transitions_change_nothing() {
    let (h, id) = booked().await;
    let c1 = as_contractor("c-1");

    let err = h.state_machine.complete(&id, &c1).await.unwrap_err();
    assert!(err.is_conflict());
    let err = h.state_machine.start(&id, &c1).await.unwrap_err();
    assert!(err.is_conflict());

    let stored = h.assignments.find_by_id(&id).await.unwrap().unwrap();
    assert_eq!(stored.status, AssignmentStatus::Pending);
    assert!(stored.started_at.is_none());
    assert_eq!(h.job_of("job-1").await.status, JobStatus::Assigned);
    assert_eq!(h.events.kinds(), vec![AssignmentEventKind::AssignmentCreated]);
}

#[tokio::test]
async fn test_terminal_assignment_cannot_move() {
    let (h, id) = booked().await;
    let c1 = as_contractor("c-1");
    h.state_machine
        .decline(&id, &c1, Some("too far".to_string()))
        .await
        .unwrap();

    let err = h.state_machine.accept(&id, &c1).await.unwrap_err();
    assert!(err.is_conflict());
    let err = h
        .state_machine
        .cancel(&id, &dispatcher(), None)
        .await
        .unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_decline_returns_job_to_the_pool() {
    let (h, id) = booked().await;

    let declined = h
        .state_machine
        .decline(&id, &as_contractor("c-1"), Some("van broke down".to_string()))
        .await
        .unwrap();
    assert_eq!(declined.reason.as_deref(), Some("van broke down"));

    let stored_job = h.job_of("job-1").await;
    assert_eq!(stored_job.status, JobStatus::Pending);
    assert!(stored_job.assigned_contractor_id.is_none());

    let set = h
        .dispatch
        .request_recommendations(&"job-1".to_string(), None, None)
        .await
        .unwrap();
    let ids: Vec<&str> = set
        .recommendations
        .iter()
        .map(|r| r.contractor_id.as_str())
        .collect();
    assert_eq!(ids, vec!["c-1", "c-2"]);

    let events = h.events.events();
    let last = events.last().unwrap();
    assert_eq!(last.kind, AssignmentEventKind::AssignmentDeclined);
    assert_eq!(last.reason.as_deref(), Some("van broke down"));
}

#[tokio::test]
async fn test_dispatcher_cancel_frees_job() {
    let (h, id) = booked().await;
    h.state_machine.accept(&id, &as_contractor("c-1")).await.unwrap();

    h.state_machine
        .cancel(&id, &dispatcher(), Some("customer rescheduled".to_string()))
        .await
        .unwrap();

    assert_eq!(h.job_of("job-1").await.status, JobStatus::Pending);
    h.state_machine
        .create_assignment(&"job-1".to_string(), &"c-2".to_string(), &dispatcher())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_reassign_moves_job_and_keeps_history() {
    let (h, id) = booked().await;

    let created = h
        .state_machine
        .reassign(&id, &"c-2".to_string(), &dispatcher(), None)
        .await
        .unwrap();
    assert_eq!(created.contractor_id, "c-2");
    assert_eq!(created.status, AssignmentStatus::Pending);

    let history = h
        .state_machine
        .assignment_history(&"job-1".to_string())
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    let old = history.iter().find(|a| a.id == id).unwrap();
    assert_eq!(old.status, AssignmentStatus::Cancelled);

    let stored_job = h.job_of("job-1").await;
    assert_eq!(stored_job.status, JobStatus::Assigned);
    assert_eq!(stored_job.assigned_contractor_id.as_deref(), Some("c-2"));
}

#[tokio::test]
async fn test_reassign_to_busy_contractor_rolls_back() {
    let (h, id) = booked().await;
    h.add_job(job("job-2", "plumbing", monday_at(11, 0), 60)).await;
    h.state_machine
        .create_assignment(&"job-2".to_string(), &"c-2".to_string(), &dispatcher())
        .await
        .unwrap();

    let err = h
        .state_machine
        .reassign(&id, &"c-2".to_string(), &dispatcher(), None)
        .await
        .unwrap_err();
    assert!(err.is_conflict());

    let original = h.assignments.find_by_id(&id).await.unwrap().unwrap();
    assert_eq!(original.status, AssignmentStatus::Pending);
    assert!(original.cancelled_at.is_none());
    let stored_job = h.job_of("job-1").await;
    assert_eq!(stored_job.status, JobStatus::Assigned);
    assert_eq!(stored_job.assigned_contractor_id.as_deref(), Some("c-1"));
}

#[tokio::test]
async fn test_cancel_job_closes_it_for_good() {
    let (h, id) = booked().await;

    let cancelled = h
        .state_machine
        .cancel_job(&"job-1".to_string(), &dispatcher(), Some("duplicate".to_string()))
        .await
        .unwrap();
    assert_eq!(cancelled.status, JobStatus::Cancelled);

    let assignment = h.assignments.find_by_id(&id).await.unwrap().unwrap();
    assert_eq!(assignment.status, AssignmentStatus::Cancelled);

    let err = h
        .state_machine
        .create_assignment(&"job-1".to_string(), &"c-2".to_string(), &dispatcher())
        .await
        .unwrap_err();
    assert!(err.is_conflict());
    let err = h
        .dispatch
        .request_recommendations(&"job-1".to_string(), None, None)
        .await
        .unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_failed_notification_keeps_transition() {
    let (h, id) = booked().await;
    h.events.fail_deliveries();

    let accepted = h
        .state_machine
        .accept(&id, &as_contractor("c-1"))
        .await
        .unwrap();
    assert_eq!(accepted.status, AssignmentStatus::Accepted);

    let stored = h.assignments.find_by_id(&id).await.unwrap().unwrap();
    assert_eq!(stored.status, AssignmentStatus::Accepted);
}
