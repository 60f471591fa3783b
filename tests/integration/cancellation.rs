//! Cancellation and observer loss.
//!
//! Once a run is cancelled no new task is dispatched, calls already in
//! flight finish, and everything else is skipped.

use tokio_util::sync::CancellationToken;

use maestro::core::{RawPlan, TaskError, TaskStatus};
use maestro::orchestration::{channel, ProgressEvent, RunContext};

use crate::fixtures::{kinds_for, task, Harness};

#[tokio::test(start_paused = true)]
async fn test_cancel_between_layers() {
    let harness = Harness::with_concurrency(2);
    let mut handle = harness.orchestrator.spawn(RawPlan::new(vec![
        task("first", "search").param("delay_ms", 100),
        task("second", "messaging").depends_on(&["first"]),
    ]));

    let event = handle.events().recv().await.unwrap();
    assert!(matches!(event, ProgressEvent::TaskStarted { .. }));
    handle.cancel();

    let report = handle.wait().await.unwrap();
    assert!(report.cancelled);
    assert!(!report.success);
    assert_eq!(report.task("first").unwrap().status, TaskStatus::Succeeded);
    let second = report.task("second").unwrap();
    assert_eq!(second.status, TaskStatus::Skipped);
    assert_eq!(second.error, Some(TaskError::Cancelled));
    assert_eq!(harness.probe.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_within_layer_stops_admission() {
    let harness = Harness::with_concurrency(1);
    let mut handle = harness.orchestrator.spawn(RawPlan::new(vec![
        task("a", "search").param("delay_ms", 50),
        task("b", "search").param("delay_ms", 50),
        task("c", "search").param("delay_ms", 50),
    ]));

    handle.events().recv().await.unwrap();
    handle.cancel();

    let report = handle.wait().await.unwrap();
    assert!(report.cancelled);
    assert_eq!(report.task("a").unwrap().status, TaskStatus::Succeeded);
    for id in ["b", "c"] {
        assert_eq!(report.task(id).unwrap().error, Some(TaskError::Cancelled));
    }
    assert_eq!(harness.probe.max(), 1);
    assert_eq!(harness.probe.calls(), 1);
}

/// A session token cancels every run derived from it.
#[tokio::test]
async fn test_cancelled_session_token() {
    let harness = Harness::with_concurrency(4);
    let session = CancellationToken::new();
    let (tx, rx) = channel(64);
    let ctx = RunContext::with_cancellation(tx, session.child_token());
    session.cancel();

    let report = harness
        .orchestrator
        .run(
            RawPlan::new(vec![task("a", "search"), task("b", "search")]),
            &ctx,
        )
        .await
        .unwrap();
    drop(ctx);
    let events = rx.collect().await;

    assert!(report.cancelled);
    assert_eq!(report.count(TaskStatus::Skipped), 2);
    assert_eq!(harness.probe.calls(), 0);
    assert_eq!(kinds_for(&events, "a"), vec!["TaskSkipped"]);
    assert!(matches!(
        events.last(),
        Some(ProgressEvent::PlanCompleted { payload }) if payload.cancelled
    ));
}

/// Dropping the event stream cancels the run.
#[tokio::test(start_paused = true)]
async fn test_observer_disconnect_cancels_run() {
    let harness = Harness::with_concurrency(2);
    let handle = harness.orchestrator.spawn(RawPlan::new(vec![
        task("first", "search").param("delay_ms", 100),
        task("second", "search").depends_on(&["first"]),
        task("third", "search").depends_on(&["second"]),
    ]));

    let (mut events, completion) = handle.split();
    events.recv().await.unwrap();
    drop(events);

    let report = completion.wait().await.unwrap();
    assert!(report.cancelled);
    assert_eq!(report.task("first").unwrap().status, TaskStatus::Succeeded);
    assert_eq!(report.task("second").unwrap().error, Some(TaskError::Cancelled));
    assert_eq!(report.task("third").unwrap().error, Some(TaskError::Cancelled));
    assert_eq!(harness.probe.calls(), 1);
}

/// Cancelling after every task finished changes nothing.
#[tokio::test]
async fn test_cancel_after_completion_is_not_reported() {
    let harness = Harness::with_concurrency(2);
    let handle = harness
        .orchestrator
        .spawn(RawPlan::new(vec![task("only", "search")]));
    let token = handle.cancellation_token();

    let report = handle.wait().await.unwrap();
    token.cancel();

    assert!(report.success);
    assert!(!report.cancelled);
}
