//! End-to-end plan outcomes: success, failure cascades, unknown
//! capabilities and rejected plans.

use serde_json::json;

use maestro::core::{RawPlan, TaskError, TaskId, TaskStatus};
use maestro::orchestration::{OrchestratorConfig, ProgressEvent};
use maestro::{Error, PlanningError};

use crate::fixtures::{kinds_for, position_of, task, Harness};

/// Two independent tasks run in the same layer and both succeed.
#[tokio::test]
async fn test_independent_tasks_succeed() {
    let harness = Harness::with_concurrency(4);
    let raw = RawPlan::new(vec![
        task("x", "search").param("query", "weather"),
        task("y", "messaging").param("channel", "#general"),
    ]);

    let (report, events) = harness.run(raw).await;
    let report = report.unwrap();

    assert!(report.success);
    assert!(!report.cancelled);
    assert_eq!(report.count(TaskStatus::Succeeded), 2);

    // Both dispatched before either completed: same layer.
    let last_start = position_of(&events, "TaskStarted", "x")
        .max(position_of(&events, "TaskStarted", "y"))
        .unwrap();
    assert!(last_start < 2);

    match events.last() {
        Some(ProgressEvent::PlanCompleted { payload }) => assert_eq!(payload, &report),
        other => panic!("expected PlanCompleted last, got {:?}", other),
    }
}

/// A failed task skips its dependents and fails the run.
#[tokio::test]
async fn test_failure_skips_dependents() {
    let harness = Harness::with_concurrency(4);
    let raw = RawPlan::new(vec![
        task("x", "search").param("fail", "search backend unavailable"),
        task("y", "messaging").depends_on(&["x"]),
    ]);

    let (report, events) = harness.run(raw).await;
    let report = report.unwrap();

    assert!(!report.success);
    let x = report.task("x").unwrap();
    assert_eq!(x.status, TaskStatus::Failed);
    assert_eq!(
        x.error.as_ref().unwrap().to_string(),
        "agent execution failed: search backend unavailable"
    );
    let y = report.task("y").unwrap();
    assert_eq!(y.status, TaskStatus::Skipped);
    assert_eq!(
        y.error,
        Some(TaskError::DependencyNotSucceeded {
            dependency: TaskId::from("x")
        })
    );

    assert_eq!(kinds_for(&events, "x"), vec!["TaskStarted", "TaskFailed"]);
    assert_eq!(kinds_for(&events, "y"), vec!["TaskSkipped"]);
    assert_eq!(harness.probe.calls(), 1);
}

/// Skips propagate transitively down a chain.
#[tokio::test]
async fn test_skip_cascades_transitively() {
    let harness = Harness::with_concurrency(2);
    let raw = RawPlan::new(vec![
        task("a", "search").param("fail", "nope"),
        task("b", "search").depends_on(&["a"]),
        task("c", "search").depends_on(&["b"]),
        task("side", "search"),
    ]);

    let (report, _) = harness.run(raw).await;
    let report = report.unwrap();

    assert_eq!(report.task("a").unwrap().status, TaskStatus::Failed);
    assert_eq!(report.task("b").unwrap().status, TaskStatus::Skipped);
    assert_eq!(
        report.task("c").unwrap().error,
        Some(TaskError::DependencyNotSucceeded {
            dependency: TaskId::from("b")
        })
    );
    assert_eq!(report.task("side").unwrap().status, TaskStatus::Succeeded);
    assert_eq!(report.summary(), "1 succeeded, 1 failed, 2 skipped");
}

/// An unregistered capability fails only its own task, wherever it sits.
#[tokio::test]
async fn test_unknown_capability_fails_only_that_task() {
    for order in [["z", "x"], ["x", "z"]] {
        let harness = Harness::with_concurrency(4);
        let tasks = order
            .iter()
            .map(|id| match *id {
                "z" => task("z", "fax"),
                _ => task("x", "search"),
            })
            .collect();

        let (report, events) = harness.run(RawPlan::new(tasks)).await;
        let report = report.unwrap();

        assert_eq!(report.task("x").unwrap().status, TaskStatus::Succeeded);
        let z = report.task("z").unwrap();
        assert_eq!(z.status, TaskStatus::Failed);
        assert_eq!(
            z.error,
            Some(TaskError::CapabilityNotFound {
                capability: "fax".to_string()
            })
        );
        assert_eq!(kinds_for(&events, "z"), vec!["TaskFailed"]);
        assert!(!report.success);
    }
}

/// Strict mode rejects the same plan before anything runs.
#[tokio::test]
async fn test_strict_mode_rejects_unknown_capability() {
    let harness = Harness::new(OrchestratorConfig::default().with_strict_capabilities(true));
    let raw = RawPlan::new(vec![task("x", "search"), task("z", "fax")]);

    let (outcome, events) = harness.run(raw).await;
    match outcome {
        Err(Error::Planning(PlanningError::UnknownCapability { task, capability })) => {
            assert_eq!(task, TaskId::from("z"));
            assert_eq!(capability, "fax");
        }
        other => panic!("expected UnknownCapability, got {:?}", other),
    }
    assert!(events.is_empty());
    assert_eq!(harness.probe.calls(), 0);
}

/// A cyclic plan is rejected before any event is emitted.
#[tokio::test]
async fn test_cycle_rejected_before_dispatch() {
    let harness = Harness::with_concurrency(4);
    let raw = RawPlan::new(vec![
        task("a", "search").depends_on(&["b"]),
        task("b", "search").depends_on(&["a"]),
    ]);

    let (outcome, events) = harness.run(raw).await;
    assert!(matches!(
        outcome,
        Err(Error::Planning(PlanningError::CyclicDependency { .. }))
    ));
    assert!(events.is_empty());
    assert_eq!(harness.probe.calls(), 0);
}

/// Validating the same bad plan always yields the same error.
#[test]
fn test_validation_is_deterministic() {
    let harness = Harness::with_concurrency(4);
    let bad = [
        RawPlan::new(vec![]),
        RawPlan::new(vec![task("a", "search"), task("a", "search")]),
        RawPlan::new(vec![task("a", "search").depends_on(&["ghost"])]),
        RawPlan::new(vec![
            task("a", "search").depends_on(&["c"]),
            task("b", "search").depends_on(&["a"]),
            task("c", "search").depends_on(&["b"]),
        ]),
    ];
    for raw in bad {
        let first = harness.orchestrator.validate(raw.clone()).unwrap_err();
        for _ in 0..5 {
            let again = harness.orchestrator.validate(raw.clone()).unwrap_err();
            assert_eq!(again, first);
            assert_eq!(again.kind(), first.kind());
        }
    }
}

/// Legacy agent names resolve through registry aliases.
#[tokio::test]
async fn test_alias_capability_dispatches() {
    let harness = Harness::with_concurrency(1);
    let raw = RawPlan::from_json(
        r#"[{"id": "post", "agent": "SlackAgent", "parameters": {"reply": "sent"}}]"#,
    )
    .unwrap();

    let (report, _) = harness.run(raw).await;
    let report = report.unwrap();
    assert!(report.success);
    assert_eq!(report.task("post").unwrap().result, Some(json!("sent")));
}

/// Every task of a well-formed plan ends terminal.
#[tokio::test]
async fn test_every_task_reaches_terminal_state() {
    let harness = Harness::with_concurrency(3);
    let raw = RawPlan::new(vec![
        task("a", "search"),
        task("b", "search").param("fail", "boom"),
        task("c", "search").depends_on(&["a"]),
        task("d", "search").depends_on(&["b", "c"]),
        task("e", "fax").depends_on(&["a"]),
        task("f", "messaging").depends_on(&["c"]),
    ]);

    let (report, _) = harness.run(raw).await;
    let report = report.unwrap();

    assert!(report.tasks.iter().all(|t| t.status.is_terminal()));
    let ids: Vec<&str> = report.tasks.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c", "d", "e", "f"]);
    assert_eq!(report.task("d").unwrap().status, TaskStatus::Skipped);
    assert_eq!(report.task("e").unwrap().status, TaskStatus::Failed);
    assert_eq!(report.task("f").unwrap().status, TaskStatus::Succeeded);
    assert!(!report.success);
}
