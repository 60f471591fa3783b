//! Dispatch behaviour: concurrency limits, layer ordering, result
//! hand-off, timeouts and panicking agents.

use serde_json::json;
use std::collections::HashSet;
use std::time::Duration;

use maestro::core::{RawPlan, TaskError, TaskStatus};
use maestro::orchestration::{OrchestratorConfig, ProgressEvent};

use crate::fixtures::{independent_tasks, is_terminal_event, position_of, task, Harness};

/// Test: concurrency limit
/// Given 10 independent slow tasks and a limit of 3
/// Then at most 3 agent calls overlap, and the limit is reached
#[tokio::test(start_paused = true)]
async fn test_concurrency_limit_respected() {
    let harness = Harness::with_concurrency(3);
    let (report, _) = harness.run(independent_tasks(10, 50)).await;

    assert!(report.unwrap().success);
    assert_eq!(harness.probe.calls(), 10);
    assert_eq!(harness.probe.max(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_concurrency_limit_of_one_serialises() {
    let harness = Harness::with_concurrency(1);
    let (report, events) = harness.run(independent_tasks(4, 10)).await;

    assert!(report.unwrap().success);
    assert_eq!(harness.probe.max(), 1);

    // Started/finished strictly alternate, in plan order.
    let kinds: Vec<&str> = events
        .iter()
        .filter(|e| e.task_id().is_some())
        .map(ProgressEvent::kind)
        .collect();
    assert_eq!(
        kinds,
        ["TaskStarted", "TaskSucceeded"].repeat(4),
        "unexpected event sequence"
    );
    let started: Vec<String> = events
        .iter()
        .filter(|e| matches!(e, ProgressEvent::TaskStarted { .. }))
        .map(|e| e.task_id().unwrap().to_string())
        .collect();
    assert_eq!(started, vec!["t0", "t1", "t2", "t3"]);
}

/// No task starts before every one of its dependencies has finished.
#[tokio::test(start_paused = true)]
async fn test_dependencies_finish_before_dependents_start() {
    let harness = Harness::with_concurrency(4);
    let raw = RawPlan::new(vec![
        task("fetch", "search").param("delay_ms", 30),
        task("quick", "search").param("delay_ms", 1),
        task("summarise", "search").depends_on(&["fetch"]),
        task("notify", "messaging").depends_on(&["summarise", "quick"]),
    ]);
    let deps = [
        ("summarise", vec!["fetch"]),
        ("notify", vec!["summarise", "quick"]),
    ];

    let (report, events) = harness.run(raw).await;
    assert!(report.unwrap().success);

    for (id, dependencies) in deps {
        let started = position_of(&events, "TaskStarted", id).unwrap();
        for dep in dependencies {
            let finished = events
                .iter()
                .position(|e| {
                    is_terminal_event(e) && e.task_id().map(|t| t.as_str()) == Some(dep)
                })
                .unwrap();
            assert!(finished < started, "{} started before {} finished", id, dep);
        }
    }
}

/// A whole layer is terminal before the next layer starts, even when the
/// next layer's own dependencies finished early.
#[tokio::test(start_paused = true)]
async fn test_layers_are_barriers() {
    let harness = Harness::with_concurrency(4);
    let raw = RawPlan::new(vec![
        task("fast", "search").param("delay_ms", 1),
        task("slow", "search").param("delay_ms", 100),
        task("after_fast", "search").depends_on(&["fast"]),
    ]);

    let (report, events) = harness.run(raw).await;
    assert!(report.unwrap().success);

    let slow_done = position_of(&events, "TaskSucceeded", "slow").unwrap();
    let next_started = position_of(&events, "TaskStarted", "after_fast").unwrap();
    assert!(slow_done < next_started);
}

/// Each task produces exactly one terminal event; started tasks exactly
/// one start event.
#[tokio::test]
async fn test_one_terminal_event_per_task() {
    let harness = Harness::with_concurrency(2);
    let raw = RawPlan::new(vec![
        task("a", "search"),
        task("b", "search").param("fail", "x"),
        task("c", "search").depends_on(&["b"]),
        task("d", "fax"),
    ]);

    let (report, events) = harness.run(raw).await;
    let report = report.unwrap();

    let mut terminal = HashSet::new();
    for event in events.iter().filter(|e| is_terminal_event(e)) {
        assert!(terminal.insert(event.task_id().unwrap().to_string()));
    }
    assert_eq!(terminal.len(), report.tasks.len());
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, ProgressEvent::PlanCompleted { .. }))
            .count(),
        1
    );
}

/// Dependency results are substituted into `{id}` placeholders.
#[tokio::test]
async fn test_dependency_results_are_interpolated() {
    let harness = Harness::with_concurrency(2);
    let raw = RawPlan::new(vec![
        task("weather", "search").param("reply", "Sunny, 31C"),
        task("lookup", "search").param("reply", json!({"sid": "SM1"})),
        task("post", "messaging")
            .param("message", "Today: {weather} ({lookup}) {unrelated}")
            .depends_on(&["weather", "lookup"]),
    ]);

    let (report, _) = harness.run(raw).await;
    let report = report.unwrap();
    let echoed = report.task("post").unwrap().result.clone().unwrap();
    assert_eq!(
        echoed["echo"]["message"],
        json!("Today: Sunny, 31C ({\"sid\":\"SM1\"}) {unrelated}")
    );
}

/// Placeholders for tasks that are not declared dependencies stay put.
#[tokio::test]
async fn test_interpolation_limited_to_declared_dependencies() {
    let harness = Harness::with_concurrency(1);
    let raw = RawPlan::new(vec![
        task("a", "search").param("reply", "A"),
        task("b", "search").param("message", "{a}"),
    ]);

    let (report, _) = harness.run(raw).await;
    let report = report.unwrap();
    let echoed = report.task("b").unwrap().result.clone().unwrap();
    assert_eq!(echoed["echo"]["message"], json!("{a}"));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_fails_task_and_skips_dependents() {
    let harness = Harness::new(
        OrchestratorConfig::default()
            .with_max_concurrency(2)
            .with_task_timeout(Duration::from_secs(1)),
    );
    let raw = RawPlan::new(vec![
        task("hang", "search").param("delay_ms", 60_000),
        task("ok", "search").param("delay_ms", 10),
        task("after", "messaging").depends_on(&["hang"]),
    ]);

    let (report, _) = harness.run(raw).await;
    let report = report.unwrap();

    assert_eq!(
        report.task("hang").unwrap().error,
        Some(TaskError::TimedOut(Duration::from_secs(1)))
    );
    assert_eq!(report.task("ok").unwrap().status, TaskStatus::Succeeded);
    assert_eq!(report.task("after").unwrap().status, TaskStatus::Skipped);
}

#[tokio::test]
async fn test_panicking_agent_fails_only_its_task() {
    let harness = Harness::with_concurrency(2);
    let raw = RawPlan::new(vec![
        task("bad", "search").param("panic", "index out of bounds"),
        task("good", "search"),
        task("after_good", "messaging").depends_on(&["good"]),
    ]);

    let (report, events) = harness.run(raw).await;
    let report = report.unwrap();

    assert_eq!(
        report.task("bad").unwrap().error,
        Some(TaskError::AgentPanicked("index out of bounds".to_string()))
    );
    assert_eq!(report.task("after_good").unwrap().status, TaskStatus::Succeeded);
    assert!(matches!(events.last(), Some(ProgressEvent::PlanCompleted { .. })));
}
