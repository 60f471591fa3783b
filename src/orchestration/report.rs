//! Final per-task summary of a run.

use serde::Serialize;
use serde_json::Value;

use crate::core::{Plan, TaskError, TaskId, TaskStatus};
use crate::orchestration::context::RunId;

/// Terminal state of one task.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskReport {
    pub id: TaskId,
    pub capability: String,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskError>,
}

/// Outcome of a run, tasks in plan order.
///
/// `success` is true iff every task succeeded. `cancelled` is true when
/// cancellation kept at least one task from being dispatched.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: RunId,
    pub success: bool,
    pub cancelled: bool,
    pub tasks: Vec<TaskReport>,
}

impl RunReport {
    pub fn from_plan(run_id: RunId, plan: &Plan, cancelled: bool) -> Self {
        let tasks: Vec<TaskReport> = plan
            .tasks()
            .iter()
            .map(|task| TaskReport {
                id: task.id.clone(),
                capability: task.capability.clone(),
                status: task.status(),
                result: task.result().cloned(),
                error: task.error().cloned(),
            })
            .collect();
        let success = tasks.iter().all(|t| t.status == TaskStatus::Succeeded);
        Self {
            run_id,
            success,
            cancelled,
            tasks,
        }
    }

    pub fn task(&self, id: &str) -> Option<&TaskReport> {
        self.tasks.iter().find(|t| t.id.as_str() == id)
    }

    pub fn count(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|t| t.status == status).count()
    }

    /// One-line summary, e.g. `3 succeeded, 1 failed, 1 skipped`.
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{} succeeded, {} failed, {} skipped",
            self.count(TaskStatus::Succeeded),
            self.count(TaskStatus::Failed),
            self.count(TaskStatus::Skipped)
        );
        if self.cancelled {
            line.push_str(" (cancelled)");
        }
        line
    }
}
