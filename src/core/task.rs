//! Task data model.
//!
//! Tasks are the atomic units of work in a plan. Each task names the
//! capability that executes it, the parameters handed to that capability,
//! and the tasks it depends on. Status only moves forward.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::outcome::TaskError;
use crate::error::{Error, Result};

/// Parameters passed to an agent: string keys to arbitrary JSON values.
pub type Parameters = Map<String, Value>;

/// Identifier of a task, unique within its plan.
///
/// Identifiers come from the planner, so they are free-form strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Task status in its lifecycle.
///
/// `Pending -> Ready -> Running -> {Succeeded | Failed}`. `Skipped` is
/// reachable from `Pending` and `Ready`. A task whose capability has no
/// agent goes straight from `Pending`/`Ready` to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting for its layer to be activated.
    #[default]
    Pending,
    /// Every dependency succeeded; waiting for a concurrency slot.
    Ready,
    /// The agent call is in flight.
    Running,
    Succeeded,
    Failed,
    /// Never dispatched.
    Skipped,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Skipped
        )
    }

    /// Whether moving from `self` to `next` respects the lifecycle.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, Ready)
                | (Pending, Skipped)
                | (Pending, Failed)
                | (Ready, Running)
                | (Ready, Skipped)
                | (Ready, Failed)
                | (Running, Succeeded)
                | (Running, Failed)
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Ready => "ready",
            TaskStatus::Running => "running",
            TaskStatus::Succeeded => "succeeded",
            TaskStatus::Failed => "failed",
            TaskStatus::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// A single task in a plan.
#[derive(Debug, Clone)]
pub struct Task {
    /// Unique identifier within the plan.
    pub id: TaskId,
    /// Human-readable description of the action.
    pub description: String,
    /// Normalised capability tag used for agent lookup.
    pub capability: String,
    /// Arguments for the agent.
    pub parameters: Parameters,
    /// Tasks that must succeed before this one runs, in declaration order.
    pub depends_on: Vec<TaskId>,
    status: TaskStatus,
    result: Option<Value>,
    error: Option<TaskError>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a pending task with no parameters or dependencies.
    pub fn new(id: impl Into<TaskId>, capability: &str, description: &str) -> Self {
        Self {
            id: id.into(),
            description: description.to_string(),
            capability: normalize_capability(capability),
            parameters: Parameters::new(),
            depends_on: Vec::new(),
            status: TaskStatus::Pending,
            result: None,
            error: None,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// Set dependencies, dropping repeats while keeping first-seen order.
    pub fn with_dependencies<I, T>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TaskId>,
    {
        self.depends_on.clear();
        for dep in deps {
            let dep = dep.into();
            if !self.depends_on.contains(&dep) {
                self.depends_on.push(dep);
            }
        }
        self
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&TaskError> {
        self.error.as_ref()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn transition(&mut self, next: TaskStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                task: self.id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if next.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Dependencies satisfied; the task may be dispatched.
    pub fn mark_ready(&mut self) -> Result<()> {
        self.transition(TaskStatus::Ready)
    }

    /// The agent call is about to be made.
    pub fn start(&mut self) -> Result<()> {
        self.transition(TaskStatus::Running)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    pub fn succeed(&mut self, result: Value) -> Result<()> {
        self.transition(TaskStatus::Succeeded)?;
        self.result = Some(result);
        Ok(())
    }

    pub fn fail(&mut self, error: TaskError) -> Result<()> {
        self.transition(TaskStatus::Failed)?;
        self.error = Some(error);
        Ok(())
    }

    pub fn skip(&mut self, reason: TaskError) -> Result<()> {
        self.transition(TaskStatus::Skipped)?;
        self.error = Some(reason);
        Ok(())
    }
}

/// Canonical form of a capability tag: trimmed and lower-cased.
pub fn normalize_capability(tag: &str) -> String {
    tag.trim().to_lowercase()
}
