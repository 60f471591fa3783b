//! Outcomes of task execution.
//!
//! [`AgentResult`] is what an agent hands back for a single invocation.
//! [`TaskError`] is what the orchestrator records on a task that did not
//! succeed, whether the agent reported the failure or the orchestrator
//! decided the task could not run.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::core::task::TaskId;

/// Failure reported by an agent while executing a task.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message}")]
#[serde(transparent)]
pub struct AgentExecutionError {
    pub message: String,
}

impl AgentExecutionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Result of one agent invocation.
///
/// `result` is present iff `success` is true; `error` is present iff it is
/// false. The constructors are the only way to build one, which keeps the
/// two fields consistent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentResult {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<AgentExecutionError>,
}

impl AgentResult {
    /// Successful invocation carrying an opaque payload.
    pub fn success(result: impl Into<Value>) -> Self {
        Self {
            success: true,
            result: Some(result.into()),
            error: None,
        }
    }

    /// Failed invocation.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(AgentExecutionError::new(error)),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&AgentExecutionError> {
        self.error.as_ref()
    }

    /// Split into the payload or the error.
    pub fn into_result(self) -> std::result::Result<Value, AgentExecutionError> {
        match (self.result, self.error) {
            (Some(value), None) => Ok(value),
            (_, Some(error)) => Err(error),
            (None, None) => Err(AgentExecutionError::new("agent returned no result")),
        }
    }
}

impl<T: Into<Value>, E: Into<String>> From<std::result::Result<T, E>> for AgentResult {
    fn from(result: std::result::Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::success(value),
            Err(error) => Self::failure(error),
        }
    }
}

/// Why a task ended in `Failed` or `Skipped`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("capability not found: {capability}")]
    CapabilityNotFound { capability: String },

    #[error("agent execution failed: {0}")]
    AgentExecution(#[from] AgentExecutionError),

    #[error("agent timed out after {0:?}")]
    TimedOut(Duration),

    #[error("agent panicked: {0}")]
    AgentPanicked(String),

    #[error("skipped: dependency `{dependency}` did not succeed")]
    DependencyNotSucceeded { dependency: TaskId },

    #[error("skipped: run cancelled")]
    Cancelled,
}

impl TaskError {
    /// True for reasons that lead to `Skipped` rather than `Failed`.
    pub fn is_skip_reason(&self) -> bool {
        matches!(
            self,
            TaskError::DependencyNotSucceeded { .. } | TaskError::Cancelled
        )
    }
}

// The wire format carries errors as plain strings.
impl Serialize for TaskError {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
