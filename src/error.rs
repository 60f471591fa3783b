use serde::Serialize;
use thiserror::Error;

use crate::core::task::{TaskId, TaskStatus};

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("No home directory")]
    NoHomeDir,

    #[error("Planning error: {0}")]
    Planning(#[from] PlanningError),

    #[error("Agent registry error: {0}")]
    Registry(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid status transition for task {task} from {from} to {to}")]
    InvalidTransition {
        task: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("Run cancelled")]
    Cancelled,

    #[error("Task join error: {0}")]
    TaskJoin(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Structural problems with a raw plan, detected before any agent runs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanningError {
    #[error("malformed plan: {0}")]
    Malformed(String),

    #[error("plan contains no tasks")]
    EmptyPlan,

    #[error("duplicate task id `{0}`")]
    DuplicateTaskId(TaskId),

    #[error("task `{task}` depends on unknown task `{dependency}`")]
    UnknownDependency { task: TaskId, dependency: TaskId },

    #[error("dependency cycle detected at task `{task}`")]
    CyclicDependency { task: TaskId },

    #[error("task `{task}` requests unregistered capability `{capability}`")]
    UnknownCapability { task: TaskId, capability: String },
}

/// Discriminant of a [`PlanningError`], stable across repeated validations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanningErrorKind {
    Malformed,
    EmptyPlan,
    DuplicateTaskId,
    UnknownDependency,
    CyclicDependency,
    UnknownCapability,
}

impl PlanningError {
    pub fn kind(&self) -> PlanningErrorKind {
        match self {
            PlanningError::Malformed(_) => PlanningErrorKind::Malformed,
            PlanningError::EmptyPlan => PlanningErrorKind::EmptyPlan,
            PlanningError::DuplicateTaskId(_) => PlanningErrorKind::DuplicateTaskId,
            PlanningError::UnknownDependency { .. } => PlanningErrorKind::UnknownDependency,
            PlanningError::CyclicDependency { .. } => PlanningErrorKind::CyclicDependency,
            PlanningError::UnknownCapability { .. } => PlanningErrorKind::UnknownCapability,
        }
    }
}
