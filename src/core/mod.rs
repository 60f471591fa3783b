//! Core domain models for plan execution.
//!
//! Tasks, the validated plan built from planner output, the dependency
//! graph that partitions it into layers, and task outcomes.

pub mod dag;
pub mod outcome;
pub mod plan;
pub mod task;

pub use dag::DependencyGraph;
pub use outcome::{AgentExecutionError, AgentResult, TaskError};
pub use plan::{Plan, RawPlan, RawTask};
pub use task::{normalize_capability, Parameters, Task, TaskId, TaskStatus};
