//! Orchestration layer.
//!
//! Turns a validated plan into agent calls: layered dispatch with bounded
//! concurrency, progress events for one observer per run, cooperative
//! cancellation and a final report.

mod context;
mod interpolate;
mod orchestrator;
mod planner;
mod progress;
mod report;

pub use context::{RunContext, RunId};
pub use interpolate::interpolate;
pub use orchestrator::{Orchestrator, OrchestratorConfig, RunCompletion, RunHandle};
pub use planner::{Planner, StaticPlanner};
pub use progress::{channel, ProgressEvent, ProgressReceiver, ProgressSender};
pub use report::{RunReport, TaskReport};
