pub mod agents;
pub mod config;
pub mod core;
pub mod error;
pub mod log;
pub mod orchestration;

pub use error::{Error, PlanningError, Result};
