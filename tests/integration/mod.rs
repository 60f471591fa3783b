//! Integration test suite for Maestro.
//!
//! These tests drive whole plans through the orchestrator and check the
//! progress stream and final report together.
//!
//! # Test Categories
//!
//! - `scenarios`: Plan outcomes, failure cascades, rejected plans
//! - `dispatch`: Concurrency limits, layer ordering, result hand-off
//! - `cancellation`: Cancelled runs and lost observers
//! - `builtin_agents`: The built-in registry end to end
//!
//! # CI Compatibility
//!
//! Agents are scripted or dry-run; no external service is contacted.


mod cancellation;
mod dispatch;
mod scenarios;
