//! Capability agents.
//!
//! An agent executes one task for one capability. Agents are stateless
//! with respect to the plan: they receive the task's parameters, do their
//! work, and report an [`AgentResult`]. Failures from underlying services
//! are returned inside the result, never raised.

mod dry_run;
mod knowledge;
mod registry;

use async_trait::async_trait;

use crate::core::{AgentResult, Parameters};

pub use dry_run::{CalendarAgent, CommunicationAgent, MessagingAgent, SearchAgent};
pub use knowledge::KnowledgeAgent;
pub use registry::{AgentRegistry, AgentRegistryBuilder};

pub const MESSAGING: &str = "messaging";
pub const CALENDAR: &str = "calendar";
pub const COMMUNICATION: &str = "communication";
pub const SEARCH: &str = "search";
pub const KNOWLEDGE: &str = "knowledge";

/// Execution contract for a capability.
///
/// Implementations may suspend (network calls) but must not panic for
/// ordinary failures; report them with [`AgentResult::failure`]. The
/// orchestrator calls `execute` at most once per task and does not retry.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Capability tag served by this agent.
    fn capability(&self) -> &str;

    async fn execute(&self, parameters: &Parameters) -> AgentResult;
}

/// Fetch a required, non-empty string parameter.
pub(crate) fn required_str<'a>(
    parameters: &'a Parameters,
    key: &str,
) -> std::result::Result<&'a str, String> {
    match parameters.get(key) {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Ok(s.trim()),
        Some(serde_json::Value::String(_)) => Err(format!("parameter `{}` is empty", key)),
        Some(other) => Err(format!(
            "parameter `{}` must be a string, got {}",
            key, other
        )),
        None => Err(format!("missing required parameter `{}`", key)),
    }
}
