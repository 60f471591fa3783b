//! Sources of plans.
//!
//! A [`Planner`] turns a natural-language instruction into raw plan data.
//! The language-model planner lives outside this crate; [`StaticPlanner`]
//! replays fixed output and is what the CLI and tests use.

use async_trait::async_trait;

use crate::core::RawPlan;
use crate::error::Result;
use crate::mlog_debug;

/// Produces a raw plan for an instruction.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, instruction: &str) -> Result<RawPlan>;
}

/// Planner that always answers with the same text.
///
/// The text is parsed like model output: a JSON array or `{"tasks": [...]}`,
/// optionally wrapped in a Markdown code fence.
#[derive(Debug, Clone)]
pub struct StaticPlanner {
    output: String,
}

impl StaticPlanner {
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
        }
    }

    pub fn from_plan(plan: &RawPlan) -> Result<Self> {
        Ok(Self::new(serde_json::to_string(plan)?))
    }
}

#[async_trait]
impl Planner for StaticPlanner {
    async fn plan(&self, instruction: &str) -> Result<RawPlan> {
        mlog_debug!("static planner answering {:?}", instruction);
        Ok(RawPlan::from_planner_output(&self.output)?)
    }
}
