//! Capability registry.
//!
//! Built once at startup and read-only afterwards, so concurrent lookups
//! need no locking. Tags are normalised, and aliases let planner-specific
//! names resolve to a canonical capability.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use crate::agents::{
    Agent, CalendarAgent, CommunicationAgent, KnowledgeAgent, MessagingAgent, SearchAgent,
    CALENDAR, COMMUNICATION, KNOWLEDGE, MESSAGING, SEARCH,
};
use crate::core::normalize_capability;
use crate::error::{Error, Result};
use crate::mlog_debug;

/// Mapping from capability tag to agent.
pub struct AgentRegistry {
    agents: HashMap<String, Arc<dyn Agent>>,
    aliases: HashMap<String, String>,
}

impl AgentRegistry {
    pub fn builder() -> AgentRegistryBuilder {
        AgentRegistryBuilder::default()
    }

    /// Registry with the built-in agents and the legacy planner names
    /// (`SlackAgent`, `CalendarAgent`, ...) as aliases.
    pub fn builtin(knowledge_dir: &Path) -> Result<Self> {
        Self::builder()
            .register(MessagingAgent)
            .register(CalendarAgent)
            .register(CommunicationAgent)
            .register(SearchAgent)
            .register(KnowledgeAgent::load(knowledge_dir)?)
            .alias("SlackAgent", MESSAGING)
            .alias("CalendarAgent", CALENDAR)
            .alias("CommunicationAgent", COMMUNICATION)
            .alias("SearchAgent", SEARCH)
            .alias("KnowledgeAgent", KNOWLEDGE)
            .build()
    }

    /// Look up the agent for a capability tag or alias.
    pub fn get(&self, capability: &str) -> Option<Arc<dyn Agent>> {
        let tag = normalize_capability(capability);
        let canonical = self.aliases.get(&tag).unwrap_or(&tag);
        self.agents.get(canonical).cloned()
    }

    pub fn contains(&self, capability: &str) -> bool {
        self.get(capability).is_some()
    }

    /// Canonical capability tags, sorted.
    pub fn capabilities(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.agents.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }

    /// Aliases and the capability each resolves to, sorted by alias.
    pub fn aliases(&self) -> BTreeMap<&str, &str> {
        self.aliases
            .iter()
            .map(|(alias, tag)| (alias.as_str(), tag.as_str()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

impl std::fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("capabilities", &self.capabilities())
            .field("aliases", &self.aliases.len())
            .finish()
    }
}

/// Collects agents before freezing them into an [`AgentRegistry`].
///
/// Problems (duplicate tags, dangling aliases, no agents at all) are
/// reported by [`build`](Self::build) as fatal startup errors.
#[derive(Default)]
pub struct AgentRegistryBuilder {
    agents: HashMap<String, Arc<dyn Agent>>,
    aliases: Vec<(String, String)>,
    duplicates: Vec<String>,
}

impl AgentRegistryBuilder {
    pub fn register(self, agent: impl Agent + 'static) -> Self {
        self.register_arc(Arc::new(agent))
    }

    pub fn register_arc(mut self, agent: Arc<dyn Agent>) -> Self {
        let tag = normalize_capability(agent.capability());
        if self.agents.insert(tag.clone(), agent).is_some() {
            self.duplicates.push(tag);
        }
        self
    }

    /// Resolve `alias` to `capability` on lookup.
    pub fn alias(mut self, alias: &str, capability: &str) -> Self {
        self.aliases
            .push((normalize_capability(alias), normalize_capability(capability)));
        self
    }

    pub fn build(self) -> Result<AgentRegistry> {
        if self.agents.is_empty() {
            return Err(Error::Registry("no agents registered".to_string()));
        }
        if let Some(tag) = self.duplicates.first() {
            return Err(Error::Registry(format!(
                "capability `{}` registered more than once",
                tag
            )));
        }

        let mut aliases = HashMap::with_capacity(self.aliases.len());
        for (alias, tag) in self.aliases {
            if !self.agents.contains_key(&tag) {
                return Err(Error::Registry(format!(
                    "alias `{}` points to unregistered capability `{}`",
                    alias, tag
                )));
            }
            if self.agents.contains_key(&alias) {
                return Err(Error::Registry(format!(
                    "alias `{}` shadows a registered capability",
                    alias
                )));
            }
            aliases.insert(alias, tag);
        }

        mlog_debug!(
            "AgentRegistry built: {} capabilities, {} aliases",
            self.agents.len(),
            aliases.len()
        );

        Ok(AgentRegistry {
            agents: self.agents,
            aliases,
        })
    }
}
