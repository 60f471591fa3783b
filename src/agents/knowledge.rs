//! Knowledge-base lookup over local text files.
//!
//! Every `.txt` file in the knowledge directory is read once when the agent
//! is built and split into paragraphs. A query returns the paragraphs that
//! share the most terms with it.

use async_trait::async_trait;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::agents::{required_str, Agent, KNOWLEDGE};
use crate::core::{AgentResult, Parameters};
use crate::error::Result;
use crate::{mlog_debug, mlog_warn};

/// Answer returned when no documents were loaded.
pub const EMPTY_KNOWLEDGE_BASE: &str =
    "Knowledge base is empty. Add .txt files to the knowledge directory.";

/// Answer returned when no paragraph matches the query.
pub const NO_MATCH: &str = "No relevant passages found in the knowledge base.";

const DEFAULT_LIMIT: usize = 3;

#[derive(Debug, Clone)]
struct Passage {
    text: String,
    terms: HashSet<String>,
}

/// Agent for the `knowledge` capability.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeAgent {
    passages: Vec<Passage>,
}

impl KnowledgeAgent {
    /// Load every `.txt` file in `dir`, in file-name order.
    ///
    /// A missing directory is created and yields an empty knowledge base.
    pub fn load(dir: &Path) -> Result<Self> {
        if !dir.exists() {
            mlog_debug!("Creating knowledge directory: {}", dir.display());
            fs::create_dir_all(dir)?;
            return Ok(Self::default());
        }

        let mut files: Vec<_> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().map(|ext| ext == "txt").unwrap_or(false))
            .collect();
        files.sort();

        let mut agent = Self::default();
        for path in files {
            match fs::read_to_string(&path) {
                Ok(content) => agent.add_document(&content),
                Err(e) => mlog_warn!("Skipping unreadable knowledge file {}: {}", path.display(), e),
            }
        }
        mlog_debug!(
            "Knowledge base loaded from {}: {} passages",
            dir.display(),
            agent.passages.len()
        );
        Ok(agent)
    }

    /// Build from in-memory documents.
    pub fn from_documents<'a>(documents: impl IntoIterator<Item = &'a str>) -> Self {
        let mut agent = Self::default();
        for doc in documents {
            agent.add_document(doc);
        }
        agent
    }

    fn add_document(&mut self, content: &str) {
        let content = content.replace("\r\n", "\n");
        for paragraph in content.split("\n\n") {
            let text = paragraph.trim();
            if text.is_empty() {
                continue;
            }
            self.passages.push(Passage {
                text: text.to_string(),
                terms: terms(text),
            });
        }
    }

    pub fn passage_count(&self) -> usize {
        self.passages.len()
    }

    /// Best-matching paragraphs for `query`, most relevant first.
    ///
    /// Ties keep document order.
    pub fn lookup(&self, query: &str, limit: usize) -> Vec<&str> {
        let query_terms = terms(query);
        let mut scored: Vec<(usize, usize)> = self
            .passages
            .iter()
            .enumerate()
            .map(|(pos, passage)| (passage.terms.intersection(&query_terms).count(), pos))
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        scored
            .into_iter()
            .take(limit)
            .map(|(_, pos)| self.passages[pos].text.as_str())
            .collect()
    }
}

/// Lower-cased alphanumeric words of three or more characters.
fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 3)
        .map(|w| w.to_lowercase())
        .collect()
}

#[async_trait]
impl Agent for KnowledgeAgent {
    fn capability(&self) -> &str {
        KNOWLEDGE
    }

    async fn execute(&self, parameters: &Parameters) -> AgentResult {
        let query = match required_str(parameters, "query") {
            Ok(q) => q,
            Err(e) => return AgentResult::failure(e),
        };
        let limit = match parameters.get("limit") {
            None => DEFAULT_LIMIT,
            Some(v) => match v.as_u64() {
                Some(n) if n > 0 => n as usize,
                _ => return AgentResult::failure("parameter `limit` must be a positive integer"),
            },
        };

        if self.passages.is_empty() {
            return AgentResult::success(EMPTY_KNOWLEDGE_BASE);
        }

        let matches = self.lookup(query, limit);
        if matches.is_empty() {
            return AgentResult::success(NO_MATCH);
        }
        AgentResult::success(matches.join("\n\n"))
    }
}
