//! Raw planner output and the validated plan built from it.
//!
//! A [`RawPlan`] is untrusted: it is whatever the planning service produced.
//! [`Plan::from_raw`] turns it into a [`Plan`] only if every id is unique,
//! every dependency names a task in the same plan, and the dependency
//! relation is acyclic.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::dag::DependencyGraph;
use crate::core::task::{Parameters, Task, TaskId};
use crate::error::PlanningError;

/// One task descriptor as emitted by the planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTask {
    /// Defaults to `step-<n>` (1-based plan position) when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(alias = "agent")]
    pub capability: String,
    #[serde(default, alias = "action")]
    pub description: String,
    #[serde(default)]
    pub parameters: Parameters,
    #[serde(default, alias = "depends_on")]
    pub depends_on: Vec<String>,
}

impl RawTask {
    pub fn new(id: &str, capability: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            capability: capability.to_string(),
            description: String::new(),
            parameters: Parameters::new(),
            depends_on: Vec::new(),
        }
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn param(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }

    pub fn depends_on(mut self, deps: &[&str]) -> Self {
        self.depends_on = deps.iter().map(|d| d.to_string()).collect();
        self
    }
}

/// Ordered list of task descriptors from the planner.
///
/// Deserializes from `{ "tasks": [...] }` or from a bare array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawPlanRepr")]
pub struct RawPlan {
    pub tasks: Vec<RawTask>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPlanRepr {
    Wrapped { tasks: Vec<RawTask> },
    Bare(Vec<RawTask>),
}

impl From<RawPlanRepr> for RawPlan {
    fn from(repr: RawPlanRepr) -> Self {
        match repr {
            RawPlanRepr::Wrapped { tasks } | RawPlanRepr::Bare(tasks) => Self { tasks },
        }
    }
}

impl RawPlan {
    pub fn new(tasks: Vec<RawTask>) -> Self {
        Self { tasks }
    }

    /// Parse a JSON document.
    pub fn from_json(json: &str) -> Result<Self, PlanningError> {
        serde_json::from_str(json).map_err(|e| PlanningError::Malformed(e.to_string()))
    }

    /// Parse free-form planner output, tolerating a surrounding Markdown
    /// code fence such as ```` ```json ... ``` ````.
    pub fn from_planner_output(text: &str) -> Result<Self, PlanningError> {
        Self::from_json(strip_code_fence(text))
    }
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`, `JSON`, ...), whether or not the body
    // starts on the next line.
    let body = rest.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// A validated plan.
///
/// The task set and the dependency relation are fixed at construction.
/// Only task status and outcome change afterwards, and only through the
/// orchestrator.
#[derive(Debug, Clone)]
pub struct Plan {
    tasks: Vec<Task>,
    index: HashMap<TaskId, usize>,
    graph: DependencyGraph,
}

impl Plan {
    /// Validate raw planner output.
    ///
    /// Checks run in a fixed order (shape, unique ids, dependency
    /// references, cycles), so the same input always fails the same way.
    pub fn from_raw(raw: RawPlan) -> Result<Self, PlanningError> {
        if raw.tasks.is_empty() {
            return Err(PlanningError::EmptyPlan);
        }

        let mut tasks = Vec::with_capacity(raw.tasks.len());
        for (pos, raw_task) in raw.tasks.into_iter().enumerate() {
            let id = match raw_task.id {
                Some(id) if id.trim().is_empty() => {
                    return Err(PlanningError::Malformed(format!(
                        "task at position {} has an empty id",
                        pos + 1
                    )));
                }
                Some(id) => id.trim().to_string(),
                None => format!("step-{}", pos + 1),
            };
            if raw_task.capability.trim().is_empty() {
                return Err(PlanningError::Malformed(format!(
                    "task `{}` has an empty capability",
                    id
                )));
            }
            let task = Task::new(id, &raw_task.capability, &raw_task.description)
                .with_parameters(raw_task.parameters)
                .with_dependencies(raw_task.depends_on.iter().map(|d| d.trim()));
            tasks.push(task);
        }

        let mut index = HashMap::with_capacity(tasks.len());
        for (pos, task) in tasks.iter().enumerate() {
            if index.insert(task.id.clone(), pos).is_some() {
                return Err(PlanningError::DuplicateTaskId(task.id.clone()));
            }
        }

        for task in &tasks {
            if let Some(missing) = task.depends_on.iter().find(|d| !index.contains_key(*d)) {
                return Err(PlanningError::UnknownDependency {
                    task: task.id.clone(),
                    dependency: missing.clone(),
                });
            }
        }

        let graph = DependencyGraph::build(&tasks, &index)?;

        Ok(Self {
            tasks,
            index,
            graph,
        })
    }

    /// Tasks in plan order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.index.get(id).map(|&pos| &self.tasks[pos])
    }

    pub fn position(&self, id: &TaskId) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub(crate) fn task_at(&self, pos: usize) -> &Task {
        &self.tasks[pos]
    }

    pub(crate) fn task_at_mut(&mut self, pos: usize) -> &mut Task {
        &mut self.tasks[pos]
    }

    /// Plan positions grouped by dependency layer.
    pub fn layers(&self) -> &[Vec<usize>] {
        self.graph.layers()
    }

    /// Task ids grouped by dependency layer.
    pub fn layer_ids(&self) -> Vec<Vec<TaskId>> {
        self.layers()
            .iter()
            .map(|layer| layer.iter().map(|&pos| self.tasks[pos].id.clone()).collect())
            .collect()
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Distinct capability tags requested by the plan, in first-use order.
    pub fn capabilities(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for task in &self.tasks {
            if !seen.contains(&task.capability.as_str()) {
                seen.push(&task.capability);
            }
        }
        seen
    }
}
