//! Orchestrator for layered plan execution.
//!
//! The Orchestrator validates raw planner output, partitions the plan into
//! dependency layers, and dispatches each layer's tasks to their agents
//! with bounded concurrency. A layer is fully terminal before the next one
//! starts. Tasks whose dependencies did not succeed are skipped, and the
//! run ends with a per-task report.

use futures::FutureExt;
use serde_json::Value;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::agents::{Agent, AgentRegistry};
use crate::config::{Config, DEFAULT_EVENT_BUFFER, DEFAULT_MAX_CONCURRENCY};
use crate::core::{Parameters, Plan, RawPlan, TaskError, TaskId, TaskStatus};
use crate::error::{Error, PlanningError, Result};
use crate::orchestration::context::{RunContext, RunId};
use crate::orchestration::interpolate::interpolate;
use crate::orchestration::planner::Planner;
use crate::orchestration::progress::{self, ProgressEvent, ProgressReceiver};
use crate::orchestration::report::RunReport;
use crate::{mlog, mlog_debug, mlog_error, mlog_trace, mlog_warn};

/// Runtime settings for the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    /// Maximum agent calls in flight at once (at least 1).
    pub max_concurrency: usize,
    /// Deadline for a single agent call.
    pub task_timeout: Option<Duration>,
    /// Reject unregistered capabilities during validation instead of
    /// failing the affected tasks at dispatch.
    pub strict_capabilities: bool,
    /// Progress channel capacity for spawned runs.
    pub event_buffer: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            task_timeout: None,
            strict_capabilities: false,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

impl From<&Config> for OrchestratorConfig {
    fn from(config: &Config) -> Self {
        Self {
            max_concurrency: config.effective_max_concurrency().max(1),
            task_timeout: config.task_timeout(),
            strict_capabilities: config.strict_capabilities,
            event_buffer: config.effective_event_buffer(),
        }
    }
}

impl OrchestratorConfig {
    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = limit.max(1);
        self
    }

    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = Some(timeout);
        self
    }

    pub fn with_strict_capabilities(mut self, strict: bool) -> Self {
        self.strict_capabilities = strict;
        self
    }
}

/// Validates plans and drives their execution.
///
/// Cheap to clone: the registry is shared and read-only.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    registry: Arc<AgentRegistry>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(registry: Arc<AgentRegistry>, config: OrchestratorConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Validate raw planner output into a plan.
    ///
    /// No agent is invoked. The same input always yields the same error kind.
    pub fn validate(&self, raw: RawPlan) -> std::result::Result<Plan, PlanningError> {
        let plan = Plan::from_raw(raw)?;
        if self.config.strict_capabilities {
            if let Some(task) = plan
                .tasks()
                .iter()
                .find(|t| !self.registry.contains(&t.capability))
            {
                return Err(PlanningError::UnknownCapability {
                    task: task.id.clone(),
                    capability: task.capability.clone(),
                });
            }
        }
        Ok(plan)
    }

    /// Validate and execute `raw`, reporting progress through `ctx`.
    ///
    /// Only a planning error fails the call; task failures end up in the
    /// report.
    pub async fn run(&self, raw: RawPlan, ctx: &RunContext) -> Result<RunReport> {
        let plan = self.validate(raw).map_err(|e| {
            mlog_error!("run {}: plan rejected: {}", ctx.run_id().short(), e);
            Error::Planning(e)
        })?;
        self.execute(plan, ctx).await
    }

    /// Ask `planner` for a plan for `instruction`, then run it.
    pub async fn plan_and_run(
        &self,
        planner: &dyn Planner,
        instruction: &str,
        ctx: &RunContext,
    ) -> Result<RunReport> {
        mlog!("run {}: planning {:?}", ctx.run_id().short(), instruction);
        let raw = planner.plan(instruction).await?;
        self.run(raw, ctx).await
    }

    /// Execute an already validated plan.
    pub async fn execute(&self, plan: Plan, ctx: &RunContext) -> Result<RunReport> {
        Execution {
            registry: &self.registry,
            config: &self.config,
            plan,
            ctx,
        }
        .run()
        .await
    }

    /// Start a run on the current tokio runtime with its own progress channel.
    pub fn spawn(&self, raw: RawPlan) -> RunHandle {
        let (tx, events) = progress::channel(self.config.event_buffer);
        let ctx = RunContext::new(tx);
        let run_id = ctx.run_id();
        let cancel = ctx.cancellation_token();
        let orchestrator = self.clone();
        let join = tokio::spawn(async move { orchestrator.run(raw, &ctx).await });
        RunHandle {
            run_id,
            events,
            completion: RunCompletion { cancel, join },
        }
    }
}

/// A spawned run: its progress stream plus the means to cancel and await it.
#[derive(Debug)]
pub struct RunHandle {
    run_id: RunId,
    events: ProgressReceiver,
    completion: RunCompletion,
}

impl RunHandle {
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn events(&mut self) -> &mut ProgressReceiver {
        &mut self.events
    }

    pub fn cancel(&self) {
        self.completion.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.completion.cancellation_token()
    }

    /// Separate the event stream from completion so they can be consumed
    /// concurrently. Dropping the receiver cancels the run.
    ///
    /// The receiver must be drained while the run is in progress: events
    /// apply backpressure, so a run whose observer holds the receiver but
    /// stops reading pauses once `event_buffer` events are pending.
    pub fn split(self) -> (ProgressReceiver, RunCompletion) {
        (self.events, self.completion)
    }

    /// Drain remaining events and wait for the report.
    pub async fn wait(self) -> Result<RunReport> {
        let (mut events, completion) = self.split();
        while events.recv().await.is_some() {}
        completion.wait().await
    }
}

/// Completion half of a [`RunHandle`].
#[derive(Debug)]
pub struct RunCompletion {
    cancel: CancellationToken,
    join: JoinHandle<Result<RunReport>>,
}

impl RunCompletion {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn wait(self) -> Result<RunReport> {
        self.join
            .await
            .map_err(|e| Error::TaskJoin(e.to_string()))?
    }
}

type AgentOutcome = std::result::Result<Value, TaskError>;

/// State of one run. Owns the plan; the only place task status changes.
struct Execution<'a> {
    registry: &'a AgentRegistry,
    config: &'a OrchestratorConfig,
    plan: Plan,
    ctx: &'a RunContext,
}

impl Execution<'_> {
    async fn run(mut self) -> Result<RunReport> {
        let run = self.ctx.run_id().short();
        let layers = self.plan.layers().to_vec();
        mlog!(
            "run {}: executing {} tasks in {} layers (max_concurrency={})",
            run,
            self.plan.len(),
            layers.len(),
            self.config.max_concurrency
        );

        for (number, layer) in layers.iter().enumerate() {
            if self.ctx.is_cancelled() {
                mlog_warn!("run {}: cancelled before layer {}", run, number);
                break;
            }
            let ready = self.activate_layer(layer).await?;
            mlog!(
                "run {}: layer {} activated, {} of {} tasks ready",
                run,
                number,
                ready.len(),
                layer.len()
            );
            self.run_layer(ready).await?;
        }

        let cancelled = self.skip_undispatched().await?;
        let report = RunReport::from_plan(self.ctx.run_id(), &self.plan, cancelled);
        mlog!("run {}: completed: {}", run, report.summary());
        self.ctx
            .emit(ProgressEvent::PlanCompleted {
                payload: report.clone(),
            })
            .await;
        Ok(report)
    }

    /// Skip tasks with a dependency that did not succeed; mark the rest ready.
    async fn activate_layer(&mut self, layer: &[usize]) -> Result<Vec<usize>> {
        let mut ready = Vec::with_capacity(layer.len());
        for &pos in layer {
            let blocker = self
                .plan
                .task_at(pos)
                .depends_on
                .iter()
                .find(|dep| {
                    self.plan.task(dep).map(|t| t.status()) != Some(TaskStatus::Succeeded)
                })
                .cloned();

            match blocker {
                Some(dependency) => {
                    mlog_debug!(
                        "run {}: skipping {}: dependency {} did not succeed",
                        self.ctx.run_id().short(),
                        self.plan.task_at(pos).id,
                        dependency
                    );
                    self.skip(pos, TaskError::DependencyNotSucceeded { dependency })
                        .await?;
                }
                None => {
                    self.plan.task_at_mut(pos).mark_ready()?;
                    ready.push(pos);
                }
            }
        }
        Ok(ready)
    }

    /// Dispatch `ready` in order, keeping at most `max_concurrency` agent
    /// calls in flight, until every admitted call has completed.
    async fn run_layer(&mut self, ready: Vec<usize>) -> Result<()> {
        let mut queue: VecDeque<usize> = ready.into();
        let mut in_flight: JoinSet<(usize, AgentOutcome)> = JoinSet::new();

        loop {
            while in_flight.len() < self.config.max_concurrency && !self.ctx.is_cancelled() {
                let Some(pos) = queue.pop_front() else {
                    break;
                };
                self.dispatch(pos, &mut in_flight).await?;
            }

            match in_flight.join_next().await {
                Some(Ok((pos, outcome))) => self.complete(pos, outcome).await?,
                Some(Err(e)) => return Err(Error::TaskJoin(e.to_string())),
                None => break,
            }
        }

        if !queue.is_empty() {
            mlog_warn!(
                "run {}: cancelled with {} tasks of the layer not dispatched",
                self.ctx.run_id().short(),
                queue.len()
            );
        }
        Ok(())
    }

    async fn dispatch(
        &mut self,
        pos: usize,
        in_flight: &mut JoinSet<(usize, AgentOutcome)>,
    ) -> Result<()> {
        let task = self.plan.task_at(pos);
        let task_id = task.id.clone();

        let Some(agent) = self.registry.get(&task.capability) else {
            let error = TaskError::CapabilityNotFound {
                capability: task.capability.clone(),
            };
            mlog_warn!("run {}: {}: {}", self.ctx.run_id().short(), task_id, error);
            self.plan.task_at_mut(pos).fail(error.clone())?;
            self.ctx
                .emit(ProgressEvent::TaskFailed { task_id, error })
                .await;
            return Ok(());
        };

        let parameters = self.resolve_parameters(pos);
        mlog_trace!("run {}: {} parameters: {:?}", self.ctx.run_id().short(), task_id, parameters);

        self.plan.task_at_mut(pos).start()?;
        mlog_debug!(
            "run {}: dispatching {} to {}",
            self.ctx.run_id().short(),
            task_id,
            agent.capability()
        );
        self.ctx
            .emit(ProgressEvent::TaskStarted { task_id })
            .await;

        let timeout = self.config.task_timeout;
        in_flight.spawn(async move { (pos, invoke(agent, parameters, timeout).await) });
        Ok(())
    }

    /// The task's parameters with dependency results filled in.
    fn resolve_parameters(&self, pos: usize) -> Parameters {
        let task = self.plan.task_at(pos);
        let results: Vec<(&TaskId, &Value)> = task
            .depends_on
            .iter()
            .filter_map(|dep| self.plan.task(dep).and_then(|t| t.result()).map(|r| (dep, r)))
            .collect();
        interpolate(&task.parameters, &results)
    }

    async fn complete(&mut self, pos: usize, outcome: AgentOutcome) -> Result<()> {
        let task_id = self.plan.task_at(pos).id.clone();
        match outcome {
            Ok(payload) => {
                mlog_debug!("run {}: {} succeeded", self.ctx.run_id().short(), task_id);
                self.plan.task_at_mut(pos).succeed(payload.clone())?;
                self.ctx
                    .emit(ProgressEvent::TaskSucceeded { task_id, payload })
                    .await;
            }
            Err(error) => {
                mlog_warn!("run {}: {} failed: {}", self.ctx.run_id().short(), task_id, error);
                self.plan.task_at_mut(pos).fail(error.clone())?;
                self.ctx
                    .emit(ProgressEvent::TaskFailed { task_id, error })
                    .await;
            }
        }
        Ok(())
    }

    async fn skip(&mut self, pos: usize, reason: TaskError) -> Result<()> {
        let task_id = self.plan.task_at(pos).id.clone();
        self.plan.task_at_mut(pos).skip(reason.clone())?;
        self.ctx
            .emit(ProgressEvent::TaskSkipped {
                task_id,
                error: reason,
            })
            .await;
        Ok(())
    }

    /// Skip every task cancellation kept from running, in plan order.
    /// Returns whether there were any.
    async fn skip_undispatched(&mut self) -> Result<bool> {
        let pending: Vec<usize> = (0..self.plan.len())
            .filter(|&pos| !self.plan.task_at(pos).is_terminal())
            .collect();
        for &pos in &pending {
            self.skip(pos, TaskError::Cancelled).await?;
        }
        Ok(!pending.is_empty())
    }
}

/// Call the agent once, containing panics and enforcing the deadline.
async fn invoke(
    agent: Arc<dyn Agent>,
    parameters: Parameters,
    timeout: Option<Duration>,
) -> AgentOutcome {
    let call = AssertUnwindSafe(async move { agent.execute(&parameters).await }).catch_unwind();
    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(outcome) => outcome,
            Err(_) => return Err(TaskError::TimedOut(limit)),
        },
        None => call.await,
    };
    match outcome {
        Ok(result) => result.into_result().map_err(TaskError::from),
        Err(panic) => Err(TaskError::AgentPanicked(panic_message(panic.as_ref()))),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
