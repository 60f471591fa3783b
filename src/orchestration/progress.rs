//! Progress events and the channel that carries them to one observer.
//!
//! Events are delivered in emission order over a bounded tokio channel.
//! Delivery is best-effort: once the receiver is dropped, further sends
//! fail and the run is treated as abandoned by its observer.

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::core::{TaskError, TaskId};
use crate::orchestration::report::RunReport;

/// Lifecycle event of a run.
///
/// Serializes to `{ "type": ..., "taskId"?, "payload"?, "error"? }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ProgressEvent {
    #[serde(rename_all = "camelCase")]
    TaskStarted { task_id: TaskId },
    #[serde(rename_all = "camelCase")]
    TaskSucceeded { task_id: TaskId, payload: Value },
    #[serde(rename_all = "camelCase")]
    TaskFailed { task_id: TaskId, error: TaskError },
    /// `error` carries the skip reason.
    #[serde(rename_all = "camelCase")]
    TaskSkipped { task_id: TaskId, error: TaskError },
    PlanCompleted { payload: RunReport },
}

impl ProgressEvent {
    /// The task this event is about; `None` for `PlanCompleted`.
    pub fn task_id(&self) -> Option<&TaskId> {
        match self {
            ProgressEvent::TaskStarted { task_id }
            | ProgressEvent::TaskSucceeded { task_id, .. }
            | ProgressEvent::TaskFailed { task_id, .. }
            | ProgressEvent::TaskSkipped { task_id, .. } => Some(task_id),
            ProgressEvent::PlanCompleted { .. } => None,
        }
    }

    /// Wire name of the event type.
    pub fn kind(&self) -> &'static str {
        match self {
            ProgressEvent::TaskStarted { .. } => "TaskStarted",
            ProgressEvent::TaskSucceeded { .. } => "TaskSucceeded",
            ProgressEvent::TaskFailed { .. } => "TaskFailed",
            ProgressEvent::TaskSkipped { .. } => "TaskSkipped",
            ProgressEvent::PlanCompleted { .. } => "PlanCompleted",
        }
    }

    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Create a progress channel holding at most `buffer` undelivered events.
pub fn channel(buffer: usize) -> (ProgressSender, ProgressReceiver) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    (ProgressSender { tx: Some(tx) }, ProgressReceiver { rx })
}

/// Sending half, owned by the run context.
#[derive(Debug, Clone)]
pub struct ProgressSender {
    tx: Option<mpsc::Sender<ProgressEvent>>,
}

impl ProgressSender {
    /// A sender with no observer; every event is dropped.
    pub fn detached() -> Self {
        Self { tx: None }
    }

    pub fn is_detached(&self) -> bool {
        self.tx.is_none()
    }

    /// Deliver `event`. Returns `Err(event)` only when an observer existed
    /// and has gone away.
    pub async fn send(&self, event: ProgressEvent) -> std::result::Result<(), ProgressEvent> {
        match &self.tx {
            Some(tx) => tx.send(event).await.map_err(|e| e.0),
            None => Ok(()),
        }
    }
}

/// Receiving half, held by the session's observer.
#[derive(Debug)]
pub struct ProgressReceiver {
    rx: mpsc::Receiver<ProgressEvent>,
}

impl ProgressReceiver {
    /// Next event; `None` once the run has finished and the channel is drained.
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<ProgressEvent> {
        self.rx.try_recv().ok()
    }

    /// Receive until the channel closes.
    pub async fn collect(mut self) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.rx.recv().await {
            events.push(event);
        }
        events
    }
}
