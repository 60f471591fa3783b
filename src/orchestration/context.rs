//! Per-run context.
//!
//! Each run gets its own context carrying the progress sink and the
//! cancellation token, passed explicitly into the orchestrator. Nothing
//! about a session lives in global state.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::mlog_warn;
use crate::orchestration::progress::{ProgressEvent, ProgressSender};

/// Identifier of one run, used to tag log lines and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First 8 characters, for log lines.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything a run needs from its session.
#[derive(Debug)]
pub struct RunContext {
    run_id: RunId,
    progress: ProgressSender,
    cancel: CancellationToken,
    observer_lost: AtomicBool,
}

impl RunContext {
    pub fn new(progress: ProgressSender) -> Self {
        Self::with_cancellation(progress, CancellationToken::new())
    }

    /// Context driven by an existing token, e.g. a child of a session token.
    pub fn with_cancellation(progress: ProgressSender, cancel: CancellationToken) -> Self {
        Self {
            run_id: RunId::new(),
            progress,
            cancel,
            observer_lost: AtomicBool::new(false),
        }
    }

    /// Context without an observer.
    pub fn detached() -> Self {
        Self::new(ProgressSender::detached())
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// True once a send found the observer gone.
    pub fn observer_lost(&self) -> bool {
        self.observer_lost.load(Ordering::SeqCst)
    }

    /// Deliver an event to the observer.
    ///
    /// Waits while the channel is full. A vanished observer cancels the
    /// run. Returns whether the event was handed over.
    pub async fn emit(&self, event: ProgressEvent) -> bool {
        match self.progress.send(event).await {
            Ok(()) => true,
            Err(event) => {
                if !self.observer_lost.swap(true, Ordering::SeqCst) {
                    mlog_warn!(
                        "run {}: observer disconnected while sending {}, cancelling",
                        self.run_id.short(),
                        event.kind()
                    );
                }
                self.cancel.cancel();
                false
            }
        }
    }
}
