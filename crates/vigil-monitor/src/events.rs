use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use vigil_process::{ActionKind, ProcessSnapshot, TargetId};

use crate::error::ActionError;
use crate::reconcile::UiDelta;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogResetReason {
    /// The caller started a new incarnation.
    Started,
    Cleared,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Lifecycle(ActionKind),
    Console(String),
    ClearLog,
    SetPort(u16),
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Lifecycle(kind) => kind.as_str(),
            Operation::Console(_) => "console",
            Operation::ClearLog => "clear-log",
            Operation::SetPort(_) => "set-port",
        }
    }
}

/// Outcome of one imperative call; `Ok` holds the remote's message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResult {
    pub operation: Operation,
    pub outcome: Result<String, ActionError>,
}

impl ActionResult {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn message(&self) -> String {
        match &self.outcome {
            Ok(m) => m.clone(),
            Err(e) => e.to_string(),
        }
    }
}

/// Everything a session reports to its presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Snapshot {
        snapshot: ProcessSnapshot,
        delta: UiDelta,
        observed_at: DateTime<Utc>,
    },
    LogLines(Vec<String>),
    LogReset {
        reason: LogResetReason,
    },
    ActionResult(ActionResult),
    /// Terminal: the target was deleted and polling has stopped.
    TargetGone {
        target: TargetId,
    },
}

pub type EventSender = mpsc::UnboundedSender<SessionEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
