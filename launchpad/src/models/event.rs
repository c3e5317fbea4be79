//! Progress events published for a deployment

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::session::{CompletionInfo, LogEntry, SessionSnapshot};

/// Severity attached to progress messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressLevel {
    Info,
    Warning,
}

/// Event payload, tagged by kind on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum EventKind {
    /// First event on every subscription
    Connected { id: String },

    /// Current session state at subscribe time
    Status(Box<SessionSnapshot>),

    /// Milestone message
    Progress { message: String, level: ProgressLevel },

    /// One executed remote command
    Log(LogEntry),

    /// Terminal failure of a workflow
    Error { message: String },

    /// Terminal success of a workflow
    Complete(CompletionInfo),
}

/// An event with the time it was produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,

    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
        }
    }

    pub fn connected(id: impl Into<String>) -> Self {
        Self::new(EventKind::Connected { id: id.into() })
    }

    pub fn status(snapshot: SessionSnapshot) -> Self {
        Self::new(EventKind::Status(Box::new(snapshot)))
    }

    pub fn progress(message: impl Into<String>) -> Self {
        Self::new(EventKind::Progress {
            message: message.into(),
            level: ProgressLevel::Info,
        })
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(EventKind::Progress {
            message: message.into(),
            level: ProgressLevel::Warning,
        })
    }

    pub fn log(entry: LogEntry) -> Self {
        Self::new(EventKind::Log(entry))
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(EventKind::Error {
            message: message.into(),
        })
    }

    pub fn complete(info: CompletionInfo) -> Self {
        Self::new(EventKind::Complete(info))
    }

    /// Short name of the event kind, used as the SSE event name
    pub fn name(&self) -> &'static str {
        match self.kind {
            EventKind::Connected { .. } => "connected",
            EventKind::Status(_) => "status",
            EventKind::Progress { .. } => "progress",
            EventKind::Log(_) => "log",
            EventKind::Error { .. } => "error",
            EventKind::Complete(_) => "complete",
        }
    }

    /// Whether the event ends a workflow
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, EventKind::Error { .. } | EventKind::Complete(_))
    }
}
