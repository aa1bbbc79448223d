use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

pub mod streams;
pub use streams::{EventStream, Subscriber};

// Session event channel capacity
pub const SESSION_EVENT_CAPACITY: usize = 32;

/// What happened to the session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEventKind {
    /// A login or signup stored a fresh token
    LoggedIn,
    /// The user logged out explicitly
    LoggedOut,
    /// The server rejected the token. The UI must leave every authenticated
    /// screen and navigate to `redirect_to`.
    Invalidated { redirect_to: String },
}

/// Session lifecycle notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEvent {
    /// Unique event ID
    pub id: String,
    pub kind: SessionEventKind,
    pub timestamp: DateTime<Utc>,
}

impl SessionEvent {
    pub fn new(kind: SessionEventKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            timestamp: Utc::now(),
        }
    }

    /// Session invalidated, navigate to the given route
    pub fn invalidated(redirect_to: impl Into<String>) -> Self {
        Self::new(SessionEventKind::Invalidated {
            redirect_to: redirect_to.into(),
        })
    }

    pub fn is_invalidation(&self) -> bool {
        matches!(self.kind, SessionEventKind::Invalidated { .. })
    }
}

/// Injected channel replacing direct navigation on session changes
#[derive(Clone)]
pub struct SessionEvents {
    stream: EventStream<SessionEvent>,
}

impl SessionEvents {
    pub fn new() -> Self {
        Self {
            stream: EventStream::new(SESSION_EVENT_CAPACITY),
        }
    }

    /// Get a subscriber to receive session events
    pub fn subscribe(&self) -> Subscriber<SessionEvent> {
        self.stream.subscribe()
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: SessionEvent) -> usize {
        info!(event = ?event.kind, "Session event");
        self.stream.publish(event)
    }

    pub fn subscriber_count(&self) -> usize {
        self.stream.subscriber_count()
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}
