//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is shared via `Arc<EventBus>`. Subscribers that fall behind
//! by more than the channel capacity observe `RecvError::Lagged` and skip
//! the dropped events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use filmgen_core::types::DbId;

// ---------------------------------------------------------------------------
// PlatformEvent
// ---------------------------------------------------------------------------

/// A domain event addressed to a set of users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformEvent {
    /// Dot-separated event name, e.g. `"regeneration.approved"`.
    pub event_type: String,

    /// Short human-readable headline.
    pub title: String,

    /// Body text shown to recipients.
    pub message: String,

    pub project_id: Option<DbId>,

    pub source_entity_type: Option<String>,

    pub source_entity_id: Option<DbId>,

    /// User that triggered the event.
    pub actor_user_id: Option<DbId>,

    /// Users who should be told about the event.
    pub recipient_ids: Vec<DbId>,

    /// Deep link into the application, if any.
    pub action_url: Option<String>,

    /// Event-specific structured data.
    pub payload: serde_json::Value,

    pub timestamp: DateTime<Utc>,
}

impl PlatformEvent {
    pub fn new(
        event_type: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            title: title.into(),
            message: message.into(),
            project_id: None,
            source_entity_type: None,
            source_entity_id: None,
            actor_user_id: None,
            recipient_ids: Vec::new(),
            action_url: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_project(mut self, project_id: DbId) -> Self {
        self.project_id = Some(project_id);
        self
    }

    pub fn with_source(mut self, entity_type: impl Into<String>, entity_id: DbId) -> Self {
        self.source_entity_type = Some(entity_type.into());
        self.source_entity_id = Some(entity_id);
        self
    }

    pub fn with_actor(mut self, user_id: DbId) -> Self {
        self.actor_user_id = Some(user_id);
        self
    }

    /// Set the recipients, dropping duplicates while keeping first-seen order.
    pub fn with_recipients(mut self, recipients: impl IntoIterator<Item = DbId>) -> Self {
        let mut ids = Vec::new();
        for id in recipients {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        self.recipient_ids = ids;
        self
    }

    pub fn with_action_url(mut self, url: impl Into<String>) -> Self {
        self.action_url = Some(url.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// ```rust
/// use filmgen_events::bus::{EventBus, PlatformEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(PlatformEvent::new("regeneration.requested", "New request", "Scene 1 image"));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<PlatformEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// Returns the number of subscribers reached; zero means the event was
    /// dropped.
    pub fn publish(&self, event: PlatformEvent) -> usize {
        match self.sender.send(event) {
            Ok(n) => n,
            Err(err) => {
                tracing::debug!(event_type = %err.0.event_type, "Event published with no subscribers");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlatformEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
