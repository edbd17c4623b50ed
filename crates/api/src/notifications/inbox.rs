//! Durable notification delivery.
//!
//! [`InboxSink`] stores one in-app notification per recipient before the
//! workflow call that produced it returns, then publishes the event on the
//! platform bus for live listeners. A slow or absent bus subscriber can
//! never cost an inbox row.

use std::sync::Arc;

use async_trait::async_trait;
use filmgen_core::error::CoreError;
use filmgen_db::models::notification::NewNotification;
use filmgen_db::repositories::NotificationRepo;
use filmgen_db::DbPool;
use filmgen_events::{EventBus, PlatformEvent};
use filmgen_regeneration::notify::to_event;
use filmgen_regeneration::{Notification, NotificationSink};
use serde_json::json;

pub struct InboxSink {
    pool: DbPool,
    bus: Arc<EventBus>,
}

impl InboxSink {
    pub fn new(pool: DbPool, bus: Arc<EventBus>) -> Self {
        Self { pool, bus }
    }
}

#[async_trait]
impl NotificationSink for InboxSink {
    async fn deliver(&self, notification: Notification) -> Result<(), CoreError> {
        let event = to_event(notification);
        let rows = notifications_for(&event);

        NotificationRepo::create_all(&self.pool, &rows)
            .await
            .map_err(|e| CoreError::Internal(format!("Failed to store notifications: {e}")))?;

        tracing::debug!(
            event_type = %event.event_type,
            recipients = rows.len(),
            "Notification stored in inboxes"
        );
        self.bus.publish(event);
        Ok(())
    }
}

/// One inbox row per distinct recipient.
fn notifications_for(event: &PlatformEvent) -> Vec<NewNotification> {
    let mut recipients = event.recipient_ids.clone();
    recipients.sort_unstable();
    recipients.dedup();

    let metadata = json!({
        "project_id": event.project_id,
        "source_entity_type": event.source_entity_type,
        "source_entity_id": event.source_entity_id,
        "actor_user_id": event.actor_user_id,
        "payload": event.payload,
    });

    recipients
        .into_iter()
        .map(|user_id| NewNotification {
            user_id,
            event_type: event.event_type.clone(),
            title: event.title.clone(),
            message: event.message.clone(),
            action_url: event.action_url.clone(),
            metadata: metadata.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_row_per_distinct_recipient() {
        let event = PlatformEvent::new("regeneration.requested", "New request", "Please review")
            .with_project(1)
            .with_source("regeneration_request", 7)
            .with_recipients([5, 3, 5])
            .with_action_url("/projects/1/regeneration/7");

        let rows = notifications_for(&event);

        assert_eq!(rows.iter().map(|n| n.user_id).collect::<Vec<_>>(), vec![3, 5]);
        assert_eq!(rows[0].event_type, "regeneration.requested");
        assert_eq!(rows[0].action_url.as_deref(), Some("/projects/1/regeneration/7"));
        assert_eq!(rows[0].metadata["source_entity_id"], 7);
    }

    #[test]
    fn no_recipients_no_rows() {
        let event = PlatformEvent::new("regeneration.failed", "Failed", "Scene gone");
        assert!(notifications_for(&event).is_empty());
    }
}
