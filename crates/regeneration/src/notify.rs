//! Notification texts for workflow transitions and the event-bus sink.

use std::sync::Arc;

use async_trait::async_trait;
use filmgen_core::error::CoreError;
use filmgen_core::types::DbId;
use filmgen_events::event_types::{
    REGENERATION_APPROVED, REGENERATION_COMPLETED, REGENERATION_FAILED,
    REGENERATION_FINAL_REJECTED, REGENERATION_READY_FOR_SELECTION, REGENERATION_REJECTED,
    REGENERATION_REQUESTED, REGENERATION_SELECTED,
};
use filmgen_events::{EventBus, PlatformEvent};
use serde_json::json;

use crate::collaborators::{Notification, NotificationSink};
use crate::request::RegenerationRequest;

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

/// Publishes notifications as [`PlatformEvent`]s without persisting them.
pub struct EventBusSink {
    bus: Arc<EventBus>,
}

impl EventBusSink {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl NotificationSink for EventBusSink {
    async fn deliver(&self, n: Notification) -> Result<(), CoreError> {
        self.bus.publish(to_event(n));
        Ok(())
    }
}

/// The platform event describing a notification.
pub fn to_event(n: Notification) -> PlatformEvent {
    PlatformEvent::new(n.event_type, n.title, n.message)
        .with_project(n.project_id)
        .with_source("regeneration_request", n.request_id)
        .with_actor(n.actor_id)
        .with_recipients(n.recipient_ids)
        .with_action_url(n.action_url)
        .with_payload(n.metadata)
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

fn notice(
    req: &RegenerationRequest,
    event_type: &'static str,
    actor_id: DbId,
    recipient_ids: Vec<DbId>,
    title: impl Into<String>,
    message: impl Into<String>,
) -> Notification {
    Notification {
        event_type,
        project_id: req.project_id,
        request_id: req.id,
        actor_id,
        recipient_ids,
        title: title.into(),
        message: message.into(),
        action_url: req.action_url(),
        metadata: json!({
            "request_id": req.id,
            "target_type": req.target_type,
            "target_id": req.target_id,
            "status": req.status,
        }),
    }
}

fn with_note(message: String, note: Option<&str>) -> String {
    match note {
        Some(n) if !n.trim().is_empty() => format!("{message} Note: {n}"),
        _ => message,
    }
}

pub fn requested(req: &RegenerationRequest, approvers: Vec<DbId>) -> Notification {
    notice(
        req,
        REGENERATION_REQUESTED,
        req.requester_id,
        approvers,
        "Regeneration requested",
        format!("A regeneration of \"{}\" is waiting for approval.", req.target_name),
    )
}

pub fn approved(req: &RegenerationRequest, actor_id: DbId) -> Notification {
    let message = format!(
        "Your regeneration of \"{}\" was approved with {} attempt(s).",
        req.target_name, req.max_attempts
    );
    notice(
        req,
        REGENERATION_APPROVED,
        actor_id,
        vec![req.requester_id],
        "Regeneration approved",
        with_note(message, req.review_note.as_deref()),
    )
}

pub fn rejected(req: &RegenerationRequest, actor_id: DbId) -> Notification {
    let message = format!("Your regeneration of \"{}\" was rejected.", req.target_name);
    notice(
        req,
        REGENERATION_REJECTED,
        actor_id,
        vec![req.requester_id],
        "Regeneration rejected",
        with_note(message, req.review_note.as_deref()),
    )
}

pub fn ready_for_selection(req: &RegenerationRequest) -> Notification {
    notice(
        req,
        REGENERATION_READY_FOR_SELECTION,
        req.requester_id,
        vec![req.requester_id],
        "Attempts used up",
        format!(
            "All {} attempts for \"{}\" are done. Pick the best candidate.",
            req.max_attempts, req.target_name
        ),
    )
}

pub fn selected(req: &RegenerationRequest, approvers: Vec<DbId>) -> Notification {
    notice(
        req,
        REGENERATION_SELECTED,
        req.requester_id,
        approvers,
        "Candidate selected",
        format!(
            "A candidate for \"{}\" is waiting for final approval.",
            req.target_name
        ),
    )
}

pub fn completed(req: &RegenerationRequest, actor_id: DbId) -> Notification {
    let message = format!(
        "Your selected candidate was applied to \"{}\".",
        req.target_name
    );
    notice(
        req,
        REGENERATION_COMPLETED,
        actor_id,
        vec![req.requester_id],
        "Regeneration completed",
        with_note(message, req.final_review_note.as_deref()),
    )
}

pub fn final_rejected(req: &RegenerationRequest, actor_id: DbId) -> Notification {
    let message = format!(
        "Your selected candidate for \"{}\" was not accepted; the scene is unchanged.",
        req.target_name
    );
    notice(
        req,
        REGENERATION_FINAL_REJECTED,
        actor_id,
        vec![req.requester_id],
        "Final approval declined",
        with_note(message, req.final_review_note.as_deref()),
    )
}

pub fn failed(req: &RegenerationRequest, actor_id: DbId) -> Notification {
    notice(
        req,
        REGENERATION_FAILED,
        actor_id,
        vec![req.requester_id],
        "Regeneration failed",
        format!(
            "The regeneration of \"{}\" failed: {}",
            req.target_name,
            req.error_message.as_deref().unwrap_or("unknown error")
        ),
    )
}
