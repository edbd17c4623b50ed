//! Notification entity models and DTOs.

use serde::Serialize;
use sqlx::FromRow;
use filmgen_core::types::{DbId, Timestamp};

/// A row from the `notifications` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Notification {
    pub id: DbId,
    pub user_id: DbId,
    pub event_type: String,
    pub title: String,
    pub message: String,
    pub action_url: Option<String>,
    pub metadata: serde_json::Value,
    pub is_read: bool,
    pub read_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

/// DTO for inserting a notification.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: DbId,
    pub event_type: String,
    pub title: String,
    pub message: String,
    pub action_url: Option<String>,
    pub metadata: serde_json::Value,
}
