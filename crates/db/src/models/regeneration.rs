//! Regeneration request rows, their child collections, and update DTOs.

use serde::Serialize;
use sqlx::FromRow;
use filmgen_core::error::CoreError;
use filmgen_core::regeneration::{LogEntry, LogKind, RequestStatus, StatusId, TargetType};
use filmgen_core::types::{DbId, Timestamp};

/// A row from the `regeneration_requests` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RegenerationRequestRow {
    pub id: DbId,
    pub project_id: DbId,
    pub requester_id: DbId,
    pub target_type: String,
    pub target_id: DbId,
    pub target_name: String,
    pub status_id: StatusId,
    pub max_attempts: i32,
    pub attempts_used: i32,
    pub credits_paid: i64,
    pub selected_url: Option<String>,
    pub reviewed_by: Option<DbId>,
    pub reviewed_at: Option<Timestamp>,
    pub review_note: Option<String>,
    pub final_review_by: Option<DbId>,
    pub final_review_at: Option<Timestamp>,
    pub final_review_note: Option<String>,
    pub error_message: Option<String>,
    pub generating_since: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl RegenerationRequestRow {
    pub fn status(&self) -> Result<RequestStatus, CoreError> {
        RequestStatus::from_id(self.status_id)
    }

    pub fn target_type(&self) -> Result<TargetType, CoreError> {
        TargetType::from_name(&self.target_type)
            .map_err(|_| CoreError::Internal(format!("Corrupt target type '{}'", self.target_type)))
    }
}

/// A row from the `regeneration_candidates` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RegenerationCandidate {
    pub request_id: DbId,
    pub position: i32,
    pub url: String,
    pub created_at: Timestamp,
}

/// A row from the `regeneration_request_logs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RegenerationLogRow {
    pub id: DbId,
    pub request_id: DbId,
    pub kind: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
    pub logged_at: Timestamp,
}

impl TryFrom<RegenerationLogRow> for LogEntry {
    type Error = CoreError;

    fn try_from(row: RegenerationLogRow) -> Result<Self, Self::Error> {
        Ok(LogEntry {
            timestamp: row.logged_at,
            kind: LogKind::from_name(&row.kind)?,
            message: row.message,
            details: row.details,
        })
    }
}

/// DTO for inserting a new request in `pending`.
#[derive(Debug, Clone)]
pub struct CreateRegenerationRequest {
    pub project_id: DbId,
    pub requester_id: DbId,
    pub target_type: TargetType,
    pub target_id: DbId,
    pub target_name: String,
}

/// Who signed a review step, when, and with what note.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewStamp {
    pub reviewer_id: DbId,
    pub note: Option<String>,
    pub at: Timestamp,
}

impl ReviewStamp {
    pub fn now(reviewer_id: DbId, note: Option<String>) -> Self {
        Self {
            reviewer_id,
            note,
            at: chrono::Utc::now(),
        }
    }
}

/// Field changes applied together with a status compare-and-swap.
///
/// `None` leaves a field untouched. `new_candidate` appends a URL and
/// increments `attempts_used`; the write is refused if that would exceed the
/// budget. `error_message: Some(None)` clears the message. `claim` pins the
/// write to the attempt that set `generating_since` to that instant.
#[derive(Debug, Clone, Default)]
pub struct RequestUpdate {
    pub claim: Option<Timestamp>,
    pub max_attempts: Option<i32>,
    pub credits_paid: Option<i64>,
    pub new_candidate: Option<String>,
    pub selected_url: Option<String>,
    pub review: Option<ReviewStamp>,
    pub final_review: Option<ReviewStamp>,
    pub error_message: Option<Option<String>>,
    pub logs: Vec<LogEntry>,
}

impl RequestUpdate {
    /// Pin this update to the attempt that entered `generating` at `since`.
    pub fn claimed(mut self, since: Option<Timestamp>) -> Self {
        self.claim = since;
        self
    }

    pub fn log(mut self, entry: LogEntry) -> Self {
        self.logs.push(entry);
        self
    }

    /// Attempt increment implied by this update.
    pub fn attempt_increment(&self) -> i32 {
        i32::from(self.new_candidate.is_some())
    }
}

/// Outcome of the final-approval transaction.
#[derive(Debug, Clone)]
pub enum FinalizeOutcome<T> {
    /// Scene updated and request completed.
    Completed(T),
    /// The request was no longer in `awaiting_final`.
    StatusChanged,
    /// The target scene no longer exists; nothing was written.
    SceneMissing,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_counts_as_one_attempt() {
        let update = RequestUpdate {
            new_candidate: Some("https://cdn/x.png".into()),
            ..Default::default()
        };
        assert_eq!(update.attempt_increment(), 1);
        assert_eq!(RequestUpdate::default().attempt_increment(), 0);
    }

    #[test]
    fn log_row_converts_to_entry() {
        let row = RegenerationLogRow {
            id: 1,
            request_id: 2,
            kind: "cost".into(),
            message: "Charged $0.04".into(),
            details: None,
            logged_at: chrono::Utc::now(),
        };
        let entry = LogEntry::try_from(row).unwrap();
        assert_eq!(entry.kind, LogKind::Cost);
    }

    #[test]
    fn unknown_log_kind_is_rejected() {
        let row = RegenerationLogRow {
            id: 1,
            request_id: 2,
            kind: "debug".into(),
            message: String::new(),
            details: None,
            logged_at: chrono::Utc::now(),
        };
        assert!(LogEntry::try_from(row).is_err());
    }
}
