//! The regeneration request aggregate as the workflow sees it.

use serde::Serialize;
use filmgen_core::error::CoreError;
use filmgen_core::regeneration::{attempts_remaining, LogEntry, RequestStatus, TargetType};
use filmgen_core::types::{DbId, Timestamp};
use filmgen_db::models::regeneration::RegenerationRequestRow;
use filmgen_db::models::scene::Scene;
use filmgen_db::models::user::UserSummary;

/// A request with its candidates and audit trail.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegenerationRequest {
    pub id: DbId,
    pub project_id: DbId,
    pub requester_id: DbId,
    pub target_type: TargetType,
    pub target_id: DbId,
    pub target_name: String,
    pub status: RequestStatus,
    pub max_attempts: i32,
    pub attempts_used: i32,
    pub credits_paid: i64,
    /// Candidate URLs in the order they were produced.
    pub generated_urls: Vec<String>,
    pub selected_url: Option<String>,
    pub reviewed_by: Option<DbId>,
    pub reviewed_at: Option<Timestamp>,
    pub review_note: Option<String>,
    pub final_review_by: Option<DbId>,
    pub final_review_at: Option<Timestamp>,
    pub final_review_note: Option<String>,
    pub error_message: Option<String>,
    pub logs: Vec<LogEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generating_since: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl RegenerationRequest {
    /// Assemble from a stored row and its ordered child rows.
    pub fn from_parts(
        row: RegenerationRequestRow,
        generated_urls: Vec<String>,
        logs: Vec<LogEntry>,
    ) -> Result<Self, CoreError> {
        Ok(Self {
            status: row.status()?,
            target_type: row.target_type()?,
            id: row.id,
            project_id: row.project_id,
            requester_id: row.requester_id,
            target_id: row.target_id,
            target_name: row.target_name,
            max_attempts: row.max_attempts,
            attempts_used: row.attempts_used,
            credits_paid: row.credits_paid,
            generated_urls,
            selected_url: row.selected_url,
            reviewed_by: row.reviewed_by,
            reviewed_at: row.reviewed_at,
            review_note: row.review_note,
            final_review_by: row.final_review_by,
            final_review_at: row.final_review_at,
            final_review_note: row.final_review_note,
            error_message: row.error_message,
            logs,
            generating_since: row.generating_since,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    pub fn attempts_remaining(&self) -> i32 {
        attempts_remaining(self.max_attempts, self.attempts_used)
    }

    /// Candidates other than the selected one.
    pub fn unselected_urls(&self) -> Vec<String> {
        self.generated_urls
            .iter()
            .filter(|url| Some(url.as_str()) != self.selected_url.as_deref())
            .cloned()
            .collect()
    }

    /// Deep link used in notifications.
    pub fn action_url(&self) -> String {
        format!(
            "/projects/{}/regeneration-requests/{}",
            self.project_id, self.id
        )
    }
}

/// A request with the identities and scene state a reviewer needs.
#[derive(Debug, Clone, Serialize)]
pub struct RegenerationDetail {
    #[serde(flatten)]
    pub request: RegenerationRequest,
    pub attempts_remaining: i32,
    pub requester: Option<UserSummary>,
    pub reviewer: Option<UserSummary>,
    pub final_reviewer: Option<UserSummary>,
    /// The target scene as it is now; `None` if it was deleted.
    pub scene: Option<Scene>,
}
