//! Regeneration request state machine rules.
//!
//! A regeneration request moves through a closed set of statuses. Every
//! workflow action names the statuses it may start from; anything else is an
//! [`CoreError::InvalidTransition`]. The status discriminants match the seed
//! order of the `regeneration_statuses` lookup table.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Attempt budget granted at approval unless the approver asks otherwise.
pub const DEFAULT_MAX_ATTEMPTS: i32 = 3;

/// Upper bound an approver may grant.
pub const MAX_ALLOWED_ATTEMPTS: i32 = 10;

/// Maximum length of a review note.
pub const MAX_NOTE_LENGTH: usize = 2_000;

/// Maximum length of a target display label.
pub const MAX_TARGET_NAME_LENGTH: usize = 200;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Status ID type matching SMALLINT in the database.
pub type StatusId = i16;

#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending = 1,
    Approved = 2,
    Generating = 3,
    Selecting = 4,
    AwaitingFinal = 5,
    Completed = 6,
    Rejected = 7,
    Failed = 8,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 8] = [
        Self::Pending,
        Self::Approved,
        Self::Generating,
        Self::Selecting,
        Self::AwaitingFinal,
        Self::Completed,
        Self::Rejected,
        Self::Failed,
    ];

    /// Statuses in which a request still occupies its target.
    pub const ACTIVE: [RequestStatus; 5] = [
        Self::Pending,
        Self::Approved,
        Self::Generating,
        Self::Selecting,
        Self::AwaitingFinal,
    ];

    /// Return the database status ID.
    pub fn id(self) -> StatusId {
        self as StatusId
    }

    pub fn from_id(id: StatusId) -> Result<Self, CoreError> {
        Self::ALL
            .into_iter()
            .find(|s| s.id() == id)
            .ok_or_else(|| CoreError::Internal(format!("Unknown regeneration status id {id}")))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Generating => "generating",
            Self::Selecting => "selecting",
            Self::AwaitingFinal => "awaiting_final",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        Self::ALL
            .into_iter()
            .find(|s| s.as_str() == name)
            .ok_or_else(|| CoreError::Validation(format!("Unknown status '{name}'")))
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Rejected | Self::Failed)
    }
}

impl From<RequestStatus> for StatusId {
    fn from(value: RequestStatus) -> Self {
        value as StatusId
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Target
// ---------------------------------------------------------------------------

/// Which media field of a scene a request regenerates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    Image,
    Video,
}

impl TargetType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name {
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            other => Err(CoreError::Validation(format!(
                "Invalid target type '{other}'. Must be one of: image, video"
            ))),
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Transition table
// ---------------------------------------------------------------------------

/// Workflow actions on an existing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegenerationAction {
    Approve,
    Reject,
    Cancel,
    Attempt,
    Select,
    FinalApprove,
    FinalReject,
}

impl RegenerationAction {
    pub fn name(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Cancel => "cancel",
            Self::Attempt => "attempt",
            Self::Select => "select",
            Self::FinalApprove => "final-approve",
            Self::FinalReject => "final-reject",
        }
    }

    /// Statuses from which the action is legal.
    pub fn allowed_from(self) -> &'static [RequestStatus] {
        use RequestStatus::*;
        match self {
            Self::Approve | Self::Reject | Self::Cancel => &[Pending],
            Self::Attempt => &[Approved, Generating],
            Self::Select => &[Approved, Generating, Selecting],
            Self::FinalApprove | Self::FinalReject => &[AwaitingFinal],
        }
    }

    pub fn is_allowed_from(self, status: RequestStatus) -> bool {
        self.allowed_from().contains(&status)
    }
}

/// Fail with [`CoreError::InvalidTransition`] unless `action` is legal from `current`.
pub fn check_transition(action: RegenerationAction, current: RequestStatus) -> Result<(), CoreError> {
    if action.is_allowed_from(current) {
        Ok(())
    } else {
        Err(CoreError::invalid_transition(action.name(), current))
    }
}

/// Status after a successful attempt: `selecting` once the budget is spent.
pub fn status_after_success(attempts_used: i32, max_attempts: i32) -> RequestStatus {
    if attempts_used >= max_attempts {
        RequestStatus::Selecting
    } else {
        RequestStatus::Approved
    }
}

pub fn attempts_remaining(max_attempts: i32, attempts_used: i32) -> i32 {
    (max_attempts - attempts_used).max(0)
}

// ---------------------------------------------------------------------------
// Attempt log
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    Info,
    Success,
    Error,
    Cost,
}

impl LogKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Error => "error",
            Self::Cost => "cost",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name {
            "info" => Ok(Self::Info),
            "success" => Ok(Self::Success),
            "error" => Ok(Self::Error),
            "cost" => Ok(Self::Cost),
            other => Err(CoreError::Internal(format!("Unknown log kind '{other}'"))),
        }
    }
}

/// One write-once entry of a request's audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: Timestamp,
    pub kind: LogKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl LogEntry {
    pub fn new(kind: LogKind, message: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now(),
            kind,
            message: message.into(),
            details: None,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogKind::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(LogKind::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogKind::Error, message)
    }

    pub fn cost(message: impl Into<String>) -> Self {
        Self::new(LogKind::Cost, message)
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

pub fn validate_note(note: Option<&str>) -> Result<(), CoreError> {
    match note {
        Some(n) if n.chars().count() > MAX_NOTE_LENGTH => Err(CoreError::Validation(format!(
            "Note exceeds {MAX_NOTE_LENGTH} characters"
        ))),
        _ => Ok(()),
    }
}

pub fn validate_target_name(name: &str) -> Result<(), CoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("Target name must not be empty".into()));
    }
    if trimmed.chars().count() > MAX_TARGET_NAME_LENGTH {
        return Err(CoreError::Validation(format!(
            "Target name exceeds {MAX_TARGET_NAME_LENGTH} characters"
        )));
    }
    Ok(())
}

pub fn validate_max_attempts(max_attempts: i32) -> Result<(), CoreError> {
    if (1..=MAX_ALLOWED_ATTEMPTS).contains(&max_attempts) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "max_attempts must be between 1 and {MAX_ALLOWED_ATTEMPTS}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_ids_match_seed_data() {
        assert_eq!(RequestStatus::Pending.id(), 1);
        assert_eq!(RequestStatus::Approved.id(), 2);
        assert_eq!(RequestStatus::Generating.id(), 3);
        assert_eq!(RequestStatus::Selecting.id(), 4);
        assert_eq!(RequestStatus::AwaitingFinal.id(), 5);
        assert_eq!(RequestStatus::Completed.id(), 6);
        assert_eq!(RequestStatus::Rejected.id(), 7);
        assert_eq!(RequestStatus::Failed.id(), 8);
    }

    #[test]
    fn status_from_id_and_name_round_trip() {
        for status in RequestStatus::ALL {
            assert_eq!(RequestStatus::from_id(status.id()).unwrap(), status);
            assert_eq!(RequestStatus::from_name(status.as_str()).unwrap(), status);
        }
        assert!(RequestStatus::from_id(0).is_err());
        assert!(RequestStatus::from_name("done").is_err());
    }

    #[test]
    fn active_and_terminal_partition_all_statuses() {
        for status in RequestStatus::ALL {
            assert_ne!(
                status.is_terminal(),
                RequestStatus::ACTIVE.contains(&status),
                "{status} must be exactly one of active/terminal"
            );
        }
    }

    #[test]
    fn approve_only_from_pending() {
        assert!(check_transition(RegenerationAction::Approve, RequestStatus::Pending).is_ok());
        for status in RequestStatus::ALL {
            if status != RequestStatus::Pending {
                let err = check_transition(RegenerationAction::Approve, status).unwrap_err();
                assert!(err.to_string().contains(status.as_str()));
            }
        }
    }

    #[test]
    fn select_allowed_before_budget_exhausted() {
        assert!(RegenerationAction::Select.is_allowed_from(RequestStatus::Approved));
        assert!(RegenerationAction::Select.is_allowed_from(RequestStatus::Selecting));
        assert!(!RegenerationAction::Select.is_allowed_from(RequestStatus::AwaitingFinal));
    }

    #[test]
    fn terminal_statuses_allow_nothing() {
        let actions = [
            RegenerationAction::Approve,
            RegenerationAction::Reject,
            RegenerationAction::Cancel,
            RegenerationAction::Attempt,
            RegenerationAction::Select,
            RegenerationAction::FinalApprove,
            RegenerationAction::FinalReject,
        ];
        for status in [
            RequestStatus::Completed,
            RequestStatus::Rejected,
            RequestStatus::Failed,
        ] {
            for action in actions {
                assert!(!action.is_allowed_from(status), "{action:?} from {status}");
            }
        }
    }

    #[test]
    fn last_success_moves_to_selecting() {
        assert_eq!(status_after_success(1, 3), RequestStatus::Approved);
        assert_eq!(status_after_success(3, 3), RequestStatus::Selecting);
    }

    #[test]
    fn remaining_never_negative() {
        assert_eq!(attempts_remaining(3, 1), 2);
        assert_eq!(attempts_remaining(3, 5), 0);
    }

    #[test]
    fn log_entry_details_skipped_when_absent() {
        let json = serde_json::to_value(LogEntry::info("started")).unwrap();
        assert_eq!(json["kind"], "info");
        assert!(json.get("details").is_none());
    }

    #[test]
    fn note_and_name_validation() {
        assert!(validate_note(None).is_ok());
        assert!(validate_note(Some(&"x".repeat(MAX_NOTE_LENGTH + 1))).is_err());
        assert!(validate_target_name("  ").is_err());
        assert!(validate_target_name("Scene 4 image").is_ok());
        assert!(validate_max_attempts(0).is_err());
        assert!(validate_max_attempts(DEFAULT_MAX_ATTEMPTS).is_ok());
        assert!(validate_max_attempts(MAX_ALLOWED_ATTEMPTS + 1).is_err());
    }
}
