//! External services the workflow depends on.
//!
//! Each is a narrow trait so the engine can run against Postgres and the
//! event bus in production and against in-process fakes in tests.

use async_trait::async_trait;
use filmgen_core::error::CoreError;
use filmgen_core::roles::ProjectRole;
use filmgen_core::types::DbId;

// ---------------------------------------------------------------------------
// Capability resolution
// ---------------------------------------------------------------------------

/// Answers who may do what on a project.
#[async_trait]
pub trait CapabilityResolver: Send + Sync {
    /// The user's role on the project, `None` for non-members.
    async fn role_of(&self, project_id: DbId, user_id: DbId) -> Result<Option<ProjectRole>, CoreError>;

    /// Users who may approve requests on the project.
    async fn approvers(&self, project_id: DbId) -> Result<Vec<DbId>, CoreError>;
}

// ---------------------------------------------------------------------------
// Credit ledger
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Insufficient credits: {required} required, {balance} available")]
    Insufficient { required: i64, balance: i64 },

    #[error("Credit ledger unavailable: {0}")]
    Unavailable(String),
}

impl From<LedgerError> for CoreError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Insufficient { required, balance } => {
                CoreError::InsufficientCredits { required, balance }
            }
            LedgerError::Unavailable(msg) => CoreError::Internal(msg),
        }
    }
}

/// Result of a debit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpendReceipt {
    pub balance_after: i64,
    /// `true` when the idempotency key had already been charged.
    pub replayed: bool,
}

/// Debits and refunds user credit balances.
///
/// Both mutating calls are idempotent per key: repeating a call with the
/// same key must not move credits again.
#[async_trait]
pub trait CreditLedger: Send + Sync {
    async fn check_balance(&self, user_id: DbId) -> Result<i64, LedgerError>;

    async fn spend_credits(
        &self,
        user_id: DbId,
        amount: i64,
        reason: &str,
        idempotency_key: &str,
    ) -> Result<SpendReceipt, LedgerError>;

    async fn refund_credits(
        &self,
        user_id: DbId,
        amount: i64,
        reason: &str,
        idempotency_key: &str,
    ) -> Result<(), LedgerError>;
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// A message for a set of users about one request.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub event_type: &'static str,
    pub project_id: DbId,
    pub request_id: DbId,
    pub actor_id: DbId,
    pub recipient_ids: Vec<DbId>,
    pub title: String,
    pub message: String,
    pub action_url: String,
    pub metadata: serde_json::Value,
}

/// Delivers notifications. Failures are logged by the caller and never
/// undo the transition that triggered them.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: Notification) -> Result<(), CoreError>;
}
