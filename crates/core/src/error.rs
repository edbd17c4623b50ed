use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The requested action is not legal in the request's current status.
    #[error("Cannot {action} a request in status '{status}'")]
    InvalidTransition { action: &'static str, status: String },

    /// The approver's balance cannot fund the attempt budget.
    #[error("Insufficient credits: {required} required, {balance} available")]
    InsufficientCredits { required: i64, balance: i64 },

    /// The generation service failed or timed out. Retryable.
    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    /// A required input for generation is missing (e.g. no source image).
    #[error("Missing precondition: {0}")]
    MissingPrecondition(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for [`CoreError::InvalidTransition`].
    pub fn invalid_transition(action: &'static str, status: impl ToString) -> Self {
        CoreError::InvalidTransition {
            action,
            status: status.to_string(),
        }
    }
}
