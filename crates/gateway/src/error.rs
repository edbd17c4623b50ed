/// Errors from the generation service layer.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The HTTP request itself failed (network, DNS, TLS, decode).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("Generation API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The service answered 2xx but the body made no sense.
    #[error("Malformed generation response: {0}")]
    Malformed(String),

    /// The video job reported failure.
    #[error("Video job failed: {0}")]
    JobFailed(String),

    /// The job was still processing after the poll cap.
    #[error("Video job still processing after {polls} polls")]
    Timeout { polls: u32 },

    #[error("Generation cancelled")]
    Cancelled,
}

impl GatewayError {
    /// Whether a poll that hit this error is worth repeating.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request(e) => e.is_timeout() || e.is_connect(),
            Self::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}
