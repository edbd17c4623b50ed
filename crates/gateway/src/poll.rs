//! Capped, cancellable polling of asynchronous video jobs.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::client::GenerationGateway;
use crate::error::GatewayError;
use crate::types::JobStatus;

/// Default delay between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default number of polls before giving up (ten minutes at 5 s).
pub const DEFAULT_MAX_POLLS: u32 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_polls: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
        }
    }
}

/// Poll `job_id` until it completes, fails, exhausts the policy, or `cancel`
/// fires.
///
/// Each poll is preceded by one interval of sleep. Transient transport
/// errors count as a poll and are retried; anything else ends the wait.
pub async fn wait_for_video(
    gateway: &dyn GenerationGateway,
    job_id: &str,
    policy: &PollPolicy,
    cancel: &CancellationToken,
) -> Result<String, GatewayError> {
    for poll in 1..=policy.max_polls {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(job_id, poll, "Video polling cancelled");
                return Err(GatewayError::Cancelled);
            }
            _ = tokio::time::sleep(policy.interval) => {}
        }

        let status = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(job_id, poll, "Video polling cancelled");
                return Err(GatewayError::Cancelled);
            }
            status = gateway.poll_video(job_id) => status,
        };

        match status {
            Ok(JobStatus::Complete(url)) => {
                tracing::info!(job_id, poll, "Video job complete");
                return Ok(url);
            }
            Ok(JobStatus::Error(msg)) => {
                tracing::warn!(job_id, poll, error = %msg, "Video job failed");
                return Err(GatewayError::JobFailed(msg));
            }
            Ok(JobStatus::Processing) => {
                tracing::trace!(job_id, poll, "Video job still processing");
            }
            Err(e) if e.is_transient() => {
                tracing::warn!(job_id, poll, error = %e, "Transient error polling video job");
            }
            Err(e) => return Err(e),
        }
    }

    tracing::warn!(job_id, polls = policy.max_polls, "Video job timed out");
    Err(GatewayError::Timeout {
        polls: policy.max_polls,
    })
}
