//! Recovery of attempts abandoned mid-generation.
//!
//! An attempt holds its request in `generating` while the generation service
//! works. If the process dies before the outcome is recorded, the request
//! would stay there forever. The reaper moves such requests back to
//! `approved` once they have been generating longer than
//! [`RegenerationConfig::stale_after`](crate::RegenerationConfig), so the
//! attempt can be retried without consuming budget.

use std::sync::Arc;

use chrono::Utc;
use filmgen_core::error::CoreError;
use filmgen_core::regeneration::{LogEntry, RequestStatus};
use filmgen_db::models::regeneration::RequestUpdate;
use tokio_util::sync::CancellationToken;

use crate::engine::RegenerationEngine;

impl RegenerationEngine {
    /// Revert every request stuck in `generating` past the stale threshold.
    /// Returns how many were reverted.
    pub async fn reap_stale_attempts(&self) -> Result<usize, CoreError> {
        let stale_after = chrono::Duration::from_std(self.config.stale_after)
            .map_err(|e| CoreError::Internal(format!("Invalid stale threshold: {e}")))?;
        let cutoff = Utc::now() - stale_after;
        let stale = self.deps.store.list_stale_generating(cutoff).await?;

        let message = format!(
            "Attempt abandoned after {} second(s) without a result",
            self.config.stale_after.as_secs()
        );
        let mut reverted = 0;
        for (id, since) in stale {
            let update = RequestUpdate {
                error_message: Some(Some(message.clone())),
                ..Default::default()
            }
            .claimed(Some(since))
            .log(LogEntry::error(message.clone()));

            match self
                .deps
                .store
                .transition(id, &[RequestStatus::Generating], RequestStatus::Approved, update)
                .await
            {
                Ok(Some(_)) => {
                    reverted += 1;
                    tracing::warn!(request_id = id, "Reverted abandoned generation attempt");
                }
                // Finished, or was claimed again, between the scan and the write.
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(request_id = id, error = %e, "Failed to revert abandoned attempt");
                }
            }
        }
        Ok(reverted)
    }
}

/// Periodically runs [`RegenerationEngine::reap_stale_attempts`].
pub struct StaleAttemptReaper {
    engine: Arc<RegenerationEngine>,
}

impl StaleAttemptReaper {
    pub fn new(engine: Arc<RegenerationEngine>) -> Self {
        Self { engine }
    }

    /// Run until `cancel` is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        let period = self.engine.config().reaper_interval;
        tracing::info!(
            interval_secs = period.as_secs(),
            stale_after_secs = self.engine.config().stale_after.as_secs(),
            "Stale attempt reaper started",
        );

        let mut interval = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Stale attempt reaper stopping");
                    break;
                }
                _ = interval.tick() => {
                    match self.engine.reap_stale_attempts().await {
                        Ok(0) => tracing::debug!("No abandoned attempts"),
                        Ok(reverted) => tracing::info!(reverted, "Reverted abandoned attempts"),
                        Err(e) => tracing::error!(error = %e, "Stale attempt sweep failed"),
                    }
                }
            }
        }
    }
}
