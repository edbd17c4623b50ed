//! Running one generation attempt.
//!
//! An attempt claims the request by moving it `approved -> generating`, calls
//! the generation service outside of any transaction, then records the
//! outcome with a second compare-and-swap from `generating`, pinned to the
//! `generating_since` instant of its own claim. If the request moved on in
//! the meantime (a selection was made, or the reaper reverted it and a newer
//! attempt claimed it) the result is discarded.

use std::sync::Arc;

use filmgen_core::error::CoreError;
use filmgen_core::media::Resolution;
use filmgen_core::pricing::{format_cents, real_cost_cents};
use filmgen_core::regeneration::{
    check_transition, status_after_success, LogEntry, RegenerationAction, RequestStatus,
    TargetType,
};
use filmgen_core::types::DbId;
use filmgen_db::models::regeneration::RequestUpdate;
use filmgen_gateway::{wait_for_video, GatewayError, VideoSubmission};
use serde::Serialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::engine::{require_requester, RegenerationEngine};
use crate::notify;
use crate::params::{image_request, resolution_for, video_request};
use crate::request::RegenerationRequest;

/// Result of a successful attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptOutcome {
    pub url: String,
    pub attempts_used: i32,
    pub attempts_remaining: i32,
    pub status: RequestStatus,
    pub generated_urls: Vec<String>,
}

/// A produced candidate and what it cost.
struct Generated {
    url: String,
    resolution: Resolution,
    owner_id: DbId,
}

enum AttemptFailure {
    Gateway(GatewayError),
    Precondition(String),
    SceneMissing,
    Other(CoreError),
}

impl From<CoreError> for AttemptFailure {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::MissingPrecondition(msg) => Self::Precondition(msg),
            other => Self::Other(other),
        }
    }
}

impl RegenerationEngine {
    /// Run an attempt on its own task.
    ///
    /// Dropping the returned future (for example when the HTTP client goes
    /// away) cancels the generation call and reverts the request to
    /// `approved` without consuming an attempt.
    pub async fn attempt(
        self: &Arc<Self>,
        project_id: DbId,
        id: DbId,
        actor_id: DbId,
    ) -> Result<AttemptOutcome, CoreError> {
        let cancel = CancellationToken::new();
        let _cancel_on_drop = cancel.clone().drop_guard();

        let engine = Arc::clone(self);
        let task = tokio::spawn(async move {
            engine
                .attempt_with_cancel(project_id, id, actor_id, &cancel)
                .await
        });

        task.await
            .map_err(|e| CoreError::Internal(format!("Attempt task failed: {e}")))?
    }

    /// Run an attempt in the current task, stopping early when `cancel`
    /// fires.
    pub async fn attempt_with_cancel(
        &self,
        project_id: DbId,
        id: DbId,
        actor_id: DbId,
        cancel: &CancellationToken,
    ) -> Result<AttemptOutcome, CoreError> {
        self.require_viewer(project_id, actor_id).await?;
        let req = self.load(project_id, id).await?;
        require_requester(&req, actor_id, "run attempts")?;
        check_transition(RegenerationAction::Attempt, req.status)?;
        if req.credits_paid <= 0 {
            return Err(CoreError::MissingPrecondition(
                "Request has not been paid for".into(),
            ));
        }
        if req.attempts_used >= req.max_attempts {
            return Err(CoreError::Conflict("No attempts remaining".into()));
        }

        let number = req.attempts_used + 1;
        let update = RequestUpdate::default().log(LogEntry::info(format!(
            "Attempt {number}/{} started",
            req.max_attempts
        )));
        let req = self
            .transition(
                project_id,
                id,
                RegenerationAction::Attempt,
                &[RequestStatus::Approved],
                RequestStatus::Generating,
                update,
            )
            .await?;

        tracing::info!(
            request_id = id,
            project_id,
            attempt = number,
            max_attempts = req.max_attempts,
            target_type = %req.target_type,
            "Generation attempt started",
        );

        match self.generate(&req, cancel).await {
            Ok(generated) => self.record_success(req, generated).await,
            Err(failure) => Err(self.record_failure(&req, actor_id, failure).await),
        }
    }

    async fn generate(
        &self,
        req: &RegenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<Generated, AttemptFailure> {
        let scene = self
            .deps
            .catalog
            .scene(req.project_id, req.target_id)
            .await?
            .ok_or(AttemptFailure::SceneMissing)?;
        let settings = self.settings(req.project_id).await?;
        let resolution = resolution_for(&settings, req.target_type);
        let gateway = self.deps.gateway.as_ref();

        let url = match req.target_type {
            TargetType::Image => {
                let characters = self.deps.catalog.characters(&scene.character_ids).await?;
                let request = image_request(&settings, &scene, &characters)?;
                tokio::select! {
                    _ = cancel.cancelled() => return Err(AttemptFailure::Gateway(GatewayError::Cancelled)),
                    result = gateway.generate_image(&request) => result.map_err(AttemptFailure::Gateway)?,
                }
            }
            TargetType::Video => {
                let request = video_request(&settings, &scene)?;
                let submission = tokio::select! {
                    _ = cancel.cancelled() => return Err(AttemptFailure::Gateway(GatewayError::Cancelled)),
                    result = gateway.submit_video(&request) => result.map_err(AttemptFailure::Gateway)?,
                };
                match submission {
                    VideoSubmission::Ready(url) => url,
                    VideoSubmission::Pending(job_id) => {
                        tracing::info!(request_id = req.id, job_id = %job_id, "Video job submitted");
                        wait_for_video(gateway, &job_id, &self.config.poll, cancel)
                            .await
                            .map_err(AttemptFailure::Gateway)?
                    }
                }
            }
        };

        Ok(Generated {
            url,
            resolution,
            owner_id: settings.owner_id,
        })
    }

    async fn record_success(
        &self,
        req: RegenerationRequest,
        generated: Generated,
    ) -> Result<AttemptOutcome, CoreError> {
        let number = req.attempts_used + 1;
        let next = status_after_success(number, req.max_attempts);
        let cents = real_cost_cents(req.target_type, generated.resolution);

        let update = RequestUpdate {
            new_candidate: Some(generated.url.clone()),
            error_message: Some(None),
            ..Default::default()
        }
        .claimed(req.generating_since)
        .log(
            LogEntry::success(format!(
                "Attempt {number}/{} produced a candidate",
                req.max_attempts
            ))
            .with_details(json!({ "url": generated.url })),
        )
        .log(
            LogEntry::cost(format!(
                "Generation cost {} billed to the project owner",
                format_cents(cents)
            ))
            .with_details(json!({
                "cents": cents,
                "owner_id": generated.owner_id,
                "resolution": generated.resolution.name(),
            })),
        );

        match self
            .deps
            .store
            .transition(req.id, &[RequestStatus::Generating], next, update)
            .await?
        {
            Some(updated) => {
                tracing::info!(
                    request_id = req.id,
                    attempt = number,
                    status = %updated.status,
                    "Generation attempt succeeded",
                );
                if updated.status == RequestStatus::Selecting {
                    self.notify(notify::ready_for_selection(&updated)).await;
                }
                Ok(AttemptOutcome {
                    url: generated.url,
                    attempts_used: updated.attempts_used,
                    attempts_remaining: updated.attempts_remaining(),
                    status: updated.status,
                    generated_urls: updated.generated_urls,
                })
            }
            None => Err(self.discard(&req, number, &generated.url).await),
        }
    }

    /// The request left `generating` while the service was working; throw
    /// the result away.
    async fn discard(&self, req: &RegenerationRequest, number: i32, url: &str) -> CoreError {
        if let Err(e) = self.deps.storage.delete_by_url(url).await {
            tracing::warn!(request_id = req.id, url, error = %e, "Failed to delete discarded candidate");
        }
        let current = match self.load(req.project_id, req.id).await {
            Ok(current) => current,
            Err(e) => return e,
        };
        tracing::info!(
            request_id = req.id,
            attempt = number,
            status = %current.status,
            "Discarded attempt result; request moved on",
        );
        let entry = LogEntry::info(format!(
            "Discarded result of attempt {number}: request is now {}",
            current.status
        ))
        .with_details(json!({ "url": url }));
        self.append_logs(current.clone(), vec![entry]).await;
        CoreError::invalid_transition(RegenerationAction::Attempt.name(), current.status)
    }

    async fn record_failure(
        &self,
        req: &RegenerationRequest,
        actor_id: DbId,
        failure: AttemptFailure,
    ) -> CoreError {
        let (message, error) = match failure {
            AttemptFailure::SceneMissing => {
                self.fail_missing_scene(req, actor_id, RequestStatus::Generating)
                    .await;
                return CoreError::NotFound {
                    entity: "Scene",
                    id: req.target_id,
                };
            }
            AttemptFailure::Gateway(GatewayError::Cancelled) => (
                "attempt cancelled".to_string(),
                CoreError::GenerationFailed("attempt cancelled".into()),
            ),
            AttemptFailure::Gateway(e) => (e.to_string(), CoreError::GenerationFailed(e.to_string())),
            AttemptFailure::Precondition(msg) => (msg.clone(), CoreError::MissingPrecondition(msg)),
            AttemptFailure::Other(e) => (e.to_string(), e),
        };

        let number = req.attempts_used + 1;
        let entry = LogEntry::error(format!(
            "Attempt {number}/{} failed: {message}",
            req.max_attempts
        ));
        let update = RequestUpdate {
            error_message: Some(Some(message.clone())),
            ..Default::default()
        }
        .claimed(req.generating_since)
        .log(entry.clone());

        match self
            .deps
            .store
            .transition(req.id, &[RequestStatus::Generating], RequestStatus::Approved, update)
            .await
        {
            Ok(Some(_)) => {
                tracing::warn!(request_id = req.id, attempt = number, error = %message, "Generation attempt failed");
            }
            Ok(None) => {
                // Already moved on; keep the failure in the audit trail only.
                if let Err(e) = self.deps.store.append_logs(req.id, vec![entry]).await {
                    tracing::error!(request_id = req.id, error = %e, "Failed to append request logs");
                }
            }
            Err(e) => {
                tracing::error!(request_id = req.id, error = %e, "Failed to revert failed attempt");
            }
        }
        error
    }
}
