//! The regeneration workflow engine.
//!
//! Every operation follows the same shape: resolve the actor's role, load
//! the request scoped to its project, check the transition table, then write
//! through a single status compare-and-swap. Side effects that may fail on
//! their own (notifications, storage cleanup) run after the write and are
//! logged rather than surfaced.

use std::sync::Arc;

use filmgen_cloud::StorageProvider;
use filmgen_core::error::CoreError;
use filmgen_core::pricing::{approval_cost, credits_per_attempt};
use filmgen_core::regeneration::{
    check_transition, validate_max_attempts, validate_note, validate_target_name, LogEntry,
    RegenerationAction, RequestStatus, TargetType,
};
use filmgen_core::roles::ProjectRole;
use filmgen_core::types::DbId;
use filmgen_db::models::project::ProjectSettings;
use filmgen_db::models::regeneration::{
    CreateRegenerationRequest, FinalizeOutcome, RequestUpdate, ReviewStamp,
};
use filmgen_gateway::GenerationGateway;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::cleanup::delete_candidates;
use crate::collaborators::{CapabilityResolver, CreditLedger, Notification, NotificationSink};
use crate::config::RegenerationConfig;
use crate::notify;
use crate::params::resolution_for;
use crate::request::{RegenerationDetail, RegenerationRequest};
use crate::store::{ProductionCatalog, RegenerationStore};

/// Entity name used in not-found errors.
const ENTITY: &str = "RegenerationRequest";

/// Idempotency key for the approval debit of a request.
pub fn approval_key(request_id: DbId) -> String {
    format!("regeneration:{request_id}:approval")
}

/// Idempotency key for refunding an approval debit that lost its race.
pub fn approval_refund_key(request_id: DbId) -> String {
    format!("regeneration:{request_id}:approval:refund")
}

// ---------------------------------------------------------------------------
// Inputs and outputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRequestInput {
    pub target_type: TargetType,
    pub target_id: DbId,
    pub target_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApproveInput {
    pub note: Option<String>,
    pub max_attempts: Option<i32>,
}

/// What approving would cost the approver right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApprovalQuote {
    pub max_attempts: i32,
    pub resolution: &'static str,
    pub credits_per_attempt: i64,
    pub total_cost: i64,
    pub balance: i64,
    pub sufficient: bool,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Everything the engine talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn RegenerationStore>,
    pub catalog: Arc<dyn ProductionCatalog>,
    pub capabilities: Arc<dyn CapabilityResolver>,
    pub ledger: Arc<dyn CreditLedger>,
    pub gateway: Arc<dyn GenerationGateway>,
    pub storage: Arc<dyn StorageProvider>,
    pub notifier: Arc<dyn NotificationSink>,
}

pub struct RegenerationEngine {
    pub(crate) deps: Collaborators,
    pub(crate) config: RegenerationConfig,
}

impl RegenerationEngine {
    pub fn new(deps: Collaborators, config: RegenerationConfig) -> Self {
        Self { deps, config }
    }

    pub fn config(&self) -> &RegenerationConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Ask for a scene's image or video to be regenerated.
    ///
    /// Only members who can edit but not approve may ask; approvers change
    /// scenes directly.
    pub async fn create(
        &self,
        project_id: DbId,
        actor_id: DbId,
        input: CreateRequestInput,
    ) -> Result<RegenerationRequest, CoreError> {
        let role = self.role(project_id, actor_id).await?;
        if !role.can_edit() || role.can_approve_requests() {
            return Err(CoreError::Forbidden(
                "Only collaborators can request regenerations".into(),
            ));
        }
        validate_target_name(&input.target_name)?;

        if self
            .deps
            .catalog
            .scene(project_id, input.target_id)
            .await?
            .is_none()
        {
            return Err(CoreError::NotFound {
                entity: "Scene",
                id: input.target_id,
            });
        }

        let req = self
            .deps
            .store
            .insert(&CreateRegenerationRequest {
                project_id,
                requester_id: actor_id,
                target_type: input.target_type,
                target_id: input.target_id,
                target_name: input.target_name,
            })
            .await?;

        tracing::info!(
            request_id = req.id,
            project_id,
            user_id = actor_id,
            target_type = %req.target_type,
            target_id = req.target_id,
            "Regeneration requested",
        );

        let approvers = self.approvers(project_id).await;
        self.notify(notify::requested(&req, approvers)).await;
        Ok(req)
    }

    /// Approve a pending request: charge the approver for the whole attempt
    /// budget and open the request for attempts.
    pub async fn approve(
        &self,
        project_id: DbId,
        id: DbId,
        actor_id: DbId,
        input: ApproveInput,
    ) -> Result<RegenerationRequest, CoreError> {
        self.require_approver(project_id, actor_id).await?;
        validate_note(input.note.as_deref())?;
        let max_attempts = input
            .max_attempts
            .unwrap_or(self.config.default_max_attempts);
        validate_max_attempts(max_attempts)?;

        let req = self.load(project_id, id).await?;
        check_transition(RegenerationAction::Approve, req.status)?;

        let settings = self.settings(project_id).await?;
        let resolution = resolution_for(&settings, req.target_type);
        let per_attempt = credits_per_attempt(req.target_type, resolution);
        let cost = approval_cost(req.target_type, resolution, max_attempts);

        let receipt = self
            .deps
            .ledger
            .spend_credits(
                actor_id,
                cost,
                &format!("Regeneration #{id}: {max_attempts} attempt(s)"),
                &approval_key(id),
            )
            .await?;

        let update = RequestUpdate {
            max_attempts: Some(max_attempts),
            credits_paid: Some(cost),
            review: Some(ReviewStamp::now(actor_id, input.note)),
            ..Default::default()
        }
        .log(LogEntry::info(format!(
            "Approved by user {actor_id} with a budget of {max_attempts} attempt(s)"
        )))
        .log(
            LogEntry::cost(format!(
                "Prepaid {cost} credits ({per_attempt} per attempt at {})",
                resolution.name()
            ))
            .with_details(json!({
                "credits": cost,
                "balance_after": receipt.balance_after,
                "replayed": receipt.replayed,
            })),
        );

        match self
            .deps
            .store
            .transition(id, &[RequestStatus::Pending], RequestStatus::Approved, update)
            .await?
        {
            Some(approved) => {
                tracing::info!(
                    request_id = id,
                    project_id,
                    user_id = actor_id,
                    credits = cost,
                    max_attempts,
                    replayed = receipt.replayed,
                    "Regeneration approved",
                );
                self.notify(notify::approved(&approved, actor_id)).await;
                Ok(approved)
            }
            None => {
                let current = self.deps.store.find(id).await?;
                // Credits stay put only if some approval landed on the request.
                let charge_held = current.as_ref().is_some_and(|r| r.credits_paid > 0);
                if !charge_held {
                    self.refund_approval(id, actor_id, cost).await;
                }
                Err(match current {
                    Some(r) => CoreError::invalid_transition(RegenerationAction::Approve.name(), r.status),
                    None => CoreError::NotFound { entity: ENTITY, id },
                })
            }
        }
    }

    pub async fn reject(
        &self,
        project_id: DbId,
        id: DbId,
        actor_id: DbId,
        note: Option<String>,
    ) -> Result<RegenerationRequest, CoreError> {
        self.require_approver(project_id, actor_id).await?;
        validate_note(note.as_deref())?;
        let req = self.load(project_id, id).await?;
        check_transition(RegenerationAction::Reject, req.status)?;

        let update = RequestUpdate {
            review: Some(ReviewStamp::now(actor_id, note)),
            ..Default::default()
        }
        .log(LogEntry::info(format!("Rejected by user {actor_id}")));

        let rejected = self
            .transition(
                project_id,
                id,
                RegenerationAction::Reject,
                &[RequestStatus::Pending],
                RequestStatus::Rejected,
                update,
            )
            .await?;

        tracing::info!(request_id = id, project_id, user_id = actor_id, "Regeneration rejected");
        self.notify(notify::rejected(&rejected, actor_id)).await;
        Ok(rejected)
    }

    /// Withdraw a pending request. Nothing has been charged yet.
    pub async fn cancel(&self, project_id: DbId, id: DbId, actor_id: DbId) -> Result<(), CoreError> {
        let role = self.role(project_id, actor_id).await?;
        let req = self.load(project_id, id).await?;
        if req.requester_id != actor_id && !role.can_approve_requests() {
            return Err(CoreError::Forbidden(
                "Only the requester or an approver can cancel a request".into(),
            ));
        }
        check_transition(RegenerationAction::Cancel, req.status)?;

        if !self.deps.store.delete_pending(id).await? {
            return Err(self.lost_race(project_id, id, RegenerationAction::Cancel).await);
        }

        tracing::info!(request_id = id, project_id, user_id = actor_id, "Regeneration cancelled");
        Ok(())
    }

    /// Pick one of the generated candidates for final review.
    pub async fn select(
        &self,
        project_id: DbId,
        id: DbId,
        actor_id: DbId,
        url: &str,
    ) -> Result<RegenerationRequest, CoreError> {
        self.role(project_id, actor_id).await?;
        let req = self.load(project_id, id).await?;
        require_requester(&req, actor_id, "select a candidate")?;
        check_transition(RegenerationAction::Select, req.status)?;

        if req.generated_urls.is_empty() {
            return Err(CoreError::MissingPrecondition(
                "No candidates have been generated yet".into(),
            ));
        }
        let position = req
            .generated_urls
            .iter()
            .position(|u| u == url)
            .ok_or_else(|| {
                CoreError::Validation("URL is not one of this request's candidates".into())
            })?;

        let update = RequestUpdate {
            selected_url: Some(url.to_string()),
            ..Default::default()
        }
        .log(
            LogEntry::info(format!(
                "Selected candidate {}/{}",
                position + 1,
                req.generated_urls.len()
            ))
            .with_details(json!({ "url": url })),
        );

        let selected = self
            .transition(
                project_id,
                id,
                RegenerationAction::Select,
                RegenerationAction::Select.allowed_from(),
                RequestStatus::AwaitingFinal,
                update,
            )
            .await?;

        if req.status == RequestStatus::Generating {
            tracing::info!(
                request_id = id,
                "Candidate selected while an attempt is in flight; its result will be discarded",
            );
        }
        tracing::info!(request_id = id, project_id, user_id = actor_id, "Candidate selected");

        let approvers = self.approvers(project_id).await;
        self.notify(notify::selected(&selected, approvers)).await;
        Ok(selected)
    }

    /// Apply the selected candidate to the scene and delete the others.
    ///
    /// The scene write and the status change commit together; cleanup runs
    /// afterwards and never blocks completion.
    pub async fn final_approve(
        &self,
        project_id: DbId,
        id: DbId,
        actor_id: DbId,
        note: Option<String>,
    ) -> Result<RegenerationRequest, CoreError> {
        self.require_approver(project_id, actor_id).await?;
        validate_note(note.as_deref())?;
        let req = self.load(project_id, id).await?;
        check_transition(RegenerationAction::FinalApprove, req.status)?;

        let selected_url = req.selected_url.clone().ok_or_else(|| {
            CoreError::Internal(format!("Request {id} is awaiting final approval without a selection"))
        })?;

        let update = RequestUpdate {
            final_review: Some(ReviewStamp::now(actor_id, note)),
            ..Default::default()
        }
        .log(
            LogEntry::success(format!(
                "Final approval by user {actor_id}; applied to scene {} {}",
                req.target_id, req.target_type
            ))
            .with_details(json!({ "url": selected_url })),
        );

        match self.deps.store.finalize(id, update).await? {
            FinalizeOutcome::Completed(done) => {
                let logs =
                    delete_candidates(self.deps.storage.as_ref(), id, &done.unselected_urls()).await;
                let done = self.append_logs(done, logs).await;
                tracing::info!(
                    request_id = id,
                    project_id,
                    user_id = actor_id,
                    scene_id = done.target_id,
                    "Regeneration completed",
                );
                self.notify(notify::completed(&done, actor_id)).await;
                Ok(done)
            }
            FinalizeOutcome::StatusChanged => {
                Err(self.lost_race(project_id, id, RegenerationAction::FinalApprove).await)
            }
            FinalizeOutcome::SceneMissing => {
                self.fail_missing_scene(&req, actor_id, RequestStatus::AwaitingFinal)
                    .await;
                Err(CoreError::NotFound {
                    entity: "Scene",
                    id: req.target_id,
                })
            }
        }
    }

    /// Decline the selected candidate. The scene is left untouched and all
    /// candidates are deleted.
    pub async fn final_reject(
        &self,
        project_id: DbId,
        id: DbId,
        actor_id: DbId,
        note: Option<String>,
    ) -> Result<RegenerationRequest, CoreError> {
        self.require_approver(project_id, actor_id).await?;
        validate_note(note.as_deref())?;
        let req = self.load(project_id, id).await?;
        check_transition(RegenerationAction::FinalReject, req.status)?;

        let update = RequestUpdate {
            final_review: Some(ReviewStamp::now(actor_id, note)),
            ..Default::default()
        }
        .log(LogEntry::info(format!(
            "Final approval declined by user {actor_id}; scene unchanged"
        )));

        let rejected = self
            .transition(
                project_id,
                id,
                RegenerationAction::FinalReject,
                &[RequestStatus::AwaitingFinal],
                RequestStatus::Rejected,
                update,
            )
            .await?;

        let logs = delete_candidates(self.deps.storage.as_ref(), id, &rejected.generated_urls).await;
        let rejected = self.append_logs(rejected, logs).await;

        tracing::info!(request_id = id, project_id, user_id = actor_id, "Final approval declined");
        self.notify(notify::final_rejected(&rejected, actor_id)).await;
        Ok(rejected)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// A project's requests, newest first.
    pub async fn list(
        &self,
        project_id: DbId,
        actor_id: DbId,
        status: Option<RequestStatus>,
    ) -> Result<Vec<RegenerationRequest>, CoreError> {
        self.require_viewer(project_id, actor_id).await?;
        self.deps.store.list(project_id, status).await
    }

    /// One request with display identities and the current scene.
    pub async fn get(
        &self,
        project_id: DbId,
        id: DbId,
        actor_id: DbId,
    ) -> Result<RegenerationDetail, CoreError> {
        self.require_viewer(project_id, actor_id).await?;
        let req = self.load(project_id, id).await?;

        let mut user_ids = vec![req.requester_id];
        user_ids.extend(req.reviewed_by);
        user_ids.extend(req.final_review_by);
        user_ids.sort_unstable();
        user_ids.dedup();
        let users = self.deps.catalog.user_summaries(&user_ids).await?;
        let user = |id: Option<DbId>| id.and_then(|id| users.iter().find(|u| u.id == id).cloned());

        let scene = self.deps.catalog.scene(project_id, req.target_id).await?;

        Ok(RegenerationDetail {
            attempts_remaining: req.attempts_remaining(),
            requester: user(Some(req.requester_id)),
            reviewer: user(req.reviewed_by),
            final_reviewer: user(req.final_review_by),
            scene,
            request: req,
        })
    }

    /// Price an approval without charging anything.
    pub async fn approval_quote(
        &self,
        project_id: DbId,
        id: DbId,
        actor_id: DbId,
        max_attempts: Option<i32>,
    ) -> Result<ApprovalQuote, CoreError> {
        self.require_approver(project_id, actor_id).await?;
        let max_attempts = max_attempts.unwrap_or(self.config.default_max_attempts);
        validate_max_attempts(max_attempts)?;
        let req = self.load(project_id, id).await?;
        check_transition(RegenerationAction::Approve, req.status)?;

        let settings = self.settings(project_id).await?;
        let resolution = resolution_for(&settings, req.target_type);
        let total_cost = approval_cost(req.target_type, resolution, max_attempts);
        let balance = self.deps.ledger.check_balance(actor_id).await?;

        Ok(ApprovalQuote {
            max_attempts,
            resolution: resolution.name(),
            credits_per_attempt: credits_per_attempt(req.target_type, resolution),
            total_cost,
            balance,
            sufficient: balance >= total_cost,
        })
    }

    // -----------------------------------------------------------------------
    // Shared helpers
    // -----------------------------------------------------------------------

    async fn role(&self, project_id: DbId, user_id: DbId) -> Result<ProjectRole, CoreError> {
        self.deps
            .capabilities
            .role_of(project_id, user_id)
            .await?
            .ok_or_else(|| CoreError::Forbidden("You are not a member of this project".into()))
    }

    pub(crate) async fn require_viewer(&self, project_id: DbId, user_id: DbId) -> Result<(), CoreError> {
        if self.role(project_id, user_id).await?.can_view() {
            Ok(())
        } else {
            Err(CoreError::Forbidden("You cannot view this project".into()))
        }
    }

    async fn require_approver(&self, project_id: DbId, user_id: DbId) -> Result<(), CoreError> {
        if self.role(project_id, user_id).await?.can_approve_requests() {
            Ok(())
        } else {
            Err(CoreError::Forbidden(
                "Only project owners and admins can review regeneration requests".into(),
            ))
        }
    }

    /// Load a request, treating one from another project as missing.
    pub(crate) async fn load(&self, project_id: DbId, id: DbId) -> Result<RegenerationRequest, CoreError> {
        match self.deps.store.find(id).await? {
            Some(req) if req.project_id == project_id => Ok(req),
            _ => Err(CoreError::NotFound { entity: ENTITY, id }),
        }
    }

    pub(crate) async fn settings(&self, project_id: DbId) -> Result<ProjectSettings, CoreError> {
        self.deps
            .catalog
            .project_settings(project_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Project",
                id: project_id,
            })
    }

    /// Compare-and-swap that explains a lost race as the current status.
    pub(crate) async fn transition(
        &self,
        project_id: DbId,
        id: DbId,
        action: RegenerationAction,
        from: &[RequestStatus],
        to: RequestStatus,
        update: RequestUpdate,
    ) -> Result<RegenerationRequest, CoreError> {
        match self.deps.store.transition(id, from, to, update).await? {
            Some(req) => Ok(req),
            None => Err(self.lost_race(project_id, id, action).await),
        }
    }

    pub(crate) async fn lost_race(
        &self,
        project_id: DbId,
        id: DbId,
        action: RegenerationAction,
    ) -> CoreError {
        match self.load(project_id, id).await {
            Ok(current) => CoreError::invalid_transition(action.name(), current.status),
            Err(e) => e,
        }
    }

    /// Persist extra log entries and mirror them on the returned value.
    pub(crate) async fn append_logs(
        &self,
        mut req: RegenerationRequest,
        logs: Vec<LogEntry>,
    ) -> RegenerationRequest {
        if logs.is_empty() {
            return req;
        }
        match self.deps.store.append_logs(req.id, logs.clone()).await {
            Ok(()) => req.logs.extend(logs),
            Err(e) => tracing::error!(request_id = req.id, error = %e, "Failed to append request logs"),
        }
        req
    }

    /// Mark a request `failed` because its target scene is gone, and delete
    /// every candidate it produced.
    pub(crate) async fn fail_missing_scene(
        &self,
        req: &RegenerationRequest,
        actor_id: DbId,
        from: RequestStatus,
    ) {
        let message = format!("Target scene {} no longer exists", req.target_id);
        let update = RequestUpdate {
            error_message: Some(Some(message.clone())),
            ..Default::default()
        }
        .log(LogEntry::error(message));

        match self
            .deps
            .store
            .transition(req.id, &[from], RequestStatus::Failed, update)
            .await
        {
            Ok(Some(failed)) => {
                tracing::warn!(
                    request_id = req.id,
                    scene_id = req.target_id,
                    "Regeneration failed: target scene missing",
                );
                let logs =
                    delete_candidates(self.deps.storage.as_ref(), req.id, &failed.generated_urls).await;
                let failed = self.append_logs(failed, logs).await;
                self.notify(notify::failed(&failed, actor_id)).await;
            }
            Ok(None) => {
                tracing::info!(request_id = req.id, "Request moved on before it could be marked failed");
            }
            Err(e) => {
                tracing::error!(request_id = req.id, error = %e, "Failed to mark request failed");
            }
        }
    }

    async fn refund_approval(&self, id: DbId, actor_id: DbId, amount: i64) {
        let result = self
            .deps
            .ledger
            .refund_credits(
                actor_id,
                amount,
                &format!("Regeneration #{id}: approval superseded"),
                &approval_refund_key(id),
            )
            .await;
        match result {
            Ok(()) => tracing::info!(request_id = id, user_id = actor_id, amount, "Refunded approval charge"),
            Err(e) => tracing::error!(
                request_id = id,
                user_id = actor_id,
                amount,
                error = %e,
                "Failed to refund approval charge",
            ),
        }
    }

    async fn approvers(&self, project_id: DbId) -> Vec<DbId> {
        match self.deps.capabilities.approvers(project_id).await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!(project_id, error = %e, "Failed to resolve approvers");
                Vec::new()
            }
        }
    }

    pub(crate) async fn notify(&self, notification: Notification) {
        let event_type = notification.event_type;
        let request_id = notification.request_id;
        if notification.recipient_ids.is_empty() {
            tracing::debug!(request_id, event_type, "Notification has no recipients");
            return;
        }
        if let Err(e) = self.deps.notifier.deliver(notification).await {
            tracing::warn!(request_id, event_type, error = %e, "Failed to deliver notification");
        }
    }
}

pub(crate) fn require_requester(
    req: &RegenerationRequest,
    actor_id: DbId,
    what: &str,
) -> Result<(), CoreError> {
    if req.requester_id == actor_id {
        Ok(())
    } else {
        Err(CoreError::Forbidden(format!(
            "Only the requester can {what}"
        )))
    }
}
