//! Persistence seams for requests and the production data they point at.

use async_trait::async_trait;
use filmgen_core::error::CoreError;
use filmgen_core::regeneration::{LogEntry, RequestStatus};
use filmgen_core::types::{DbId, Timestamp};
use filmgen_db::models::project::{Character, ProjectSettings};
use filmgen_db::models::regeneration::{CreateRegenerationRequest, FinalizeOutcome, RequestUpdate};
use filmgen_db::models::scene::Scene;
use filmgen_db::models::user::UserSummary;

use crate::request::RegenerationRequest;

/// Storage of regeneration requests.
///
/// [`transition`](RegenerationStore::transition) is the only way to change a
/// request's status: it succeeds only if the stored status is one of `from`,
/// `generating_since` matches `update.claim` when one is given, and the
/// update keeps `attempts_used <= max_attempts`.
#[async_trait]
pub trait RegenerationStore: Send + Sync {
    /// Fails with [`CoreError::Conflict`] if the target already has an
    /// active request.
    async fn insert(&self, input: &CreateRegenerationRequest) -> Result<RegenerationRequest, CoreError>;

    async fn find(&self, id: DbId) -> Result<Option<RegenerationRequest>, CoreError>;

    /// Newest first.
    async fn list(
        &self,
        project_id: DbId,
        status: Option<RequestStatus>,
    ) -> Result<Vec<RegenerationRequest>, CoreError>;

    /// Delete the request if it is still `pending`.
    async fn delete_pending(&self, id: DbId) -> Result<bool, CoreError>;

    async fn transition(
        &self,
        id: DbId,
        from: &[RequestStatus],
        to: RequestStatus,
        update: RequestUpdate,
    ) -> Result<Option<RegenerationRequest>, CoreError>;

    async fn append_logs(&self, id: DbId, logs: Vec<LogEntry>) -> Result<(), CoreError>;

    /// Move `awaiting_final -> completed` and write the selected URL into the
    /// target scene as one atomic change.
    async fn finalize(
        &self,
        id: DbId,
        update: RequestUpdate,
    ) -> Result<FinalizeOutcome<RegenerationRequest>, CoreError>;

    /// Requests that entered `generating` before `cutoff`, with the instant
    /// they entered it.
    async fn list_stale_generating(
        &self,
        cutoff: Timestamp,
    ) -> Result<Vec<(DbId, Timestamp)>, CoreError>;
}

/// Read access to projects, scenes, characters, and users.
#[async_trait]
pub trait ProductionCatalog: Send + Sync {
    async fn scene(&self, project_id: DbId, scene_id: DbId) -> Result<Option<Scene>, CoreError>;

    async fn project_settings(&self, project_id: DbId) -> Result<Option<ProjectSettings>, CoreError>;

    async fn characters(&self, ids: &[DbId]) -> Result<Vec<Character>, CoreError>;

    async fn user_summaries(&self, ids: &[DbId]) -> Result<Vec<UserSummary>, CoreError>;
}
