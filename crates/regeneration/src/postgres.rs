//! Database-backed collaborators.
//!
//! Thin adapters from the workflow traits onto the `filmgen-db`
//! repositories. Requests are assembled from their row, candidate rows and
//! log rows with one query per child table, whatever the number of requests.

use std::collections::HashMap;

use async_trait::async_trait;
use filmgen_core::error::CoreError;
use filmgen_core::regeneration::{LogEntry, RequestStatus};
use filmgen_core::roles::ProjectRole;
use filmgen_core::types::{DbId, Timestamp};
use filmgen_db::is_unique_violation;
use filmgen_db::models::credit::{CreditEntry, LedgerOutcome};
use filmgen_db::models::project::{Character, ProjectSettings};
use filmgen_db::models::regeneration::{
    CreateRegenerationRequest, FinalizeOutcome, RegenerationRequestRow, RequestUpdate,
};
use filmgen_db::models::scene::Scene;
use filmgen_db::models::user::UserSummary;
use filmgen_db::repositories::{
    CharacterRepo, CreditRepo, ProjectMemberRepo, ProjectRepo, RegenerationRequestRepo,
    SceneRepo, UserRepo,
};
use sqlx::PgPool;

use crate::collaborators::{CapabilityResolver, CreditLedger, LedgerError, SpendReceipt};
use crate::request::RegenerationRequest;
use crate::store::{ProductionCatalog, RegenerationStore};

const ACTIVE_TARGET_CONSTRAINT: &str = "uq_regeneration_requests_active_target";

/// Map a database error, logging the ones callers cannot act on.
fn db_error(err: sqlx::Error) -> CoreError {
    if is_unique_violation(&err, ACTIVE_TARGET_CONSTRAINT) {
        return CoreError::Conflict(
            "An active regeneration request already exists for this target".into(),
        );
    }
    tracing::error!(error = %err, "Database error");
    CoreError::Internal(format!("Database error: {err}"))
}

// ---------------------------------------------------------------------------
// Requests and catalog
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgRegenerationStore {
    pool: PgPool,
}

impl PgRegenerationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn assemble_one(&self, row: RegenerationRequestRow) -> Result<RegenerationRequest, CoreError> {
        let mut requests = self.assemble(vec![row]).await?;
        requests
            .pop()
            .ok_or_else(|| CoreError::Internal("Request vanished while loading".into()))
    }

    /// Attach candidates and logs to rows, keeping the row order.
    async fn assemble(
        &self,
        rows: Vec<RegenerationRequestRow>,
    ) -> Result<Vec<RegenerationRequest>, CoreError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<DbId> = rows.iter().map(|r| r.id).collect();

        let mut urls: HashMap<DbId, Vec<String>> = HashMap::new();
        for candidate in RegenerationRequestRepo::candidates_for(&self.pool, &ids)
            .await
            .map_err(db_error)?
        {
            urls.entry(candidate.request_id).or_default().push(candidate.url);
        }

        let mut logs: HashMap<DbId, Vec<LogEntry>> = HashMap::new();
        for row in RegenerationRequestRepo::logs_for(&self.pool, &ids)
            .await
            .map_err(db_error)?
        {
            let request_id = row.request_id;
            logs.entry(request_id).or_default().push(LogEntry::try_from(row)?);
        }

        rows.into_iter()
            .map(|row| {
                let id = row.id;
                RegenerationRequest::from_parts(
                    row,
                    urls.remove(&id).unwrap_or_default(),
                    logs.remove(&id).unwrap_or_default(),
                )
            })
            .collect()
    }
}

#[async_trait]
impl RegenerationStore for PgRegenerationStore {
    async fn insert(&self, input: &CreateRegenerationRequest) -> Result<RegenerationRequest, CoreError> {
        let row = RegenerationRequestRepo::create(&self.pool, input)
            .await
            .map_err(db_error)?;
        self.assemble_one(row).await
    }

    async fn find(&self, id: DbId) -> Result<Option<RegenerationRequest>, CoreError> {
        match RegenerationRequestRepo::find_by_id(&self.pool, id)
            .await
            .map_err(db_error)?
        {
            Some(row) => Ok(Some(self.assemble_one(row).await?)),
            None => Ok(None),
        }
    }

    async fn list(
        &self,
        project_id: DbId,
        status: Option<RequestStatus>,
    ) -> Result<Vec<RegenerationRequest>, CoreError> {
        let rows = RegenerationRequestRepo::list_by_project(&self.pool, project_id, status)
            .await
            .map_err(db_error)?;
        self.assemble(rows).await
    }

    async fn delete_pending(&self, id: DbId) -> Result<bool, CoreError> {
        RegenerationRequestRepo::delete_pending(&self.pool, id)
            .await
            .map_err(db_error)
    }

    async fn transition(
        &self,
        id: DbId,
        from: &[RequestStatus],
        to: RequestStatus,
        update: RequestUpdate,
    ) -> Result<Option<RegenerationRequest>, CoreError> {
        match RegenerationRequestRepo::transition(&self.pool, id, from, to, &update)
            .await
            .map_err(db_error)?
        {
            Some(row) => Ok(Some(self.assemble_one(row).await?)),
            None => Ok(None),
        }
    }

    async fn append_logs(&self, id: DbId, logs: Vec<LogEntry>) -> Result<(), CoreError> {
        RegenerationRequestRepo::append_logs(&self.pool, id, &logs)
            .await
            .map_err(db_error)
    }

    async fn finalize(
        &self,
        id: DbId,
        update: RequestUpdate,
    ) -> Result<FinalizeOutcome<RegenerationRequest>, CoreError> {
        match RegenerationRequestRepo::complete_with_scene(&self.pool, id, &update)
            .await
            .map_err(db_error)?
        {
            FinalizeOutcome::Completed(row) => {
                Ok(FinalizeOutcome::Completed(self.assemble_one(row).await?))
            }
            FinalizeOutcome::StatusChanged => Ok(FinalizeOutcome::StatusChanged),
            FinalizeOutcome::SceneMissing => Ok(FinalizeOutcome::SceneMissing),
        }
    }

    async fn list_stale_generating(
        &self,
        cutoff: Timestamp,
    ) -> Result<Vec<(DbId, Timestamp)>, CoreError> {
        RegenerationRequestRepo::list_stale_generating(&self.pool, cutoff)
            .await
            .map_err(db_error)
    }
}

#[async_trait]
impl ProductionCatalog for PgRegenerationStore {
    async fn scene(&self, project_id: DbId, scene_id: DbId) -> Result<Option<Scene>, CoreError> {
        SceneRepo::find_in_project(&self.pool, project_id, scene_id)
            .await
            .map_err(db_error)
    }

    async fn project_settings(&self, project_id: DbId) -> Result<Option<ProjectSettings>, CoreError> {
        ProjectRepo::find_settings(&self.pool, project_id)
            .await
            .map_err(db_error)
    }

    async fn characters(&self, ids: &[DbId]) -> Result<Vec<Character>, CoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        CharacterRepo::find_by_ids(&self.pool, ids)
            .await
            .map_err(db_error)
    }

    async fn user_summaries(&self, ids: &[DbId]) -> Result<Vec<UserSummary>, CoreError> {
        UserRepo::summaries(&self.pool, ids).await.map_err(db_error)
    }
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgCapabilities {
    pool: PgPool,
}

impl PgCapabilities {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CapabilityResolver for PgCapabilities {
    async fn role_of(&self, project_id: DbId, user_id: DbId) -> Result<Option<ProjectRole>, CoreError> {
        let name = ProjectMemberRepo::role_of(&self.pool, project_id, user_id)
            .await
            .map_err(db_error)?;
        name.as_deref().map(ProjectRole::from_name).transpose()
    }

    async fn approvers(&self, project_id: DbId) -> Result<Vec<DbId>, CoreError> {
        ProjectMemberRepo::approvers(&self.pool, project_id)
            .await
            .map_err(db_error)
    }
}

// ---------------------------------------------------------------------------
// Credits
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgCreditLedger {
    pool: PgPool,
}

impl PgCreditLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn ledger_error(err: sqlx::Error) -> LedgerError {
    tracing::error!(error = %err, "Credit ledger error");
    LedgerError::Unavailable(format!("Credit ledger error: {err}"))
}

#[async_trait]
impl CreditLedger for PgCreditLedger {
    async fn check_balance(&self, user_id: DbId) -> Result<i64, LedgerError> {
        CreditRepo::balance(&self.pool, user_id)
            .await
            .map_err(ledger_error)
    }

    async fn spend_credits(
        &self,
        user_id: DbId,
        amount: i64,
        reason: &str,
        idempotency_key: &str,
    ) -> Result<SpendReceipt, LedgerError> {
        let entry = CreditEntry {
            user_id,
            amount,
            reason,
            idempotency_key,
        };
        match CreditRepo::spend(&self.pool, &entry)
            .await
            .map_err(ledger_error)?
        {
            LedgerOutcome::Applied { balance_after } => Ok(SpendReceipt {
                balance_after,
                replayed: false,
            }),
            LedgerOutcome::Replayed { balance_after } => Ok(SpendReceipt {
                balance_after,
                replayed: true,
            }),
            LedgerOutcome::Insufficient { balance } => Err(LedgerError::Insufficient {
                required: amount,
                balance,
            }),
        }
    }

    async fn refund_credits(
        &self,
        user_id: DbId,
        amount: i64,
        reason: &str,
        idempotency_key: &str,
    ) -> Result<(), LedgerError> {
        let entry = CreditEntry {
            user_id,
            amount,
            reason,
            idempotency_key,
        };
        CreditRepo::refund(&self.pool, &entry)
            .await
            .map_err(ledger_error)?;
        Ok(())
    }
}
