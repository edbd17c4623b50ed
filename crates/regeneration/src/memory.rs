//! In-process implementations of the workflow's collaborators.
//!
//! [`InMemoryStore`] follows the same compare-and-swap and uniqueness rules
//! as the Postgres store; the other types record what was asked of them.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use filmgen_cloud::{StorageError, StorageProvider};
use filmgen_core::error::CoreError;
use filmgen_core::regeneration::{LogEntry, RequestStatus, TargetType};
use filmgen_core::roles::ProjectRole;
use filmgen_core::types::{DbId, Timestamp};
use filmgen_db::models::project::{Character, ProjectSettings};
use filmgen_db::models::regeneration::{CreateRegenerationRequest, FinalizeOutcome, RequestUpdate};
use filmgen_db::models::scene::Scene;
use filmgen_db::models::user::UserSummary;

use crate::collaborators::{
    CapabilityResolver, CreditLedger, LedgerError, Notification, NotificationSink, SpendReceipt,
};
use crate::request::RegenerationRequest;
use crate::store::{ProductionCatalog, RegenerationStore};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Inner {
    next_id: DbId,
    requests: HashMap<DbId, RegenerationRequest>,
    projects: HashMap<DbId, ProjectSettings>,
    scenes: HashMap<DbId, Scene>,
    characters: HashMap<DbId, Character>,
    users: HashMap<DbId, UserSummary>,
}

/// Requests plus the production data they reference, behind one lock.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn add_project(&self, settings: ProjectSettings) {
        lock(&self.inner).projects.insert(settings.id, settings);
    }

    pub fn add_scene(&self, scene: Scene) {
        lock(&self.inner).scenes.insert(scene.id, scene);
    }

    pub fn remove_scene(&self, scene_id: DbId) -> Option<Scene> {
        lock(&self.inner).scenes.remove(&scene_id)
    }

    pub fn add_character(&self, character: Character) {
        lock(&self.inner).characters.insert(character.id, character);
    }

    pub fn add_user(&self, id: DbId, display_name: &str) {
        lock(&self.inner).users.insert(
            id,
            UserSummary {
                id,
                display_name: display_name.to_string(),
            },
        );
    }

    pub fn scene_snapshot(&self, scene_id: DbId) -> Option<Scene> {
        lock(&self.inner).scenes.get(&scene_id).cloned()
    }

    pub fn request(&self, id: DbId) -> Option<RegenerationRequest> {
        lock(&self.inner).requests.get(&id).cloned()
    }

    /// Backdate when a request entered `generating`.
    pub fn set_generating_since(&self, id: DbId, since: Timestamp) {
        if let Some(req) = lock(&self.inner).requests.get_mut(&id) {
            req.generating_since = Some(since);
        }
    }
}

/// Apply a compare-and-swap to one request, mirroring the SQL update.
fn apply_transition(
    req: &mut RegenerationRequest,
    from: &[RequestStatus],
    to: RequestStatus,
    update: RequestUpdate,
) -> bool {
    if !from.contains(&req.status) {
        return false;
    }
    if update.claim.is_some() && update.claim != req.generating_since {
        return false;
    }
    let max_attempts = update.max_attempts.unwrap_or(req.max_attempts);
    if req.attempts_used + update.attempt_increment() > max_attempts {
        return false;
    }

    let now = chrono::Utc::now();
    req.status = to;
    req.max_attempts = max_attempts;
    if let Some(credits) = update.credits_paid {
        req.credits_paid = credits;
    }
    if let Some(url) = update.new_candidate {
        req.generated_urls.push(url);
        req.attempts_used += 1;
    }
    if let Some(url) = update.selected_url {
        req.selected_url = Some(url);
    }
    if let Some(stamp) = update.review {
        req.reviewed_by = Some(stamp.reviewer_id);
        req.reviewed_at = Some(stamp.at);
        req.review_note = stamp.note;
    }
    if let Some(stamp) = update.final_review {
        req.final_review_by = Some(stamp.reviewer_id);
        req.final_review_at = Some(stamp.at);
        req.final_review_note = stamp.note;
    }
    if let Some(message) = update.error_message {
        req.error_message = message;
    }
    req.generating_since = (to == RequestStatus::Generating).then_some(now);
    req.updated_at = now;
    req.logs.extend(update.logs);
    true
}

#[async_trait]
impl RegenerationStore for InMemoryStore {
    async fn insert(&self, input: &CreateRegenerationRequest) -> Result<RegenerationRequest, CoreError> {
        let mut inner = lock(&self.inner);

        let occupied = inner.requests.values().any(|r| {
            r.target_type == input.target_type
                && r.target_id == input.target_id
                && RequestStatus::ACTIVE.contains(&r.status)
        });
        if occupied {
            return Err(CoreError::Conflict(
                "An active regeneration request already exists for this target".into(),
            ));
        }

        inner.next_id += 1;
        let now = chrono::Utc::now();
        let req = RegenerationRequest {
            id: inner.next_id,
            project_id: input.project_id,
            requester_id: input.requester_id,
            target_type: input.target_type,
            target_id: input.target_id,
            target_name: input.target_name.trim().to_string(),
            status: RequestStatus::Pending,
            max_attempts: 0,
            attempts_used: 0,
            credits_paid: 0,
            generated_urls: Vec::new(),
            selected_url: None,
            reviewed_by: None,
            reviewed_at: None,
            review_note: None,
            final_review_by: None,
            final_review_at: None,
            final_review_note: None,
            error_message: None,
            logs: Vec::new(),
            generating_since: None,
            created_at: now,
            updated_at: now,
        };
        inner.requests.insert(req.id, req.clone());
        Ok(req)
    }

    async fn find(&self, id: DbId) -> Result<Option<RegenerationRequest>, CoreError> {
        Ok(self.request(id))
    }

    async fn list(
        &self,
        project_id: DbId,
        status: Option<RequestStatus>,
    ) -> Result<Vec<RegenerationRequest>, CoreError> {
        let inner = lock(&self.inner);
        let mut out: Vec<_> = inner
            .requests
            .values()
            .filter(|r| r.project_id == project_id)
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(out)
    }

    async fn delete_pending(&self, id: DbId) -> Result<bool, CoreError> {
        let mut inner = lock(&self.inner);
        match inner.requests.get(&id) {
            Some(r) if r.status == RequestStatus::Pending => {
                inner.requests.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn transition(
        &self,
        id: DbId,
        from: &[RequestStatus],
        to: RequestStatus,
        update: RequestUpdate,
    ) -> Result<Option<RegenerationRequest>, CoreError> {
        let mut inner = lock(&self.inner);
        let Some(req) = inner.requests.get_mut(&id) else {
            return Ok(None);
        };
        Ok(apply_transition(req, from, to, update).then(|| req.clone()))
    }

    async fn append_logs(&self, id: DbId, logs: Vec<LogEntry>) -> Result<(), CoreError> {
        if let Some(req) = lock(&self.inner).requests.get_mut(&id) {
            req.logs.extend(logs);
        }
        Ok(())
    }

    async fn finalize(
        &self,
        id: DbId,
        update: RequestUpdate,
    ) -> Result<FinalizeOutcome<RegenerationRequest>, CoreError> {
        let mut inner = lock(&self.inner);
        let Inner {
            requests, scenes, ..
        } = &mut *inner;

        let Some(req) = requests.get_mut(&id) else {
            return Ok(FinalizeOutcome::StatusChanged);
        };
        if req.status != RequestStatus::AwaitingFinal {
            return Ok(FinalizeOutcome::StatusChanged);
        }
        let Some(scene) = scenes
            .get_mut(&req.target_id)
            .filter(|s| s.project_id == req.project_id)
        else {
            return Ok(FinalizeOutcome::SceneMissing);
        };

        if !apply_transition(req, &[RequestStatus::AwaitingFinal], RequestStatus::Completed, update)
        {
            return Ok(FinalizeOutcome::StatusChanged);
        }
        let url = req.selected_url.clone();
        match req.target_type {
            TargetType::Image => scene.image_url = url,
            TargetType::Video => scene.video_url = url,
        }
        Ok(FinalizeOutcome::Completed(req.clone()))
    }

    async fn list_stale_generating(
        &self,
        cutoff: Timestamp,
    ) -> Result<Vec<(DbId, Timestamp)>, CoreError> {
        let inner = lock(&self.inner);
        let mut stale: Vec<_> = inner
            .requests
            .values()
            .filter(|r| r.status == RequestStatus::Generating)
            .filter_map(|r| r.generating_since.filter(|t| *t < cutoff).map(|t| (r.id, t)))
            .collect();
        stale.sort_unstable_by_key(|(_, since)| *since);
        Ok(stale)
    }
}

#[async_trait]
impl ProductionCatalog for InMemoryStore {
    async fn scene(&self, project_id: DbId, scene_id: DbId) -> Result<Option<Scene>, CoreError> {
        Ok(lock(&self.inner)
            .scenes
            .get(&scene_id)
            .filter(|s| s.project_id == project_id)
            .cloned())
    }

    async fn project_settings(&self, project_id: DbId) -> Result<Option<ProjectSettings>, CoreError> {
        Ok(lock(&self.inner).projects.get(&project_id).cloned())
    }

    async fn characters(&self, ids: &[DbId]) -> Result<Vec<Character>, CoreError> {
        let inner = lock(&self.inner);
        Ok(ids
            .iter()
            .filter_map(|id| inner.characters.get(id).cloned())
            .collect())
    }

    async fn user_summaries(&self, ids: &[DbId]) -> Result<Vec<UserSummary>, CoreError> {
        let inner = lock(&self.inner);
        Ok(ids
            .iter()
            .filter_map(|id| inner.users.get(id).cloned())
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// Fixed role table.
#[derive(Default)]
pub struct StaticCapabilities {
    roles: Mutex<HashMap<(DbId, DbId), ProjectRole>>,
}

impl StaticCapabilities {
    pub fn grant(&self, project_id: DbId, user_id: DbId, role: ProjectRole) {
        lock(&self.roles).insert((project_id, user_id), role);
    }
}

#[async_trait]
impl CapabilityResolver for StaticCapabilities {
    async fn role_of(&self, project_id: DbId, user_id: DbId) -> Result<Option<ProjectRole>, CoreError> {
        Ok(lock(&self.roles).get(&(project_id, user_id)).copied())
    }

    async fn approvers(&self, project_id: DbId) -> Result<Vec<DbId>, CoreError> {
        let mut ids: Vec<_> = lock(&self.roles)
            .iter()
            .filter(|((p, _), role)| *p == project_id && role.can_approve_requests())
            .map(|((_, u), _)| *u)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// One journaled ledger movement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub user_id: DbId,
    pub amount: i64,
    pub idempotency_key: String,
}

#[derive(Default)]
struct Accounts {
    balances: HashMap<DbId, i64>,
    journal: Vec<LedgerEntry>,
    receipts: HashMap<String, i64>,
}

/// Balances with an idempotent journal.
#[derive(Default)]
pub struct InMemoryLedger {
    accounts: Mutex<Accounts>,
    unavailable: AtomicBool,
}

impl InMemoryLedger {
    pub fn set_balance(&self, user_id: DbId, balance: i64) {
        lock(&self.accounts).balances.insert(user_id, balance);
    }

    pub fn balance_of(&self, user_id: DbId) -> i64 {
        lock(&self.accounts)
            .balances
            .get(&user_id)
            .copied()
            .unwrap_or(0)
    }

    /// Every applied debit and refund, in order. Replays are not recorded.
    pub fn journal(&self) -> Vec<LedgerEntry> {
        lock(&self.accounts).journal.clone()
    }

    /// Make every call fail with [`LedgerError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), LedgerError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(LedgerError::Unavailable("ledger offline".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CreditLedger for InMemoryLedger {
    async fn check_balance(&self, user_id: DbId) -> Result<i64, LedgerError> {
        self.check_available()?;
        Ok(self.balance_of(user_id))
    }

    async fn spend_credits(
        &self,
        user_id: DbId,
        amount: i64,
        _reason: &str,
        idempotency_key: &str,
    ) -> Result<SpendReceipt, LedgerError> {
        self.check_available()?;
        let mut accounts = lock(&self.accounts);
        if let Some(balance_after) = accounts.receipts.get(idempotency_key) {
            return Ok(SpendReceipt {
                balance_after: *balance_after,
                replayed: true,
            });
        }
        let balance = accounts.balances.get(&user_id).copied().unwrap_or(0);
        if balance < amount {
            return Err(LedgerError::Insufficient {
                required: amount,
                balance,
            });
        }
        let balance_after = balance - amount;
        accounts.balances.insert(user_id, balance_after);
        accounts
            .receipts
            .insert(idempotency_key.to_string(), balance_after);
        accounts.journal.push(LedgerEntry {
            user_id,
            amount: -amount,
            idempotency_key: idempotency_key.to_string(),
        });
        Ok(SpendReceipt {
            balance_after,
            replayed: false,
        })
    }

    async fn refund_credits(
        &self,
        user_id: DbId,
        amount: i64,
        _reason: &str,
        idempotency_key: &str,
    ) -> Result<(), LedgerError> {
        self.check_available()?;
        let mut accounts = lock(&self.accounts);
        if accounts.receipts.contains_key(idempotency_key) {
            return Ok(());
        }
        let balance_after = accounts.balances.get(&user_id).copied().unwrap_or(0) + amount;
        accounts.balances.insert(user_id, balance_after);
        accounts
            .receipts
            .insert(idempotency_key.to_string(), balance_after);
        accounts.journal.push(LedgerEntry {
            user_id,
            amount,
            idempotency_key: idempotency_key.to_string(),
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// Keeps every delivered notification.
#[derive(Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<Notification>>,
    failing: AtomicBool,
}

impl RecordingSink {
    pub fn delivered(&self) -> Vec<Notification> {
        lock(&self.delivered).clone()
    }

    pub fn event_types(&self) -> Vec<&'static str> {
        lock(&self.delivered).iter().map(|n| n.event_type).collect()
    }

    /// Make every delivery fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn deliver(&self, notification: Notification) -> Result<(), CoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CoreError::Internal("notification channel down".into()));
        }
        lock(&self.delivered).push(notification);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Records deletions; URLs registered with [`fail_on`](Self::fail_on) fail.
#[derive(Default)]
pub struct RecordingStorage {
    deleted: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingStorage {
    pub fn fail_on(&self, url: &str) {
        lock(&self.failing).insert(url.to_string());
    }

    pub fn deleted(&self) -> Vec<String> {
        lock(&self.deleted).clone()
    }
}

#[async_trait]
impl StorageProvider for RecordingStorage {
    async fn delete_by_url(&self, url: &str) -> Result<(), StorageError> {
        if lock(&self.failing).contains(url) {
            return Err(StorageError::Backend(format!("refused to delete {url}")));
        }
        lock(&self.deleted).push(url.to_string());
        Ok(())
    }
}
