//! Shared fixtures for workflow tests: an engine wired to in-memory
//! collaborators and a scripted generation service.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use filmgen_core::regeneration::TargetType;
use filmgen_core::roles::ProjectRole;
use filmgen_core::types::DbId;
use filmgen_db::models::project::ProjectSettings;
use filmgen_db::models::scene::Scene;
use filmgen_gateway::{
    GatewayError, GenerationGateway, ImageRequest, JobStatus, PollPolicy, VideoRequest,
    VideoSubmission,
};
use filmgen_regeneration::memory::{
    InMemoryLedger, InMemoryStore, RecordingSink, RecordingStorage, StaticCapabilities,
};
use filmgen_regeneration::{
    ApproveInput, Collaborators, CreateRequestInput, CreditLedger, RegenerationConfig,
    RegenerationEngine, RegenerationRequest,
};
use tokio::sync::Notify;

pub const PROJECT: DbId = 1;
pub const SCENE: DbId = 10;

pub const OWNER: DbId = 100;
pub const ADMIN: DbId = 101;
pub const COLLABORATOR: DbId = 102;
pub const OTHER_COLLABORATOR: DbId = 103;
pub const READER: DbId = 104;
pub const OUTSIDER: DbId = 999;

pub const ORIGINAL_IMAGE: &str = "https://cdn.example.com/scenes/10/original.png";
pub const ORIGINAL_VIDEO: &str = "https://cdn.example.com/scenes/10/original.mp4";

pub const STARTING_BALANCE: i64 = 100;

// ---------------------------------------------------------------------------
// Scripted generation service
// ---------------------------------------------------------------------------

/// Answers from queued scripts, falling back to fresh CDN URLs.
#[derive(Default)]
pub struct ScriptedGateway {
    images: Mutex<VecDeque<Result<String, GatewayError>>>,
    submissions: Mutex<VecDeque<Result<VideoSubmission, GatewayError>>>,
    polls: Mutex<VecDeque<Result<JobStatus, GatewayError>>>,
    image_calls: AtomicUsize,
    video_calls: AtomicUsize,
    poll_calls: AtomicUsize,
    last_image_request: Mutex<Option<ImageRequest>>,
    gate: Mutex<Option<Gate>>,
}

/// Holds generation calls until released.
#[derive(Clone, Default)]
pub struct Gate {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl ScriptedGateway {
    pub fn push_image(&self, result: Result<String, GatewayError>) {
        self.images.lock().unwrap().push_back(result);
    }

    pub fn push_submission(&self, result: Result<VideoSubmission, GatewayError>) {
        self.submissions.lock().unwrap().push_back(result);
    }

    pub fn push_poll(&self, result: Result<JobStatus, GatewayError>) {
        self.polls.lock().unwrap().push_back(result);
    }

    pub fn image_calls(&self) -> usize {
        self.image_calls.load(Ordering::SeqCst)
    }

    pub fn video_calls(&self) -> usize {
        self.video_calls.load(Ordering::SeqCst)
    }

    pub fn poll_calls(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }

    pub fn last_image_request(&self) -> Option<ImageRequest> {
        self.last_image_request.lock().unwrap().clone()
    }

    /// Make the next generation calls wait for [`Gate::release`].
    pub fn hold(&self) -> Gate {
        let gate = Gate::default();
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    async fn pass_gate(&self) {
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
    }
}

#[async_trait]
impl GenerationGateway for ScriptedGateway {
    async fn generate_image(&self, request: &ImageRequest) -> Result<String, GatewayError> {
        let n = self.image_calls.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_image_request.lock().unwrap() = Some(request.clone());
        self.pass_gate().await;
        let scripted = self.images.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(format!("https://cdn.example.com/gen/image-{n}.png")))
    }

    async fn submit_video(&self, _request: &VideoRequest) -> Result<VideoSubmission, GatewayError> {
        let n = self.video_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.pass_gate().await;
        let scripted = self.submissions.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| {
            Ok(VideoSubmission::Ready(format!(
                "https://cdn.example.com/gen/video-{n}.mp4"
            )))
        })
    }

    async fn poll_video(&self, _job_id: &str) -> Result<JobStatus, GatewayError> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.polls.lock().unwrap().pop_front();
        scripted.unwrap_or(Ok(JobStatus::Processing))
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub engine: Arc<RegenerationEngine>,
    pub store: Arc<InMemoryStore>,
    pub capabilities: Arc<StaticCapabilities>,
    pub ledger: Arc<InMemoryLedger>,
    pub gateway: Arc<ScriptedGateway>,
    pub storage: Arc<RecordingStorage>,
    pub sink: Arc<RecordingSink>,
}

/// Fast polling so video tests finish quickly.
pub fn test_config() -> RegenerationConfig {
    RegenerationConfig {
        poll: PollPolicy {
            interval: Duration::from_millis(1),
            max_polls: 5,
        },
        ..RegenerationConfig::default()
    }
}

pub fn settings() -> ProjectSettings {
    ProjectSettings {
        id: PROJECT,
        owner_id: OWNER,
        aspect_ratio: "16:9".into(),
        image_resolution: "2k".into(),
        video_resolution: "hd".into(),
        style_prompt: Some("cinematic lighting".into()),
    }
}

pub fn scene() -> Scene {
    Scene {
        id: SCENE,
        project_id: PROJECT,
        title: "Harbor at dawn".into(),
        image_prompt: Some("a fishing harbor at dawn".into()),
        video_prompt: Some("boats drift slowly".into()),
        duration_secs: 5,
        image_url: Some(ORIGINAL_IMAGE.into()),
        video_url: Some(ORIGINAL_VIDEO.into()),
        character_ids: Vec::new(),
    }
}

pub fn harness() -> Harness {
    harness_with(test_config())
}

pub fn harness_with(config: RegenerationConfig) -> Harness {
    harness_with_ledger(config, |ledger, _| ledger as Arc<dyn CreditLedger>)
}

/// Like [`harness_with`], but the engine charges through whatever `wrap`
/// builds around the in-memory ledger and store.
pub fn harness_with_ledger(
    config: RegenerationConfig,
    wrap: impl FnOnce(Arc<InMemoryLedger>, Arc<InMemoryStore>) -> Arc<dyn CreditLedger>,
) -> Harness {
    let store = Arc::new(InMemoryStore::default());
    store.add_project(settings());
    store.add_scene(scene());
    for (id, name) in [
        (OWNER, "Olivia Owner"),
        (ADMIN, "Adrian Admin"),
        (COLLABORATOR, "Casey Collaborator"),
        (OTHER_COLLABORATOR, "Charlie Collaborator"),
        (READER, "Riley Reader"),
    ] {
        store.add_user(id, name);
    }

    let capabilities = Arc::new(StaticCapabilities::default());
    capabilities.grant(PROJECT, OWNER, ProjectRole::Owner);
    capabilities.grant(PROJECT, ADMIN, ProjectRole::Admin);
    capabilities.grant(PROJECT, COLLABORATOR, ProjectRole::Collaborator);
    capabilities.grant(PROJECT, OTHER_COLLABORATOR, ProjectRole::Collaborator);
    capabilities.grant(PROJECT, READER, ProjectRole::Reader);

    let ledger = Arc::new(InMemoryLedger::default());
    ledger.set_balance(OWNER, STARTING_BALANCE);
    ledger.set_balance(ADMIN, STARTING_BALANCE);

    let gateway = Arc::new(ScriptedGateway::default());
    let storage = Arc::new(RecordingStorage::default());
    let sink = Arc::new(RecordingSink::default());

    let engine = Arc::new(RegenerationEngine::new(
        Collaborators {
            store: store.clone(),
            catalog: store.clone(),
            capabilities: capabilities.clone(),
            ledger: wrap(ledger.clone(), store.clone()),
            gateway: gateway.clone(),
            storage: storage.clone(),
            notifier: sink.clone(),
        },
        config,
    ));

    Harness {
        engine,
        store,
        capabilities,
        ledger,
        gateway,
        storage,
        sink,
    }
}

impl Harness {
    /// A pending request from [`COLLABORATOR`].
    pub async fn create(&self, target_type: TargetType) -> RegenerationRequest {
        self.engine
            .create(
                PROJECT,
                COLLABORATOR,
                CreateRequestInput {
                    target_type,
                    target_id: SCENE,
                    target_name: "Harbor at dawn".into(),
                },
            )
            .await
            .unwrap()
    }

    /// A request approved by [`OWNER`] with the default budget.
    pub async fn approved(&self, target_type: TargetType) -> RegenerationRequest {
        let req = self.create(target_type).await;
        self.engine
            .approve(PROJECT, req.id, OWNER, ApproveInput::default())
            .await
            .unwrap()
    }

    /// Run one attempt as the requester.
    pub async fn attempt(
        &self,
        id: DbId,
    ) -> Result<filmgen_regeneration::AttemptOutcome, filmgen_core::error::CoreError> {
        self.engine.attempt(PROJECT, id, COLLABORATOR).await
    }
}
