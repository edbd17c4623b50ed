use std::sync::Arc;

use filmgen_regeneration::RegenerationEngine;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: filmgen_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Regeneration workflow, wired to its production collaborators.
    pub engine: Arc<RegenerationEngine>,
    /// Event bus the engine's notifications are published on.
    pub event_bus: Arc<filmgen_events::EventBus>,
}
