use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use filmgen_api::config::ServerConfig;
use filmgen_api::notifications::InboxSink;
use filmgen_api::router::build_app_router;
use filmgen_api::state::AppState;
use filmgen_cloud::{S3Storage, StorageConfig};
use filmgen_gateway::{GatewayConfig, HttpGateway};
use filmgen_regeneration::postgres::{PgCapabilities, PgCreditLedger, PgRegenerationStore};
use filmgen_regeneration::reaper::StaleAttemptReaper;
use filmgen_regeneration::{Collaborators, RegenerationConfig, RegenerationEngine};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    // LOG_FORMAT=json switches to one JSON object per line.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "filmgen_api=debug,filmgen_regeneration=debug,filmgen_gateway=debug,tower_http=debug"
            .into()
    });
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = filmgen_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    filmgen_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    filmgen_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- External services ---
    let gateway_config = GatewayConfig::from_env();
    let gateway = HttpGateway::new(&gateway_config).expect("Failed to build generation client");
    tracing::info!(base_url = %gateway_config.base_url, "Generation gateway configured");

    let storage = S3Storage::connect(&StorageConfig::from_env()).await;
    tracing::info!("Object storage client created");

    // --- Event bus ---
    let event_bus = Arc::new(filmgen_events::EventBus::default());

    // --- Regeneration engine ---
    let regeneration_config = RegenerationConfig::from_env();
    let longest_attempt = regeneration_config
        .poll_window()
        .max(gateway_config.request_timeout)
        .max(Duration::from_secs(config.attempt_timeout_secs));
    if regeneration_config.stale_after <= longest_attempt {
        tracing::warn!(
            stale_after_secs = regeneration_config.stale_after.as_secs(),
            longest_attempt_secs = longest_attempt.as_secs(),
            "STALE_ATTEMPT_SECS does not outlast a live attempt; slow attempts may be reverted and discarded",
        );
    }

    let store = Arc::new(PgRegenerationStore::new(pool.clone()));
    let engine = Arc::new(RegenerationEngine::new(
        Collaborators {
            store: store.clone(),
            catalog: store,
            capabilities: Arc::new(PgCapabilities::new(pool.clone())),
            ledger: Arc::new(PgCreditLedger::new(pool.clone())),
            gateway: Arc::new(gateway),
            storage: Arc::new(storage),
            notifier: Arc::new(InboxSink::new(pool.clone(), Arc::clone(&event_bus))),
        },
        regeneration_config,
    ));

    // Revert attempts abandoned by a crash or restart.
    let reaper_cancel = CancellationToken::new();
    let reaper = StaleAttemptReaper::new(Arc::clone(&engine));
    let reaper_cancel_clone = reaper_cancel.clone();
    let reaper_handle = tokio::spawn(async move {
        reaper.run(reaper_cancel_clone).await;
    });

    tracing::info!("Background services started (stale attempt reaper)");

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        engine,
        event_bus: Arc::clone(&event_bus),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    let grace = Duration::from_secs(config.shutdown_timeout_secs);

    reaper_cancel.cancel();
    let _ = tokio::time::timeout(grace, reaper_handle).await;
    tracing::info!("Stale attempt reaper stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
