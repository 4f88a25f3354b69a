//! GR Uploader
//!
//! Main entry point: sync worker, periodic scheduler and REST API.

use gr_uploader::{
    camera_client::CameraClient,
    dedup_store::SqliteDedupStore,
    remote_store::{LocalObjectStore, MemoryRemoteStore, RemoteStore},
    state::{AppConfig, AppState},
    sync_orchestrator::{SnapshotKind, SyncOrchestrator, SyncTrigger, SyncWorker},
    web_api,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Upper bound on waiting for the in-flight file at shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(120);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gr_uploader=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting GR Uploader v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::default();
    tracing::info!(
        camera_url = %config.camera_url,
        dedup_database_url = %config.dedup_database_url,
        object_dir = ?config.object_dir,
        public_base_url = %config.public_base_url,
        retention_count = config.retention_count,
        sync_interval_secs = config.sync_interval.as_secs(),
        failure_policy = ?config.failure_policy,
        prune_after_cycle = config.prune_after_cycle,
        "Configuration loaded"
    );

    let camera = Arc::new(CameraClient::new(config.camera_config())?);

    let dedup = Arc::new(SqliteDedupStore::connect(&config.dedup_database_url).await?);
    tracing::info!(synced = dedup.count().await?, "Dedup store opened");

    let remote: Arc<dyn RemoteStore> = match &config.object_dir {
        Some(dir) => {
            let store = LocalObjectStore::new(dir.clone(), config.public_base_url.clone()).await?;
            tracing::info!(object_dir = %dir.display(), "LocalObjectStore initialized");
            Arc::new(store)
        }
        None => {
            tracing::warn!("OBJECT_DIR not set, uploads are kept in memory only");
            Arc::new(MemoryRemoteStore::new(config.public_base_url.clone()))
        }
    };

    let orchestrator = Arc::new(
        SyncOrchestrator::new(camera, remote, dedup.clone(), config.retention_count)
            .with_failure_policy(config.failure_policy),
    );

    let (sync, worker) =
        SyncWorker::spawn(orchestrator.clone(), config.command_queue, config.prune_after_cycle);

    // Startup cycle, then optional snapshot
    if let Err(e) = sync.trigger_cycle(SyncTrigger::Startup) {
        tracing::error!(error = %e, "Failed to queue startup sync");
    }
    if config.startup_snapshot {
        if let Err(e) = sync.trigger_snapshot(SnapshotKind::Startup) {
            tracing::error!(error = %e, "Failed to queue startup snapshot");
        }
    }

    // Periodic sync
    let periodic = sync.clone();
    let interval = config.sync_interval;
    let scheduler = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // first tick completes immediately; startup cycle is already queued
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = periodic.trigger_cycle(SyncTrigger::Periodic) {
                tracing::warn!(error = %e, "Periodic sync not queued");
            }
        }
    });
    tracing::info!(interval_secs = interval.as_secs(), "Periodic sync scheduled");

    let state = AppState {
        config: config.clone(),
        orchestrator,
        sync: sync.clone(),
        dedup: Some(dedup),
    };

    let mut app = web_api::create_router(state);
    if let Some(dir) = &config.object_dir {
        app = app.nest_service("/objects", ServeDir::new(dir));
    }
    let app = app
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    let server_sync = sync.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown requested");
            server_sync.shutdown();
        })
        .await?;

    // Let the worker finish the file in flight before the runtime goes away
    scheduler.abort();
    sync.shutdown();
    match tokio::time::timeout(SHUTDOWN_GRACE, worker).await {
        Ok(Ok(())) => tracing::info!("Sync worker drained"),
        Ok(Err(e)) => tracing::error!(error = %e, "Sync worker task failed"),
        Err(_) => tracing::warn!(
            grace_secs = SHUTDOWN_GRACE.as_secs(),
            "Sync worker did not stop in time"
        ),
    }

    Ok(())
}
