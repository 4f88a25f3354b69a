//! Application state
//!
//! Holds configuration and the shared sync components

use crate::camera_client::{CameraConfig, ProbePolicy};
use crate::dedup_store::SqliteDedupStore;
use crate::retention_manager::DEFAULT_RETENTION_COUNT;
use crate::sync_orchestrator::{FailurePolicy, SyncHandle, SyncOrchestrator};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Lower bound for the periodic sync interval
pub const MIN_SYNC_INTERVAL_SECS: u64 = 60;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Camera base URL
    pub camera_url: String,
    /// SQLite URL of the dedup store
    pub dedup_database_url: String,
    /// Directory of the local object store (memory store when unset)
    pub object_dir: Option<PathBuf>,
    /// Public base URL returned for stored objects
    pub public_base_url: String,
    /// Number of newest remote objects kept
    pub retention_count: usize,
    /// Periodic sync interval
    pub sync_interval: Duration,
    pub failure_policy: FailurePolicy,
    /// Run a retention pass after every cycle
    pub prune_after_cycle: bool,
    /// Upload the most recent photo once at start
    pub startup_snapshot: bool,
    /// Sync worker queue capacity
    pub command_queue: usize,
    /// Server port
    pub port: u16,
    /// Server host
    pub host: String,
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

impl Default for AppConfig {
    fn default() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env_parse("PORT").unwrap_or(8080);

        let failure_policy = match std::env::var("FAILURE_POLICY") {
            Ok(raw) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!(value = %raw, error = %e, "Invalid FAILURE_POLICY, using skip");
                FailurePolicy::default()
            }),
            Err(_) => FailurePolicy::default(),
        };

        Self {
            camera_url: std::env::var("CAMERA_URL")
                .unwrap_or_else(|_| CameraConfig::default().base_url),
            dedup_database_url: std::env::var("DEDUP_DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://gr-uploader.db".to_string()),
            object_dir: std::env::var("OBJECT_DIR").ok().map(PathBuf::from),
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| format!("http://{}:{}/objects", host, port)),
            retention_count: env_parse("RETENTION_COUNT").unwrap_or(DEFAULT_RETENTION_COUNT),
            sync_interval: Duration::from_secs(
                env_parse("SYNC_INTERVAL_SECS")
                    .unwrap_or(900)
                    .max(MIN_SYNC_INTERVAL_SECS),
            ),
            failure_policy,
            prune_after_cycle: env_parse("PRUNE_AFTER_CYCLE").unwrap_or(true),
            startup_snapshot: env_parse("STARTUP_SNAPSHOT").unwrap_or(false),
            command_queue: env_parse("COMMAND_QUEUE").unwrap_or(8),
            port,
            host,
        }
    }
}

impl AppConfig {
    /// Camera client settings derived from this config
    pub fn camera_config(&self) -> CameraConfig {
        CameraConfig {
            base_url: self.camera_url.clone(),
            probe: ProbePolicy::default(),
            ..CameraConfig::default()
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application config
    pub config: AppConfig,
    /// SyncOrchestrator (read-only calls from the API)
    pub orchestrator: Arc<SyncOrchestrator>,
    /// Handle to the single sync worker
    pub sync: SyncHandle,
    /// Persistent dedup store, when configured
    pub dedup: Option<Arc<SqliteDedupStore>>,
}
