//! GR Uploader Library
//!
//! Mirrors photos from a Wi-Fi camera into an object store.
//!
//! ## Architecture
//!
//! 1. CameraClient - Readiness probe, photo listing, photo download
//! 2. DedupStore - Persistent "already synced" markers
//! 3. RemoteStore - Object store (upload, list, URL, delete)
//! 4. RetentionManager - Keep the newest N remote objects
//! 5. SyncOrchestrator - Sync cycle and snapshot uploads
//! 6. SyncWorker - Single-consumer command queue around the orchestrator
//! 7. WebAPI - REST API for the viewer UI
//!
//! ## Design Principles
//!
//! - Camera is the source of truth; remote store is a bounded mirror
//! - At most one cycle runs at a time
//! - Dedup mark only after a confirmed upload

pub mod camera_client;
pub mod dedup_store;
pub mod error;
pub mod models;
pub mod remote_store;
pub mod retention_manager;
pub mod state;
pub mod sync_orchestrator;
pub mod web_api;

pub use error::{Error, Result};
pub use state::AppState;
