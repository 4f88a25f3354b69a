//! SyncOrchestrator - Camera -> object store sync cycle
//!
//! ## Responsibilities
//!
//! - One sequential cycle: probe, list, skip synced, download, upload, mark
//! - Per-file continue/abort decision via `FailurePolicy`
//! - Manual "most recent photo" snapshot upload (separate key namespace)
//! - Read-only image listing and retention passes for the UI
//!
//! ## Delivery
//!
//! The dedup mark is written only after the upload returned, so a crash in
//! between re-uploads the same key next cycle (at-least-once, overwrite).

mod types;
mod worker;

pub use types::*;
pub use worker::{SyncCommand, SyncHandle, SyncStatus, SyncWorker};

use crate::camera_client::{CameraClient, PhotoDirectory, PhotoIdentity};
use crate::dedup_store::DedupStore;
use crate::error::{Error, Result};
use crate::remote_store::RemoteStore;
use crate::retention_manager::{RetentionManager, RetentionReport};
use chrono::Utc;
use rand::Rng;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Exclusive upper bound of the random snapshot key suffix
const SNAPSHOT_SUFFIX_RANGE: u32 = 1_000_000;

/// SyncOrchestrator instance
pub struct SyncOrchestrator {
    camera: Arc<CameraClient>,
    remote: Arc<dyn RemoteStore>,
    dedup: Arc<dyn DedupStore>,
    retention: RetentionManager,
    failure_policy: FailurePolicy,
}

impl SyncOrchestrator {
    /// Create new SyncOrchestrator
    pub fn new(
        camera: Arc<CameraClient>,
        remote: Arc<dyn RemoteStore>,
        dedup: Arc<dyn DedupStore>,
        retention_count: usize,
    ) -> Self {
        let retention = RetentionManager::new(remote.clone(), retention_count);
        Self {
            camera,
            remote,
            dedup,
            retention,
            failure_policy: FailurePolicy::default(),
        }
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    /// Size of the retention window
    pub fn retention_count(&self) -> usize {
        self.retention.retain_count()
    }

    /// Run one sync cycle
    ///
    /// Probe and listing failures abort the cycle with `Err` before any
    /// photo is touched. Per-file failures land in the report.
    pub async fn run_sync_cycle(
        &self,
        trigger: SyncTrigger,
        cancel: &CancellationToken,
    ) -> Result<SyncReport> {
        let mut report = SyncReport::new(trigger);

        tracing::info!(
            cycle_id = %report.cycle_id,
            trigger = ?trigger,
            camera_url = %self.camera.base_url(),
            "Sync cycle started"
        );

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let dirs = match self.fetch_listing().await {
            Ok(dirs) => dirs,
            Err(e) => {
                tracing::error!(cycle_id = %report.cycle_id, error = %e, "Sync cycle aborted");
                return Err(e);
            }
        };

        'dirs: for dir in &dirs {
            for file in &dir.files {
                if cancel.is_cancelled() {
                    tracing::warn!(cycle_id = %report.cycle_id, "Sync cycle cancelled");
                    report.cancelled = true;
                    break 'dirs;
                }

                let identity = PhotoIdentity::new(&dir.name, file);
                match self.sync_photo(&identity).await {
                    Ok(Some(uploaded)) => report.uploaded.push(uploaded),
                    Ok(None) => report.skipped += 1,
                    Err(e) => {
                        tracing::warn!(
                            cycle_id = %report.cycle_id,
                            identity = %identity,
                            error = %e,
                            policy = ?self.failure_policy,
                            "Photo sync failed"
                        );
                        report.failed.push(FileFailure {
                            identity,
                            error: e.to_string(),
                        });

                        if self.failure_policy == FailurePolicy::AbortCycle {
                            report.aborted = true;
                            break 'dirs;
                        }
                    }
                }
            }
        }

        report.finished_at = Some(Utc::now());

        tracing::info!(
            cycle_id = %report.cycle_id,
            uploaded = report.uploaded.len(),
            skipped = report.skipped,
            failed = report.failed.len(),
            cancelled = report.cancelled,
            aborted = report.aborted,
            "Sync cycle finished"
        );

        Ok(report)
    }

    /// Probe gate + listing
    async fn fetch_listing(&self) -> Result<Vec<PhotoDirectory>> {
        self.camera.wait_for_server().await?;
        self.camera.list_photos().await
    }

    /// Sync one photo; `Ok(None)` when already synced
    async fn sync_photo(&self, identity: &PhotoIdentity) -> Result<Option<UploadedPhoto>> {
        let key = identity.key();

        if self.dedup.is_synced(&key).await? {
            tracing::debug!(identity = %identity, "Already synced, skipping");
            return Ok(None);
        }

        let data = self
            .camera
            .download_photo(&identity.directory, &identity.file_name)
            .await?;
        let size = data.len();

        let url = self.upload(&key, data).await?;
        self.dedup.mark_synced(&key).await?;

        tracing::info!(identity = %identity, size = size, url = %url, "Photo synced");

        Ok(Some(UploadedPhoto {
            identity: identity.clone(),
            key,
            url,
        }))
    }

    async fn upload(&self, key: &str, data: Vec<u8>) -> Result<String> {
        self.remote.put(key, data).await.map_err(|e| match e {
            Error::Upload { .. } => e,
            other => Error::Upload {
                key: key.to_string(),
                message: other.to_string(),
            },
        })
    }

    /// Upload the last file of the first camera directory
    ///
    /// Always uses a fresh random key and never reads or writes dedup marks.
    pub async fn upload_most_recent_photo(&self, kind: SnapshotKind) -> Result<UploadedPhoto> {
        let dirs = self.fetch_listing().await?;

        let identity = dirs
            .first()
            .and_then(|dir| dir.files.last().map(|file| PhotoIdentity::new(&dir.name, file)))
            .ok_or_else(|| Error::NotFound("no photos on camera".to_string()))?;

        let data = self
            .camera
            .download_photo(&identity.directory, &identity.file_name)
            .await?;

        let suffix = rand::thread_rng().gen_range(0..SNAPSHOT_SUFFIX_RANGE);
        let key = format!("{}_{}", kind.key_prefix(), suffix);
        let url = self.upload(&key, data).await?;

        tracing::info!(identity = %identity, key = %key, kind = ?kind, "Snapshot uploaded");

        Ok(UploadedPhoto { identity, key, url })
    }

    /// Every remote object as `{name, url}`
    pub async fn list_recent_images(&self) -> Result<Vec<RecentImage>> {
        let objects = self.remote.list().await?;
        Ok(objects
            .into_iter()
            .map(|o| RecentImage {
                name: o.key,
                url: o.url,
            })
            .collect())
    }

    /// Public URL of one remote object
    pub async fn image_url(&self, key: &str) -> Result<String> {
        self.remote.download_url(key).await
    }

    /// Run one retention pass
    pub async fn enforce_retention(&self) -> Result<RetentionReport> {
        self.retention.enforce().await
    }
}
