//! RetentionManager - Bounded remote retention window
//!
//! ## Responsibilities
//!
//! - List every remote object with its creation time
//! - Keep the newest N (default 20), delete the rest
//! - Deletion is best-effort per object: failures are logged and collected,
//!   the retained set is still returned
//!
//! Dedup markers are not touched; a pruned photo stays marked as synced.

use crate::error::{Error, Result};
use crate::remote_store::{RemoteObject, RemoteStore};
use serde::Serialize;
use std::sync::Arc;

/// Default number of most recent objects kept
pub const DEFAULT_RETENTION_COUNT: usize = 20;

/// Deletion failure for one excess object
#[derive(Debug, Clone, Serialize)]
pub struct DeleteFailure {
    pub key: String,
    pub error: String,
}

/// Outcome of one retention pass
#[derive(Debug, Clone, Serialize)]
pub struct RetentionReport {
    /// Retained objects, newest first
    pub retained: Vec<RemoteObject>,
    /// Keys that were deleted
    pub deleted: Vec<String>,
    /// Excess objects whose deletion failed
    pub failed: Vec<DeleteFailure>,
}

impl RetentionReport {
    /// URLs of the retained objects, newest first
    pub fn retained_urls(&self) -> Vec<String> {
        self.retained.iter().map(|o| o.url.clone()).collect()
    }
}

/// RetentionManager instance
pub struct RetentionManager {
    store: Arc<dyn RemoteStore>,
    retain: usize,
}

impl RetentionManager {
    pub fn new(store: Arc<dyn RemoteStore>, retain: usize) -> Self {
        Self { store, retain }
    }

    pub fn retain_count(&self) -> usize {
        self.retain
    }

    /// Run one retention pass
    ///
    /// Only a listing failure is returned as `Err`.
    pub async fn enforce(&self) -> Result<RetentionReport> {
        let objects = self.store.list().await?;
        let total = objects.len();

        let (retained, excess) = partition_newest(objects, self.retain);

        let mut deleted = Vec::with_capacity(excess.len());
        let mut failed = Vec::new();

        for obj in excess {
            match self.store.delete(&obj.key).await {
                Ok(()) => {
                    tracing::info!(key = %obj.key, created_at = %obj.created_at, "Deleted old image");
                    deleted.push(obj.key);
                }
                Err(e) => {
                    let err = Error::RetentionDelete {
                        key: obj.key.clone(),
                        message: e.to_string(),
                    };
                    tracing::warn!(key = %obj.key, error = %err, "Retention delete failed, continuing");
                    failed.push(DeleteFailure {
                        key: obj.key,
                        error: err.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            total = total,
            retained = retained.len(),
            deleted = deleted.len(),
            failed = failed.len(),
            retain_count = self.retain,
            "Retention pass completed"
        );

        Ok(RetentionReport {
            retained,
            deleted,
            failed,
        })
    }
}

/// Sort newest first and split into (first `retain`, remainder)
///
/// The sort is stable, so equal timestamps keep listing order.
fn partition_newest(
    mut objects: Vec<RemoteObject>,
    retain: usize,
) -> (Vec<RemoteObject>, Vec<RemoteObject>) {
    objects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let excess = objects.split_off(retain.min(objects.len()));
    (objects, excess)
}
