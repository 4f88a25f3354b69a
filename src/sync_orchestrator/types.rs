//! Sync type definitions

use crate::camera_client::PhotoIdentity;
use crate::error::Error;
use crate::retention_manager::RetentionReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// What started a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTrigger {
    /// Process start
    Startup,
    /// Periodic background trigger
    Periodic,
    /// User-initiated refresh
    Manual,
}

/// Per-file failure handling inside a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the remaining files on the first per-file failure
    AbortCycle,
    /// Record the failure and continue with the next file
    #[default]
    SkipFile,
}

impl FromStr for FailurePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" | "abort_cycle" => Ok(Self::AbortCycle),
            "skip" | "skip_file" => Ok(Self::SkipFile),
            other => Err(Error::Config(format!("unknown failure policy: {}", other))),
        }
    }
}

/// Manual snapshot namespace (bypasses dedup)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotKind {
    /// Upload at process start
    Startup,
    /// User pressed "upload last image"
    Manual,
}

impl SnapshotKind {
    pub fn key_prefix(&self) -> &'static str {
        match self {
            SnapshotKind::Startup => "INIT_GET",
            SnapshotKind::Manual => "LAST_UPLOAD",
        }
    }
}

/// Photo uploaded during a cycle or snapshot
#[derive(Debug, Clone, Serialize)]
pub struct UploadedPhoto {
    pub identity: PhotoIdentity,
    /// Remote object key
    pub key: String,
    pub url: String,
}

/// Photo that failed inside a cycle
#[derive(Debug, Clone, Serialize)]
pub struct FileFailure {
    pub identity: PhotoIdentity,
    pub error: String,
}

/// Result of one sync cycle
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub cycle_id: Uuid,
    pub trigger: SyncTrigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Newly uploaded photos, in listing order
    pub uploaded: Vec<UploadedPhoto>,
    /// Photos skipped because they were already synced
    pub skipped: usize,
    pub failed: Vec<FileFailure>,
    /// Stopped early by the cancellation signal
    pub cancelled: bool,
    /// Stopped early by `FailurePolicy::AbortCycle`
    pub aborted: bool,
    /// Retention pass run after the cycle, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention: Option<RetentionReport>,
}

impl SyncReport {
    pub fn new(trigger: SyncTrigger) -> Self {
        Self {
            cycle_id: Uuid::new_v4(),
            trigger,
            started_at: Utc::now(),
            finished_at: None,
            uploaded: Vec::new(),
            skipped: 0,
            failed: Vec::new(),
            cancelled: false,
            aborted: false,
            retention: None,
        }
    }

    /// URLs uploaded in this cycle
    pub fn urls(&self) -> Vec<String> {
        self.uploaded.iter().map(|p| p.url.clone()).collect()
    }

    /// Every listed photo was either uploaded or already synced
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && !self.cancelled && !self.aborted
    }
}

/// Projection of one remote object for the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecentImage {
    pub name: String,
    pub url: String,
}
