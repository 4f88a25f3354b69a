//! DedupStore - Synced-photo markers
//!
//! ## Responsibilities
//!
//! - Remember which photo identities were already uploaded
//! - Opaque get/set interface; presence of a marker means "synced"
//!
//! Markers are written once per identity right after a successful upload and
//! never deleted here.

mod repository;

pub use repository::SqliteDedupStore;

use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Marker value written after a successful upload
pub const SYNCED_MARKER: &str = "synced";

/// Persistent identity -> marker mapping
#[async_trait]
pub trait DedupStore: Send + Sync {
    /// Get the marker for a key, if any
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Set the marker for a key
    async fn set(&self, key: &str, marker: &str) -> Result<()>;

    async fn is_synced(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    async fn mark_synced(&self, key: &str) -> Result<()> {
        self.set(key, SYNCED_MARKER).await
    }
}

/// In-memory DedupStore (tests, ephemeral runs)
#[derive(Default)]
pub struct MemoryDedupStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryDedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl DedupStore for MemoryDedupStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, marker: &str) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), marker.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_mark_and_get() {
        let store = MemoryDedupStore::new();
        assert!(!store.is_synced("100RICOH/R001.JPG").await.unwrap());

        store.mark_synced("100RICOH/R001.JPG").await.unwrap();

        assert!(store.is_synced("100RICOH/R001.JPG").await.unwrap());
        assert_eq!(
            store.get("100RICOH/R001.JPG").await.unwrap().as_deref(),
            Some(SYNCED_MARKER)
        );
        assert!(!store.is_synced("100RICOH/R002.JPG").await.unwrap());
        assert_eq!(store.len().await, 1);
    }
}
