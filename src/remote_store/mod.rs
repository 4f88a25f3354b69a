//! RemoteStore - Cloud object store adapter
//!
//! ## Responsibilities
//!
//! - put / list / download URL / delete on the photo bucket
//! - Hide the concrete store behind one trait so the orchestrator and
//!   retention manager never see transport details
//!
//! `put` on an existing key overwrites it; that is what makes a repeated
//! upload after a lost dedup marker harmless.

mod local;

pub use local::LocalObjectStore;

use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Object entry returned by `RemoteStore::list`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteObject {
    pub key: String,
    pub url: String,
    /// Store-side creation time (not the camera capture time)
    pub created_at: DateTime<Utc>,
}

/// Object store operations used by the sync engine
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Store bytes under `key` and return its public URL
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<String>;

    /// List every object with its creation time
    async fn list(&self) -> Result<Vec<RemoteObject>>;

    /// Public URL for an existing object
    async fn download_url(&self, key: &str) -> Result<String>;

    /// Delete one object
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Build `{base}/{seg}/{seg}` with every key segment percent-encoded
pub(crate) fn object_url(base_url: &str, key: &str) -> String {
    let encoded: Vec<String> = key
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();
    format!("{}/{}", base_url.trim_end_matches('/'), encoded.join("/"))
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    created_at: DateTime<Utc>,
}

/// In-memory RemoteStore
///
/// Used when no object directory is configured, and by tests.
pub struct MemoryRemoteStore {
    base_url: String,
    objects: RwLock<BTreeMap<String, StoredObject>>,
}

impl MemoryRemoteStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            objects: RwLock::new(BTreeMap::new()),
        }
    }

    /// Insert an object with an explicit creation time
    pub async fn insert_with_created_at(
        &self,
        key: &str,
        data: Vec<u8>,
        created_at: DateTime<Utc>,
    ) {
        self.objects
            .write()
            .await
            .insert(key.to_string(), StoredObject { data, created_at });
    }

    /// Stored bytes for a key
    pub async fn get_bytes(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.read().await.get(key).map(|o| o.data.clone())
    }

    pub async fn keys(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<String> {
        if key.is_empty() {
            return Err(Error::Upload {
                key: key.to_string(),
                message: "empty object key".to_string(),
            });
        }

        self.insert_with_created_at(key, data, Utc::now()).await;
        Ok(object_url(&self.base_url, key))
    }

    async fn list(&self) -> Result<Vec<RemoteObject>> {
        let objects = self.objects.read().await;
        Ok(objects
            .iter()
            .map(|(key, obj)| RemoteObject {
                key: key.clone(),
                url: object_url(&self.base_url, key),
                created_at: obj.created_at,
            })
            .collect())
    }

    async fn download_url(&self, key: &str) -> Result<String> {
        if !self.objects.read().await.contains_key(key) {
            return Err(Error::NotFound(format!("object {}", key)));
        }
        Ok(object_url(&self.base_url, key))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match self.objects.write().await.remove(key) {
            Some(_) => Ok(()),
            None => Err(Error::NotFound(format!("object {}", key))),
        }
    }
}
