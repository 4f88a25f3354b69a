//! LocalObjectStore - directory-backed bucket
//!
//! Objects live under `root/{key}`; the binary serves `root` over HTTP so
//! the returned URLs resolve. Writes go through a temp file + rename so a
//! listing never sees a half-written photo.

use super::{object_url, RemoteObject, RemoteStore};
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Suffix of in-flight writes, skipped by `list`
const PARTIAL_SUFFIX: &str = ".partial";

/// Directory-backed RemoteStore
pub struct LocalObjectStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalObjectStore {
    /// Create new LocalObjectStore, creating `root` if needed
    pub async fn new(root: PathBuf, public_base_url: impl Into<String>) -> Result<Self> {
        fs::create_dir_all(&root).await?;

        Ok(Self {
            root,
            public_base_url: public_base_url.into(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map an object key to a path under root, rejecting traversal
    fn resolve(&self, key: &str) -> Result<PathBuf> {
        let invalid = key.is_empty()
            || key.starts_with('/')
            || key.contains('\\')
            || key
                .split('/')
                .any(|seg| seg.is_empty() || seg == "." || seg == "..");

        if invalid {
            return Err(Error::RemoteStore(format!("invalid object key: {:?}", key)));
        }

        Ok(key.split('/').fold(self.root.clone(), |path, seg| path.join(seg)))
    }

    fn key_for(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let segments: Vec<&str> = rel.iter().map(|s| s.to_str()).collect::<Option<_>>()?;
        Some(segments.join("/"))
    }
}

#[async_trait]
impl RemoteStore for LocalObjectStore {
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<String> {
        let upload_err = |message: String| Error::Upload {
            key: key.to_string(),
            message,
        };

        let path = self.resolve(key).map_err(|e| upload_err(e.to_string()))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| upload_err(e.to_string()))?;
        }

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| upload_err("invalid file name".to_string()))?;
        let tmp = path.with_file_name(format!(
            ".{}.{}{}",
            file_name,
            uuid::Uuid::new_v4().simple(),
            PARTIAL_SUFFIX
        ));

        fs::write(&tmp, &data)
            .await
            .map_err(|e| upload_err(e.to_string()))?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(upload_err(e.to_string()));
        }

        tracing::debug!(
            key = %key,
            path = %path.display(),
            size = data.len(),
            "Object stored"
        );

        Ok(object_url(&self.public_base_url, key))
    }

    async fn list(&self) -> Result<Vec<RemoteObject>> {
        let mut objects = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir)
                .await
                .map_err(|e| Error::RemoteStore(format!("read_dir {}: {}", dir.display(), e)))?;

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| Error::RemoteStore(e.to_string()))?
            {
                let path = entry.path();
                let file_type = entry.file_type().await?;
                let name = entry.file_name();
                let Some(name) = name.to_str() else {
                    tracing::warn!(path = %path.display(), "Skipping non UTF-8 object path");
                    continue;
                };

                // dot entries (temp files, trash dirs) are not objects
                if name.starts_with('.') {
                    continue;
                }
                if file_type.is_dir() {
                    pending.push(path);
                    continue;
                }
                if !file_type.is_file() || name.ends_with(PARTIAL_SUFFIX) {
                    continue;
                }

                let Some(key) = self.key_for(&path) else {
                    tracing::warn!(path = %path.display(), "Skipping non UTF-8 object path");
                    continue;
                };

                let modified = entry.metadata().await?.modified()?;
                objects.push(RemoteObject {
                    url: object_url(&self.public_base_url, &key),
                    key,
                    created_at: DateTime::<Utc>::from(modified),
                });
            }
        }

        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    async fn download_url(&self, key: &str) -> Result<String> {
        let path = self.resolve(key)?;
        if !fs::try_exists(&path).await? {
            return Err(Error::NotFound(format!("object {}", key)));
        }
        Ok(object_url(&self.public_base_url, key))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("object {}", key)))
            }
            Err(e) => Err(Error::RemoteStore(format!("delete {}: {}", key, e))),
        }
    }
}
