//! SQLite-backed DedupStore

use super::DedupStore;
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use tracing::debug;

/// SQLite DedupStore
pub struct SqliteDedupStore {
    pool: SqlitePool,
}

impl SqliteDedupStore {
    /// Connect and create the `sync_records` table if needed
    ///
    /// `sqlite::memory:` is held on a single connection so every query sees
    /// the same database.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let in_memory = database_url.contains(":memory:");

        let mut pool_options = SqlitePoolOptions::new().max_connections(if in_memory { 1 } else { 4 });
        if in_memory {
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }
        let pool = pool_options.connect_with(options).await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sync_records (
                photo_key TEXT PRIMARY KEY NOT NULL,
                marker TEXT NOT NULL,
                synced_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::DedupStore(e.to_string()))?;

        Ok(())
    }

    /// Number of synced photos
    pub async fn count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM sync_records")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::DedupStore(e.to_string()))?;

        Ok(row.get::<i64, _>("cnt"))
    }
}

#[async_trait]
impl DedupStore for SqliteDedupStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT marker FROM sync_records WHERE photo_key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::DedupStore(e.to_string()))?;

        Ok(row.map(|r| r.get::<String, _>("marker")))
    }

    async fn set(&self, key: &str, marker: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sync_records (photo_key, marker, synced_at)
            VALUES (?, ?, ?)
            ON CONFLICT(photo_key) DO UPDATE SET
                marker = excluded.marker,
                synced_at = excluded.synced_at
            "#,
        )
        .bind(key)
        .bind(marker)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| Error::DedupStore(e.to_string()))?;

        debug!(photo_key = %key, marker = %marker, "Dedup marker written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup_store::SYNCED_MARKER;

    #[tokio::test]
    async fn test_sqlite_roundtrip() {
        let store = SqliteDedupStore::connect("sqlite::memory:").await.unwrap();

        assert_eq!(store.get("100RICOH/R001.JPG").await.unwrap(), None);
        store.mark_synced("100RICOH/R001.JPG").await.unwrap();
        assert_eq!(
            store.get("100RICOH/R001.JPG").await.unwrap().as_deref(),
            Some(SYNCED_MARKER)
        );
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sqlite_set_is_upsert() {
        let store = SqliteDedupStore::connect("sqlite::memory:").await.unwrap();

        store.set("100RICOH/R001.JPG", "pending").await.unwrap();
        store.set("100RICOH/R001.JPG", SYNCED_MARKER).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        assert!(store.is_synced("100RICOH/R001.JPG").await.unwrap());
    }

    #[tokio::test]
    async fn test_sqlite_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("dedup.db").display());

        {
            let store = SqliteDedupStore::connect(&url).await.unwrap();
            store.mark_synced("100RICOH/R002.JPG").await.unwrap();
        }

        let reopened = SqliteDedupStore::connect(&url).await.unwrap();
        assert!(reopened.is_synced("100RICOH/R002.JPG").await.unwrap());
    }
}
