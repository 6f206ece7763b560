//! Key-value entity storage.
//!
//! Records are JSON documents addressed by `(kind, id)`. Writes are upserts
//! and a batch is applied atomically.

use crate::domain::EntityId;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to encode {kind} {id}: {source}")]
    Encode {
        kind: &'static str,
        id: EntityId,
        source: serde_json::Error,
    },

    #[error("stored {kind} {id} is corrupt: {source}")]
    Decode {
        kind: &'static str,
        id: EntityId,
        source: serde_json::Error,
    },
}

/// One serialized entity, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub kind: &'static str,
    pub id: EntityId,
    pub data: String,
}

#[async_trait]
pub trait EntityStore: Send + Sync + fmt::Debug {
    async fn get(&self, kind: &str, id: &EntityId) -> Result<Option<String>, StoreError>;

    /// Every record of `kind` whose id starts with `prefix`, in id order.
    async fn scan_prefix(
        &self,
        kind: &str,
        prefix: &EntityId,
    ) -> Result<Vec<(EntityId, String)>, StoreError>;

    /// Upsert all records or none of them.
    async fn put_batch(&self, records: Vec<StoredRecord>) -> Result<(), StoreError>;
}

/// SQLite-backed store over the `entities` table.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteStore { pool }
    }

    /// Number of stored records of `kind`.
    pub async fn count(&self, kind: &str) -> Result<i64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) FROM entities WHERE kind = ?")
            .bind(kind)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get(0))
    }
}

#[async_trait]
impl EntityStore for SqliteStore {
    async fn get(&self, kind: &str, id: &EntityId) -> Result<Option<String>, StoreError> {
        let row = sqlx::query("SELECT data FROM entities WHERE kind = ? AND id = ?")
            .bind(kind)
            .bind(id.as_bytes())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<String, _>("data")))
    }

    async fn scan_prefix(
        &self,
        kind: &str,
        prefix: &EntityId,
    ) -> Result<Vec<(EntityId, String)>, StoreError> {
        let prefix = prefix.as_bytes();
        let rows = if prefix.is_empty() {
            sqlx::query("SELECT id, data FROM entities WHERE kind = ? ORDER BY id ASC")
                .bind(kind)
                .fetch_all(&self.pool)
                .await?
        } else {
            sqlx::query(
                r#"
                SELECT id, data FROM entities
                WHERE kind = ? AND substr(id, 1, ?) = ?
                ORDER BY id ASC
                "#,
            )
            .bind(kind)
            .bind(prefix.len() as i64)
            .bind(prefix)
            .fetch_all(&self.pool)
            .await?
        };

        Ok(rows
            .iter()
            .map(|row| {
                let id: Vec<u8> = row.get("id");
                let data: String = row.get("data");
                (EntityId::from_bytes(id), data)
            })
            .collect())
    }

    async fn put_batch(&self, records: Vec<StoredRecord>) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }

        let updated_at = chrono::Utc::now().timestamp_millis();
        let mut tx = self.pool.begin().await?;

        for record in &records {
            sqlx::query(
                r#"
                INSERT INTO entities (kind, id, data, updated_at)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(kind, id) DO UPDATE SET
                    data = excluded.data,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(record.kind)
            .bind(record.id.as_bytes())
            .bind(&record.data)
            .bind(updated_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

/// In-process store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<(String, EntityId), String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<(String, EntityId), String>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn get(&self, kind: &str, id: &EntityId) -> Result<Option<String>, StoreError> {
        Ok(self.lock().get(&(kind.to_string(), id.clone())).cloned())
    }

    async fn scan_prefix(
        &self,
        kind: &str,
        prefix: &EntityId,
    ) -> Result<Vec<(EntityId, String)>, StoreError> {
        let records = self.lock();
        Ok(records
            .range((kind.to_string(), prefix.clone())..)
            .take_while(|((k, id), _)| k == kind && id.starts_with(prefix))
            .map(|((_, id), data)| (id.clone(), data.clone()))
            .collect())
    }

    async fn put_batch(&self, records: Vec<StoredRecord>) -> Result<(), StoreError> {
        let mut stored = self.lock();
        for record in records {
            stored.insert((record.kind.to_string(), record.id), record.data);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use tempfile::TempDir;

    fn record(kind: &'static str, id: &[u8], data: &str) -> StoredRecord {
        StoredRecord {
            kind,
            id: EntityId::from_bytes(id.to_vec()),
            data: data.to_string(),
        }
    }

    async fn exercise(store: &dyn EntityStore) {
        store
            .put_batch(vec![
                record("position", &[1, 1], "a"),
                record("position", &[1, 2], "b"),
                record("position", &[2, 1], "c"),
                record("vault", &[1, 1], "v"),
            ])
            .await
            .unwrap();

        let id = EntityId::from_bytes(vec![1, 2]);
        assert_eq!(store.get("position", &id).await.unwrap().as_deref(), Some("b"));
        assert_eq!(store.get("vault", &id).await.unwrap(), None);

        let scanned = store
            .scan_prefix("position", &EntityId::from_bytes(vec![1]))
            .await
            .unwrap();
        let data: Vec<&str> = scanned.iter().map(|(_, d)| d.as_str()).collect();
        assert_eq!(data, vec!["a", "b"]);

        // upsert replaces in place
        store
            .put_batch(vec![record("position", &[1, 2], "b2")])
            .await
            .unwrap();
        assert_eq!(store.get("position", &id).await.unwrap().as_deref(), Some("b2"));
        let all = store
            .scan_prefix("position", &EntityId::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_memory_store_semantics() {
        let store = MemoryStore::new();
        exercise(&store).await;
        assert_eq!(store.len(), 4);
    }

    #[tokio::test]
    async fn test_sqlite_store_semantics() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store.db").to_string_lossy().to_string();
        let store = SqliteStore::new(init_db(&path).await.unwrap());
        exercise(&store).await;
        assert_eq!(store.count("position").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_sqlite_data_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store.db").to_string_lossy().to_string();
        {
            let store = SqliteStore::new(init_db(&path).await.unwrap());
            store
                .put_batch(vec![record("token", &[9], "{}")])
                .await
                .unwrap();
        }
        let store = SqliteStore::new(init_db(&path).await.unwrap());
        let id = EntityId::from_bytes(vec![9]);
        assert_eq!(store.get("token", &id).await.unwrap().as_deref(), Some("{}"));
    }
}
