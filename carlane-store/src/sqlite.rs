//! SQLite-backed identity store

use std::collections::BTreeSet;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::errors::{Result, StoreError};
use crate::{IdentityMapping, IdentityStore};

/// Synchronous database handle; all access goes through the async
/// wrapper below.
struct Database {
    conn: Connection,
}

impl Database {
    fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let mut db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let mut db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    fn initialize(&mut self) -> Result<()> {
        // Reruns depend on every acknowledged write surviving a crash,
        // so writes are flushed synchronously instead of batched.
        self.conn.pragma_update(None, "journal_mode", "WAL")?;
        self.conn.pragma_update(None, "synchronous", "FULL")?;
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS identity_map (
                external_id TEXT PRIMARY KEY,
                remote_id TEXT NOT NULL,
                last_known_price TEXT NOT NULL,
                fields_digest TEXT NOT NULL,
                last_synced_at TEXT NOT NULL
            );
            "#,
        )?;

        info!("Identity store initialized");
        Ok(())
    }

    fn lookup(&self, external_id: &str) -> Result<Option<IdentityMapping>> {
        let row = self
            .conn
            .query_row(
                r#"
                SELECT external_id, remote_id, last_known_price,
                       fields_digest, last_synced_at
                FROM identity_map
                WHERE external_id = ?1
                "#,
                params![external_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(external_id, remote_id, price, fields_digest, synced)| {
            let last_known_price =
                Decimal::from_str(&price).map_err(|e| StoreError::Corrupt {
                    external_id: external_id.clone(),
                    detail: format!("bad price '{price}': {e}"),
                })?;
            let last_synced_at = DateTime::parse_from_rfc3339(&synced)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| StoreError::Corrupt {
                    external_id: external_id.clone(),
                    detail: format!("bad timestamp '{synced}': {e}"),
                })?;
            Ok(IdentityMapping {
                external_id,
                remote_id,
                last_known_price,
                fields_digest,
                last_synced_at,
            })
        })
        .transpose()
    }

    fn upsert(&mut self, mapping: &IdentityMapping) -> Result<()> {
        self.conn
            .execute(
                r#"
                INSERT INTO identity_map
                    (external_id, remote_id, last_known_price,
                     fields_digest, last_synced_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(external_id) DO UPDATE SET
                    remote_id = excluded.remote_id,
                    last_known_price = excluded.last_known_price,
                    fields_digest = excluded.fields_digest,
                    last_synced_at = excluded.last_synced_at
                "#,
                params![
                    mapping.external_id,
                    mapping.remote_id,
                    mapping.last_known_price.to_string(),
                    mapping.fields_digest,
                    mapping.last_synced_at.to_rfc3339(),
                ],
            )
            .map_err(|source| StoreError::Write {
                external_id: mapping.external_id.clone(),
                source,
            })?;

        debug!("Recorded mapping for {}", mapping.external_id);
        Ok(())
    }

    fn remove(&mut self, external_id: &str) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM identity_map WHERE external_id = ?1",
                params![external_id],
            )
            .map_err(|source| StoreError::Write {
                external_id: external_id.to_string(),
                source,
            })?;

        debug!("Removed mapping for {}", external_id);
        Ok(())
    }

    fn known_external_ids(&self) -> Result<BTreeSet<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT external_id FROM identity_map ORDER BY external_id")?;
        let ids = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(ids.collect::<std::result::Result<BTreeSet<_>, _>>()?)
    }
}

/// Durable identity store shared across async tasks.
#[derive(Clone)]
pub struct SqliteStore {
    inner: Arc<Mutex<Database>>,
}

impl SqliteStore {
    /// Open or create the store at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Database::open(path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(db)),
        })
    }

    /// Create an in-memory store (for testing).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self {
            inner: Arc::new(Mutex::new(db)),
        })
    }
}

#[async_trait]
impl IdentityStore for SqliteStore {
    async fn lookup(&self, external_id: &str) -> Result<Option<IdentityMapping>> {
        let db = self.inner.lock().await;
        db.lookup(external_id)
    }

    async fn record(&self, mapping: IdentityMapping) -> Result<()> {
        let mut db = self.inner.lock().await;
        db.upsert(&mapping)
    }

    async fn remove(&self, external_id: &str) -> Result<()> {
        let mut db = self.inner.lock().await;
        db.remove(external_id)
    }

    async fn known_external_ids(&self) -> Result<BTreeSet<String>> {
        let db = self.inner.lock().await;
        db.known_external_ids()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn mapping(external_id: &str, remote_id: &str, price: Decimal) -> IdentityMapping {
        IdentityMapping {
            external_id: external_id.to_string(),
            remote_id: remote_id.to_string(),
            last_known_price: price,
            fields_digest: "digest-1".to_string(),
            last_synced_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn upsert_replaces_existing_mapping() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        store.record(mapping("VIN1", "R1", dec!(20000))).await.unwrap();
        store.record(mapping("VIN1", "R1", dec!(18000))).await.unwrap();

        let found = store.lookup("VIN1").await.unwrap().unwrap();
        assert_eq!(found.remote_id, "R1");
        assert_eq!(found.last_known_price, dec!(18000));

        let ids = store.known_external_ids().await.unwrap();
        assert_eq!(ids.len(), 1);
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        store.record(mapping("VIN1", "R1", dec!(20000))).await.unwrap();
        store.remove("VIN1").await.unwrap();
        store.remove("VIN1").await.unwrap();
        assert!(store.lookup("VIN1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn known_ids_are_sorted() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        for id in ["VIN3", "VIN1", "VIN2"] {
            store.record(mapping(id, "R", dec!(1))).await.unwrap();
        }
        let ids: Vec<_> = store.known_external_ids().await.unwrap().into_iter().collect();
        assert_eq!(ids, vec!["VIN1", "VIN2", "VIN3"]);
    }

    #[tokio::test]
    async fn writes_survive_reopening() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("identity.db");

        {
            let store = SqliteStore::open(&path).await.unwrap();
            store.record(mapping("VIN1", "R1", dec!(20000))).await.unwrap();
        }

        let reopened = SqliteStore::open(&path).await.unwrap();
        let found = reopened.lookup("VIN1").await.unwrap().unwrap();
        assert_eq!(found.remote_id, "R1");
        assert_eq!(found.last_known_price, dec!(20000));
    }
}
