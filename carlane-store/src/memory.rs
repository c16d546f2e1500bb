//! In-memory identity store for tests and dry runs

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::errors::{Result, StoreError};
use crate::{IdentityMapping, IdentityStore};

/// Volatile [`IdentityStore`] with the same contract as the SQLite
/// implementation. Writes can be made to fail on demand so callers can
/// exercise their degraded-store paths.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, IdentityMapping>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing mappings.
    pub async fn with_mappings(mappings: impl IntoIterator<Item = IdentityMapping>) -> Self {
        let store = Self::new();
        {
            let mut entries = store.entries.lock().await;
            for mapping in mappings {
                entries.insert(mapping.external_id.clone(), mapping);
            }
        }
        store
    }

    /// Make every subsequent `record`/`remove` fail with a write error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn write_error(&self, external_id: &str) -> StoreError {
        StoreError::Write {
            external_id: external_id.to_string(),
            source: rusqlite::Error::InvalidQuery,
        }
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn lookup(&self, external_id: &str) -> Result<Option<IdentityMapping>> {
        let entries = self.entries.lock().await;
        Ok(entries.get(external_id).cloned())
    }

    async fn record(&self, mapping: IdentityMapping) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(self.write_error(&mapping.external_id));
        }
        let mut entries = self.entries.lock().await;
        entries.insert(mapping.external_id.clone(), mapping);
        Ok(())
    }

    async fn remove(&self, external_id: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(self.write_error(external_id));
        }
        let mut entries = self.entries.lock().await;
        entries.remove(external_id);
        Ok(())
    }

    async fn known_external_ids(&self) -> Result<BTreeSet<String>> {
        let entries = self.entries.lock().await;
        Ok(entries.keys().cloned().collect())
    }
}
