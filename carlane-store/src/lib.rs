//! Identity mapping store for Carlane
//!
//! Tracks which partner VIN corresponds to which remote catalog id,
//! together with the last price and field fingerprint that were
//! successfully pushed. The store is the anchor that makes reruns
//! safe: every write is durably flushed before the call returns.
//!
//! The reconciler only reads; the synchronizer is the sole writer.

pub mod errors;
pub mod memory;
pub mod sqlite;

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub use errors::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Persistent association between a partner VIN and a remote record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityMapping {
    pub external_id: String,
    pub remote_id: String,
    /// Sales price most recently confirmed by the platform.
    pub last_known_price: Decimal,
    /// Fingerprint of the non-price fields at the last successful push.
    pub fields_digest: String,
    pub last_synced_at: DateTime<Utc>,
}

/// Contract for the identity map.
///
/// Implementations must be safe under concurrent calls for distinct
/// ids and must serialize calls touching the same id. A successful
/// `record` or `remove` is durable once the call returns.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Look up the mapping for a VIN, if one exists.
    async fn lookup(&self, external_id: &str) -> Result<Option<IdentityMapping>>;

    /// Insert or update a mapping. At most one mapping per VIN exists
    /// at any time.
    async fn record(&self, mapping: IdentityMapping) -> Result<()>;

    /// Delete the mapping for a VIN after a confirmed remote close.
    /// Removing an unknown VIN is not an error.
    async fn remove(&self, external_id: &str) -> Result<()>;

    /// All VINs currently known to the store, sorted. Used to find
    /// vehicles that disappeared from the feed.
    async fn known_external_ids(&self) -> Result<BTreeSet<String>>;
}
