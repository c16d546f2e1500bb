//! Remote catalog gateway for Carlane
//!
//! The leasing platform exposes vehicle create/update/price/close
//! operations over a REST API. This crate defines the gateway trait
//! the synchronization engine is written against, the classified
//! error type its retry logic depends on, the production HTTP
//! implementation and an in-memory fake for tests.

pub mod errors;
pub mod fake;
pub mod http;
pub mod payload;

use std::fmt;

use async_trait::async_trait;
use carlane_feed::VehicleRecord;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub use errors::{GatewayError, Result};
pub use fake::{FakeGateway, FailureScript, GatewayCall};
pub use http::HttpGateway;

/// Platform-side identifier of a catalog record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteId(pub String);

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Summary of an active listing as reported by the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteListing {
    pub remote_id: RemoteId,
    pub external_id: String,
    pub sales_price: Option<Decimal>,
}

/// Remote catalog operations used by the synchronizer.
///
/// Every method fails with a [`GatewayError`] whose
/// [`is_transient`](GatewayError::is_transient) classification drives
/// the caller's retry decision.
#[async_trait]
pub trait CatalogGateway: Send + Sync {
    /// Create a listing, returning the platform id for it.
    async fn create_vehicle(&self, record: &VehicleRecord) -> Result<RemoteId>;

    /// Replace the catalog fields of an existing listing.
    async fn update_vehicle(&self, remote_id: &RemoteId, record: &VehicleRecord) -> Result<()>;

    /// Change the sales price of an existing listing. `is_decrease`
    /// lets the platform apply its discount handling.
    async fn update_price(
        &self,
        remote_id: &RemoteId,
        price: Decimal,
        is_decrease: bool,
    ) -> Result<()>;

    /// Deactivate a listing.
    async fn close_vehicle(&self, remote_id: &RemoteId) -> Result<()>;

    /// All currently active listings, for cross-checking the identity
    /// store against platform-side truth.
    async fn list_active_vehicles(&self) -> Result<Vec<RemoteListing>>;
}
