//! In-memory gateway for engine tests
//!
//! Mirrors the platform contract closely enough to exercise the
//! synchronizer: it hands out remote ids, tracks active listings,
//! records the exact call order and can be scripted to fail per VIN.

use std::collections::HashMap;

use async_trait::async_trait;
use carlane_feed::VehicleRecord;
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use crate::errors::{GatewayError, Result};
use crate::{CatalogGateway, RemoteId, RemoteListing};

/// One observed gateway call, in dispatch order.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    Create {
        external_id: String,
    },
    UpdateFields {
        external_id: String,
    },
    UpdatePrice {
        external_id: String,
        price: Decimal,
        is_decrease: bool,
    },
    Close {
        external_id: String,
    },
}

impl GatewayCall {
    pub fn external_id(&self) -> &str {
        match self {
            GatewayCall::Create { external_id }
            | GatewayCall::UpdateFields { external_id }
            | GatewayCall::UpdatePrice { external_id, .. }
            | GatewayCall::Close { external_id } => external_id,
        }
    }

    pub fn is_close(&self) -> bool {
        matches!(self, GatewayCall::Close { .. })
    }
}

/// Scripted failure behavior for a VIN.
#[derive(Debug, Clone)]
pub enum FailureScript {
    /// Fail with a transient error on the next `n` calls, then succeed.
    TransientTimes(u32),
    /// Every call fails with a transient error.
    TransientAlways,
    /// Every call fails with a permanent validation rejection.
    Permanent,
}

#[derive(Default)]
struct FakeState {
    next_id: u64,
    /// external id -> (remote id, current sales price)
    vehicles: HashMap<String, (RemoteId, Decimal)>,
    by_remote: HashMap<RemoteId, String>,
    calls: Vec<GatewayCall>,
    failures: HashMap<String, FailureScript>,
}

impl FakeState {
    fn apply_script(&mut self, external_id: &str) -> Result<()> {
        match self.failures.get_mut(external_id) {
            None | Some(FailureScript::TransientTimes(0)) => Ok(()),
            Some(FailureScript::TransientTimes(remaining)) => {
                *remaining -= 1;
                Err(GatewayError::Server {
                    status: 503,
                    message: "scripted transient failure".to_string(),
                })
            }
            Some(FailureScript::TransientAlways) => Err(GatewayError::Server {
                status: 503,
                message: "scripted transient failure".to_string(),
            }),
            Some(FailureScript::Permanent) => Err(GatewayError::Rejected {
                status: 422,
                message: "scripted validation rejection".to_string(),
            }),
        }
    }

    fn resolve(&self, remote_id: &RemoteId) -> Result<String> {
        self.by_remote
            .get(remote_id)
            .cloned()
            .ok_or_else(|| GatewayError::Rejected {
                status: 404,
                message: format!("unknown vehicle {remote_id}"),
            })
    }
}

/// In-memory [`CatalogGateway`].
#[derive(Default)]
pub struct FakeGateway {
    state: Mutex<FakeState>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate active listings, returning their remote ids.
    pub async fn seed(&self, listings: &[(&str, Decimal)]) -> Vec<RemoteId> {
        let mut state = self.state.lock().await;
        let mut ids = Vec::new();
        for (external_id, price) in listings {
            state.next_id += 1;
            let remote_id = RemoteId(format!("R{}", state.next_id));
            state
                .vehicles
                .insert((*external_id).to_string(), (remote_id.clone(), *price));
            state
                .by_remote
                .insert(remote_id.clone(), (*external_id).to_string());
            ids.push(remote_id);
        }
        ids
    }

    /// Script failures for every call touching `external_id`.
    pub async fn fail(&self, external_id: &str, script: FailureScript) {
        let mut state = self.state.lock().await;
        state.failures.insert(external_id.to_string(), script);
    }

    /// Calls observed so far, in dispatch order.
    pub async fn calls(&self) -> Vec<GatewayCall> {
        self.state.lock().await.calls.clone()
    }

    pub async fn is_active(&self, external_id: &str) -> bool {
        self.state.lock().await.vehicles.contains_key(external_id)
    }

    pub async fn sales_price(&self, external_id: &str) -> Option<Decimal> {
        let state = self.state.lock().await;
        state.vehicles.get(external_id).map(|(_, price)| *price)
    }
}

#[async_trait]
impl CatalogGateway for FakeGateway {
    async fn create_vehicle(&self, record: &VehicleRecord) -> Result<RemoteId> {
        let mut state = self.state.lock().await;
        state.calls.push(GatewayCall::Create {
            external_id: record.external_id.clone(),
        });
        state.apply_script(&record.external_id)?;

        if state.vehicles.contains_key(&record.external_id) {
            return Err(GatewayError::Rejected {
                status: 409,
                message: format!("vehicle {} already listed", record.external_id),
            });
        }

        state.next_id += 1;
        let remote_id = RemoteId(format!("R{}", state.next_id));
        state.vehicles.insert(
            record.external_id.clone(),
            (remote_id.clone(), record.sales_price),
        );
        state
            .by_remote
            .insert(remote_id.clone(), record.external_id.clone());
        Ok(remote_id)
    }

    async fn update_vehicle(&self, remote_id: &RemoteId, record: &VehicleRecord) -> Result<()> {
        let mut state = self.state.lock().await;
        let external_id = state.resolve(remote_id)?;
        state.calls.push(GatewayCall::UpdateFields {
            external_id: external_id.clone(),
        });
        state.apply_script(&external_id)?;
        let _ = record;
        Ok(())
    }

    async fn update_price(
        &self,
        remote_id: &RemoteId,
        price: Decimal,
        is_decrease: bool,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        let external_id = state.resolve(remote_id)?;
        state.calls.push(GatewayCall::UpdatePrice {
            external_id: external_id.clone(),
            price,
            is_decrease,
        });
        state.apply_script(&external_id)?;

        if let Some((_, current)) = state.vehicles.get_mut(&external_id) {
            *current = price;
        }
        Ok(())
    }

    async fn close_vehicle(&self, remote_id: &RemoteId) -> Result<()> {
        let mut state = self.state.lock().await;
        let external_id = state.resolve(remote_id)?;
        state.calls.push(GatewayCall::Close {
            external_id: external_id.clone(),
        });
        state.apply_script(&external_id)?;

        state.vehicles.remove(&external_id);
        state.by_remote.remove(remote_id);
        Ok(())
    }

    async fn list_active_vehicles(&self) -> Result<Vec<RemoteListing>> {
        let state = self.state.lock().await;
        let mut listings: Vec<_> = state
            .vehicles
            .iter()
            .map(|(external_id, (remote_id, price))| RemoteListing {
                remote_id: remote_id.clone(),
                external_id: external_id.clone(),
                sales_price: Some(*price),
            })
            .collect();
        listings.sort_by(|a, b| a.external_id.cmp(&b.external_id));
        Ok(listings)
    }
}
