//! Plan computation
//!
//! The reconciler diffs the incoming feed against the identity store
//! and produces an ordered operation plan. Planning never talks to the
//! platform, so a plan is also a dry-run preview: same feed plus same
//! store state always yields the same plan.

use std::collections::HashMap;
use std::fmt;

use carlane_feed::VehicleRecord;
use carlane_gateway::RemoteId;
use carlane_store::IdentityStore;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};

use crate::errors::Result;

/// Policy flags for plan computation.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanOptions {
    /// Close vehicles that are known to the store but absent from the
    /// feed.
    pub close_missing: bool,
    /// Emit price updates when the feed price differs from the last
    /// confirmed one.
    pub update_prices: bool,
}

/// Direction of a price change, used by the platform's discount rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PriceChange {
    Decreased,
    Increased,
}

/// A planned catalog operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Operation {
    Create {
        record: VehicleRecord,
    },
    UpdatePrice {
        remote_id: RemoteId,
        external_id: String,
        new_price: Decimal,
        reason: PriceChange,
    },
    UpdateFields {
        remote_id: RemoteId,
        record: VehicleRecord,
    },
    /// The vehicle disappeared from the feed.
    Close {
        remote_id: RemoteId,
        external_id: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OperationKind {
    Create,
    UpdatePrice,
    UpdateFields,
    Close,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OperationKind::Create => "create",
            OperationKind::UpdatePrice => "update-price",
            OperationKind::UpdateFields => "update-fields",
            OperationKind::Close => "close",
        };
        f.write_str(label)
    }
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Create { .. } => OperationKind::Create,
            Operation::UpdatePrice { .. } => OperationKind::UpdatePrice,
            Operation::UpdateFields { .. } => OperationKind::UpdateFields,
            Operation::Close { .. } => OperationKind::Close,
        }
    }

    pub fn external_id(&self) -> &str {
        match self {
            Operation::Create { record } => &record.external_id,
            Operation::UpdatePrice { external_id, .. } => external_id,
            Operation::UpdateFields { record, .. } => &record.external_id,
            Operation::Close { external_id, .. } => external_id,
        }
    }
}

/// Non-fatal diagnostic raised during planning.
#[derive(Debug, Clone, Serialize)]
pub struct PlanWarning {
    pub external_id: String,
    pub message: String,
}

impl fmt::Display for PlanWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.external_id, self.message)
    }
}

/// Ordered operation plan for one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncPlan {
    pub operations: Vec<Operation>,
    pub warnings: Vec<PlanWarning>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn count(&self, kind: OperationKind) -> usize {
        self.operations.iter().filter(|op| op.kind() == kind).count()
    }
}

/// Computes the operation plan from feed and store state.
///
/// The reconciler only reads the store; all writes happen in the
/// executor, after the platform confirmed the corresponding change.
pub struct Reconciler<'a> {
    store: &'a dyn IdentityStore,
    options: PlanOptions,
}

impl<'a> Reconciler<'a> {
    pub fn new(store: &'a dyn IdentityStore, options: PlanOptions) -> Self {
        Self { store, options }
    }

    /// Compute the plan for the given feed.
    ///
    /// Plan order is creations first (feed order), then updates (feed
    /// order, price before fields per vehicle), then closes (sorted by
    /// VIN). Closing is the most destructive action and is ordered
    /// last so it never races a creation in the same run.
    pub async fn plan(&self, records: &[VehicleRecord]) -> Result<SyncPlan> {
        let mut warnings = Vec::new();
        let (order, chosen) = dedup_feed(records, &mut warnings);

        let mut creates = Vec::new();
        let mut updates = Vec::new();
        for external_id in &order {
            let record = chosen[external_id.as_str()];
            match self.store.lookup(external_id).await? {
                None => creates.push(Operation::Create {
                    record: record.clone(),
                }),
                Some(mapping) => {
                    if self.options.update_prices
                        && mapping.last_known_price != record.sales_price
                    {
                        let reason = if record.sales_price < mapping.last_known_price {
                            PriceChange::Decreased
                        } else {
                            PriceChange::Increased
                        };
                        updates.push(Operation::UpdatePrice {
                            remote_id: RemoteId(mapping.remote_id.clone()),
                            external_id: record.external_id.clone(),
                            new_price: record.sales_price,
                            reason,
                        });
                    }
                    if mapping.fields_digest != record.fields_digest() {
                        updates.push(Operation::UpdateFields {
                            remote_id: RemoteId(mapping.remote_id),
                            record: record.clone(),
                        });
                    }
                }
            }
        }

        let mut closes = Vec::new();
        if self.options.close_missing {
            // BTreeSet iteration keeps closes sorted by VIN.
            for external_id in self.store.known_external_ids().await? {
                if chosen.contains_key(external_id.as_str()) {
                    continue;
                }
                if let Some(mapping) = self.store.lookup(&external_id).await? {
                    closes.push(Operation::Close {
                        remote_id: RemoteId(mapping.remote_id),
                        external_id,
                    });
                }
            }
        }

        debug!(
            "Planned {} creates, {} updates, {} closes",
            creates.len(),
            updates.len(),
            closes.len()
        );

        let mut operations = creates;
        operations.append(&mut updates);
        operations.append(&mut closes);

        if operations.is_empty() {
            info!("Feed matches known remote state, nothing to do");
        }

        Ok(SyncPlan {
            operations,
            warnings,
        })
    }
}

/// Collapse duplicate VINs: the last occurrence wins, conflicting
/// earlier occurrences are reported. Position in the plan follows the
/// first occurrence, so reordering rows never reshuffles the plan.
fn dedup_feed<'r>(
    records: &'r [VehicleRecord],
    warnings: &mut Vec<PlanWarning>,
) -> (Vec<String>, HashMap<&'r str, &'r VehicleRecord>) {
    let mut order = Vec::new();
    let mut chosen: HashMap<&str, &VehicleRecord> = HashMap::new();
    for record in records {
        match chosen.insert(record.external_id.as_str(), record) {
            None => order.push(record.external_id.clone()),
            Some(previous) => {
                let conflicting = previous.sales_price != record.sales_price
                    || previous.fields_digest() != record.fields_digest();
                if conflicting {
                    warnings.push(PlanWarning {
                        external_id: record.external_id.clone(),
                        message: format!(
                            "duplicate feed entry with conflicting data \
                             (lines {} and {}), keeping line {}",
                            previous.source_line, record.source_line, record.source_line
                        ),
                    });
                }
            }
        }
    }
    (order, chosen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use carlane_store::{IdentityMapping, MemoryStore};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn record(external_id: &str, sales_price: Decimal) -> VehicleRecord {
        VehicleRecord {
            external_id: external_id.to_string(),
            category: "PASSENGER".to_string(),
            make: "VW".to_string(),
            model: "Golf".to_string(),
            manufacture_year: 2021,
            mileage: 42_000,
            engine_code: None,
            cubic_capacity: dec!(1968),
            acceleration: None,
            fuel_type: "DIESEL".to_string(),
            power: 150,
            transmission_type: "AUTOMATIC".to_string(),
            drive_wheels: "FRONT".to_string(),
            body_type: "HATCHBACK".to_string(),
            car_class: None,
            doors: Some(5),
            color: "Grey".to_string(),
            list_price: dec!(98000),
            sales_price,
            configuration_number: None,
            available_from: None,
            first_registration_date: None,
            description: None,
            registration_number: None,
            location_id: None,
            source_line: 2,
        }
    }

    fn mapping_for(record: &VehicleRecord, remote_id: &str) -> IdentityMapping {
        IdentityMapping {
            external_id: record.external_id.clone(),
            remote_id: remote_id.to_string(),
            last_known_price: record.sales_price,
            fields_digest: record.fields_digest(),
            last_synced_at: Utc::now(),
        }
    }

    fn options(close_missing: bool, update_prices: bool) -> PlanOptions {
        PlanOptions {
            close_missing,
            update_prices,
        }
    }

    #[tokio::test]
    async fn unknown_vehicles_are_created() {
        let store = MemoryStore::new();
        let feed = vec![record("VIN1", dec!(92000)), record("VIN2", dec!(85000))];

        let plan = Reconciler::new(&store, options(false, false))
            .plan(&feed)
            .await
            .unwrap();

        assert_eq!(plan.operations.len(), 2);
        assert!(plan
            .operations
            .iter()
            .all(|op| op.kind() == OperationKind::Create));
        assert_eq!(plan.operations[0].external_id(), "VIN1");
        assert_eq!(plan.operations[1].external_id(), "VIN2");
    }

    #[tokio::test]
    async fn unchanged_feed_plans_nothing() {
        let a = record("VIN1", dec!(92000));
        let store = MemoryStore::with_mappings([mapping_for(&a, "R1")]).await;

        let plan = Reconciler::new(&store, options(true, true))
            .plan(&[a])
            .await
            .unwrap();

        assert!(plan.is_empty());
        assert!(plan.warnings.is_empty());
    }

    #[tokio::test]
    async fn price_decrease_is_tagged() {
        let mut stored = record("VIN1", dec!(20000));
        let store = MemoryStore::with_mappings([mapping_for(&stored, "R1")]).await;
        stored.sales_price = dec!(18000);

        let plan = Reconciler::new(&store, options(false, true))
            .plan(&[stored])
            .await
            .unwrap();

        assert_eq!(plan.operations.len(), 1);
        match &plan.operations[0] {
            Operation::UpdatePrice {
                new_price, reason, ..
            } => {
                assert_eq!(*new_price, dec!(18000));
                assert_eq!(*reason, PriceChange::Decreased);
            }
            other => panic!("expected price update, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn price_change_is_ignored_without_flag() {
        let mut stored = record("VIN1", dec!(20000));
        let store = MemoryStore::with_mappings([mapping_for(&stored, "R1")]).await;
        stored.sales_price = dec!(18000);

        let plan = Reconciler::new(&store, options(false, false))
            .plan(&[stored])
            .await
            .unwrap();

        assert!(plan.is_empty());
    }

    #[tokio::test]
    async fn changed_fields_and_price_yield_two_operations() {
        let original = record("VIN1", dec!(20000));
        let store = MemoryStore::with_mappings([mapping_for(&original, "R1")]).await;

        let mut changed = record("VIN1", dec!(21000));
        changed.mileage = 50_000;

        let plan = Reconciler::new(&store, options(false, true))
            .plan(&[changed])
            .await
            .unwrap();

        let kinds: Vec<_> = plan.operations.iter().map(Operation::kind).collect();
        assert_eq!(
            kinds,
            vec![OperationKind::UpdatePrice, OperationKind::UpdateFields]
        );
        match &plan.operations[0] {
            Operation::UpdatePrice { reason, .. } => {
                assert_eq!(*reason, PriceChange::Increased)
            }
            other => panic!("expected price update, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_vehicles_close_only_when_enabled() {
        let a = record("VINA", dec!(1000));
        let b = record("VINB", dec!(1000));
        let c = record("VINC", dec!(1000));
        let store = MemoryStore::with_mappings([
            mapping_for(&a, "R1"),
            mapping_for(&b, "R2"),
            mapping_for(&c, "R3"),
        ])
        .await;
        let feed = vec![a, b];

        let closing = Reconciler::new(&store, options(true, false))
            .plan(&feed)
            .await
            .unwrap();
        assert_eq!(closing.operations.len(), 1);
        match &closing.operations[0] {
            Operation::Close {
                external_id,
                remote_id,
            } => {
                assert_eq!(external_id, "VINC");
                assert_eq!(remote_id.0, "R3");
            }
            other => panic!("expected close, got {other:?}"),
        }

        let keeping = Reconciler::new(&store, options(false, false))
            .plan(&feed)
            .await
            .unwrap();
        assert_eq!(keeping.count(OperationKind::Close), 0);
    }

    #[tokio::test]
    async fn creates_precede_updates_which_precede_closes() {
        let known = record("VINB", dec!(20000));
        let gone = record("VINZ", dec!(5000));
        let store =
            MemoryStore::with_mappings([mapping_for(&known, "R1"), mapping_for(&gone, "R2")])
                .await;

        let mut updated = record("VINB", dec!(19000));
        updated.mileage = 60_000;
        let feed = vec![updated, record("VINA", dec!(30000))];

        let plan = Reconciler::new(&store, options(true, true))
            .plan(&feed)
            .await
            .unwrap();

        let kinds: Vec<_> = plan.operations.iter().map(Operation::kind).collect();
        assert_eq!(
            kinds,
            vec![
                OperationKind::Create,
                OperationKind::UpdatePrice,
                OperationKind::UpdateFields,
                OperationKind::Close,
            ]
        );
        assert_eq!(plan.operations[0].external_id(), "VINA");
        assert_eq!(plan.operations[3].external_id(), "VINZ");
    }

    #[tokio::test]
    async fn conflicting_duplicates_warn_and_last_wins() {
        let store = MemoryStore::new();
        let first = record("VIN1", dec!(92000));
        let mut second = record("VIN1", dec!(90000));
        second.source_line = 9;

        let plan = Reconciler::new(&store, options(false, false))
            .plan(&[first, second])
            .await
            .unwrap();

        assert_eq!(plan.operations.len(), 1);
        match &plan.operations[0] {
            Operation::Create { record } => assert_eq!(record.sales_price, dec!(90000)),
            other => panic!("expected create, got {other:?}"),
        }
        assert_eq!(plan.warnings.len(), 1);
        assert!(plan.warnings[0].message.contains("lines 2 and 9"));
    }

    #[tokio::test]
    async fn identical_duplicates_collapse_silently() {
        let store = MemoryStore::new();
        let first = record("VIN1", dec!(92000));
        let mut second = record("VIN1", dec!(92000));
        second.source_line = 9;

        let plan = Reconciler::new(&store, options(false, false))
            .plan(&[first, second])
            .await
            .unwrap();

        assert_eq!(plan.operations.len(), 1);
        assert!(plan.warnings.is_empty());
    }
}
