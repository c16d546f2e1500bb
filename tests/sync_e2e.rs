//! End-to-end runs of the synchronization pipeline
//!
//! These tests drive the real engine against the in-memory gateway and
//! a durable on-disk identity store, covering the whole feed lifecycle
//! of a vehicle: appear, change price, change fields, disappear.

use std::sync::Arc;
use std::time::Duration;

use carlane_feed::{load_from_reader, RowError, VehicleRecord};
use carlane_gateway::{CatalogGateway, FakeGateway};
use carlane_store::{IdentityStore, SqliteStore};
use carlane_sync::{RetryPolicy, SyncConfig, SyncEngine};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tempfile::TempDir;

fn record(external_id: &str, sales_price: Decimal) -> VehicleRecord {
    VehicleRecord {
        external_id: external_id.to_string(),
        category: "PASSENGER".to_string(),
        make: "Skoda".to_string(),
        model: "Octavia".to_string(),
        manufacture_year: 2022,
        mileage: 15_000,
        engine_code: Some("DLA".to_string()),
        cubic_capacity: dec!(1498),
        acceleration: Some(dec!(9.1)),
        fuel_type: "PETROL".to_string(),
        power: 110,
        transmission_type: "MANUAL".to_string(),
        drive_wheels: "FRONT".to_string(),
        body_type: "ESTATE".to_string(),
        car_class: Some("FAMILY".to_string()),
        doors: Some(5),
        color: "White".to_string(),
        list_price: dec!(112000),
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

fn config(close_missing: bool, update_prices: bool) -> SyncConfig {
    SyncConfig {
        close_missing,
        update_prices,
        retry: RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            multiplier: 2.0,
            jitter: 0.0,
        },
        concurrency: 4,
    }
}

struct Harness {
    _dir: TempDir,
    store: Arc<SqliteStore>,
    gateway: Arc<FakeGateway>,
}

impl Harness {
    async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(
            SqliteStore::open(dir.path().join("identity.db"))
                .await
                .unwrap(),
        );
        Self {
            _dir: dir,
            store,
            gateway: Arc::new(FakeGateway::new()),
        }
    }

    fn engine(&self, close_missing: bool, update_prices: bool) -> SyncEngine {
        SyncEngine::new(
            Arc::clone(&self.store) as Arc<dyn IdentityStore>,
            Arc::clone(&self.gateway) as Arc<dyn CatalogGateway>,
            config(close_missing, update_prices),
        )
    }
}

#[tokio::test]
async fn rerunning_an_unchanged_feed_is_a_no_op() {
    let harness = Harness::new().await;
    let feed = [record("VIN1", dec!(92000)), record("VIN2", dec!(85000))];

    let engine = harness.engine(true, true);
    let first = engine.run(&feed, Vec::new()).await.unwrap();
    assert_eq!(first.created, 2);
    assert_eq!(first.total_operations(), 2);

    // Second run over identical state: the plan is empty.
    let plan = engine.plan(&feed).await.unwrap();
    assert!(plan.is_empty());

    let second = engine.run(&feed, Vec::new()).await.unwrap();
    assert_eq!(second.total_operations(), 0);
    assert_eq!(harness.gateway.calls().await.len(), 2);
}

#[tokio::test]
async fn a_vehicle_lifecycle_runs_end_to_end() {
    let harness = Harness::new().await;

    // Appear.
    let run1 = harness
        .engine(true, true)
        .run(&[record("VIN1", dec!(92000))], Vec::new())
        .await
        .unwrap();
    assert_eq!(run1.created, 1);
    assert!(harness.gateway.is_active("VIN1").await);

    // Price drops, mileage grows.
    let mut changed = record("VIN1", dec!(88000));
    changed.mileage = 18_000;
    let run2 = harness
        .engine(true, true)
        .run(std::slice::from_ref(&changed), Vec::new())
        .await
        .unwrap();
    assert_eq!(run2.price_changed, 1);
    assert_eq!(run2.updated, 1);
    assert_eq!(run2.created, 0);
    assert_eq!(harness.gateway.sales_price("VIN1").await, Some(dec!(88000)));

    // Disappear.
    let run3 = harness
        .engine(true, true)
        .run(&[], Vec::new())
        .await
        .unwrap();
    assert_eq!(run3.closed, 1);
    assert!(!harness.gateway.is_active("VIN1").await);
    assert!(harness.store.lookup("VIN1").await.unwrap().is_none());

    // Reappear: treated as brand new.
    let run4 = harness
        .engine(true, true)
        .run(&[record("VIN1", dec!(80000))], Vec::new())
        .await
        .unwrap();
    assert_eq!(run4.created, 1);
}

#[tokio::test]
async fn the_store_never_holds_two_ids_for_one_vin() {
    let harness = Harness::new().await;
    let feed = [record("VIN1", dec!(92000))];

    let engine = harness.engine(false, true);
    engine.run(&feed, Vec::new()).await.unwrap();
    let first = harness.store.lookup("VIN1").await.unwrap().unwrap();

    // Price churn across runs keeps the same remote id.
    for price in [dec!(91000), dec!(90000), dec!(89000)] {
        engine
            .run(&[record("VIN1", price)], Vec::new())
            .await
            .unwrap();
        let mapping = harness.store.lookup("VIN1").await.unwrap().unwrap();
        assert_eq!(mapping.remote_id, first.remote_id);
        assert_eq!(mapping.last_known_price, price);
    }
    assert_eq!(harness.store.known_external_ids().await.unwrap().len(), 1);
}

#[tokio::test]
async fn feed_row_errors_surface_untouched_in_the_report() {
    let harness = Harness::new().await;
    let row_errors = vec![RowError {
        line: 7,
        vin: Some("VINBAD".to_string()),
        message: "missing required fields: color".to_string(),
    }];

    let report = harness
        .engine(false, false)
        .run(&[record("VIN1", dec!(92000))], row_errors.clone())
        .await
        .unwrap();

    assert_eq!(report.created, 1);
    assert_eq!(report.feed_errors, row_errors);
}

#[tokio::test]
async fn csv_feed_flows_through_the_whole_pipeline() {
    let harness = Harness::new().await;

    let csv = "\
vin,category,make,model,manufactureYear,mileage,engineCode,cubicCapacity,acceleration,fuelType,power,transmissionType,driveWheels,type,carClass,doors,color,pricing_listPrice,pricing_salesPrice,configurationNumber,availableFrom,firstRegistrationDate,description,registrationNumber,locationId
VIN1,Osobowy,Skoda,Octavia,2022,15 000,DLA,1498,\"9,1\",Benzyna,110,Manualna,Na przednie koła,Kombi,Family,5,White,112000,105000,,,,,,
,Osobowy,Skoda,Fabia,2022,9000,,999,,Benzyna,70,Manualna,FWD,Hatchback,,5,Red,80000,76000,,,,,,
";
    let batch = load_from_reader(csv.as_bytes()).unwrap();
    assert_eq!(batch.records.len(), 1);
    assert_eq!(batch.errors.len(), 1);

    let report = harness
        .engine(false, false)
        .run(&batch.records, batch.errors)
        .await
        .unwrap();

    assert_eq!(report.created, 1);
    assert_eq!(report.feed_errors.len(), 1);
    assert_eq!(report.feed_errors[0].line, 3);
    assert!(harness.gateway.is_active("VIN1").await);
    assert_eq!(
        harness.gateway.sales_price("VIN1").await,
        Some(dec!(105000))
    );
}
