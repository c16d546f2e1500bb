//! Engine facade
//!
//! `SyncEngine` ties planning and execution together behind the single
//! entry point callers use: hand it the normalized records (plus any
//! row errors the feed layer collected) and block until the report is
//! final.

use std::sync::Arc;

use carlane_feed::{RowError, VehicleRecord};
use carlane_gateway::CatalogGateway;
use carlane_store::IdentityStore;
use tracing::info;

use crate::errors::Result;
use crate::executor::{CancelToken, Executor};
use crate::plan::{PlanOptions, Reconciler, SyncPlan};
use crate::report::RunReport;
use crate::retry::RetryPolicy;

/// Configuration for one synchronization run.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Close vehicles missing from the feed.
    pub close_missing: bool,
    /// Push price changes for existing vehicles.
    pub update_prices: bool,
    pub retry: RetryPolicy,
    /// Maximum concurrent in-flight vehicles. Correctness does not
    /// depend on the value; 1 serializes the whole run.
    pub concurrency: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            close_missing: false,
            update_prices: false,
            retry: RetryPolicy::default(),
            concurrency: 4,
        }
    }
}

/// The synchronization engine.
pub struct SyncEngine {
    store: Arc<dyn IdentityStore>,
    gateway: Arc<dyn CatalogGateway>,
    config: SyncConfig,
    cancel: CancelToken,
}

impl SyncEngine {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        gateway: Arc<dyn CatalogGateway>,
        config: SyncConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            config,
            cancel: CancelToken::new(),
        }
    }

    /// Handle an operator can use to abort the run. Dispatch stops,
    /// in-flight calls finish, the report is still produced.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Compute the plan without touching the platform (dry run).
    pub async fn plan(&self, records: &[VehicleRecord]) -> Result<SyncPlan> {
        let options = PlanOptions {
            close_missing: self.config.close_missing,
            update_prices: self.config.update_prices,
        };
        Reconciler::new(self.store.as_ref(), options)
            .plan(records)
            .await
    }

    /// Run a full synchronization and return the final report.
    ///
    /// A store failure during planning aborts the run before any
    /// remote call; every later problem lands in the report instead.
    pub async fn run(
        &self,
        records: &[VehicleRecord],
        feed_errors: Vec<RowError>,
    ) -> Result<RunReport> {
        let plan = self.plan(records).await?;
        info!(
            "Executing plan with {} operations ({} feed rows, {} row errors)",
            plan.operations.len(),
            records.len(),
            feed_errors.len()
        );

        let executor = Executor::new(
            Arc::clone(&self.gateway),
            Arc::clone(&self.store),
            self.config.retry.clone(),
            self.config.concurrency,
            self.cancel.clone(),
        );
        let mut report = executor.execute(plan).await;
        report.feed_errors = feed_errors;

        info!(
            "Run finished: {} created, {} updated, {} price changes, \
             {} closed, {} failed, {} skipped",
            report.created,
            report.updated,
            report.price_changed,
            report.closed,
            report.failed,
            report.skipped
        );
        Ok(report)
    }
}
