//! Plan execution
//!
//! The executor walks the plan in two phases: first every create and
//! update reaches a terminal state, only then do closes start. Within
//! a phase, operations are grouped by VIN; a group runs as one task so
//! an id never has two calls in flight, while distinct ids run
//! concurrently under a semaphore.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use carlane_gateway::{CatalogGateway, GatewayError, RemoteId};
use carlane_store::{IdentityMapping, IdentityStore};
use chrono::Utc;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::plan::{Operation, OperationKind, SyncPlan};
use crate::report::RunReport;
use crate::retry::RetryPolicy;

/// Cooperative cancellation handle.
///
/// Cancelling stops the executor from dispatching further operations;
/// calls already in flight finish to a terminal state, so the identity
/// store never reflects a half-applied remote change.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Terminal state of one executed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OutcomeStatus {
    Succeeded,
    /// Rejected by the platform; retrying would not help.
    FailedPermanent,
    /// Transient failures persisted through every allowed attempt.
    FailedExhausted,
    /// Never dispatched because the run was cancelled.
    Skipped,
}

/// Result of one planned operation, in plan order in the report.
#[derive(Debug, Clone, Serialize)]
pub struct OperationOutcome {
    pub external_id: String,
    pub kind: OperationKind,
    pub status: OutcomeStatus,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OperationOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(
            self.status,
            OutcomeStatus::FailedPermanent | OutcomeStatus::FailedExhausted
        )
    }
}

/// Executes a plan against the gateway, keeping the store in step.
pub struct Executor {
    gateway: Arc<dyn CatalogGateway>,
    store: Arc<dyn IdentityStore>,
    retry: RetryPolicy,
    concurrency: usize,
    cancel: CancelToken,
}

impl Executor {
    pub fn new(
        gateway: Arc<dyn CatalogGateway>,
        store: Arc<dyn IdentityStore>,
        retry: RetryPolicy,
        concurrency: usize,
        cancel: CancelToken,
    ) -> Self {
        Self {
            gateway,
            store,
            retry,
            concurrency: concurrency.max(1),
            cancel,
        }
    }

    /// Run every operation to a terminal state and build the report.
    pub async fn execute(&self, plan: SyncPlan) -> RunReport {
        let mut report = RunReport::new();
        for warning in &plan.warnings {
            report.warnings.push(warning.to_string());
        }

        let indexed: Vec<(usize, Operation)> =
            plan.operations.into_iter().enumerate().collect();
        let (upserts, closes): (Vec<_>, Vec<_>) = indexed
            .into_iter()
            .partition(|(_, op)| op.kind() != OperationKind::Close);

        let mut results = Vec::new();

        // Phase barrier: every create/update is terminal before the
        // first close dispatches, even under concurrency.
        let (mut outcomes, mut warnings) = self.run_phase(upserts).await;
        results.append(&mut outcomes);
        report.warnings.append(&mut warnings);

        let (mut outcomes, mut warnings) = self.run_phase(closes).await;
        results.append(&mut outcomes);
        report.warnings.append(&mut warnings);

        // Report follows plan order, not completion order.
        results.sort_by_key(|(index, _)| *index);
        for (_, outcome) in results {
            report.push_outcome(outcome);
        }
        report
    }

    async fn run_phase(
        &self,
        operations: Vec<(usize, Operation)>,
    ) -> (Vec<(usize, OperationOutcome)>, Vec<String>) {
        let mut results = Vec::new();
        let mut warnings = Vec::new();
        if operations.is_empty() {
            return (results, warnings);
        }

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for (external_id, group) in group_by_external_id(operations) {
            if self.cancel.is_cancelled() {
                debug!("Run cancelled, skipping {}", external_id);
                results.extend(skip_group(group));
                continue;
            }

            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    results.extend(skip_group(group));
                    continue;
                }
            };

            let gateway = Arc::clone(&self.gateway);
            let store = Arc::clone(&self.store);
            let retry = self.retry.clone();
            let cancel = self.cancel.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let mut outcomes = Vec::new();
                let mut warnings = Vec::new();
                for (index, operation) in group {
                    if cancel.is_cancelled() {
                        outcomes.push((index, skipped(&operation)));
                        continue;
                    }
                    let (outcome, mut op_warnings) =
                        run_operation(gateway.as_ref(), store.as_ref(), &retry, operation)
                            .await;
                    outcomes.push((index, outcome));
                    warnings.append(&mut op_warnings);
                }
                (outcomes, warnings)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((mut outcomes, mut task_warnings)) => {
                    results.append(&mut outcomes);
                    warnings.append(&mut task_warnings);
                }
                Err(err) => {
                    warn!("Executor task failed: {err}");
                    warnings.push(format!("executor task failed: {err}"));
                }
            }
        }

        (results, warnings)
    }
}

/// Group a phase by VIN, preserving first-seen order. Operations for
/// the same vehicle stay in plan order inside their group.
fn group_by_external_id(
    operations: Vec<(usize, Operation)>,
) -> Vec<(String, Vec<(usize, Operation)>)> {
    let mut order = Vec::new();
    let mut groups: HashMap<String, Vec<(usize, Operation)>> = HashMap::new();
    for (index, operation) in operations {
        let external_id = operation.external_id().to_string();
        if !groups.contains_key(&external_id) {
            order.push(external_id.clone());
        }
        groups.entry(external_id).or_default().push((index, operation));
    }
    order
        .into_iter()
        .map(|id| {
            let group = groups.remove(&id).unwrap_or_default();
            (id, group)
        })
        .collect()
}

fn skipped(operation: &Operation) -> OperationOutcome {
    OperationOutcome {
        external_id: operation.external_id().to_string(),
        kind: operation.kind(),
        status: OutcomeStatus::Skipped,
        attempts: 0,
        error: None,
    }
}

fn skip_group(group: Vec<(usize, Operation)>) -> Vec<(usize, OperationOutcome)> {
    group
        .into_iter()
        .map(|(index, operation)| (index, skipped(&operation)))
        .collect()
}

/// Drive one operation to a terminal state.
///
/// Transient failures are retried with backoff; permanent ones are
/// final on the spot. The store is only touched after the platform
/// confirmed the change, so an exhausted retry leaves no trace.
async fn run_operation(
    gateway: &dyn CatalogGateway,
    store: &dyn IdentityStore,
    retry: &RetryPolicy,
    operation: Operation,
) -> (OperationOutcome, Vec<String>) {
    let external_id = operation.external_id().to_string();
    let kind = operation.kind();
    let mut attempts = 0;

    loop {
        attempts += 1;
        match dispatch(gateway, &operation).await {
            Ok(created) => {
                let mut warnings = Vec::new();
                if let Err(err) = apply_success(store, &operation, created).await {
                    // The remote change went through; losing the local
                    // mapping threatens the next run, not this one.
                    warn!(
                        "Identity store update failed for {} after successful {}: {}",
                        external_id, kind, err
                    );
                    warnings.push(format!(
                        "identity store update failed for {external_id}: {err}"
                    ));
                }
                return (
                    OperationOutcome {
                        external_id,
                        kind,
                        status: OutcomeStatus::Succeeded,
                        attempts,
                        error: None,
                    },
                    warnings,
                );
            }
            Err(err) if err.is_transient() && attempts < retry.max_attempts => {
                let delay = retry.delay_after(attempts);
                debug!(
                    "Transient failure for {} ({}), retrying in {:?} (attempt {}/{}): {}",
                    external_id, kind, delay, attempts, retry.max_attempts, err
                );
                sleep(delay).await;
            }
            Err(err) if err.is_transient() => {
                warn!(
                    "Giving up on {} ({}) after {} attempts: {}",
                    external_id, kind, attempts, err
                );
                return (
                    OperationOutcome {
                        external_id,
                        kind,
                        status: OutcomeStatus::FailedExhausted,
                        attempts,
                        error: Some(err.to_string()),
                    },
                    Vec::new(),
                );
            }
            Err(err) => {
                warn!("Permanent failure for {} ({}): {}", external_id, kind, err);
                return (
                    OperationOutcome {
                        external_id,
                        kind,
                        status: OutcomeStatus::FailedPermanent,
                        attempts,
                        error: Some(err.to_string()),
                    },
                    Vec::new(),
                );
            }
        }
    }
}

/// Issue the gateway call for an operation. Returns the new remote id
/// for creates.
async fn dispatch(
    gateway: &dyn CatalogGateway,
    operation: &Operation,
) -> Result<Option<RemoteId>, GatewayError> {
    match operation {
        Operation::Create { record } => gateway.create_vehicle(record).await.map(Some),
        Operation::UpdatePrice {
            remote_id,
            new_price,
            reason,
            ..
        } => gateway
            .update_price(
                remote_id,
                *new_price,
                *reason == crate::plan::PriceChange::Decreased,
            )
            .await
            .map(|_| None),
        Operation::UpdateFields { remote_id, record } => gateway
            .update_vehicle(remote_id, record)
            .await
            .map(|_| None),
        Operation::Close { remote_id, .. } => {
            gateway.close_vehicle(remote_id).await.map(|_| None)
        }
    }
}

/// Bring the identity store in line with a confirmed remote change.
async fn apply_success(
    store: &dyn IdentityStore,
    operation: &Operation,
    created: Option<RemoteId>,
) -> carlane_store::Result<()> {
    match operation {
        Operation::Create { record } => {
            let Some(remote_id) = created else {
                return Ok(());
            };
            store
                .record(IdentityMapping {
                    external_id: record.external_id.clone(),
                    remote_id: remote_id.0,
                    last_known_price: record.sales_price,
                    fields_digest: record.fields_digest(),
                    last_synced_at: Utc::now(),
                })
                .await
        }
        Operation::UpdatePrice {
            remote_id,
            external_id,
            new_price,
            ..
        } => {
            let mut mapping = store.lookup(external_id).await?.unwrap_or_else(|| {
                // The mapping vanished mid-run; rebuild it with an
                // empty digest so the next run resyncs the fields.
                IdentityMapping {
                    external_id: external_id.clone(),
                    remote_id: remote_id.0.clone(),
                    last_known_price: *new_price,
                    fields_digest: String::new(),
                    last_synced_at: Utc::now(),
                }
            });
            mapping.last_known_price = *new_price;
            mapping.last_synced_at = Utc::now();
            store.record(mapping).await
        }
        Operation::UpdateFields { remote_id, record } => {
            let mut mapping = store
                .lookup(&record.external_id)
                .await?
                .unwrap_or_else(|| IdentityMapping {
                    external_id: record.external_id.clone(),
                    remote_id: remote_id.0.clone(),
                    last_known_price: record.sales_price,
                    fields_digest: String::new(),
                    last_synced_at: Utc::now(),
                });
            mapping.fields_digest = record.fields_digest();
            mapping.last_synced_at = Utc::now();
            store.record(mapping).await
        }
        Operation::Close { external_id, .. } => store.remove(external_id).await,
    }
}
