//! Synchronization engine for Carlane
//!
//! This crate is the heart of the system. Given the normalized vehicle
//! records of a run and the identity store, it
//! - computes a minimal, deterministic plan of catalog operations
//!   (create / update price / update fields / close),
//! - executes that plan against the remote catalog gateway with
//!   bounded concurrency, retry with backoff, and a strict
//!   upserts-before-closes phase barrier,
//! - keeps the identity store consistent with every confirmed remote
//!   change, and
//! - aggregates everything into a run report an operator can act on.

pub mod engine;
pub mod errors;
pub mod executor;
pub mod plan;
pub mod report;
pub mod retry;

pub use engine::{SyncConfig, SyncEngine};
pub use errors::{Result, SyncError};
pub use executor::{CancelToken, Executor, OperationOutcome, OutcomeStatus};
pub use plan::{
    Operation, OperationKind, PlanOptions, PlanWarning, PriceChange, Reconciler, SyncPlan,
};
pub use report::RunReport;
pub use retry::RetryPolicy;
