//! Partner feed handling for Carlane
//!
//! This crate turns the raw partner CSV export into normalized
//! [`VehicleRecord`]s ready for reconciliation:
//! - CSV loading with per-row error collection
//! - Partner value cleanup (locale quirks, enum translation)
//! - A stable field fingerprint used to detect remote drift

pub mod errors;
pub mod loader;
pub mod normalize;
pub mod record;

pub use errors::{FeedError, Result};
pub use loader::{load_from_csv, load_from_reader, FeedBatch, RowError};
pub use record::VehicleRecord;
