//! Error types for the synchronization engine

use thiserror::Error;

/// Fatal errors that abort a run before any remote call is made.
///
/// Everything else (transient remote failures, permanent rejections,
/// store write hiccups mid-run) is absorbed into the run report
/// instead of being raised.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("identity store error: {0}")]
    Store(#[from] carlane_store::StoreError),
}

pub type Result<T> = std::result::Result<T, SyncError>;
