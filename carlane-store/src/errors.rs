//! Error types for the identity store

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A write could not be persisted. In-memory and on-disk state may
    /// now diverge; callers must log loudly instead of continuing
    /// silently.
    #[error("write for '{external_id}' was not persisted: {source}")]
    Write {
        external_id: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("corrupt store row for '{external_id}': {detail}")]
    Corrupt { external_id: String, detail: String },
}

pub type Result<T> = std::result::Result<T, StoreError>;
