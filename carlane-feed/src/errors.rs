//! Error types for feed parsing

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("missing required fields: {fields}")]
    MissingFields { fields: String },

    #[error("invalid value for '{field}': {value}")]
    InvalidValue { field: String, value: String },

    #[error("invalid date value: {0}")]
    InvalidDate(String),
}

pub type Result<T> = std::result::Result<T, FeedError>;
