//! Carlane integration tests and workspace root
//!
//! This crate serves as the root of the Carlane workspace and contains
//! integration tests that exercise the full feed-to-report pipeline.

// Re-export major components for integration testing
pub use carlane_feed as feed;
pub use carlane_gateway as gateway;
pub use carlane_store as store;
pub use carlane_sync as sync;
