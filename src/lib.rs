//! vitalsync - Health data aggregation and sync engine
//!
//! vitalsync reads time-stamped physiological records from a device record
//! store and turns them into two outputs: a read-only summary of recent values
//! and a normalized payload delivered to a remote endpoint. The flow is:
//! paginated reads → interval merging / stream correlation → summary or
//! payload → sync transport.
//!
//! ## Modules
//!
//! - **store**: record store boundary plus an in-memory implementation
//! - **reader**: paginated, typed reads on top of a store
//! - **merger** / **correlator**: pure sleep-interval union and minute-bucket joins
//! - **summary** / **payload**: the two outputs, with per-metric failure isolation
//! - **transport**: bearer-authenticated HTTP delivery
//! - **pipeline**: `HealthSync`, the orchestrating entry point

pub mod config;
pub mod correlator;
pub mod error;
pub mod logging;
pub mod merger;
pub mod payload;
pub mod pipeline;
pub mod reader;
pub mod store;
pub mod summary;
pub mod transport;
pub mod types;

pub use config::{LookbackWindows, SyncConfig};
pub use error::{ConfigError, StoreError, SyncError};
pub use pipeline::{HealthSync, PayloadCounts, SyncReport};
pub use store::{InMemoryRecordStore, RecordStore, StoreAvailability};
pub use transport::{HttpSyncTransport, SyncReceipt, SyncTransport};
pub use types::{HealthSummary, SyncPayload};

/// Crate version, sent in the transport's user agent
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
