//! Error types for vitalsync

use thiserror::Error;

/// Failures raised by a record store
///
/// Inside the summary and payload builders these are isolated per metric:
/// they are logged and the affected field or list degrades to absent/empty.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to read {kind} records: {message}")]
    ReadFailed { kind: String, message: String },

    #[error("Aggregate query {metric} failed: {message}")]
    AggregateFailed { metric: String, message: String },

    #[error("Invalid page token: {0}")]
    InvalidPageToken(String),

    #[error("Pagination stalled on {kind}: store repeated page token {token}")]
    StalledPagination { kind: String, token: String },

    #[error("Invalid record snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
}

/// Outcome of a sync attempt that did not succeed
#[derive(Debug, Error)]
pub enum SyncError {
    /// The health data platform is not available on this device
    #[error("Health data platform unavailable: {0}")]
    Unsupported(String),

    /// The endpoint answered with a non-2xx status
    #[error("Sync rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// No response was obtained at all
    #[error("Sync transport failure: {0}")]
    Transport(String),

    #[error("Failed to encode sync payload: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl SyncError {
    pub fn is_rejected(&self) -> bool {
        matches!(self, SyncError::Rejected { .. })
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, SyncError::Transport(_))
    }

    /// HTTP status carried by a rejection
    pub fn status(&self) -> Option<u16> {
        match self {
            SyncError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Invalid or missing configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(String),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}
