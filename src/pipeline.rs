//! Pipeline orchestration
//!
//! `HealthSync` is the public entry point. It ties a record store to the
//! lookback windows and hands finished payloads to a sync transport:
//!
//! 1. availability check (fails fast with `SyncError::Unsupported`)
//! 2. concurrent metric reads through the paginated reader
//! 3. summary or payload construction
//! 4. delivery through the transport (sync only)

use crate::config::LookbackWindows;
use crate::error::SyncError;
use crate::payload::{PayloadBuilder, SyncInputs};
use crate::store::{RecordStore, StoreAvailability};
use crate::summary::{SummaryBuilder, SummaryInputs};
use crate::transport::{SyncReceipt, SyncTransport};
use crate::types::{HealthSummary, SyncPayload};
use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Number of entries per payload section
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadCounts {
    pub body_measurements: usize,
    pub blood_pressure: usize,
    pub sleep_sessions: usize,
    pub steps: usize,
}

impl From<&SyncPayload> for PayloadCounts {
    fn from(payload: &SyncPayload) -> Self {
        Self {
            body_measurements: payload.body_measurements.len(),
            blood_pressure: payload.blood_pressure.len(),
            sleep_sessions: payload.sleep_sessions.len(),
            steps: payload.steps.len(),
        }
    }
}

/// Result of a delivered sync
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub receipt: SyncReceipt,
    pub counts: PayloadCounts,
}

/// Health data aggregation and sync engine
pub struct HealthSync<Tz: TimeZone = Local> {
    store: Arc<dyn RecordStore>,
    windows: LookbackWindows,
    payload_builder: PayloadBuilder<Tz>,
}

impl HealthSync<Local> {
    /// Engine labelling step dates in the system's local timezone
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            windows: LookbackWindows::default(),
            payload_builder: PayloadBuilder::new(Local),
        }
    }
}

impl<Tz: TimeZone> HealthSync<Tz> {
    /// Label step dates in `tz` instead
    pub fn with_timezone<T: TimeZone>(self, tz: T) -> HealthSync<T> {
        HealthSync {
            store: self.store,
            windows: self.windows,
            payload_builder: PayloadBuilder::new(tz),
        }
    }

    pub fn with_windows(mut self, windows: LookbackWindows) -> Self {
        self.windows = windows;
        self
    }

    pub fn windows(&self) -> &LookbackWindows {
        &self.windows
    }

    /// Fail with `Unsupported` unless the store can serve reads
    pub async fn check_availability(&self) -> Result<(), SyncError> {
        match self.store.availability().await {
            StoreAvailability::Available => Ok(()),
            StoreAvailability::Unavailable { reason } => {
                warn!(%reason, "health data platform unavailable");
                Err(SyncError::Unsupported(reason))
            }
        }
    }

    /// Latest values and totals as of `now`
    #[instrument(skip(self))]
    pub async fn summary(&self, now: DateTime<Utc>) -> Result<HealthSummary, SyncError> {
        self.check_availability().await?;

        let inputs = SummaryInputs::collect(self.store.as_ref(), now, &self.windows).await;
        Ok(SummaryBuilder::build(inputs, now))
    }

    /// Normalized payload for the sync windows ending at `now`
    #[instrument(skip(self))]
    pub async fn build_payload(&self, now: DateTime<Utc>) -> Result<SyncPayload, SyncError> {
        self.check_availability().await?;

        let inputs = SyncInputs::collect(
            self.store.as_ref(),
            now,
            &self.windows,
            self.payload_builder.timezone(),
        )
        .await;
        Ok(self.payload_builder.build(&inputs))
    }

    /// Build the payload and deliver it once through `transport`
    #[instrument(skip(self, transport))]
    pub async fn sync(
        &self,
        transport: &dyn SyncTransport,
        now: DateTime<Utc>,
    ) -> Result<SyncReport, SyncError> {
        let payload = self.build_payload(now).await?;
        let counts = PayloadCounts::from(&payload);

        let receipt = transport.send(&payload).await?;
        info!(
            request_id = %receipt.request_id,
            status = receipt.status,
            body_measurements = counts.body_measurements,
            blood_pressure = counts.blood_pressure,
            sleep_sessions = counts.sleep_sessions,
            steps = counts.steps,
            "sync complete"
        );

        Ok(SyncReport { receipt, counts })
    }
}
