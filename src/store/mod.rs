//! Record store boundary
//!
//! The engine never talks to a concrete health data source. Everything it
//! reads goes through [`RecordStore`]: paginated, time-range-filtered reads of
//! the six record kinds plus two windowed aggregate queries.

mod memory;

pub use memory::{InMemoryRecordStore, RecordSnapshot};

use crate::error::StoreError;
use crate::types::{DeviceRecord, RecordKind, TimeRange};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Whether the health data platform can be queried at all
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StoreAvailability {
    Available,
    Unavailable { reason: String },
}

impl StoreAvailability {
    pub fn is_available(&self) -> bool {
        matches!(self, StoreAvailability::Available)
    }
}

/// One page of records plus the token for the next page, if any
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordPage {
    pub records: Vec<DeviceRecord>,
    pub next_token: Option<String>,
}

/// Windowed aggregates the store computes itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateMetric {
    StepsTotal,
    SleepDurationTotal,
}

impl AggregateMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateMetric::StepsTotal => "steps_total",
            AggregateMetric::SleepDurationTotal => "sleep_duration_total",
        }
    }
}

impl std::fmt::Display for AggregateMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value of an aggregate query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateValue {
    Count(i64),
    Duration(TimeDelta),
}

impl AggregateValue {
    pub fn as_count(&self) -> Option<i64> {
        match self {
            AggregateValue::Count(count) => Some(*count),
            AggregateValue::Duration(_) => None,
        }
    }

    pub fn as_minutes(&self) -> Option<i64> {
        match self {
            AggregateValue::Duration(duration) => Some(duration.num_minutes()),
            AggregateValue::Count(_) => None,
        }
    }
}

/// Aggregate over one calendar-day period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyAggregate {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub value: AggregateValue,
}

/// Read access to a health data source
///
/// Implementations hold no state shared between calls that the engine relies
/// on, so independent queries may run concurrently.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Precondition check, called before any read
    async fn availability(&self) -> StoreAvailability;

    /// Read one page of `kind` records in `range`
    ///
    /// `page_token` is `None` for the first page and otherwise the
    /// `next_token` of the previous page.
    async fn read_page(
        &self,
        kind: RecordKind,
        range: &TimeRange,
        page_token: Option<&str>,
    ) -> Result<RecordPage, StoreError>;

    /// Aggregate `metric` over the whole range; `None` when there is no data
    async fn aggregate(
        &self,
        metric: AggregateMetric,
        range: &TimeRange,
    ) -> Result<Option<AggregateValue>, StoreError>;

    /// Aggregate `metric` once per period in `days`, in the order given
    ///
    /// Callers pass calendar-day periods (see [`TimeRange::calendar_days`]),
    /// so day boundaries follow the caller's timezone rather than the store's.
    async fn aggregate_by_day(
        &self,
        metric: AggregateMetric,
        days: &[TimeRange],
    ) -> Result<Vec<DailyAggregate>, StoreError>;
}
