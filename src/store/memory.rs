//! In-memory record store
//!
//! Serves records from a list held in memory, typically loaded from a JSON
//! snapshot. Pagination, range filtering and both aggregate queries behave
//! like a real store, and individual kinds or metrics can be made to fail.

use super::{
    AggregateMetric, AggregateValue, DailyAggregate, RecordPage, RecordStore, StoreAvailability,
};
use crate::error::StoreError;
use crate::types::{DeviceRecord, RecordKind, TimeRange};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Default number of records per page
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Serialized form of a record store's contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordSnapshot {
    #[serde(default)]
    pub records: Vec<DeviceRecord>,
}

/// Record store backed by an in-memory list
#[derive(Debug, Clone)]
pub struct InMemoryRecordStore {
    records: Vec<DeviceRecord>,
    page_size: usize,
    availability: StoreAvailability,
    failing_kinds: HashSet<RecordKind>,
    failing_metrics: HashSet<AggregateMetric>,
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl InMemoryRecordStore {
    pub fn new(records: Vec<DeviceRecord>) -> Self {
        Self {
            records,
            page_size: DEFAULT_PAGE_SIZE,
            availability: StoreAvailability::Available,
            failing_kinds: HashSet::new(),
            failing_metrics: HashSet::new(),
        }
    }

    pub fn from_snapshot(snapshot: RecordSnapshot) -> Self {
        Self::new(snapshot.records)
    }

    /// Parse a JSON snapshot (`{"records": [...]}`)
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        let snapshot: RecordSnapshot = serde_json::from_str(json)?;
        Ok(Self::from_snapshot(snapshot))
    }

    /// Set the page size (at least one record per page)
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_availability(mut self, availability: StoreAvailability) -> Self {
        self.availability = availability;
        self
    }

    /// Make every read of `kind` fail
    pub fn failing_kind(mut self, kind: RecordKind) -> Self {
        self.failing_kinds.insert(kind);
        self
    }

    /// Make every aggregate query for `metric` fail
    pub fn failing_metric(mut self, metric: AggregateMetric) -> Self {
        self.failing_metrics.insert(metric);
        self
    }

    pub fn records(&self) -> &[DeviceRecord] {
        &self.records
    }

    fn matching(&self, kind: RecordKind, range: &TimeRange) -> Vec<&DeviceRecord> {
        let mut matching: Vec<&DeviceRecord> = self
            .records
            .iter()
            .filter(|record| record.kind() == kind)
            .filter(|record| {
                let (start, end) = record.span();
                if record.is_instant() {
                    range.contains(start)
                } else {
                    range.overlaps(start, end)
                }
            })
            .collect();
        matching.sort_by_key(|record| record.span().0);
        matching
    }

    fn check_metric(&self, metric: AggregateMetric) -> Result<(), StoreError> {
        if self.failing_metrics.contains(&metric) {
            return Err(StoreError::AggregateFailed {
                metric: metric.to_string(),
                message: "injected failure".into(),
            });
        }
        Ok(())
    }

    fn steps_starting_in(&self, range: &TimeRange) -> (usize, i64) {
        self.records
            .iter()
            .filter_map(|record| match record {
                DeviceRecord::Steps(steps) if range.contains(steps.start_time) => Some(steps.count),
                _ => None,
            })
            .fold((0, 0), |(n, total), count| (n + 1, total + count))
    }

    fn sleep_within(&self, range: &TimeRange) -> (usize, TimeDelta) {
        self.records
            .iter()
            .filter_map(|record| match record {
                DeviceRecord::SleepSession(session)
                    if range.overlaps(session.start_time, session.end_time) =>
                {
                    Some(clipped(session.start_time, session.end_time, range))
                }
                _ => None,
            })
            .fold((0, TimeDelta::zero()), |(n, total), d| (n + 1, total + d))
    }
}

fn clipped(start: DateTime<Utc>, end: DateTime<Utc>, range: &TimeRange) -> TimeDelta {
    let start = start.max(range.start);
    let end = end.min(range.end);
    if end > start {
        end - start
    } else {
        TimeDelta::zero()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn availability(&self) -> StoreAvailability {
        self.availability.clone()
    }

    async fn read_page(
        &self,
        kind: RecordKind,
        range: &TimeRange,
        page_token: Option<&str>,
    ) -> Result<RecordPage, StoreError> {
        if self.failing_kinds.contains(&kind) {
            return Err(StoreError::ReadFailed {
                kind: kind.to_string(),
                message: "injected failure".into(),
            });
        }

        let matching = self.matching(kind, range);
        let offset = match page_token {
            None => 0,
            Some(token) => token
                .parse::<usize>()
                .ok()
                .filter(|offset| *offset <= matching.len())
                .ok_or_else(|| StoreError::InvalidPageToken(token.to_string()))?,
        };

        let end = (offset + self.page_size).min(matching.len());
        let records = matching[offset..end].iter().map(|r| (*r).clone()).collect();
        let next_token = (end < matching.len()).then(|| end.to_string());

        debug!(kind = %kind, offset, end, total = matching.len(), "served record page");

        Ok(RecordPage {
            records,
            next_token,
        })
    }

    async fn aggregate(
        &self,
        metric: AggregateMetric,
        range: &TimeRange,
    ) -> Result<Option<AggregateValue>, StoreError> {
        self.check_metric(metric)?;

        let value = match metric {
            AggregateMetric::StepsTotal => {
                let (n, total) = self.steps_starting_in(range);
                (n > 0).then_some(AggregateValue::Count(total))
            }
            AggregateMetric::SleepDurationTotal => {
                let (n, total) = self.sleep_within(range);
                (n > 0).then_some(AggregateValue::Duration(total))
            }
        };
        Ok(value)
    }

    async fn aggregate_by_day(
        &self,
        metric: AggregateMetric,
        days: &[TimeRange],
    ) -> Result<Vec<DailyAggregate>, StoreError> {
        self.check_metric(metric)?;

        Ok(days
            .iter()
            .map(|day| DailyAggregate {
                start: day.start,
                end: day.end,
                value: match metric {
                    AggregateMetric::StepsTotal => {
                        AggregateValue::Count(self.steps_starting_in(day).1)
                    }
                    AggregateMetric::SleepDurationTotal => {
                        AggregateValue::Duration(self.sleep_within(day).1)
                    }
                },
            })
            .collect())
    }
}
