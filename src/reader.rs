//! Paginated record reads
//!
//! Pages for a single record kind are fetched strictly in sequence: each
//! page's continuation token gates the next request and the loop ends when the
//! store returns no token. A token the store already handed out once ends the
//! read with `StalledPagination`, so a cycling store cannot loop forever.
//! Records accumulate in a local buffer, so dropping
//! the returned future stops further page requests and discards what was
//! already read.

use crate::error::StoreError;
use crate::store::{AggregateMetric, RecordStore};
use crate::types::{
    BloodPressureRecord, BloodPressureSample, BodyFatRecord, BodyFatSample, HeartRateRecord,
    HeartRateSample, SleepInterval, SleepSessionRecord, StepsBucket, TimeRange, TypedRecord,
    WeightRecord, WeightSample,
};
use chrono::TimeZone;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Read every record of type `R` in `range`, following continuation tokens
pub async fn read_all<R: TypedRecord>(
    store: &dyn RecordStore,
    range: &TimeRange,
) -> Result<Vec<R>, StoreError> {
    let kind = R::KIND;
    let mut records = Vec::new();
    let mut token: Option<String> = None;
    let mut sent: HashSet<String> = HashSet::new();
    let mut pages = 0usize;

    loop {
        let page = store.read_page(kind, range, token.as_deref()).await?;
        pages += 1;

        for record in page.records {
            let actual = record.kind();
            match R::from_device_record(record) {
                Some(typed) => records.push(typed),
                None => warn!(expected = %kind, actual = %actual, "skipping record of unexpected kind"),
            }
        }

        match page.next_token {
            Some(next) if !sent.insert(next.clone()) => {
                return Err(StoreError::StalledPagination {
                    kind: kind.to_string(),
                    token: next,
                });
            }
            Some(next) => token = Some(next),
            None => break,
        }
    }

    debug!(kind = %kind, pages, records = records.len(), "read complete");
    Ok(records)
}

pub async fn read_weights(
    store: &dyn RecordStore,
    range: &TimeRange,
) -> Result<Vec<WeightSample>, StoreError> {
    let records = read_all::<WeightRecord>(store, range).await?;
    Ok(records.into_iter().map(WeightSample::from).collect())
}

pub async fn read_body_fat(
    store: &dyn RecordStore,
    range: &TimeRange,
) -> Result<Vec<BodyFatSample>, StoreError> {
    let records = read_all::<BodyFatRecord>(store, range).await?;
    Ok(records.into_iter().map(BodyFatSample::from).collect())
}

pub async fn read_blood_pressure(
    store: &dyn RecordStore,
    range: &TimeRange,
) -> Result<Vec<BloodPressureSample>, StoreError> {
    let records = read_all::<BloodPressureRecord>(store, range).await?;
    Ok(records.into_iter().map(BloodPressureSample::from).collect())
}

/// Heart rate records with their readings still grouped per record
pub async fn read_heart_rate_records(
    store: &dyn RecordStore,
    range: &TimeRange,
) -> Result<Vec<HeartRateRecord>, StoreError> {
    read_all::<HeartRateRecord>(store, range).await
}

/// Heart rate readings expanded to one sample per reading
pub async fn read_heart_rate_samples(
    store: &dyn RecordStore,
    range: &TimeRange,
) -> Result<Vec<HeartRateSample>, StoreError> {
    let records = read_heart_rate_records(store, range).await?;
    Ok(records.iter().flat_map(HeartRateRecord::samples).collect())
}

/// Sleep sessions as intervals; sessions ending before they start are dropped
pub async fn read_sleep_intervals(
    store: &dyn RecordStore,
    range: &TimeRange,
) -> Result<Vec<SleepInterval>, StoreError> {
    let records = read_all::<SleepSessionRecord>(store, range).await?;
    let intervals = records
        .into_iter()
        .filter_map(|record| match SleepInterval::try_from(record) {
            Ok(interval) => Some(interval),
            Err(bad) => {
                warn!(start = %bad.start_time, end = %bad.end_time, "dropping inverted sleep session");
                None
            }
        })
        .collect();
    Ok(intervals)
}

/// One step bucket per calendar day of `range` in `tz`
pub async fn read_daily_steps<Tz: TimeZone>(
    store: &dyn RecordStore,
    range: &TimeRange,
    tz: &Tz,
) -> Result<Vec<StepsBucket>, StoreError> {
    let days = range.calendar_days(tz);
    let daily = store
        .aggregate_by_day(AggregateMetric::StepsTotal, &days)
        .await?;
    Ok(daily
        .into_iter()
        .filter_map(|day| {
            day.value.as_count().map(|count| StepsBucket {
                start: day.start,
                end: day.end,
                count,
            })
        })
        .collect())
}

/// Total steps over the range, `None` when the store has no data
pub async fn read_total_steps(
    store: &dyn RecordStore,
    range: &TimeRange,
) -> Result<Option<i64>, StoreError> {
    let value = store.aggregate(AggregateMetric::StepsTotal, range).await?;
    Ok(value.and_then(|v| v.as_count()))
}

/// Total sleep minutes over the range, `None` when the store has no data
pub async fn read_total_sleep_minutes(
    store: &dyn RecordStore,
    range: &TimeRange,
) -> Result<Option<i64>, StoreError> {
    let value = store
        .aggregate(AggregateMetric::SleepDurationTotal, range)
        .await?;
    Ok(value.and_then(|v| v.as_minutes()))
}
