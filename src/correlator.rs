//! Stream correlation
//!
//! Joins two independently sampled streams on a one-minute correlation key.
//! Inputs are stably sorted by timestamp first, so when several samples of the
//! same kind fall in one minute the latest one wins (exact timestamp ties keep
//! input order, last wins).

use crate::types::{BloodPressureSample, HeartRateSample, Timestamped};
use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use std::collections::BTreeMap;

/// Round a timestamp down to its minute
pub fn minute_bucket(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant
        .duration_trunc(TimeDelta::minutes(1))
        .unwrap_or(instant)
}

/// One row per distinct minute; either side may be missing
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelatedRow<L, R> {
    pub bucket: DateTime<Utc>,
    pub left: Option<L>,
    pub right: Option<R>,
}

fn sorted_by_time<T: Timestamped + Clone>(samples: &[T]) -> Vec<T> {
    let mut sorted = samples.to_vec();
    sorted.sort_by_key(|sample| sample.timestamp());
    sorted
}

/// Latest sample per minute bucket
fn last_per_bucket<T: Timestamped + Clone>(samples: &[T]) -> BTreeMap<DateTime<Utc>, T> {
    sorted_by_time(samples)
        .into_iter()
        .map(|sample| (minute_bucket(sample.timestamp()), sample))
        .collect()
}

/// Full outer join of two streams on the minute bucket, ascending by bucket
pub fn correlate<L, R>(left: &[L], right: &[R]) -> Vec<CorrelatedRow<L, R>>
where
    L: Timestamped + Clone,
    R: Timestamped + Clone,
{
    let mut rows: BTreeMap<DateTime<Utc>, CorrelatedRow<L, R>> = BTreeMap::new();

    for (bucket, sample) in last_per_bucket(left) {
        rows.entry(bucket)
            .or_insert_with(|| empty_row(bucket))
            .left = Some(sample);
    }
    for (bucket, sample) in last_per_bucket(right) {
        rows.entry(bucket)
            .or_insert_with(|| empty_row(bucket))
            .right = Some(sample);
    }

    rows.into_values().collect()
}

fn empty_row<L, R>(bucket: DateTime<Utc>) -> CorrelatedRow<L, R> {
    CorrelatedRow {
        bucket,
        left: None,
        right: None,
    }
}

/// Blood pressure reading with the pulse measured in the same minute
#[derive(Debug, Clone, PartialEq)]
pub struct PulseEnrichedReading {
    pub reading: BloodPressureSample,
    pub pulse: Option<i64>,
}

/// Attach same-minute heart rate to blood pressure readings.
///
/// Blood pressure is the primary series: every minute holding a reading
/// yields a row, with or without a pulse. Heart rate samples in minutes
/// without a blood pressure reading are dropped.
pub fn enrich_with_pulse(
    blood_pressure: &[BloodPressureSample],
    heart_rate: &[HeartRateSample],
) -> Vec<PulseEnrichedReading> {
    let pulses: BTreeMap<DateTime<Utc>, i64> = last_per_bucket(heart_rate)
        .into_iter()
        .map(|(bucket, sample)| (bucket, sample.bpm))
        .collect();

    last_per_bucket(blood_pressure)
        .into_iter()
        .map(|(bucket, reading)| PulseEnrichedReading {
            reading,
            pulse: pulses.get(&bucket).copied(),
        })
        .collect()
}
