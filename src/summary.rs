//! Health summary
//!
//! Builds the read-only on-screen snapshot: the latest value per metric over
//! the metrics lookback window, plus step and sleep totals over the totals
//! window. Totals come from the store's aggregate queries, never recomputed
//! here. A failed query only blanks its own field.

use crate::config::LookbackWindows;
use crate::error::StoreError;
use crate::reader;
use crate::store::RecordStore;
use crate::types::{
    BloodPressureSample, BodyFatSample, HealthSummary, HeartRateRecord, TimeRange, Timestamped,
    WeightSample,
};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

/// Raw query results feeding one summary, failures included
#[derive(Debug)]
pub struct SummaryInputs {
    pub weights: Result<Vec<WeightSample>, StoreError>,
    pub body_fat: Result<Vec<BodyFatSample>, StoreError>,
    pub blood_pressure: Result<Vec<BloodPressureSample>, StoreError>,
    pub heart_rate: Result<Vec<HeartRateRecord>, StoreError>,
    pub total_steps: Result<Option<i64>, StoreError>,
    pub total_sleep_minutes: Result<Option<i64>, StoreError>,
}

impl SummaryInputs {
    /// Issue every summary query against `store`, concurrently
    pub async fn collect(
        store: &dyn RecordStore,
        now: DateTime<Utc>,
        windows: &LookbackWindows,
    ) -> Self {
        let metrics = TimeRange::trailing_days(now, windows.summary_metrics_days);
        let totals = TimeRange::trailing_days(now, windows.summary_totals_days);

        let (weights, body_fat, blood_pressure, heart_rate, total_steps, total_sleep_minutes) =
            tokio::join!(
                reader::read_weights(store, &metrics),
                reader::read_body_fat(store, &metrics),
                reader::read_blood_pressure(store, &metrics),
                reader::read_heart_rate_records(store, &metrics),
                reader::read_total_steps(store, &totals),
                reader::read_total_sleep_minutes(store, &totals),
            );

        Self {
            weights,
            body_fat,
            blood_pressure,
            heart_rate,
            total_steps,
            total_sleep_minutes,
        }
    }
}

/// Summary builder
pub struct SummaryBuilder;

impl SummaryBuilder {
    /// Reduce query results to a summary, isolating failures per metric
    pub fn build(inputs: SummaryInputs, generated_at: DateTime<Utc>) -> HealthSummary {
        let weights = isolate("weight", inputs.weights).unwrap_or_default();
        let body_fat = isolate("body_fat", inputs.body_fat).unwrap_or_default();
        let blood_pressure = isolate("blood_pressure", inputs.blood_pressure).unwrap_or_default();
        let heart_rate = isolate("heart_rate", inputs.heart_rate).unwrap_or_default();
        let total_steps = isolate("total_steps", inputs.total_steps).flatten();
        let total_sleep = isolate("total_sleep", inputs.total_sleep_minutes).flatten();

        let latest_bp = latest(&blood_pressure);

        let summary = HealthSummary {
            latest_weight_kg: latest(&weights).map(|w| w.value_kg),
            latest_body_fat_percent: latest(&body_fat).map(|f| f.percentage),
            latest_systolic_mmhg: latest_bp.map(|bp| bp.systolic_mmhg),
            latest_diastolic_mmhg: latest_bp.map(|bp| bp.diastolic_mmhg),
            latest_heart_rate_bpm: latest_heart_rate(&heart_rate),
            total_steps_7d: total_steps,
            total_sleep_minutes_7d: total_sleep,
            generated_at,
        };

        debug!(?summary, "summary built");
        summary
    }
}

fn isolate<T>(metric: &'static str, result: Result<T, StoreError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(metric, error = %e, "metric query failed, leaving it out of the summary");
            None
        }
    }
}

/// Sample with the greatest timestamp
pub fn latest<T: Timestamped>(samples: &[T]) -> Option<&T> {
    samples.iter().max_by_key(|sample| sample.timestamp())
}

/// Latest heart rate: last reading of the record that ends last
///
/// When that record carries no readings the result is `None`; earlier
/// records are not consulted.
pub fn latest_heart_rate(records: &[HeartRateRecord]) -> Option<i64> {
    records
        .iter()
        .max_by_key(|record| record.end_time)
        .and_then(|record| record.samples().max_by_key(|sample| sample.timestamp))
        .map(|sample| sample.bpm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{AggregateMetric, InMemoryRecordStore};
    use crate::types::{
        BloodPressureRecord, DeviceRecord, HeartRateReading, RecordKind, SleepSessionRecord,
        StepsRecord, WeightRecord,
    };
    use chrono::{TimeDelta, TimeZone};
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 31, 12, 0, 0).unwrap()
    }

    fn days_ago(days: i64, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 31, hour, 0, 0).unwrap() - TimeDelta::days(days)
    }

    fn empty_inputs() -> SummaryInputs {
        SummaryInputs {
            weights: Ok(Vec::new()),
            body_fat: Ok(Vec::new()),
            blood_pressure: Ok(Vec::new()),
            heart_rate: Ok(Vec::new()),
            total_steps: Ok(None),
            total_sleep_minutes: Ok(None),
        }
    }

    fn hr_record(end: DateTime<Utc>, readings: &[(i64, i64)]) -> HeartRateRecord {
        HeartRateRecord {
            start_time: end - TimeDelta::minutes(30),
            end_time: end,
            samples: readings
                .iter()
                .map(|(offset, bpm)| HeartRateReading {
                    time: end - TimeDelta::minutes(30) + TimeDelta::minutes(*offset),
                    beats_per_minute: *bpm,
                })
                .collect(),
        }
    }

    #[test]
    fn test_latest_picks_max_timestamp() {
        let weights = vec![
            WeightSample {
                value_kg: 82.0,
                timestamp: days_ago(1, 8),
            },
            WeightSample {
                value_kg: 80.0,
                timestamp: days_ago(0, 7),
            },
            WeightSample {
                value_kg: 81.0,
                timestamp: days_ago(3, 9),
            },
        ];
        assert_eq!(latest(&weights).map(|w| w.value_kg), Some(80.0));
        assert!(latest::<WeightSample>(&[]).is_none());
    }

    #[test]
    fn test_latest_heart_rate_uses_record_with_latest_end() {
        let records = vec![
            hr_record(days_ago(0, 10), &[(1, 58), (20, 61), (10, 99)]),
            hr_record(days_ago(1, 10), &[(5, 120)]),
        ];
        assert_eq!(latest_heart_rate(&records), Some(61));
    }

    #[test]
    fn test_latest_heart_rate_empty_latest_record() {
        let records = vec![hr_record(days_ago(0, 10), &[]), hr_record(days_ago(1, 10), &[(5, 70)])];
        assert_eq!(latest_heart_rate(&records), None);
    }

    #[test]
    fn test_missing_data_is_none_not_zero() {
        let summary = SummaryBuilder::build(empty_inputs(), now());

        assert_eq!(summary.latest_weight_kg, None);
        assert_eq!(summary.latest_heart_rate_bpm, None);
        assert_eq!(summary.total_steps_7d, None);
        assert_eq!(summary.generated_at, now());
    }

    #[test]
    fn test_failed_metric_is_isolated() {
        let mut inputs = empty_inputs();
        inputs.weights = Ok(vec![WeightSample {
            value_kg: 79.4,
            timestamp: days_ago(2, 7),
        }]);
        inputs.blood_pressure = Err(StoreError::ReadFailed {
            kind: "blood_pressure".into(),
            message: "permission revoked".into(),
        });
        inputs.total_steps = Ok(Some(0));

        let summary = SummaryBuilder::build(inputs, now());

        assert_eq!(summary.latest_weight_kg, Some(79.4));
        assert_eq!(summary.latest_systolic_mmhg, None);
        assert_eq!(summary.latest_diastolic_mmhg, None);
        assert_eq!(summary.total_steps_7d, Some(0));
    }

    #[tokio::test]
    async fn test_collect_from_store_respects_windows() {
        let records = vec![
            DeviceRecord::Weight(WeightRecord {
                time: days_ago(40, 8),
                weight_kg: 90.0,
            }),
            DeviceRecord::Weight(WeightRecord {
                time: days_ago(20, 8),
                weight_kg: 85.0,
            }),
            DeviceRecord::BloodPressure(BloodPressureRecord {
                time: days_ago(1, 8),
                systolic_mmhg: 122.0,
                diastolic_mmhg: 81.0,
            }),
            DeviceRecord::HeartRate(hr_record(days_ago(1, 9), &[(3, 66)])),
            DeviceRecord::Steps(StepsRecord {
                start_time: days_ago(2, 9),
                end_time: days_ago(2, 10),
                count: 3000,
            }),
            DeviceRecord::Steps(StepsRecord {
                start_time: days_ago(10, 9),
                end_time: days_ago(10, 10),
                count: 9999,
            }),
            DeviceRecord::SleepSession(SleepSessionRecord {
                start_time: days_ago(3, 1),
                end_time: days_ago(3, 8),
            }),
        ];
        let store = InMemoryRecordStore::new(records)
            .with_page_size(1)
            .failing_kind(RecordKind::BodyFat)
            .failing_metric(AggregateMetric::SleepDurationTotal);

        let inputs = SummaryInputs::collect(&store, now(), &LookbackWindows::default()).await;
        let summary = SummaryBuilder::build(inputs, now());

        assert_eq!(
            summary,
            HealthSummary {
                latest_weight_kg: Some(85.0),
                latest_body_fat_percent: None,
                latest_systolic_mmhg: Some(122.0),
                latest_diastolic_mmhg: Some(81.0),
                latest_heart_rate_bpm: Some(66),
                total_steps_7d: Some(3000),
                total_sleep_minutes_7d: None,
                generated_at: now(),
            }
        );
    }
}
