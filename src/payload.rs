//! Sync payload construction
//!
//! Turns raw record lists for the sync lookback windows into the normalized
//! `SyncPayload`. Body measurements and blood pressure go through the
//! correlator, sleep through the interval merger, and daily step buckets are
//! keyed by local calendar date.

use crate::config::LookbackWindows;
use crate::correlator::{correlate, enrich_with_pulse};
use crate::error::StoreError;
use crate::merger::merge_intervals;
use crate::reader;
use crate::store::RecordStore;
use crate::types::{
    format_instant, BloodPressureEntry, BloodPressureSample, BodyFatSample, BodyMeasurementEntry,
    HeartRateSample, SleepInterval, SleepSessionEntry, StepsBucket, StepsEntry, SyncPayload,
    TimeRange, WeightSample,
};
use chrono::{DateTime, TimeZone, Utc};
use tracing::{debug, warn};

/// Record lists feeding one sync payload
///
/// A list that failed to load is already empty here.
#[derive(Debug, Clone, Default)]
pub struct SyncInputs {
    pub weights: Vec<WeightSample>,
    pub body_fat: Vec<BodyFatSample>,
    pub blood_pressure: Vec<BloodPressureSample>,
    pub heart_rate: Vec<HeartRateSample>,
    pub sleep: Vec<SleepInterval>,
    pub steps: Vec<StepsBucket>,
}

impl SyncInputs {
    /// Read every sync input from `store`, concurrently
    ///
    /// Daily steps are split at midnights in `tz`, which should be the zone
    /// the payload is later built in.
    pub async fn collect<Tz: TimeZone>(
        store: &dyn RecordStore,
        now: DateTime<Utc>,
        windows: &LookbackWindows,
        tz: &Tz,
    ) -> Self {
        let body = TimeRange::trailing_days(now, windows.sync_body_days);
        let activity = TimeRange::trailing_days(now, windows.sync_activity_days);

        let (weights, body_fat, blood_pressure, heart_rate, sleep, steps) = tokio::join!(
            reader::read_weights(store, &body),
            reader::read_body_fat(store, &body),
            reader::read_blood_pressure(store, &body),
            reader::read_heart_rate_samples(store, &activity),
            reader::read_sleep_intervals(store, &activity),
            reader::read_daily_steps(store, &activity, tz),
        );

        Self {
            weights: or_empty("weight", weights),
            body_fat: or_empty("body_fat", body_fat),
            blood_pressure: or_empty("blood_pressure", blood_pressure),
            heart_rate: or_empty("heart_rate", heart_rate),
            sleep: or_empty("sleep", sleep),
            steps: or_empty("steps", steps),
        }
    }
}

fn or_empty<T>(list: &'static str, result: Result<Vec<T>, StoreError>) -> Vec<T> {
    result.unwrap_or_else(|e| {
        warn!(list, error = %e, "record list failed to load, syncing it as empty");
        Vec::new()
    })
}

/// Payload builder
///
/// `tz` is the zone whose calendar dates label the daily step buckets.
#[derive(Debug, Clone)]
pub struct PayloadBuilder<Tz: TimeZone> {
    tz: Tz,
}

impl<Tz: TimeZone> PayloadBuilder<Tz> {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn timezone(&self) -> &Tz {
        &self.tz
    }

    pub fn build(&self, inputs: &SyncInputs) -> SyncPayload {
        let payload = SyncPayload {
            body_measurements: body_measurements(&inputs.weights, &inputs.body_fat),
            blood_pressure: blood_pressure(&inputs.blood_pressure, &inputs.heart_rate),
            sleep_sessions: sleep_sessions(&inputs.sleep),
            steps: self.steps(&inputs.steps),
        };

        debug!(
            body_measurements = payload.body_measurements.len(),
            blood_pressure = payload.blood_pressure.len(),
            sleep_sessions = payload.sleep_sessions.len(),
            steps = payload.steps.len(),
            "payload built"
        );
        payload
    }

    /// Daily buckets labelled by local date, ascending, duplicates kept
    fn steps(&self, buckets: &[StepsBucket]) -> Vec<StepsEntry> {
        let mut entries: Vec<StepsEntry> = buckets
            .iter()
            .map(|bucket| StepsEntry {
                date: bucket
                    .start
                    .with_timezone(&self.tz)
                    .date_naive()
                    .format("%Y-%m-%d")
                    .to_string(),
                count: bucket.count,
            })
            .collect();
        entries.sort_by(|a, b| a.date.cmp(&b.date));
        entries
    }
}

fn body_measurements(
    weights: &[WeightSample],
    body_fat: &[BodyFatSample],
) -> Vec<BodyMeasurementEntry> {
    correlate(weights, body_fat)
        .into_iter()
        .map(|row| BodyMeasurementEntry {
            recorded_at: format_instant(row.bucket),
            weight_kg: row.left.map(|w| w.value_kg),
            body_fat_percent: row.right.map(|f| f.percentage),
        })
        .collect()
}

fn blood_pressure(
    readings: &[BloodPressureSample],
    heart_rate: &[HeartRateSample],
) -> Vec<BloodPressureEntry> {
    enrich_with_pulse(readings, heart_rate)
        .into_iter()
        .map(|row| BloodPressureEntry {
            recorded_at: format_instant(row.reading.timestamp),
            // truncation toward zero, not rounding
            systolic: row.reading.systolic_mmhg as i64,
            diastolic: row.reading.diastolic_mmhg as i64,
            pulse: row.pulse,
        })
        .collect()
}

fn sleep_sessions(intervals: &[SleepInterval]) -> Vec<SleepSessionEntry> {
    merge_intervals(intervals)
        .into_iter()
        .map(|interval| SleepSessionEntry {
            start_time: format_instant(interval.start()),
            end_time: format_instant(interval.end()),
            duration_hours: interval.duration_minutes() as f64 / 60.0,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{AggregateMetric, InMemoryRecordStore};
    use crate::types::{
        BloodPressureRecord, DeviceRecord, HeartRateReading, HeartRateRecord, RecordKind,
        SleepSessionRecord, StepsRecord, WeightRecord,
    };
    use chrono::{FixedOffset, TimeDelta};
    use pretty_assertions::assert_eq;

    fn t(d: u32, h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, h, m, s).unwrap()
    }

    fn utc_builder() -> PayloadBuilder<Utc> {
        PayloadBuilder::new(Utc)
    }

    fn day_bucket(start: DateTime<Utc>, count: i64) -> StepsBucket {
        StepsBucket {
            start,
            end: start + TimeDelta::days(1),
            count,
        }
    }

    #[test]
    fn test_body_measurements_share_minute() {
        let inputs = SyncInputs {
            weights: vec![WeightSample {
                value_kg: 80.5,
                timestamp: t(15, 8, 0, 15),
            }],
            body_fat: vec![BodyFatSample {
                percentage: 21.3,
                timestamp: t(15, 8, 0, 45),
            }],
            ..Default::default()
        };

        let payload = utc_builder().build(&inputs);

        assert_eq!(
            payload.body_measurements,
            vec![BodyMeasurementEntry {
                recorded_at: "2024-01-15T08:00:00Z".to_string(),
                weight_kg: Some(80.5),
                body_fat_percent: Some(21.3),
            }]
        );
    }

    #[test]
    fn test_blood_pressure_truncated_with_pulse() {
        let inputs = SyncInputs {
            blood_pressure: vec![
                BloodPressureSample {
                    systolic_mmhg: 120.9,
                    diastolic_mmhg: 79.6,
                    timestamp: t(15, 8, 0, 20),
                },
                BloodPressureSample {
                    systolic_mmhg: 131.0,
                    diastolic_mmhg: 85.2,
                    timestamp: t(15, 9, 30, 0),
                },
            ],
            heart_rate: vec![
                HeartRateSample {
                    bpm: 64,
                    timestamp: t(15, 8, 0, 40),
                },
                HeartRateSample {
                    bpm: 88,
                    timestamp: t(15, 11, 0, 0),
                },
            ],
            ..Default::default()
        };

        let payload = utc_builder().build(&inputs);

        assert_eq!(
            payload.blood_pressure,
            vec![
                BloodPressureEntry {
                    recorded_at: "2024-01-15T08:00:20Z".to_string(),
                    systolic: 120,
                    diastolic: 79,
                    pulse: Some(64),
                },
                BloodPressureEntry {
                    recorded_at: "2024-01-15T09:30:00Z".to_string(),
                    systolic: 131,
                    diastolic: 85,
                    pulse: None,
                },
            ]
        );
    }

    #[test]
    fn test_sleep_sessions_merged_with_fractional_hours() {
        let inputs = SyncInputs {
            sleep: vec![
                SleepInterval::new(t(15, 1, 0, 0), t(15, 3, 0, 0)).unwrap(),
                SleepInterval::new(t(15, 2, 30, 0), t(15, 4, 0, 0)).unwrap(),
                SleepInterval::new(t(15, 13, 0, 0), t(15, 13, 45, 0)).unwrap(),
            ],
            ..Default::default()
        };

        let payload = utc_builder().build(&inputs);

        assert_eq!(
            payload.sleep_sessions,
            vec![
                SleepSessionEntry {
                    start_time: "2024-01-15T01:00:00Z".to_string(),
                    end_time: "2024-01-15T04:00:00Z".to_string(),
                    duration_hours: 3.0,
                },
                SleepSessionEntry {
                    start_time: "2024-01-15T13:00:00Z".to_string(),
                    end_time: "2024-01-15T13:45:00Z".to_string(),
                    duration_hours: 0.75,
                },
            ]
        );
    }

    #[test]
    fn test_steps_sorted_by_local_date() {
        // Monday 2024-01-15 .. Sunday 2024-01-21, supplied in reverse
        let inputs = SyncInputs {
            steps: (15..=21)
                .rev()
                .map(|d| day_bucket(t(d, 0, 0, 0), i64::from(d) * 100))
                .collect(),
            ..Default::default()
        };

        let payload = utc_builder().build(&inputs);
        let dates: Vec<_> = payload.steps.iter().map(|s| s.date.as_str()).collect();

        assert_eq!(
            dates,
            vec![
                "2024-01-15",
                "2024-01-16",
                "2024-01-17",
                "2024-01-18",
                "2024-01-19",
                "2024-01-20",
                "2024-01-21",
            ]
        );
        assert_eq!(payload.steps[0].count, 1500);
    }

    #[test]
    fn test_steps_date_follows_timezone() {
        let inputs = SyncInputs {
            steps: vec![day_bucket(t(15, 23, 0, 0), 4000)],
            ..Default::default()
        };
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();

        let payload = PayloadBuilder::new(plus_two).build(&inputs);
        assert_eq!(payload.steps[0].date, "2024-01-16");
    }

    #[test]
    fn test_duplicate_step_dates_are_kept() {
        let inputs = SyncInputs {
            steps: vec![
                day_bucket(t(16, 0, 0, 0), 10),
                day_bucket(t(15, 12, 0, 0), 20),
                day_bucket(t(15, 0, 0, 0), 30),
            ],
            ..Default::default()
        };

        let payload = utc_builder().build(&inputs);

        assert_eq!(
            payload.steps,
            vec![
                StepsEntry {
                    date: "2024-01-15".to_string(),
                    count: 20,
                },
                StepsEntry {
                    date: "2024-01-15".to_string(),
                    count: 30,
                },
                StepsEntry {
                    date: "2024-01-16".to_string(),
                    count: 10,
                },
            ]
        );
    }

    #[test]
    fn test_empty_inputs_give_empty_payload() {
        let payload = utc_builder().build(&SyncInputs::default());
        assert!(payload.is_empty());
    }

    #[tokio::test]
    async fn test_failed_lists_sync_as_empty() {
        let now = t(31, 12, 0, 0);
        let store = InMemoryRecordStore::new(vec![
            DeviceRecord::Weight(WeightRecord {
                time: t(20, 7, 0, 0),
                weight_kg: 78.2,
            }),
            DeviceRecord::BloodPressure(BloodPressureRecord {
                time: t(30, 7, 5, 10),
                systolic_mmhg: 118.4,
                diastolic_mmhg: 77.9,
            }),
            DeviceRecord::HeartRate(HeartRateRecord {
                start_time: t(30, 7, 0, 0),
                end_time: t(30, 7, 10, 0),
                samples: vec![HeartRateReading {
                    time: t(30, 7, 5, 50),
                    beats_per_minute: 71,
                }],
            }),
            DeviceRecord::SleepSession(SleepSessionRecord {
                start_time: t(29, 23, 0, 0),
                end_time: t(30, 6, 30, 0),
            }),
            DeviceRecord::Steps(StepsRecord {
                start_time: t(30, 9, 0, 0),
                end_time: t(30, 10, 0, 0),
                count: 5000,
            }),
        ])
        .failing_kind(RecordKind::SleepSession)
        .failing_metric(AggregateMetric::StepsTotal);

        let inputs = SyncInputs::collect(&store, now, &LookbackWindows::default(), &Utc).await;
        let payload = utc_builder().build(&inputs);

        assert_eq!(payload.body_measurements.len(), 1);
        assert_eq!(payload.body_measurements[0].body_fat_percent, None);
        assert_eq!(payload.blood_pressure[0].pulse, Some(71));
        assert!(payload.sleep_sessions.is_empty());
        assert!(payload.steps.is_empty());
    }

    fn morning_steps_store() -> InMemoryRecordStore {
        InMemoryRecordStore::new(vec![DeviceRecord::Steps(StepsRecord {
            start_time: t(30, 9, 0, 0),
            end_time: t(30, 10, 0, 0),
            count: 5000,
        })])
    }

    #[tokio::test]
    async fn test_collected_steps_keep_their_calendar_date() {
        let now = t(31, 12, 0, 0);
        let builder = utc_builder();

        let inputs = SyncInputs::collect(
            &morning_steps_store(),
            now,
            &LookbackWindows::default(),
            builder.timezone(),
        )
        .await;
        let payload = builder.build(&inputs);

        let dates: Vec<_> = payload.steps.iter().map(|s| s.date.as_str()).collect();
        assert_eq!(dates.first(), Some(&"2024-01-24"));
        assert_eq!(dates.last(), Some(&"2024-01-31"));
        assert_eq!(
            payload.steps.iter().find(|s| s.count == 5000),
            Some(&StepsEntry {
                date: "2024-01-30".to_string(),
                count: 5000,
            })
        );
    }

    #[tokio::test]
    async fn test_collected_steps_use_local_midnights() {
        let now = t(31, 12, 0, 0);
        let minus_five = FixedOffset::west_opt(5 * 3600).unwrap();
        let builder = PayloadBuilder::new(minus_five);

        let inputs = SyncInputs::collect(
            &morning_steps_store(),
            now,
            &LookbackWindows::default(),
            builder.timezone(),
        )
        .await;
        let payload = builder.build(&inputs);

        let labelled: Vec<_> = payload
            .steps
            .iter()
            .filter(|s| s.count > 0)
            .map(|s| s.date.as_str())
            .collect();
        assert_eq!(labelled, vec!["2024-01-30"]);
    }
}
