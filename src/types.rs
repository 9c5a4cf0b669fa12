//! Core types for the vitalsync engine
//!
//! This module defines the data structures that flow through each stage of the
//! engine: raw device records as returned by a record store, normalized samples
//! consumed by the merger and correlator, and the two outputs (the on-screen
//! summary and the outbound sync payload).

use chrono::{DateTime, NaiveDate, SecondsFormat, TimeDelta, TimeZone, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Time ranges
// ============================================================================

/// Half-open time range `[start, end)` used for store queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Trailing lookback window ending at `now`
    pub fn trailing_days(now: DateTime<Utc>, days: i64) -> Self {
        Self {
            start: now - TimeDelta::days(days),
            end: now,
        }
    }

    /// Whether a point in time falls inside the range
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    /// Whether an interval overlaps the range
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start < self.end && end > self.start
    }

    /// Split the range at local midnights in `tz`
    ///
    /// Each period covers one calendar day; the first and last are clipped to
    /// the range, so a window ending at noon yields a half day at each end.
    pub fn calendar_days<Tz: TimeZone>(&self, tz: &Tz) -> Vec<TimeRange> {
        let mut days = Vec::new();
        let mut cursor = self.start;
        while cursor < self.end {
            let next = cursor
                .with_timezone(tz)
                .date_naive()
                .succ_opt()
                .and_then(|date| local_midnight(tz, date))
                .filter(|midnight| *midnight > cursor)
                .map_or(self.end, |midnight| midnight.min(self.end));
            days.push(TimeRange::new(cursor, next));
            cursor = next;
        }
        days
    }
}

/// First instant of `date` in `tz`; skips forward an hour when midnight falls
/// in a DST gap
fn local_midnight<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> Option<DateTime<Utc>> {
    let midnight = date.and_hms_opt(0, 0, 0)?;
    tz.from_local_datetime(&midnight)
        .earliest()
        .or_else(|| {
            tz.from_local_datetime(&(midnight + TimeDelta::hours(1)))
                .earliest()
        })
        .map(|instant| instant.with_timezone(&Utc))
}

// ============================================================================
// Raw device records (record store boundary)
// ============================================================================

/// The six record kinds a record store can be asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Weight,
    BodyFat,
    BloodPressure,
    HeartRate,
    SleepSession,
    Steps,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Weight => "weight",
            RecordKind::BodyFat => "body_fat",
            RecordKind::BloodPressure => "blood_pressure",
            RecordKind::HeartRate => "heart_rate",
            RecordKind::SleepSession => "sleep_session",
            RecordKind::Steps => "steps",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body weight reading from the device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightRecord {
    pub time: DateTime<Utc>,
    pub weight_kg: f64,
}

/// Body fat reading from the device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyFatRecord {
    pub time: DateTime<Utc>,
    pub percentage: f64,
}

/// Blood pressure reading from the device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BloodPressureRecord {
    pub time: DateTime<Utc>,
    pub systolic_mmhg: f64,
    pub diastolic_mmhg: f64,
}

/// A single beat-rate reading carried inside a [`HeartRateRecord`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartRateReading {
    pub time: DateTime<Utc>,
    pub beats_per_minute: i64,
}

/// Heart rate series record
///
/// One record spans `[start_time, end_time]` and carries many readings; each
/// reading becomes one [`HeartRateSample`] through [`HeartRateRecord::samples`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartRateRecord {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub samples: Vec<HeartRateReading>,
}

impl HeartRateRecord {
    /// Expand the record into its per-reading samples, in stored order
    pub fn samples(&self) -> impl Iterator<Item = HeartRateSample> + '_ {
        self.samples.iter().map(|reading| HeartRateSample {
            bpm: reading.beats_per_minute,
            timestamp: reading.time,
        })
    }
}

/// Sleep session as stored on the device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepSessionRecord {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Step count over an interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepsRecord {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub count: i64,
}

/// Any record a store can return, tagged by kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeviceRecord {
    Weight(WeightRecord),
    BodyFat(BodyFatRecord),
    BloodPressure(BloodPressureRecord),
    HeartRate(HeartRateRecord),
    SleepSession(SleepSessionRecord),
    Steps(StepsRecord),
}

impl DeviceRecord {
    pub fn kind(&self) -> RecordKind {
        match self {
            DeviceRecord::Weight(_) => RecordKind::Weight,
            DeviceRecord::BodyFat(_) => RecordKind::BodyFat,
            DeviceRecord::BloodPressure(_) => RecordKind::BloodPressure,
            DeviceRecord::HeartRate(_) => RecordKind::HeartRate,
            DeviceRecord::SleepSession(_) => RecordKind::SleepSession,
            DeviceRecord::Steps(_) => RecordKind::Steps,
        }
    }

    /// Start and end of the span this record covers (equal for point records)
    pub fn span(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        match self {
            DeviceRecord::Weight(r) => (r.time, r.time),
            DeviceRecord::BodyFat(r) => (r.time, r.time),
            DeviceRecord::BloodPressure(r) => (r.time, r.time),
            DeviceRecord::HeartRate(r) => (r.start_time, r.end_time),
            DeviceRecord::SleepSession(r) => (r.start_time, r.end_time),
            DeviceRecord::Steps(r) => (r.start_time, r.end_time),
        }
    }

    /// Whether this is a point-in-time record rather than an interval
    pub fn is_instant(&self) -> bool {
        matches!(
            self,
            DeviceRecord::Weight(_) | DeviceRecord::BodyFat(_) | DeviceRecord::BloodPressure(_)
        )
    }
}

/// Binds a concrete record type to its [`RecordKind`]
pub trait TypedRecord: Sized {
    const KIND: RecordKind;

    /// Extract this record type from a tagged record, `None` on kind mismatch
    fn from_device_record(record: DeviceRecord) -> Option<Self>;
}

macro_rules! typed_record {
    ($ty:ty, $variant:ident) => {
        impl TypedRecord for $ty {
            const KIND: RecordKind = RecordKind::$variant;

            fn from_device_record(record: DeviceRecord) -> Option<Self> {
                match record {
                    DeviceRecord::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }
    };
}

typed_record!(WeightRecord, Weight);
typed_record!(BodyFatRecord, BodyFat);
typed_record!(BloodPressureRecord, BloodPressure);
typed_record!(HeartRateRecord, HeartRate);
typed_record!(SleepSessionRecord, SleepSession);
typed_record!(StepsRecord, Steps);

// ============================================================================
// Normalized samples
// ============================================================================

/// Anything carrying the instant it was measured at
pub trait Timestamped {
    fn timestamp(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightSample {
    pub value_kg: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyFatSample {
    pub percentage: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BloodPressureSample {
    pub systolic_mmhg: f64,
    pub diastolic_mmhg: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartRateSample {
    pub bpm: i64,
    pub timestamp: DateTime<Utc>,
}

impl Timestamped for WeightSample {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl Timestamped for BodyFatSample {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl Timestamped for BloodPressureSample {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl Timestamped for HeartRateSample {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl From<WeightRecord> for WeightSample {
    fn from(record: WeightRecord) -> Self {
        Self {
            value_kg: record.weight_kg,
            timestamp: record.time,
        }
    }
}

impl From<BodyFatRecord> for BodyFatSample {
    fn from(record: BodyFatRecord) -> Self {
        Self {
            percentage: record.percentage,
            timestamp: record.time,
        }
    }
}

impl From<BloodPressureRecord> for BloodPressureSample {
    fn from(record: BloodPressureRecord) -> Self {
        Self {
            systolic_mmhg: record.systolic_mmhg,
            diastolic_mmhg: record.diastolic_mmhg,
            timestamp: record.time,
        }
    }
}

/// Closed sleep interval with `end >= start`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SleepInterval {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl SleepInterval {
    /// Build an interval, rejecting one that ends before it starts
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (end >= start).then_some(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Whole minutes between start and end
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

impl TryFrom<SleepSessionRecord> for SleepInterval {
    type Error = SleepSessionRecord;

    fn try_from(record: SleepSessionRecord) -> Result<Self, Self::Error> {
        Self::new(record.start_time, record.end_time).ok_or(record)
    }
}

/// Step total for one daily period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepsBucket {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub count: i64,
}

// ============================================================================
// Outputs
// ============================================================================

/// Read-only snapshot shown on screen
///
/// Every optional field is `None` when no data exists in its lookback window,
/// which is distinct from a measured zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSummary {
    pub latest_weight_kg: Option<f64>,
    pub latest_body_fat_percent: Option<f64>,
    pub latest_systolic_mmhg: Option<f64>,
    pub latest_diastolic_mmhg: Option<f64>,
    pub latest_heart_rate_bpm: Option<i64>,
    pub total_steps_7d: Option<i64>,
    pub total_sleep_minutes_7d: Option<i64>,
    pub generated_at: DateTime<Utc>,
}

/// Correlated weight/body-fat row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyMeasurementEntry {
    pub recorded_at: String,
    pub weight_kg: Option<f64>,
    pub body_fat_percent: Option<f64>,
}

/// Blood pressure row, optionally enriched with a same-minute pulse
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BloodPressureEntry {
    pub recorded_at: String,
    pub systolic: i64,
    pub diastolic: i64,
    pub pulse: Option<i64>,
}

/// Merged sleep session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepSessionEntry {
    pub start_time: String,
    pub end_time: String,
    pub duration_hours: f64,
}

/// Step count for one calendar date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepsEntry {
    /// Local calendar date (YYYY-MM-DD)
    pub date: String,
    pub count: i64,
}

/// Normalized outbound payload sent to the sync endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncPayload {
    pub body_measurements: Vec<BodyMeasurementEntry>,
    pub blood_pressure: Vec<BloodPressureEntry>,
    pub sleep_sessions: Vec<SleepSessionEntry>,
    pub steps: Vec<StepsEntry>,
}

impl SyncPayload {
    pub fn is_empty(&self) -> bool {
        self.body_measurements.is_empty()
            && self.blood_pressure.is_empty()
            && self.sleep_sessions.is_empty()
            && self.steps.is_empty()
    }
}

/// Render an instant as RFC 3339 UTC (`Z` suffix, sub-seconds only when present)
pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, h, m, s).unwrap()
    }

    #[test]
    fn test_heart_rate_record_expands_to_samples() {
        let record = HeartRateRecord {
            start_time: at(8, 0, 0),
            end_time: at(8, 5, 0),
            samples: vec![
                HeartRateReading {
                    time: at(8, 1, 0),
                    beats_per_minute: 61,
                },
                HeartRateReading {
                    time: at(8, 2, 0),
                    beats_per_minute: 64,
                },
            ],
        };

        let samples: Vec<_> = record.samples().collect();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].bpm, 64);
        assert_eq!(samples[1].timestamp, at(8, 2, 0));
    }

    #[test]
    fn test_sleep_interval_rejects_inverted_range() {
        assert!(SleepInterval::new(at(3, 0, 0), at(1, 0, 0)).is_none());

        let zero = SleepInterval::new(at(1, 0, 0), at(1, 0, 0)).unwrap();
        assert_eq!(zero.duration_minutes(), 0);

        let night = SleepInterval::new(at(1, 0, 0), at(4, 30, 0)).unwrap();
        assert_eq!(night.duration_minutes(), 210);
    }

    #[test]
    fn test_device_record_json_is_tagged_by_kind() {
        let json = r#"{"kind": "blood_pressure", "time": "2024-01-15T08:00:15Z", "systolic_mmhg": 121.6, "diastolic_mmhg": 79.2}"#;
        let record: DeviceRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.kind(), RecordKind::BloodPressure);
        assert!(record.is_instant());
        let bp = BloodPressureRecord::from_device_record(record).unwrap();
        assert_eq!(bp.systolic_mmhg, 121.6);
    }

    #[test]
    fn test_typed_record_kind_mismatch() {
        let record = DeviceRecord::Weight(WeightRecord {
            time: at(8, 0, 0),
            weight_kg: 80.0,
        });
        assert!(BodyFatRecord::from_device_record(record).is_none());
    }

    #[test]
    fn test_format_instant() {
        assert_eq!(format_instant(at(8, 0, 0)), "2024-01-15T08:00:00Z");
        let precise = at(8, 0, 15) + TimeDelta::milliseconds(250);
        assert_eq!(format_instant(precise), "2024-01-15T08:00:15.250Z");
    }

    #[test]
    fn test_time_range_membership() {
        let range = TimeRange::new(at(0, 0, 0), at(12, 0, 0));
        assert!(range.contains(at(0, 0, 0)));
        assert!(!range.contains(at(12, 0, 0)));
        assert!(range.overlaps(at(11, 0, 0), at(13, 0, 0)));
        assert!(!range.overlaps(at(12, 0, 0), at(13, 0, 0)));
    }

    #[test]
    fn test_calendar_days_split_at_midnight_and_clip() {
        let start = Utc.with_ymd_and_hms(2024, 1, 28, 12, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 31, 12, 0, 0).unwrap();
        let days = TimeRange::new(start, end).calendar_days(&Utc);

        let bounds: Vec<_> = days.iter().map(|d| (d.start, d.end)).collect();
        assert_eq!(
            bounds,
            vec![
                (start, Utc.with_ymd_and_hms(2024, 1, 29, 0, 0, 0).unwrap()),
                (
                    Utc.with_ymd_and_hms(2024, 1, 29, 0, 0, 0).unwrap(),
                    Utc.with_ymd_and_hms(2024, 1, 30, 0, 0, 0).unwrap()
                ),
                (
                    Utc.with_ymd_and_hms(2024, 1, 30, 0, 0, 0).unwrap(),
                    Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap()
                ),
                (Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap(), end),
            ]
        );
    }

    #[test]
    fn test_calendar_days_follow_timezone() {
        // local midnight at UTC+02:00 is 22:00 UTC the previous day
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let start = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 16, 12, 0, 0).unwrap();
        let days = TimeRange::new(start, end).calendar_days(&plus_two);

        assert_eq!(days.len(), 2);
        assert_eq!(
            days[0].end,
            Utc.with_ymd_and_hms(2024, 1, 15, 22, 0, 0).unwrap()
        );
        assert_eq!(days[1].end, end);
    }

    #[test]
    fn test_calendar_days_empty_range() {
        assert!(TimeRange::new(at(8, 0, 0), at(8, 0, 0))
            .calendar_days(&Utc)
            .is_empty());
    }

    #[test]
    fn test_optional_payload_fields_serialize_as_null() {
        let entry = BloodPressureEntry {
            recorded_at: "2024-01-15T08:00:00Z".to_string(),
            systolic: 120,
            diastolic: 80,
            pulse: None,
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert!(value["pulse"].is_null());
    }
}
