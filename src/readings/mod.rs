//! Sensor reading model and the reading-store seam.
//!
//! The engine only needs read access to three collections: the zone
//! reference data, pressure readings and flow readings. Everything
//! downstream works on an immutable [`ReadingSnapshot`] taken once per run.

use std::ops::RangeInclusive;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, FixedOffset, NaiveDateTime, Timelike, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

/// Reading timestamp as stamped by the feed. The offset is kept so that
/// hour-of-day is taken from the sensor's local wall clock.
pub type Timestamp = DateTime<FixedOffset>;

/// Parse a feed timestamp.
///
/// Accepts RFC 3339 with an offset, or a naive `YYYY-MM-DD HH:MM:SS[.f]`
/// wall-clock time (space or `T` separator), which is kept as-is at offset
/// `+00:00`.
pub fn parse_timestamp(text: &str) -> Result<Timestamp> {
    let text = text.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Ok(ts);
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
            return Ok(naive.and_utc().fixed_offset());
        }
    }
    bail!("unrecognised timestamp: {text:?}")
}

fn deserialize_timestamp<'de, D: Deserializer<'de>>(de: D) -> Result<Timestamp, D::Error> {
    let text = String::deserialize(de)?;
    parse_timestamp(&text).map_err(serde::de::Error::custom)
}

/// Hours of day (inclusive) treated as the low-demand night window.
pub const NIGHT_HOURS: RangeInclusive<u32> = 0..=5;

/// Whether an hour-of-day falls inside [`NIGHT_HOURS`].
pub fn is_night_hour(hour: u32) -> bool {
    NIGHT_HOURS.contains(&hour)
}

/// Static reference data for one distribution zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub zone_id: String,
    pub zone_name: String,
    pub population: u64,
    /// Meters above datum.
    pub elevation: f64,
    /// Nominal supply pressure (PSI).
    pub base_pressure: f64,
    pub num_sensors: u32,
}

/// On-disk zones file: `{"zones": [...]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZonesFile {
    pub zones: Vec<Zone>,
}

impl ZonesFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read zones file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse zones file: {}", path.display()))
    }
}

/// Read readings exported by the upstream feed.
///
/// Files ending in `.csv` are read as CSV with a header row; anything else
/// is read as a JSON array.
pub fn load_readings<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let is_csv = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if is_csv {
        return load_readings_csv(path);
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read readings file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse readings file: {}", path.display()))
}

/// Read a CSV export (`pressure_data.csv`, `flow_data.csv`).
pub fn load_readings_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open readings file: {}", path.display()))?;
    reader
        .deserialize()
        .enumerate()
        .map(|(i, row)| {
            row.with_context(|| format!("{}: bad record {}", path.display(), i + 1))
        })
        .collect()
}

/// Status tag attached to a pressure reading by the upstream feed.
///
/// Tags other than `normal` and `low` are kept as `Unknown` and flagged when
/// a snapshot is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum SensorStatus {
    Normal,
    Low,
    Unknown,
}

impl SensorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorStatus::Normal => "normal",
            SensorStatus::Low => "low",
            SensorStatus::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "normal" => SensorStatus::Normal,
            "low" => SensorStatus::Low,
            _ => SensorStatus::Unknown,
        }
    }
}

impl From<String> for SensorStatus {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

/// A single pressure sample from one sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PressureReading {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: Timestamp,
    pub zone_id: String,
    pub zone_name: String,
    pub sensor_id: String,
    pub pressure_psi: f64,
    pub elevation: f64,
    pub status: SensorStatus,
}

impl PressureReading {
    /// Local hour of day.
    pub fn hour(&self) -> u32 {
        self.timestamp.hour()
    }
}

/// A single zone-level flow sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowReading {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: Timestamp,
    pub zone_id: String,
    pub zone_name: String,
    pub flow_rate_lpm: f64,
    pub population: u64,
}

impl FlowReading {
    pub fn hour(&self) -> u32 {
        self.timestamp.hour()
    }
}

/// Read access to zones and readings.
///
/// Implementations must return readings that already satisfy the schema:
/// non-negative values and populated identifiers. The engine does not
/// re-validate them.
pub trait ReadingStore {
    fn zones(&self) -> Result<Vec<Zone>>;
    fn pressure_readings(&self) -> Result<Vec<PressureReading>>;
    fn flow_readings(&self) -> Result<Vec<FlowReading>>;
}

/// Immutable, in-memory view of a reading store for one detection pass.
#[derive(Debug, Clone, Default)]
pub struct ReadingSnapshot {
    zones: Vec<Zone>,
    pressure: Vec<PressureReading>,
    flow: Vec<FlowReading>,
}

impl ReadingSnapshot {
    pub fn new(zones: Vec<Zone>, pressure: Vec<PressureReading>, flow: Vec<FlowReading>) -> Self {
        Self {
            zones,
            pressure,
            flow,
        }
    }

    /// Pull every collection from `store` once.
    pub fn load<S: ReadingStore + ?Sized>(store: &S) -> Result<Self> {
        let zones = store.zones().context("failed to load zones")?;
        let pressure = store
            .pressure_readings()
            .context("failed to load pressure readings")?;
        let flow = store.flow_readings().context("failed to load flow readings")?;
        audit_readings(&pressure, &flow);
        tracing::info!(
            zones = zones.len(),
            pressure = pressure.len(),
            flow = flow.len(),
            "Loaded reading snapshot"
        );
        Ok(Self::new(zones, pressure, flow))
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn pressure(&self) -> &[PressureReading] {
        &self.pressure
    }

    pub fn flow(&self) -> &[FlowReading] {
        &self.flow
    }

    pub fn is_empty(&self) -> bool {
        self.pressure.is_empty() && self.flow.is_empty()
    }

    /// Latest instant across both reading collections.
    pub fn latest_timestamp(&self) -> Option<DateTime<Utc>> {
        let p = self.pressure.iter().map(|r| r.timestamp).max();
        let f = self.flow.iter().map(|r| r.timestamp).max();
        p.max(f).map(|ts| ts.with_timezone(&Utc))
    }
}

/// Counts of feed values the engine tolerates but does not trust.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedIssues {
    pub negative_pressure: usize,
    pub unknown_status: usize,
    pub negative_flow: usize,
}

impl FeedIssues {
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

/// Count and log suspect feed values. Readings are left untouched.
pub fn audit_readings(pressure: &[PressureReading], flow: &[FlowReading]) -> FeedIssues {
    let issues = FeedIssues {
        negative_pressure: pressure.iter().filter(|r| r.pressure_psi < 0.0).count(),
        unknown_status: pressure
            .iter()
            .filter(|r| r.status == SensorStatus::Unknown)
            .count(),
        negative_flow: flow.iter().filter(|r| r.flow_rate_lpm < 0.0).count(),
    };
    if !issues.is_clean() {
        warn!(
            negative_pressure = issues.negative_pressure,
            unknown_status = issues.unknown_status,
            negative_flow = issues.negative_flow,
            "Feed contains suspect readings"
        );
    }
    issues
}

impl ReadingStore for ReadingSnapshot {
    fn zones(&self) -> Result<Vec<Zone>> {
        Ok(self.zones.clone())
    }

    fn pressure_readings(&self) -> Result<Vec<PressureReading>> {
        Ok(self.pressure.clone())
    }

    fn flow_readings(&self) -> Result<Vec<FlowReading>> {
        Ok(self.flow.clone())
    }
}

/// Builders shared by unit tests across the crate.
#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::{Duration, TimeZone};

    /// Midnight, 1 March 2024 UTC, plus `day` days and `hour` hours.
    pub fn at(day: i64, hour: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
            + Duration::days(day)
            + Duration::hours(hour)
    }

    pub fn pressure(ts: DateTime<Utc>, zone: &str, sensor: &str, psi: f64) -> PressureReading {
        PressureReading {
            timestamp: ts.fixed_offset(),
            zone_id: zone.to_string(),
            zone_name: format!("{zone} Ward"),
            sensor_id: sensor.to_string(),
            pressure_psi: psi,
            elevation: 450.0,
            status: SensorStatus::Normal,
        }
    }

    pub fn flow(ts: DateTime<Utc>, zone: &str, lpm: f64) -> FlowReading {
        FlowReading {
            timestamp: ts.fixed_offset(),
            zone_id: zone.to_string(),
            zone_name: format!("{zone} Ward"),
            flow_rate_lpm: lpm,
            population: 50_000,
        }
    }

    pub fn zone(id: &str, population: u64, sensors: u32) -> Zone {
        Zone {
            zone_id: id.to_string(),
            zone_name: format!("{id} Ward"),
            population,
            elevation: 450.0,
            base_pressure: 50.0,
            num_sensors: sensors,
        }
    }
}
