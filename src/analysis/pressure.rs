//! Zone-level pressure statistics for reporting.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::stats::{group_by, Summary};
use crate::readings::PressureReading;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneStatistics {
    pub zone_name: String,
    pub zone_id: String,
    pub avg_pressure: f64,
    pub min_pressure: f64,
    pub max_pressure: f64,
    pub std_pressure: f64,
    pub num_sensors: usize,
}

/// Mean/min/max/std of pressure and distinct sensor count, per zone name.
pub fn zone_statistics(readings: &[PressureReading]) -> Vec<ZoneStatistics> {
    group_by(readings, |r| r.zone_name.as_str())
        .into_iter()
        .filter_map(|(name, rows)| {
            let s = Summary::from_values(rows.iter().map(|r| r.pressure_psi))?;
            let sensors: BTreeSet<&str> = rows.iter().map(|r| r.sensor_id.as_str()).collect();
            Some(ZoneStatistics {
                zone_name: name.to_string(),
                zone_id: rows[0].zone_id.clone(),
                avg_pressure: s.mean,
                min_pressure: s.min,
                max_pressure: s.max,
                std_pressure: s.std_dev,
                num_sensors: sensors.len(),
            })
        })
        .collect()
}

/// Start of the trailing `window` ending at `now`, clamped to the earliest
/// representable instant.
pub fn window_start(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    now.checked_sub_signed(window)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LowPressureZone {
    pub zone_name: String,
    pub zone_id: String,
    pub low_pressure_count: usize,
    pub avg_low_pressure: f64,
}

/// Readings below `threshold` within the trailing `window` before `now`,
/// counted and averaged per zone, most affected zone first.
pub fn low_pressure_zones(
    readings: &[PressureReading],
    threshold: f64,
    window: Duration,
    now: DateTime<Utc>,
) -> Vec<LowPressureZone> {
    let since = window_start(now, window);
    let low: Vec<&PressureReading> = readings
        .iter()
        .filter(|r| r.timestamp >= since && r.pressure_psi < threshold)
        .collect();

    let mut zones: Vec<LowPressureZone> = group_by(&low, |r| r.zone_name.as_str())
        .into_iter()
        .map(|(name, rows)| LowPressureZone {
            zone_name: name.to_string(),
            zone_id: rows[0].zone_id.clone(),
            low_pressure_count: rows.len(),
            avg_low_pressure: rows.iter().map(|r| r.pressure_psi).sum::<f64>() / rows.len() as f64,
        })
        .collect();

    // Stable: equal counts stay in zone-name order.
    zones.sort_by(|a, b| b.low_pressure_count.cmp(&a.low_pressure_count));
    zones
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyPressure {
    pub hour: u32,
    pub avg_pressure: f64,
}

/// Mean pressure by hour of day across all zones.
pub fn hourly_pressure_patterns(readings: &[PressureReading]) -> Vec<HourlyPressure> {
    group_by(readings, |r| r.hour())
        .into_iter()
        .map(|(hour, rows)| HourlyPressure {
            hour,
            avg_pressure: rows.iter().map(|r| r.pressure_psi).sum::<f64>() / rows.len() as f64,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneComparison {
    pub zone_name: String,
    pub avg_pressure: f64,
    pub elevation: f64,
}

/// Zones ranked by mean pressure, highest first.
pub fn zone_comparison(readings: &[PressureReading]) -> Vec<ZoneComparison> {
    let mut zones: Vec<ZoneComparison> = group_by(readings, |r| r.zone_name.as_str())
        .into_iter()
        .map(|(name, rows)| ZoneComparison {
            zone_name: name.to_string(),
            avg_pressure: rows.iter().map(|r| r.pressure_psi).sum::<f64>() / rows.len() as f64,
            elevation: rows[0].elevation,
        })
        .collect();
    zones.sort_by(|a, b| b.avg_pressure.total_cmp(&a.avg_pressure));
    zones
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyTrend {
    pub date: NaiveDate,
    pub zone_name: String,
    pub avg_pressure: f64,
}

/// Mean pressure per (local calendar day, zone) over the trailing `days`.
pub fn recent_trends(
    readings: &[PressureReading],
    days: i64,
    now: DateTime<Utc>,
) -> Vec<DailyTrend> {
    let since = Duration::try_days(days)
        .map(|window| window_start(now, window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let mut groups: BTreeMap<(NaiveDate, &str), (f64, usize)> = BTreeMap::new();
    for r in readings.iter().filter(|r| r.timestamp >= since) {
        let entry = groups
            .entry((r.timestamp.date_naive(), r.zone_name.as_str()))
            .or_insert((0.0, 0));
        entry.0 += r.pressure_psi;
        entry.1 += 1;
    }

    groups
        .into_iter()
        .map(|((date, zone), (sum, n))| DailyTrend {
            date,
            zone_name: zone.to_string(),
            avg_pressure: sum / n as f64,
        })
        .collect()
}

/// Pressure bands used for the network-wide distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PressureBand {
    VeryLow,
    Low,
    Normal,
    Good,
    High,
}

impl PressureBand {
    pub const ALL: [PressureBand; 5] = [
        PressureBand::VeryLow,
        PressureBand::Low,
        PressureBand::Normal,
        PressureBand::Good,
        PressureBand::High,
    ];

    /// Right-closed bins: (0,30], (30,40], (40,50], (50,60], (60,100].
    pub fn of(psi: f64) -> Option<Self> {
        match psi {
            p if p <= 0.0 || p.is_nan() => None,
            p if p <= 30.0 => Some(PressureBand::VeryLow),
            p if p <= 40.0 => Some(PressureBand::Low),
            p if p <= 50.0 => Some(PressureBand::Normal),
            p if p <= 60.0 => Some(PressureBand::Good),
            p if p <= 100.0 => Some(PressureBand::High),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PressureBand::VeryLow => "Very Low (<30)",
            PressureBand::Low => "Low (30-40)",
            PressureBand::Normal => "Normal (40-50)",
            PressureBand::Good => "Good (50-60)",
            PressureBand::High => "High (>60)",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PressureBandCount {
    pub band: PressureBand,
    pub pressure_range: String,
    pub count: usize,
}

/// Reading counts per [`PressureBand`]; every band is listed, even when empty.
pub fn pressure_distribution(readings: &[PressureReading]) -> Vec<PressureBandCount> {
    let mut counts: BTreeMap<PressureBand, usize> = BTreeMap::new();
    for band in readings.iter().filter_map(|r| PressureBand::of(r.pressure_psi)) {
        *counts.entry(band).or_default() += 1;
    }
    PressureBand::ALL
        .iter()
        .map(|band| PressureBandCount {
            band: *band,
            pressure_range: band.label().to_string(),
            count: counts.get(band).copied().unwrap_or(0),
        })
        .collect()
}
