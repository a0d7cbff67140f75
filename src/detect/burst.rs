//! Burst detection: abrupt reading-to-reading pressure drops per sensor.
//!
//! This is a change-point detector, not a distributional one. A gradual
//! decline spread over many samples never trips it; that signature belongs
//! to leak inference.

use tracing::debug;

use crate::analysis::stats::group_by;
use crate::detect::{BurstRecord, Severity};
use crate::readings::PressureReading;

pub const BURST_EVENT_TYPE: &str = "potential_burst";
pub const BURST_ACTION: &str = "Emergency response required";

/// Drops larger than this (PSI) are critical.
const CRITICAL_DROP_PSI: f64 = 25.0;

/// Emit a [`BurstRecord`] wherever consecutive readings of one sensor fall
/// by more than `pressure_drop_threshold` PSI.
///
/// Readings are re-sorted by timestamp (ties broken by value), so the result
/// does not depend on input order.
pub fn detect_burst_events(
    readings: &[PressureReading],
    pressure_drop_threshold: f64,
) -> Vec<BurstRecord> {
    let mut bursts = Vec::new();

    for (sensor_id, mut series) in group_by(readings, |r| r.sensor_id.as_str()) {
        series.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then(a.pressure_psi.total_cmp(&b.pressure_psi))
        });

        for pair in series.windows(2) {
            let (prev, cur) = (pair[0], pair[1]);
            let change = cur.pressure_psi - prev.pressure_psi;
            if change >= -pressure_drop_threshold {
                continue;
            }

            let drop = change.abs();
            debug!(sensor = %sensor_id, drop, at = %cur.timestamp, "Sudden pressure drop");

            bursts.push(BurstRecord {
                timestamp: cur.timestamp,
                zone_id: cur.zone_id.clone(),
                zone_name: cur.zone_name.clone(),
                sensor_id: cur.sensor_id.clone(),
                pressure_before: prev.pressure_psi,
                pressure_after: cur.pressure_psi,
                pressure_drop: drop,
                severity: if drop > CRITICAL_DROP_PSI {
                    Severity::Critical
                } else {
                    Severity::High
                },
                event_type: BURST_EVENT_TYPE.to_string(),
                recommended_action: BURST_ACTION.to_string(),
            });
        }
    }

    bursts
}
