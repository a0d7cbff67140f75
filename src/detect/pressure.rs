//! Per-zone pressure outliers against the zone's full-history baseline.

use tracing::debug;

use crate::analysis::stats::{group_by, Summary};
use crate::detect::{classify_severity, AnomalyKind, PressureAnomaly};
use crate::readings::PressureReading;

/// Flag every reading whose z-score within its zone exceeds `threshold_std`.
///
/// Zones whose baseline has no variance are skipped.
pub fn detect_pressure_anomalies(
    readings: &[PressureReading],
    threshold_std: f64,
) -> Vec<PressureAnomaly> {
    let mut anomalies = Vec::new();

    for (zone_id, zone_readings) in group_by(readings, |r| r.zone_id.as_str()) {
        let Some(baseline) = Summary::from_values(zone_readings.iter().map(|r| r.pressure_psi))
        else {
            continue;
        };

        for r in zone_readings {
            let z = match baseline.z_score(r.pressure_psi) {
                Ok(z) => z,
                Err(e) => {
                    debug!(zone = %zone_id, error = %e, "Skipping pressure baseline");
                    break;
                }
            };
            if z <= threshold_std {
                continue;
            }

            let anomaly_type = if r.pressure_psi < baseline.mean {
                AnomalyKind::PressureDrop
            } else {
                AnomalyKind::PressureSpike
            };

            anomalies.push(PressureAnomaly {
                timestamp: r.timestamp,
                zone_id: r.zone_id.clone(),
                zone_name: r.zone_name.clone(),
                sensor_id: r.sensor_id.clone(),
                pressure_psi: r.pressure_psi,
                expected_pressure: baseline.mean,
                deviation: r.pressure_psi - baseline.mean,
                z_score: z,
                anomaly_type,
                severity: classify_severity(z),
            });
        }
    }

    debug!(count = anomalies.len(), "Pressure anomaly pass complete");
    anomalies
}
