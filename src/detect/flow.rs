//! Flow outliers against per-zone, per-hour-of-day baselines.
//!
//! Demand follows a strong diurnal curve, so every (zone, hour) bucket gets
//! its own mean and deviation. A single zone-wide baseline would flag every
//! morning and evening peak.

use tracing::debug;

use crate::analysis::stats::{group_by, Summary};
use crate::detect::{classify_severity, AnomalyKind, FlowAnomaly, FlowCause};
use crate::readings::{is_night_hour, FlowReading};

/// Buckets smaller than this are not scored by default.
pub const MIN_HOURLY_SAMPLES: usize = 5;

/// Flag every reading whose z-score within its (zone, hour) bucket exceeds
/// `threshold_std`. Buckets with fewer than `min_samples` readings or with
/// zero variance are skipped.
pub fn detect_flow_anomalies(
    readings: &[FlowReading],
    threshold_std: f64,
    min_samples: usize,
) -> Vec<FlowAnomaly> {
    let mut anomalies = Vec::new();

    for ((zone_id, hour), bucket) in group_by(readings, |r| (r.zone_id.as_str(), r.hour())) {
        if bucket.len() < min_samples {
            debug!(zone = %zone_id, hour, samples = bucket.len(), "Skipping sparse flow bucket");
            continue;
        }
        let Some(baseline) = Summary::from_values(bucket.iter().map(|r| r.flow_rate_lpm)) else {
            continue;
        };

        for r in bucket {
            let z = match baseline.z_score(r.flow_rate_lpm) {
                Ok(z) => z,
                Err(e) => {
                    debug!(zone = %zone_id, hour, error = %e, "Skipping flow bucket");
                    break;
                }
            };
            if z <= threshold_std {
                continue;
            }

            let anomaly_type = if r.flow_rate_lpm > baseline.mean {
                AnomalyKind::ExcessiveFlow
            } else {
                AnomalyKind::LowFlow
            };

            anomalies.push(FlowAnomaly {
                timestamp: r.timestamp,
                zone_id: r.zone_id.clone(),
                zone_name: r.zone_name.clone(),
                hour,
                flow_rate_lpm: r.flow_rate_lpm,
                expected_flow: baseline.mean,
                deviation: r.flow_rate_lpm - baseline.mean,
                z_score: z,
                anomaly_type,
                severity: classify_severity(z),
                potential_cause: identify_cause(r.flow_rate_lpm, baseline.mean, hour),
            });
        }
    }

    debug!(count = anomalies.len(), "Flow anomaly pass complete");
    anomalies
}

/// Guess why a flow reading strayed from its baseline.
pub fn identify_cause(actual: f64, expected: f64, hour: u32) -> FlowCause {
    if actual > expected * 1.5 {
        if is_night_hour(hour) {
            FlowCause::PotentialLeak
        } else {
            FlowCause::UnusualDemand
        }
    } else {
        FlowCause::SupplyInterruption
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Severity;
    use crate::readings::fixtures::{at, flow};

    /// Thirty days of a steady diurnal curve for one zone.
    fn diurnal(zone: &str) -> Vec<FlowReading> {
        let mut readings = Vec::new();
        for day in 0..30 {
            for hour in 0..24 {
                let base = match hour {
                    0..=5 => 150.0,
                    6..=9 => 750.0,
                    18..=21 => 700.0,
                    _ => 400.0,
                };
                let jitter = ((day * 7 + hour) % 5) as f64 - 2.0;
                readings.push(flow(at(day, hour), zone, base + jitter));
            }
        }
        readings
    }

    #[test]
    fn test_diurnal_peaks_are_not_flagged() {
        assert!(detect_flow_anomalies(&diurnal("Z1"), 2.0, MIN_HOURLY_SAMPLES).is_empty());
    }

    #[test]
    fn test_night_surge_is_potential_leak() {
        let mut readings = diurnal("Z1");
        readings.push(flow(at(30, 3), "Z1", 600.0));

        let anomalies = detect_flow_anomalies(&readings, 2.0, MIN_HOURLY_SAMPLES);
        assert_eq!(anomalies.len(), 1);
        let a = &anomalies[0];
        assert_eq!(a.hour, 3);
        assert_eq!(a.anomaly_type, AnomalyKind::ExcessiveFlow);
        assert_eq!(a.potential_cause, FlowCause::PotentialLeak);
        assert_eq!(a.severity, Severity::Critical);
        assert_eq!(a.deviation, a.flow_rate_lpm - a.expected_flow);
    }

    #[test]
    fn test_daytime_collapse_is_low_flow() {
        let mut readings = diurnal("Z1");
        readings.push(flow(at(30, 12), "Z1", 50.0));

        let anomalies = detect_flow_anomalies(&readings, 2.0, MIN_HOURLY_SAMPLES);
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].anomaly_type, AnomalyKind::LowFlow);
        assert_eq!(anomalies[0].potential_cause, FlowCause::SupplyInterruption);
    }

    #[test]
    fn test_sparse_bucket_is_skipped() {
        // Four readings at 02:00 with one wild value: below the 5-sample floor.
        let readings = vec![
            flow(at(0, 2), "Z1", 100.0),
            flow(at(1, 2), "Z1", 101.0),
            flow(at(2, 2), "Z1", 99.0),
            flow(at(3, 2), "Z1", 900.0),
        ];
        assert!(detect_flow_anomalies(&readings, 0.5, MIN_HOURLY_SAMPLES).is_empty());
        assert!(!detect_flow_anomalies(&readings, 0.5, 2).is_empty());
    }

    #[test]
    fn test_constant_bucket_is_skipped() {
        let readings: Vec<_> = (0..10).map(|d| flow(at(d, 8), "Z1", 500.0)).collect();
        assert!(detect_flow_anomalies(&readings, 2.0, MIN_HOURLY_SAMPLES).is_empty());
    }

    #[test]
    fn test_identify_cause() {
        assert_eq!(identify_cause(400.0, 200.0, 0), FlowCause::PotentialLeak);
        assert_eq!(identify_cause(400.0, 200.0, 5), FlowCause::PotentialLeak);
        assert_eq!(identify_cause(400.0, 200.0, 6), FlowCause::UnusualDemand);
        assert_eq!(identify_cause(300.0, 200.0, 3), FlowCause::SupplyInterruption);
        assert_eq!(identify_cause(10.0, 200.0, 14), FlowCause::SupplyInterruption);
    }
}
