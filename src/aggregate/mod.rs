//! Aggregation of detector output into summary counts and recommendations.

pub mod recommendations;

use serde::{Deserialize, Serialize};

use crate::detect::{DetectionRun, Severity};

pub use recommendations::{generate_recommendations, Recommendation};

/// Record counts per severity tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub low: usize,
    pub moderate: usize,
    pub high: usize,
    pub critical: usize,
}

impl SeverityCounts {
    pub fn tally<I: IntoIterator<Item = Severity>>(severities: I) -> Self {
        let mut counts = Self::default();
        for s in severities {
            match s {
                Severity::Low => counts.low += 1,
                Severity::Moderate => counts.moderate += 1,
                Severity::High => counts.high += 1,
                Severity::Critical => counts.critical += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.low + self.moderate + self.high + self.critical
    }
}

/// Headline counts for one detection pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnomalySummary {
    pub total_pressure_anomalies: usize,
    pub total_flow_anomalies: usize,
    pub potential_leaks: usize,
    pub potential_bursts: usize,
    /// Critical pressure anomalies plus critical bursts. Leaks never count:
    /// their tiers stop at `high`.
    pub critical_events: usize,
    pub pressure_by_severity: SeverityCounts,
    pub flow_by_severity: SeverityCounts,
    pub leaks_by_severity: SeverityCounts,
    pub bursts_by_severity: SeverityCounts,
}

impl AnomalySummary {
    pub fn from_run(run: &DetectionRun) -> Self {
        let pressure = SeverityCounts::tally(run.pressure_anomalies.iter().map(|a| a.severity));
        let flow = SeverityCounts::tally(run.flow_anomalies.iter().map(|a| a.severity));
        let leaks = SeverityCounts::tally(run.leaks.iter().map(|l| l.severity));
        let bursts = SeverityCounts::tally(run.bursts.iter().map(|b| b.severity));

        Self {
            total_pressure_anomalies: run.pressure_anomalies.len(),
            total_flow_anomalies: run.flow_anomalies.len(),
            potential_leaks: run.leaks.len(),
            potential_bursts: run.bursts.len(),
            critical_events: pressure.critical + bursts.critical,
            pressure_by_severity: pressure,
            flow_by_severity: flow,
            leaks_by_severity: leaks,
            bursts_by_severity: bursts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{
        AnomalyKind, BurstRecord, Confidence, FlowAnomaly, FlowCause, LeakRecord, PressureAnomaly,
    };
    use crate::readings::fixtures::at;

    fn pressure_anomaly(severity: Severity) -> PressureAnomaly {
        PressureAnomaly {
            timestamp: at(0, 0).fixed_offset(),
            zone_id: "Z1".into(),
            zone_name: "Z1 Ward".into(),
            sensor_id: "Z1_S01".into(),
            pressure_psi: 10.0,
            expected_pressure: 50.0,
            deviation: -40.0,
            z_score: 5.0,
            anomaly_type: AnomalyKind::PressureDrop,
            severity,
        }
    }

    fn burst(severity: Severity) -> BurstRecord {
        BurstRecord {
            timestamp: at(0, 1).fixed_offset(),
            zone_id: "Z1".into(),
            zone_name: "Z1 Ward".into(),
            sensor_id: "Z1_S01".into(),
            pressure_before: 60.0,
            pressure_after: 30.0,
            pressure_drop: 30.0,
            severity,
            event_type: "potential_burst".into(),
            recommended_action: "Emergency response required".into(),
        }
    }

    #[test]
    fn test_counts_and_critical_events() {
        let run = DetectionRun {
            pressure_anomalies: vec![
                pressure_anomaly(Severity::Critical),
                pressure_anomaly(Severity::High),
                pressure_anomaly(Severity::Moderate),
            ],
            flow_anomalies: vec![FlowAnomaly {
                timestamp: at(0, 2).fixed_offset(),
                zone_id: "Z1".into(),
                zone_name: "Z1 Ward".into(),
                hour: 2,
                flow_rate_lpm: 900.0,
                expected_flow: 200.0,
                deviation: 700.0,
                z_score: 2.2,
                anomaly_type: AnomalyKind::ExcessiveFlow,
                severity: Severity::Low,
                potential_cause: FlowCause::PotentialLeak,
            }],
            leaks: vec![LeakRecord {
                zone_id: "Z1".into(),
                zone_name: "Z1 Ward".into(),
                population: 1000,
                avg_night_flow_lpm: 600.0,
                estimated_daily_loss_liters: 864_000.0,
                estimated_monthly_loss_liters: 25_920_000.0,
                severity: Severity::High,
                confidence: Confidence::High,
                recommended_action: "Immediate inspection required".into(),
            }],
            bursts: vec![burst(Severity::Critical), burst(Severity::High)],
        };

        let summary = run.summary();
        assert_eq!(summary.total_pressure_anomalies, 3);
        assert_eq!(summary.total_flow_anomalies, 1);
        assert_eq!(summary.potential_leaks, 1);
        assert_eq!(summary.potential_bursts, 2);
        assert_eq!(summary.critical_events, 2);
        assert_eq!(summary.pressure_by_severity.moderate, 1);
        assert_eq!(summary.flow_by_severity.low, 1);
        assert_eq!(summary.leaks_by_severity.high, 1);
        assert_eq!(summary.bursts_by_severity.total(), 2);
    }

    #[test]
    fn test_empty_run() {
        let summary = DetectionRun::default().summary();
        assert_eq!(summary, AnomalySummary::default());
    }
}
