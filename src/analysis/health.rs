//! Network health rollups built on the zone statistics.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::analysis::flow::{FlowStatistics, WaterLossEstimate};
use crate::analysis::pressure::{LowPressureZone, ZoneStatistics};
use crate::readings::Zone;

/// Zones below this mean pressure (PSI) need attention.
pub const ATTENTION_PRESSURE: f64 = 40.0;
/// Zones below this mean pressure (PSI) are in warning.
pub const WARNING_PRESSURE: f64 = 35.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemOverview {
    pub total_zones: usize,
    pub total_population: u64,
    pub total_sensors: u64,
    pub zones: Vec<Zone>,
}

pub fn system_overview(zones: &[Zone]) -> SystemOverview {
    SystemOverview {
        total_zones: zones.len(),
        total_population: zones.iter().map(|z| z.population).sum(),
        total_sensors: zones.iter().map(|z| u64::from(z.num_sensors)).sum(),
        zones: zones.to_vec(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Attention,
    Warning,
    Critical,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Attention => "attention",
            HealthStatus::Warning => "warning",
            HealthStatus::Critical => "critical",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneHealth {
    pub zone_name: String,
    pub avg_pressure: f64,
    pub status: HealthStatus,
    pub num_sensors: usize,
}

/// Classify every zone. Recent low-pressure events dominate; otherwise the
/// zone's mean pressure decides.
pub fn zone_health(
    stats: &[ZoneStatistics],
    low_pressure: &[LowPressureZone],
    critical_low_pressure_count: usize,
) -> Vec<ZoneHealth> {
    stats
        .iter()
        .map(|zone| {
            let low = low_pressure.iter().find(|l| l.zone_name == zone.zone_name);
            let status = match low {
                Some(l) if l.low_pressure_count > critical_low_pressure_count => {
                    HealthStatus::Critical
                }
                Some(_) => HealthStatus::Warning,
                None if zone.avg_pressure < WARNING_PRESSURE => HealthStatus::Warning,
                None if zone.avg_pressure < ATTENTION_PRESSURE => HealthStatus::Attention,
                None => HealthStatus::Healthy,
            };
            ZoneHealth {
                zone_name: zone.zone_name.clone(),
                avg_pressure: zone.avg_pressure,
                status,
                num_sensors: zone.num_sensors,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub avg_system_pressure: f64,
    pub total_water_flow: f64,
    pub zones_with_issues: usize,
    pub estimated_water_loss_percent: f64,
    pub system_efficiency: f64,
}

/// Network-wide KPIs. Loss percentages are NaN when no flow was recorded.
pub fn performance_metrics(
    stats: &[ZoneStatistics],
    flow: &[FlowStatistics],
    loss: &[WaterLossEstimate],
) -> PerformanceMetrics {
    let avg_system_pressure = if stats.is_empty() {
        f64::NAN
    } else {
        stats.iter().map(|s| s.avg_pressure).sum::<f64>() / stats.len() as f64
    };
    let total_water_flow: f64 = flow.iter().map(|f| f.total_flow).sum();
    let daily_loss: f64 = loss.iter().map(|l| l.estimated_daily_loss_liters).sum();

    let loss_percent = if total_water_flow > 0.0 {
        daily_loss / total_water_flow * 100.0
    } else {
        f64::NAN
    };

    PerformanceMetrics {
        avg_system_pressure,
        total_water_flow,
        zones_with_issues: stats
            .iter()
            .filter(|s| s.avg_pressure < ATTENTION_PRESSURE)
            .count(),
        estimated_water_loss_percent: loss_percent,
        system_efficiency: 100.0 - loss_percent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readings::fixtures::zone;

    fn stats(name: &str, avg: f64) -> ZoneStatistics {
        ZoneStatistics {
            zone_name: name.to_string(),
            zone_id: name.to_string(),
            avg_pressure: avg,
            min_pressure: avg,
            max_pressure: avg,
            std_pressure: 0.0,
            num_sensors: 3,
        }
    }

    fn low(name: &str, count: usize) -> LowPressureZone {
        LowPressureZone {
            zone_name: name.to_string(),
            zone_id: name.to_string(),
            low_pressure_count: count,
            avg_low_pressure: 30.0,
        }
    }

    #[test]
    fn test_system_overview() {
        let overview = system_overview(&[zone("Z1", 1000, 3), zone("Z2", 2500, 4)]);
        assert_eq!(overview.total_zones, 2);
        assert_eq!(overview.total_population, 3500);
        assert_eq!(overview.total_sensors, 7);
    }

    #[test]
    fn test_zone_health_rules() {
        let zones = vec![
            stats("A", 55.0),
            stats("B", 55.0),
            stats("C", 33.0),
            stats("D", 38.0),
            stats("E", 50.0),
        ];
        let lows = vec![low("A", 101), low("B", 100)];
        let health = zone_health(&zones, &lows, 100);
        let status: Vec<HealthStatus> = health.iter().map(|h| h.status).collect();
        assert_eq!(
            status,
            vec![
                HealthStatus::Critical,
                HealthStatus::Warning,
                HealthStatus::Warning,
                HealthStatus::Attention,
                HealthStatus::Healthy,
            ]
        );
    }

    #[test]
    fn test_performance_metrics() {
        let zones = vec![stats("A", 50.0), stats("B", 30.0)];
        let flow = vec![FlowStatistics {
            zone_name: "A".into(),
            zone_id: "A".into(),
            avg_flow: 100.0,
            min_flow: 0.0,
            max_flow: 200.0,
            total_flow: 1_000_000.0,
            population: 1000,
            per_capita_flow: 100.0,
        }];
        let loss = vec![WaterLossEstimate {
            zone_name: "A".into(),
            night_flow_lpm: 100.0,
            potential_leak: false,
            estimated_daily_loss_liters: 50_000.0,
        }];

        let m = performance_metrics(&zones, &flow, &loss);
        assert_eq!(m.avg_system_pressure, 40.0);
        assert_eq!(m.zones_with_issues, 1);
        assert_eq!(m.estimated_water_loss_percent, 5.0);
        assert_eq!(m.system_efficiency, 95.0);
    }

    #[test]
    fn test_performance_metrics_without_flow() {
        let m = performance_metrics(&[], &[], &[]);
        assert!(m.avg_system_pressure.is_nan());
        assert!(m.estimated_water_loss_percent.is_nan());
        assert_eq!(m.total_water_flow, 0.0);
    }
}
