//! Zone-level flow statistics: consumption, demand peaks, and the
//! system-wide water loss estimate.

use serde::{Deserialize, Serialize};

use crate::analysis::stats::{group_by, Summary};
use crate::readings::{is_night_hour, FlowReading};

/// Share of night flow assumed to be loss in the system-wide estimate.
/// The rest is legitimate night demand.
pub const NIGHT_LOSS_FACTOR: f64 = 0.3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowStatistics {
    pub zone_name: String,
    pub zone_id: String,
    pub avg_flow: f64,
    pub min_flow: f64,
    pub max_flow: f64,
    pub total_flow: f64,
    pub population: u64,
    /// Mean flow per 1000 residents; NaN when population is zero.
    pub per_capita_flow: f64,
}

/// Mean/min/max/sum of flow and per-capita flow, per zone name.
pub fn flow_statistics(readings: &[FlowReading]) -> Vec<FlowStatistics> {
    group_by(readings, |r| r.zone_name.as_str())
        .into_iter()
        .filter_map(|(name, rows)| {
            let s = Summary::from_values(rows.iter().map(|r| r.flow_rate_lpm))?;
            let population = rows[0].population;
            Some(FlowStatistics {
                zone_name: name.to_string(),
                zone_id: rows[0].zone_id.clone(),
                avg_flow: s.mean,
                min_flow: s.min,
                max_flow: s.max,
                total_flow: s.sum,
                population,
                per_capita_flow: per_capita(s.mean, population),
            })
        })
        .collect()
}

fn per_capita(mean_flow: f64, population: u64) -> f64 {
    if population == 0 {
        f64::NAN
    } else {
        mean_flow / population as f64 * 1000.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyDemand {
    pub hour: u32,
    pub avg_flow_lpm: f64,
}

/// Mean flow per hour of day, busiest hour first.
pub fn peak_demand_times(readings: &[FlowReading]) -> Vec<HourlyDemand> {
    let mut hours: Vec<HourlyDemand> = group_by(readings, |r| r.hour())
        .into_iter()
        .map(|(hour, rows)| HourlyDemand {
            hour,
            avg_flow_lpm: rows.iter().map(|r| r.flow_rate_lpm).sum::<f64>() / rows.len() as f64,
        })
        .collect();
    hours.sort_by(|a, b| b.avg_flow_lpm.total_cmp(&a.avg_flow_lpm));
    hours
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterLossEstimate {
    pub zone_name: String,
    pub night_flow_lpm: f64,
    pub potential_leak: bool,
    pub estimated_daily_loss_liters: f64,
}

/// Rough, system-wide loss estimate from mean night flow.
///
/// Lighter than leak detection: a lower flag threshold and only
/// [`NIGHT_LOSS_FACTOR`] of night flow counted as loss.
pub fn water_loss(readings: &[FlowReading], leak_threshold: f64) -> Vec<WaterLossEstimate> {
    let night: Vec<&FlowReading> = readings.iter().filter(|r| is_night_hour(r.hour())).collect();

    group_by(&night, |r| r.zone_name.as_str())
        .into_iter()
        .map(|(name, rows)| {
            let mean = rows.iter().map(|r| r.flow_rate_lpm).sum::<f64>() / rows.len() as f64;
            WaterLossEstimate {
                zone_name: name.to_string(),
                night_flow_lpm: mean,
                potential_leak: mean > leak_threshold,
                estimated_daily_loss_liters: mean * 60.0 * 24.0 * NIGHT_LOSS_FACTOR,
            }
        })
        .collect()
}
