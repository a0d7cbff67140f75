//! Statistics engine: descriptive baselines and zone-level reporting
//! statistics.

pub mod flow;
pub mod health;
pub mod pressure;
pub mod stats;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::config::StatisticsConfig;
use crate::readings::ReadingSnapshot;

use self::flow::{FlowStatistics, HourlyDemand, WaterLossEstimate};
use self::pressure::{
    DailyTrend, HourlyPressure, LowPressureZone, PressureBandCount, ZoneComparison,
    ZoneStatistics,
};

/// Every reporting table the statistics engine produces for one snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct NetworkStatistics {
    pub reference_time: DateTime<Utc>,
    pub zones: Vec<ZoneStatistics>,
    pub flow: Vec<FlowStatistics>,
    pub low_pressure_zones: Vec<LowPressureZone>,
    pub peak_demand: Vec<HourlyDemand>,
    pub water_loss: Vec<WaterLossEstimate>,
    pub hourly_pressure: Vec<HourlyPressure>,
    pub zone_comparison: Vec<ZoneComparison>,
    pub recent_trends: Vec<DailyTrend>,
    pub pressure_distribution: Vec<PressureBandCount>,
}

impl NetworkStatistics {
    pub fn compute(
        snapshot: &ReadingSnapshot,
        config: &StatisticsConfig,
        now: DateTime<Utc>,
    ) -> Self {
        let window_days = i64::from(config.low_pressure_window_days);
        let pressure = snapshot.pressure();
        let flow = snapshot.flow();

        Self {
            reference_time: now,
            zones: pressure::zone_statistics(pressure),
            flow: flow::flow_statistics(flow),
            low_pressure_zones: pressure::low_pressure_zones(
                pressure,
                config.low_pressure_threshold,
                Duration::days(window_days),
                now,
            ),
            peak_demand: flow::peak_demand_times(flow),
            water_loss: flow::water_loss(flow, config.water_loss_night_flow),
            hourly_pressure: pressure::hourly_pressure_patterns(pressure),
            zone_comparison: pressure::zone_comparison(pressure),
            recent_trends: pressure::recent_trends(pressure, window_days, now),
            pressure_distribution: pressure::pressure_distribution(pressure),
        }
    }
}
