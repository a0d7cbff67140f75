//! Night-flow leak inference.
//!
//! Legitimate demand between 00:00 and 05:59 is low and roughly constant.
//! A zone that sustains high flow across that window is losing water.

use tracing::debug;

use crate::analysis::stats::group_by;
use crate::detect::{Confidence, LeakRecord, Severity};
use crate::readings::{is_night_hour, FlowReading};

const MINUTES_PER_DAY: f64 = 60.0 * 24.0;
const DAYS_PER_MONTH: f64 = 30.0;

/// Emit a [`LeakRecord`] for every zone whose mean night flow exceeds
/// `night_flow_threshold` (LPM). Daytime readings are ignored entirely.
pub fn detect_leaks(readings: &[FlowReading], night_flow_threshold: f64) -> Vec<LeakRecord> {
    let night: Vec<&FlowReading> = readings.iter().filter(|r| is_night_hour(r.hour())).collect();

    let mut leaks = Vec::new();
    for (zone_id, zone_night) in group_by(&night, |r| r.zone_id.as_str()) {
        let Some(first) = zone_night.first() else {
            continue;
        };
        let avg = zone_night.iter().map(|r| r.flow_rate_lpm).sum::<f64>() / zone_night.len() as f64;
        if avg <= night_flow_threshold {
            continue;
        }

        let daily_loss = avg * MINUTES_PER_DAY;
        debug!(zone = %zone_id, avg_night_flow = avg, daily_loss, "Potential leak");

        leaks.push(LeakRecord {
            zone_id: first.zone_id.clone(),
            zone_name: first.zone_name.clone(),
            population: first.population,
            avg_night_flow_lpm: avg,
            estimated_daily_loss_liters: daily_loss,
            estimated_monthly_loss_liters: daily_loss * DAYS_PER_MONTH,
            severity: if avg > 500.0 {
                Severity::High
            } else {
                Severity::Moderate
            },
            confidence: if avg > 400.0 {
                Confidence::High
            } else {
                Confidence::Medium
            },
            recommended_action: if avg > 500.0 {
                "Immediate inspection required".to_string()
            } else {
                "Schedule inspection".to_string()
            },
        });
    }

    leaks
}
