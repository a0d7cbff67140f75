//! Operator-facing recommendations layered over detector output.

use serde::{Deserialize, Serialize};

use crate::analysis::pressure::LowPressureZone;
use crate::detect::{BurstRecord, LeakRecord, Severity};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub priority: Severity,
    pub zone: String,
    pub issue: String,
    pub recommendation: String,
    pub impact: String,
}

/// Build recommendations in a fixed order: frequent low pressure, then
/// leaks, then bursts.
///
/// Only zones with more than `low_pressure_event_limit` low-pressure events
/// in the trailing window are listed.
pub fn generate_recommendations(
    low_pressure: &[LowPressureZone],
    leaks: &[LeakRecord],
    bursts: &[BurstRecord],
    low_pressure_event_limit: usize,
) -> Vec<Recommendation> {
    let mut out = Vec::new();

    for zone in low_pressure
        .iter()
        .filter(|z| z.low_pressure_count > low_pressure_event_limit)
    {
        out.push(Recommendation {
            priority: Severity::High,
            zone: zone.zone_name.clone(),
            issue: "Frequent low pressure".to_string(),
            recommendation: "Install booster pumps or check for leaks".to_string(),
            impact: format!("{} low pressure events detected", zone.low_pressure_count),
        });
    }

    for leak in leaks {
        out.push(Recommendation {
            priority: leak.severity,
            zone: leak.zone_name.clone(),
            issue: "Potential water leak".to_string(),
            recommendation: leak.recommended_action.clone(),
            impact: format!(
                "Estimated loss: {} liters/day",
                group_thousands(leak.estimated_daily_loss_liters)
            ),
        });
    }

    for burst in bursts {
        out.push(Recommendation {
            priority: Severity::Critical,
            zone: burst.zone_name.clone(),
            issue: "Potential pipe burst".to_string(),
            recommendation: burst.recommended_action.clone(),
            impact: format!("Pressure drop: {} PSI", short_decimal(burst.pressure_drop)),
        });
    }

    out
}

/// Round to two decimals and print the shortest form that keeps at least
/// one fractional digit: `25.0`, `17.46`.
pub fn short_decimal(value: f64) -> String {
    format!("{:?}", (value * 100.0).round() / 100.0)
}

/// Round to a whole number and insert comma separators: `504000.4` -> `504,000`.
pub fn group_thousands(value: f64) -> String {
    let rounded = value.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if rounded < 0.0 {
        grouped.insert(0, '-');
    }
    grouped
}
