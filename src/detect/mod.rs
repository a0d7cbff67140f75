//! Anomaly detection: pressure and flow outliers, leaks, and bursts.
//!
//! Each detector is a pure function over a slice of readings. Groups that
//! cannot be scored (too few samples, no variance) are skipped rather than
//! reported as errors.

pub mod burst;
pub mod engine;
pub mod flow;
pub mod leak;
pub mod pressure;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::readings::Timestamp;

pub use burst::detect_burst_events;
pub use engine::{Analyzer, DetectionRun};
pub use flow::detect_flow_anomalies;
pub use leak::detect_leaks;
pub use pressure::detect_pressure_anomalies;

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("insufficient baseline data: need {needed} samples, have {have}")]
    InsufficientBaseline { needed: usize, have: usize },
    #[error("baseline has zero variance")]
    ZeroVariance,
}

/// Severity tiers shared by every record type.
///
/// Anomalies use all four; leaks use `Moderate`/`High`; bursts use
/// `High`/`Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Moderate,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Moderate => "moderate",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Map a z-score onto a severity band.
///
/// With the default pressure threshold of 2.5 the `Low` band cannot be
/// reached by pressure anomalies; flow anomalies (threshold 2.0) can land
/// there.
pub fn classify_severity(z_score: f64) -> Severity {
    if z_score > 4.0 {
        Severity::Critical
    } else if z_score > 3.0 {
        Severity::High
    } else if z_score > 2.5 {
        Severity::Moderate
    } else {
        Severity::Low
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    PressureDrop,
    PressureSpike,
    ExcessiveFlow,
    LowFlow,
}

impl AnomalyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyKind::PressureDrop => "pressure_drop",
            AnomalyKind::PressureSpike => "pressure_spike",
            AnomalyKind::ExcessiveFlow => "excessive_flow",
            AnomalyKind::LowFlow => "low_flow",
        }
    }
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pressure reading that sits too far from its zone mean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PressureAnomaly {
    pub timestamp: Timestamp,
    pub zone_id: String,
    pub zone_name: String,
    pub sensor_id: String,
    pub pressure_psi: f64,
    pub expected_pressure: f64,
    /// `pressure_psi - expected_pressure`.
    pub deviation: f64,
    pub z_score: f64,
    pub anomaly_type: AnomalyKind,
    pub severity: Severity,
}

/// Heuristic explanation attached to a flow anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowCause {
    PotentialLeak,
    UnusualDemand,
    SupplyInterruption,
}

impl FlowCause {
    pub fn description(&self) -> &'static str {
        match self {
            FlowCause::PotentialLeak => "Potential leak (high night flow)",
            FlowCause::UnusualDemand => "Unusual high demand or unauthorized usage",
            FlowCause::SupplyInterruption => "Supply interruption or valve issue",
        }
    }
}

impl fmt::Display for FlowCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A flow reading that sits too far from its (zone, hour) mean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowAnomaly {
    pub timestamp: Timestamp,
    pub zone_id: String,
    pub zone_name: String,
    pub hour: u32,
    pub flow_rate_lpm: f64,
    pub expected_flow: f64,
    pub deviation: f64,
    pub z_score: f64,
    pub anomaly_type: AnomalyKind,
    pub severity: Severity,
    pub potential_cause: FlowCause,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Medium,
    High,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Confidence::Medium => "medium",
            Confidence::High => "high",
        })
    }
}

/// A zone whose night-time flow suggests continuous loss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeakRecord {
    pub zone_id: String,
    pub zone_name: String,
    pub population: u64,
    pub avg_night_flow_lpm: f64,
    pub estimated_daily_loss_liters: f64,
    pub estimated_monthly_loss_liters: f64,
    pub severity: Severity,
    pub confidence: Confidence,
    pub recommended_action: String,
}

/// An abrupt single-step pressure drop at one sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurstRecord {
    pub timestamp: Timestamp,
    pub zone_id: String,
    pub zone_name: String,
    pub sensor_id: String,
    pub pressure_before: f64,
    pub pressure_after: f64,
    pub pressure_drop: f64,
    pub severity: Severity,
    pub event_type: String,
    pub recommended_action: String,
}
