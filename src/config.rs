//! TOML configuration for the detection engine.
//!
//! A layered configuration model with sensible defaults, an environment
//! variable override for the config file path, and a standard filesystem
//! location. Every threshold is checked by [`EngineConfig::validate`] before
//! any detector runs.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Environment variable naming an alternative config file.
pub const CONFIG_ENV: &str = "WATERGUARD_CONFIG";

/// System-wide config location consulted when no explicit path is given.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/waterguard/waterguard.toml";

/// Longest accepted trailing window (about a century).
pub const MAX_WINDOW_DAYS: u32 = 36_500;

/// Rejected configuration values.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be a finite number greater than zero, got {value}")]
    NonPositive { field: &'static str, value: f64 },
    #[error("{field} must be at least {min}, got {value}")]
    TooSmall {
        field: &'static str,
        min: u64,
        value: u64,
    },
    #[error("{field} must be at most {max}, got {value}")]
    TooLarge {
        field: &'static str,
        max: u64,
        value: u64,
    },
}

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration for a detection run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub statistics: StatisticsConfig,
    #[serde(default)]
    pub recommendations: RecommendationConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded engine configuration");
        Ok(config)
    }

    /// Resolve configuration from, in order:
    /// 1. The explicit `path`, if given (errors are fatal).
    /// 2. The path in the `WATERGUARD_CONFIG` environment variable.
    /// 3. `/etc/waterguard/waterguard.toml`.
    /// 4. Compiled-in defaults.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }

        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return Ok(cfg),
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "WATERGUARD_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let system_path = Path::new(SYSTEM_CONFIG_PATH);
        if system_path.exists() {
            match Self::load(system_path) {
                Ok(cfg) => return Ok(cfg),
                Err(e) => {
                    warn!(
                        path = %system_path.display(),
                        error = %e,
                        "system config file exists but could not be loaded, using defaults"
                    );
                }
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Ok(Self::default())
    }

    /// Reject thresholds that would make detection meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let d = &self.detection;
        ensure_positive("detection.pressure_threshold_std", d.pressure_threshold_std)?;
        ensure_positive("detection.flow_threshold_std", d.flow_threshold_std)?;
        ensure_positive("detection.night_flow_threshold", d.night_flow_threshold)?;
        ensure_positive("detection.pressure_drop_threshold", d.pressure_drop_threshold)?;
        if d.min_hourly_samples < 2 {
            return Err(ConfigError::TooSmall {
                field: "detection.min_hourly_samples",
                min: 2,
                value: d.min_hourly_samples as u64,
            });
        }

        let s = &self.statistics;
        ensure_positive("statistics.low_pressure_threshold", s.low_pressure_threshold)?;
        ensure_positive("statistics.water_loss_night_flow", s.water_loss_night_flow)?;
        if s.low_pressure_window_days == 0 {
            return Err(ConfigError::TooSmall {
                field: "statistics.low_pressure_window_days",
                min: 1,
                value: 0,
            });
        }
        if s.low_pressure_window_days > MAX_WINDOW_DAYS {
            return Err(ConfigError::TooLarge {
                field: "statistics.low_pressure_window_days",
                max: u64::from(MAX_WINDOW_DAYS),
                value: u64::from(s.low_pressure_window_days),
            });
        }
        Ok(())
    }
}

pub(crate) fn ensure_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { field, value })
    }
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

/// Thresholds used by the four detectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Z-score above which a pressure reading is an outlier.
    pub pressure_threshold_std: f64,
    /// Z-score above which a flow reading is an outlier within its hour bucket.
    pub flow_threshold_std: f64,
    /// Minimum observations in a (zone, hour) bucket before it is scored.
    pub min_hourly_samples: usize,
    /// Mean night flow (LPM) above which a zone is reported as leaking.
    pub night_flow_threshold: f64,
    /// Reading-to-reading pressure drop (PSI) treated as a burst.
    pub pressure_drop_threshold: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            pressure_threshold_std: 2.5,
            flow_threshold_std: 2.0,
            min_hourly_samples: 5,
            night_flow_threshold: 300.0,
            pressure_drop_threshold: 15.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Parameters of the zone-level reporting statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatisticsConfig {
    /// Pressure (PSI) below which a reading counts as a low-pressure event.
    pub low_pressure_threshold: f64,
    /// Trailing window for low-pressure events and recent trends.
    pub low_pressure_window_days: u32,
    /// Night flow (LPM) above which the system-wide estimate flags a zone.
    pub water_loss_night_flow: f64,
    /// Fixed reference time for trailing windows. When unset the latest
    /// reading timestamp is used.
    pub reference_time: Option<DateTime<Utc>>,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            low_pressure_threshold: 35.0,
            low_pressure_window_days: 7,
            water_loss_night_flow: 200.0,
            reference_time: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Recommendations
// ---------------------------------------------------------------------------

/// Business rules layered over detector output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationConfig {
    /// Low-pressure events in the window before a zone gets a recommendation.
    pub low_pressure_event_limit: usize,
    /// Low-pressure events in the window before a zone is marked critical.
    pub critical_low_pressure_count: usize,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            low_pressure_event_limit: 50,
            critical_low_pressure_count: 100,
        }
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Reading store location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the SQLite database holding zones and readings.
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data/waterguard.db"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum tracing level (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let cfg = EngineConfig::default();

        assert_eq!(cfg.detection.pressure_threshold_std, 2.5);
        assert_eq!(cfg.detection.flow_threshold_std, 2.0);
        assert_eq!(cfg.detection.min_hourly_samples, 5);
        assert_eq!(cfg.detection.night_flow_threshold, 300.0);
        assert_eq!(cfg.detection.pressure_drop_threshold, 15.0);

        assert_eq!(cfg.statistics.low_pressure_threshold, 35.0);
        assert_eq!(cfg.statistics.low_pressure_window_days, 7);
        assert_eq!(cfg.statistics.water_loss_night_flow, 200.0);
        assert!(cfg.statistics.reference_time.is_none());

        assert_eq!(cfg.recommendations.low_pressure_event_limit, 50);
        assert_eq!(cfg.recommendations.critical_low_pressure_count, 100);

        assert_eq!(cfg.storage.db_path, PathBuf::from("data/waterguard.db"));
        assert_eq!(cfg.logging.level, "info");
        assert!(!cfg.logging.json);

        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_parse_example_toml() {
        let toml_str = r#"
[detection]
pressure_threshold_std = 3.0
flow_threshold_std = 2.5
min_hourly_samples = 8
night_flow_threshold = 250.0
pressure_drop_threshold = 20.0

[statistics]
low_pressure_threshold = 30.0
low_pressure_window_days = 14
reference_time = "2024-03-01T00:00:00Z"

[recommendations]
low_pressure_event_limit = 10

[storage]
db_path = "/var/lib/waterguard/readings.db"

[logging]
level = "debug"
json = true
"#;

        let cfg: EngineConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(cfg.detection.pressure_threshold_std, 3.0);
        assert_eq!(cfg.detection.flow_threshold_std, 2.5);
        assert_eq!(cfg.detection.min_hourly_samples, 8);
        assert_eq!(cfg.detection.night_flow_threshold, 250.0);
        assert_eq!(cfg.detection.pressure_drop_threshold, 20.0);
        assert_eq!(cfg.statistics.low_pressure_threshold, 30.0);
        assert_eq!(cfg.statistics.low_pressure_window_days, 14);
        assert_eq!(
            cfg.statistics.reference_time.unwrap().to_rfc3339(),
            "2024-03-01T00:00:00+00:00"
        );
        // Unset fields in a present section fall back to defaults.
        assert_eq!(cfg.statistics.water_loss_night_flow, 200.0);
        assert_eq!(cfg.recommendations.low_pressure_event_limit, 10);
        assert_eq!(cfg.recommendations.critical_low_pressure_count, 100);
        assert_eq!(
            cfg.storage.db_path,
            PathBuf::from("/var/lib/waterguard/readings.db")
        );
        assert_eq!(cfg.logging.level, "debug");
        assert!(cfg.logging.json);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let cfg: EngineConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.detection.pressure_threshold_std, 2.5);
        assert_eq!(cfg.statistics.low_pressure_window_days, 7);
    }

    #[test]
    fn test_validate_rejects_non_positive_threshold() {
        let mut cfg = EngineConfig::default();
        cfg.detection.pressure_threshold_std = 0.0;
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::NonPositive {
                field: "detection.pressure_threshold_std",
                value: 0.0
            })
        );

        let mut cfg = EngineConfig::default();
        cfg.detection.pressure_drop_threshold = -15.0;
        assert!(cfg.validate().is_err());

        let mut cfg = EngineConfig::default();
        cfg.detection.flow_threshold_std = f64::NAN;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_window_and_tiny_buckets() {
        let mut cfg = EngineConfig::default();
        cfg.statistics.low_pressure_window_days = 0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::TooSmall { field: "statistics.low_pressure_window_days", .. })
        ));

        let mut cfg = EngineConfig::default();
        cfg.detection.min_hourly_samples = 1;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_huge_window() {
        let mut cfg = EngineConfig::default();
        cfg.statistics.low_pressure_window_days = 200_000_000;
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::TooLarge {
                field: "statistics.low_pressure_window_days",
                max: 36_500,
                value: 200_000_000,
            })
        );

        cfg.statistics.low_pressure_window_days = MAX_WINDOW_DAYS;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("waterguard.toml");
        std::fs::write(&path, "[detection]\nnight_flow_threshold = 450.0\n").unwrap();

        let cfg = EngineConfig::resolve(Some(&path)).unwrap();
        assert_eq!(cfg.detection.night_flow_threshold, 450.0);
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let result = EngineConfig::resolve(Some(Path::new("/nonexistent/waterguard.toml")));
        assert!(result.is_err());
    }
}
