//! System report: everything an operator dashboard needs from one run.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::aggregate::{AnomalySummary, Recommendation};
use crate::analysis::health::{self, PerformanceMetrics, SystemOverview, ZoneHealth};
use crate::detect::{Analyzer, DetectionRun};

#[derive(Debug, Clone, Serialize)]
pub struct AnomalySection {
    pub summary: AnomalySummary,
    /// Raw detector output, only when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<DetectionRun>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemReport {
    pub report_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub reference_time: DateTime<Utc>,
    pub overview: SystemOverview,
    pub performance_metrics: PerformanceMetrics,
    pub zone_health: Vec<ZoneHealth>,
    pub anomalies: AnomalySection,
    pub recommendations: Vec<Recommendation>,
}

impl SystemReport {
    /// Assemble a report from a finished detection run.
    pub fn build(
        analyzer: &Analyzer,
        run: DetectionRun,
        generated_at: DateTime<Utc>,
        include_records: bool,
    ) -> Self {
        let stats = analyzer.statistics();
        let recommendations = analyzer.recommendations(&stats, &run);

        let zone_health = health::zone_health(
            &stats.zones,
            &stats.low_pressure_zones,
            analyzer.config().recommendations.critical_low_pressure_count,
        );
        let performance_metrics =
            health::performance_metrics(&stats.zones, &stats.flow, &stats.water_loss);

        Self {
            report_id: Uuid::new_v4(),
            generated_at,
            reference_time: analyzer.reference_time(),
            overview: health::system_overview(analyzer.snapshot().zones()),
            performance_metrics,
            zone_health,
            anomalies: AnomalySection {
                summary: run.summary(),
                records: include_records.then_some(run),
            },
            recommendations,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize report")
    }

    /// Write the report as pretty JSON, creating parent directories.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(path, self.to_json()?)
            .with_context(|| format!("failed to write report: {}", path.display()))?;
        tracing::info!(path = %path.display(), id = %self.report_id, "Report exported");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::readings::fixtures::{at, flow, pressure, zone};
    use crate::readings::ReadingSnapshot;
    use std::sync::Arc;

    fn analyzer() -> Analyzer {
        let mut p = Vec::new();
        for h in 0..48 {
            p.push(pressure(at(0, h), "Z1", "Z1_S01", 52.0 + (h % 4) as f64));
            p.push(pressure(at(0, h), "Z2", "Z2_S01", 33.0 + (h % 2) as f64));
        }
        p.push(pressure(at(2, 0), "Z1", "Z1_S01", 20.0));

        let mut f = Vec::new();
        for d in 0..3 {
            for h in 0..24 {
                f.push(flow(at(d, h), "Z1", if h <= 5 { 520.0 } else { 300.0 }));
            }
        }

        let snap = ReadingSnapshot::new(vec![zone("Z1", 50_000, 1), zone("Z2", 40_000, 1)], p, f);
        Analyzer::new(Arc::new(snap), EngineConfig::default()).unwrap()
    }

    #[test]
    fn test_build_report() {
        let analyzer = analyzer();
        let run = analyzer.run();
        let report = SystemReport::build(&analyzer, run, at(10, 0), false);

        assert_eq!(report.overview.total_zones, 2);
        assert_eq!(report.overview.total_population, 90_000);
        assert_eq!(report.zone_health.len(), 2);
        assert_eq!(report.anomalies.summary.potential_leaks, 1);
        assert_eq!(report.anomalies.summary.potential_bursts, 1);
        assert!(report.anomalies.records.is_none());
        assert!(report
            .recommendations
            .iter()
            .any(|r| r.issue == "Potential water leak"));
    }

    #[test]
    fn test_report_json_shape() {
        let analyzer = analyzer();
        let report = SystemReport::build(&analyzer, analyzer.run(), at(10, 0), true);
        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

        assert!(value["report_id"].is_string());
        assert_eq!(value["anomalies"]["summary"]["potential_leaks"], 1);
        assert_eq!(value["anomalies"]["records"]["leaks"][0]["severity"], "high");
        assert_eq!(value["zone_health"][1]["status"], "warning");
    }

    #[test]
    fn test_write_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/report.json");
        let analyzer = analyzer();
        SystemReport::build(&analyzer, analyzer.run(), at(10, 0), false)
            .write_json(&path)
            .unwrap();
        assert!(path.exists());
    }
}
