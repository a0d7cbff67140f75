use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::aggregate::{generate_recommendations, AnomalySummary, Recommendation};
use crate::analysis::NetworkStatistics;
use crate::config::{ensure_positive, ConfigError, EngineConfig};
use crate::detect::{
    burst, flow, leak, pressure, BurstRecord, FlowAnomaly, LeakRecord, PressureAnomaly,
};
use crate::readings::ReadingSnapshot;

/// Output of one full detection pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetectionRun {
    pub pressure_anomalies: Vec<PressureAnomaly>,
    pub flow_anomalies: Vec<FlowAnomaly>,
    pub leaks: Vec<LeakRecord>,
    pub bursts: Vec<BurstRecord>,
}

impl DetectionRun {
    pub fn summary(&self) -> AnomalySummary {
        AnomalySummary::from_run(self)
    }
}

/// Runs the detectors over one immutable snapshot with one validated
/// configuration.
#[derive(Debug, Clone)]
pub struct Analyzer {
    snapshot: Arc<ReadingSnapshot>,
    config: EngineConfig,
    reference_time: DateTime<Utc>,
}

impl Analyzer {
    /// Validate `config` and fix the reference time used by trailing windows.
    ///
    /// The reference time comes from `statistics.reference_time` when set,
    /// otherwise from the latest reading in the snapshot.
    pub fn new(snapshot: Arc<ReadingSnapshot>, config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let reference_time = config
            .statistics
            .reference_time
            .or_else(|| snapshot.latest_timestamp())
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        Ok(Self {
            snapshot,
            config,
            reference_time,
        })
    }

    /// Replace the reference time.
    pub fn with_reference_time(mut self, now: DateTime<Utc>) -> Self {
        self.reference_time = now;
        self
    }

    pub fn snapshot(&self) -> &ReadingSnapshot {
        &self.snapshot
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn reference_time(&self) -> DateTime<Utc> {
        self.reference_time
    }

    pub fn detect_pressure_anomalies(
        &self,
        threshold_std: f64,
    ) -> Result<Vec<PressureAnomaly>, ConfigError> {
        ensure_positive("threshold_std", threshold_std)?;
        Ok(pressure::detect_pressure_anomalies(
            self.snapshot.pressure(),
            threshold_std,
        ))
    }

    pub fn detect_flow_anomalies(
        &self,
        threshold_std: f64,
    ) -> Result<Vec<FlowAnomaly>, ConfigError> {
        ensure_positive("threshold_std", threshold_std)?;
        Ok(flow::detect_flow_anomalies(
            self.snapshot.flow(),
            threshold_std,
            self.config.detection.min_hourly_samples,
        ))
    }

    pub fn detect_leaks(&self, night_flow_threshold: f64) -> Result<Vec<LeakRecord>, ConfigError> {
        ensure_positive("night_flow_threshold", night_flow_threshold)?;
        Ok(leak::detect_leaks(self.snapshot.flow(), night_flow_threshold))
    }

    pub fn detect_burst_events(
        &self,
        pressure_drop_threshold: f64,
    ) -> Result<Vec<BurstRecord>, ConfigError> {
        ensure_positive("pressure_drop_threshold", pressure_drop_threshold)?;
        Ok(burst::detect_burst_events(
            self.snapshot.pressure(),
            pressure_drop_threshold,
        ))
    }

    /// Zone-level reporting statistics at the reference time.
    pub fn statistics(&self) -> NetworkStatistics {
        NetworkStatistics::compute(&self.snapshot, &self.config.statistics, self.reference_time)
    }

    /// Operator recommendations for a finished run.
    pub fn recommendations(
        &self,
        stats: &NetworkStatistics,
        run: &DetectionRun,
    ) -> Vec<Recommendation> {
        generate_recommendations(
            &stats.low_pressure_zones,
            &run.leaks,
            &run.bursts,
            self.config.recommendations.low_pressure_event_limit,
        )
    }

    /// Run all four detectors sequentially with the configured thresholds.
    pub fn run(&self) -> DetectionRun {
        let d = &self.config.detection;
        let run = DetectionRun {
            pressure_anomalies: pressure::detect_pressure_anomalies(
                self.snapshot.pressure(),
                d.pressure_threshold_std,
            ),
            flow_anomalies: flow::detect_flow_anomalies(
                self.snapshot.flow(),
                d.flow_threshold_std,
                d.min_hourly_samples,
            ),
            leaks: leak::detect_leaks(self.snapshot.flow(), d.night_flow_threshold),
            bursts: burst::detect_burst_events(self.snapshot.pressure(), d.pressure_drop_threshold),
        };
        log_run(&run);
        run
    }

    /// Run all four detectors on the blocking pool and join the results.
    ///
    /// Produces exactly what [`Analyzer::run`] produces.
    pub async fn run_parallel(&self) -> anyhow::Result<DetectionRun> {
        let d = self.config.detection.clone();

        let snap = self.snapshot.clone();
        let (p_thr, f_thr, min) = (
            d.pressure_threshold_std,
            d.flow_threshold_std,
            d.min_hourly_samples,
        );
        let pressure_task = tokio::task::spawn_blocking(move || {
            pressure::detect_pressure_anomalies(snap.pressure(), p_thr)
        });

        let snap = self.snapshot.clone();
        let flow_task = tokio::task::spawn_blocking(move || {
            flow::detect_flow_anomalies(snap.flow(), f_thr, min)
        });

        let snap = self.snapshot.clone();
        let night = d.night_flow_threshold;
        let leak_task =
            tokio::task::spawn_blocking(move || leak::detect_leaks(snap.flow(), night));

        let snap = self.snapshot.clone();
        let drop = d.pressure_drop_threshold;
        let burst_task =
            tokio::task::spawn_blocking(move || burst::detect_burst_events(snap.pressure(), drop));

        let (pressure_anomalies, flow_anomalies, leaks, bursts) =
            tokio::try_join!(pressure_task, flow_task, leak_task, burst_task)?;

        let run = DetectionRun {
            pressure_anomalies,
            flow_anomalies,
            leaks,
            bursts,
        };
        log_run(&run);
        Ok(run)
    }
}

fn log_run(run: &DetectionRun) {
    info!(
        pressure = run.pressure_anomalies.len(),
        flow = run.flow_anomalies.len(),
        leaks = run.leaks.len(),
        bursts = run.bursts.len(),
        "Detection pass complete"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readings::fixtures::{at, flow, pressure};

    fn snapshot() -> Arc<ReadingSnapshot> {
        let mut p: Vec<_> = (0..10).map(|h| pressure(at(0, h), "Z1", "Z1_S01", 50.0)).collect();
        p.push(pressure(at(0, 10), "Z1", "Z1_S01", 10.0));

        let mut f = Vec::new();
        for d in 0..7 {
            for h in 0..24 {
                let v = if h <= 5 { 350.0 } else { 50.0 + (d % 3) as f64 };
                f.push(flow(at(d, h), "Z1", v));
            }
        }
        Arc::new(ReadingSnapshot::new(vec![], p, f))
    }

    #[test]
    fn test_invalid_config_fails_fast() {
        let mut cfg = EngineConfig::default();
        cfg.detection.night_flow_threshold = 0.0;
        assert!(Analyzer::new(snapshot(), cfg).is_err());
    }

    #[test]
    fn test_invalid_call_threshold_is_rejected() {
        let analyzer = Analyzer::new(snapshot(), EngineConfig::default()).unwrap();
        assert!(analyzer.detect_pressure_anomalies(-1.0).is_err());
        assert!(analyzer.detect_burst_events(0.0).is_err());
        assert!(analyzer.detect_leaks(f64::INFINITY).is_err());
    }

    #[test]
    fn test_reference_time_defaults_to_latest_reading() {
        let analyzer = Analyzer::new(snapshot(), EngineConfig::default()).unwrap();
        assert_eq!(analyzer.reference_time(), at(6, 23));

        let mut cfg = EngineConfig::default();
        cfg.statistics.reference_time = Some(at(30, 0));
        let analyzer = Analyzer::new(snapshot(), cfg).unwrap();
        assert_eq!(analyzer.reference_time(), at(30, 0));
    }

    #[test]
    fn test_run_matches_individual_detectors() {
        let analyzer = Analyzer::new(snapshot(), EngineConfig::default()).unwrap();
        let run = analyzer.run();

        assert_eq!(run.pressure_anomalies, analyzer.detect_pressure_anomalies(2.5).unwrap());
        assert_eq!(run.flow_anomalies, analyzer.detect_flow_anomalies(2.0).unwrap());
        assert_eq!(run.leaks, analyzer.detect_leaks(300.0).unwrap());
        assert_eq!(run.bursts, analyzer.detect_burst_events(15.0).unwrap());

        assert_eq!(run.pressure_anomalies.len(), 1);
        assert_eq!(run.leaks.len(), 1);
        assert_eq!(run.bursts.len(), 1);
    }

    #[test]
    fn test_statistics_and_recommendations() {
        let analyzer = Analyzer::new(snapshot(), EngineConfig::default()).unwrap();
        let stats = analyzer.statistics();
        assert_eq!(stats.reference_time, at(6, 23));
        assert_eq!(stats.low_pressure_zones.len(), 1);
        assert_eq!(stats.low_pressure_zones[0].low_pressure_count, 1);

        let run = analyzer.run();
        let recs = analyzer.recommendations(&stats, &run);
        // One low-pressure event is below the recommendation limit.
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].issue, "Potential water leak");
        assert_eq!(recs[1].issue, "Potential pipe burst");
    }

    #[tokio::test]
    async fn test_parallel_run_matches_sequential() {
        let analyzer = Analyzer::new(snapshot(), EngineConfig::default()).unwrap();
        let parallel = analyzer.run_parallel().await.unwrap();
        assert_eq!(parallel, analyzer.run());
    }
}
