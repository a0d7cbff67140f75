use std::sync::Arc;

use anyhow::Result;

use crate::analysis::NetworkStatistics;
use crate::detect::{Analyzer, DetectionRun};

/// Shared, read-only state for the API handlers.
///
/// The snapshot never changes while the server runs, so detection and
/// statistics are computed once at startup.
#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<Analyzer>,
    pub run: Arc<DetectionRun>,
    pub stats: Arc<NetworkStatistics>,
}

impl AppState {
    pub async fn build(analyzer: Analyzer) -> Result<Self> {
        let run = analyzer.run_parallel().await?;
        let stats = analyzer.statistics();
        Ok(Self {
            analyzer: Arc::new(analyzer),
            run: Arc::new(run),
            stats: Arc::new(stats),
        })
    }
}
