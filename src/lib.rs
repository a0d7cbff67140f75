//! Waterguard -- pressure and flow anomaly detection for water distribution
//! networks.
//!
//! This crate provides the reading store, the statistics engine, the four
//! anomaly detectors (pressure, flow, night-flow leaks, pipe bursts), the
//! aggregator that turns detector output into recommendations, and a small
//! read-only HTTP API.

pub mod aggregate;
pub mod analysis;
pub mod api;
pub mod config;
pub mod detect;
pub mod readings;
pub mod report;
pub mod storage;

use anyhow::Result;

use crate::detect::Analyzer;

/// Serve the read-only API over one analyzed snapshot.
pub async fn serve(bind: &str, analyzer: Analyzer) -> Result<()> {
    let addr: std::net::SocketAddr = bind.parse()?;
    let state = api::state::AppState::build(analyzer).await?;
    let app = api::router(state);

    tracing::info!(%addr, "Waterguard listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
