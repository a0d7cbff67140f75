//! API route definitions.

use axum::extract::{Query, State};
use axum::{routing::get, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::state::AppState;
use crate::detect::Severity;
use crate::report::SystemReport;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/summary", get(summary))
        .route("/anomalies/pressure", get(pressure_anomalies))
        .route("/anomalies/flow", get(flow_anomalies))
        .route("/leaks", get(leaks))
        .route("/bursts", get(bursts))
        .route("/statistics/zones", get(zone_statistics))
        .route("/statistics/flow", get(flow_statistics))
        .route("/statistics/peak-demand", get(peak_demand))
        .route("/statistics/water-loss", get(water_loss))
        .route("/recommendations", get(recommendations))
        .route("/report", get(report))
}

/// Optional `?min_severity=high` filter for the anomaly listings.
#[derive(Debug, Default, Deserialize)]
pub struct SeverityFilter {
    min_severity: Option<Severity>,
}

impl SeverityFilter {
    fn keeps(&self, severity: Severity) -> bool {
        self.min_severity.map_or(true, |min| severity >= min)
    }
}

fn list<T: Serialize>(state: &AppState, items: &[T]) -> Json<Value> {
    Json(json!({
        "data": items,
        "meta": {
            "total": items.len(),
            "reference_time": state.analyzer.reference_time().to_rfc3339(),
        }
    }))
}

async fn health() -> Json<Value> {
    Json(json!({
        "data": {
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION")
        },
        "meta": {
            "timestamp": Utc::now().to_rfc3339(),
            "version": env!("CARGO_PKG_VERSION")
        }
    }))
}

async fn summary(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "data": state.run.summary(),
        "meta": { "reference_time": state.analyzer.reference_time().to_rfc3339() }
    }))
}

async fn pressure_anomalies(
    State(state): State<AppState>,
    Query(filter): Query<SeverityFilter>,
) -> Json<Value> {
    let items: Vec<_> = state
        .run
        .pressure_anomalies
        .iter()
        .filter(|a| filter.keeps(a.severity))
        .collect();
    list(&state, &items)
}

async fn flow_anomalies(
    State(state): State<AppState>,
    Query(filter): Query<SeverityFilter>,
) -> Json<Value> {
    let items: Vec<_> = state
        .run
        .flow_anomalies
        .iter()
        .filter(|a| filter.keeps(a.severity))
        .collect();
    list(&state, &items)
}

async fn leaks(State(state): State<AppState>) -> Json<Value> {
    list(&state, &state.run.leaks)
}

async fn bursts(State(state): State<AppState>) -> Json<Value> {
    list(&state, &state.run.bursts)
}

async fn zone_statistics(State(state): State<AppState>) -> Json<Value> {
    list(&state, &state.stats.zones)
}

async fn flow_statistics(State(state): State<AppState>) -> Json<Value> {
    list(&state, &state.stats.flow)
}

async fn peak_demand(State(state): State<AppState>) -> Json<Value> {
    list(&state, &state.stats.peak_demand)
}

async fn water_loss(State(state): State<AppState>) -> Json<Value> {
    list(&state, &state.stats.water_loss)
}

async fn recommendations(State(state): State<AppState>) -> Json<Value> {
    let recs = state.analyzer.recommendations(&state.stats, &state.run);
    list(&state, &recs)
}

async fn report(State(state): State<AppState>) -> Json<Value> {
    let report = SystemReport::build(&state.analyzer, (*state.run).clone(), Utc::now(), false);
    let report_id = report.report_id;
    Json(json!({
        "data": report,
        "meta": { "report_id": report_id }
    }))
}
