//! REST API for simulation results.
//!
//! Provides three GET endpoints:
//! - `/state`: scenario, KPI report, and latest tick
//! - `/telemetry`: per-tick records with optional range filtering
//! - `/snapshot`: diagnostic snapshot of the final evaluation

mod handlers;
mod types;

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tracing::info;

use crate::config::ScenarioConfig;
use crate::diagnostics::DiagnosticSnapshot;
use crate::sim::kpi::KpiReport;
use crate::sim::types::StepResult;

pub use types::{ErrorResponse, StateResponse, TelemetryQuery, TelemetryRecord};

/// Immutable application state shared across all request handlers.
///
/// Constructed once after the simulation run completes and wrapped in
/// `Arc`; all data is read-only.
pub struct AppState {
    /// Scenario used for this run.
    pub scenario: ScenarioConfig,
    /// Aggregate KPI report.
    pub kpi: KpiReport,
    /// Per-tick simulation results.
    pub results: Vec<StepResult>,
    /// Snapshot of the last evaluation, if one was captured.
    pub snapshot: Option<DiagnosticSnapshot>,
}

/// Builds the axum router with all API routes.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/state", get(handlers::get_state))
        .route("/telemetry", get(handlers::get_telemetry))
        .route("/snapshot", get(handlers::get_snapshot))
        .with_state(state)
}

/// Binds to the given address and serves the API until the process exits.
///
/// # Errors
///
/// Returns an `io::Error` if the listener cannot bind or the server fails.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "API server listening");
    axum::serve(listener, app).await
}
