//! Request handlers for the API endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use super::AppState;
use super::types::{ErrorResponse, StateResponse, TelemetryQuery, TelemetryRecord};

/// Returns scenario, KPI report, and latest telemetry record.
///
/// `GET /state` → 200 + `StateResponse` JSON
pub async fn get_state(State(state): State<Arc<AppState>>) -> Json<StateResponse> {
    Json(StateResponse {
        scenario: state.scenario.clone(),
        kpi: state.kpi.clone(),
        latest_step: state.results.last().map(TelemetryRecord::from),
    })
}

/// Returns telemetry records, optionally filtered by tick range.
///
/// `GET /telemetry` → 200 + `Vec<TelemetryRecord>` JSON
/// `GET /telemetry?from=N&to=M` → filtered range (inclusive)
/// `GET /telemetry?from=10&to=5` → 400 + `ErrorResponse`
pub async fn get_telemetry(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TelemetryQuery>,
) -> impl IntoResponse {
    let from = query.from.unwrap_or(0);
    let to = query.to.unwrap_or(usize::MAX);

    if from > to {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!("`from` ({from}) must be <= `to` ({to})"),
            }),
        ));
    }

    let records: Vec<TelemetryRecord> = state
        .results
        .iter()
        .filter(|r| r.timestep >= from && r.timestep <= to)
        .map(TelemetryRecord::from)
        .collect();

    Ok(Json(records))
}

/// Returns the diagnostic snapshot of the final evaluation.
///
/// `GET /snapshot` → 200 + `DiagnosticSnapshot` JSON, or 404 when the run
/// produced none
pub async fn get_snapshot(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match &state.snapshot {
        Some(snapshot) => Ok(Json(snapshot.clone())),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "no snapshot captured".to_string(),
            }),
        )),
    }
}
