//! API response and query types.
//!
//! Field names follow the CSV telemetry columns.

use serde::{Deserialize, Serialize};

use crate::config::ScenarioConfig;
use crate::planner::PlanOutcome;
use crate::session::SessionState;
use crate::sim::kpi::KpiReport;
use crate::sim::types::StepResult;

/// Combined state response: scenario, KPIs, and latest telemetry record.
#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub scenario: ScenarioConfig,
    pub kpi: KpiReport,
    /// Most recent telemetry record, `null` for an empty run.
    pub latest_step: Option<TelemetryRecord>,
}

/// Single telemetry record using the CSV column names.
///
/// Maps internal `StepResult` fields to the public API contract:
/// - `command` → its `start`/`stop` label
/// - `departure` → `departure_soc` and `departure_met`
#[derive(Debug, Serialize)]
pub struct TelemetryRecord {
    pub timestep: usize,
    /// Tick start (`YYYY-MM-DDTHH:MM`).
    pub time: String,
    pub plugged: bool,
    pub car_soc: f64,
    pub estimated_soc: f64,
    pub target_soc: u8,
    pub charging: bool,
    pub power_kw: f64,
    pub price: Option<f64>,
    pub outcome: PlanOutcome,
    pub state: SessionState,
    pub buffer_active: bool,
    pub available_current: Option<f64>,
    pub load_limited: bool,
    pub command: Option<String>,
    pub departure_soc: Option<f64>,
    pub departure_met: Option<bool>,
}

impl From<&StepResult> for TelemetryRecord {
    fn from(r: &StepResult) -> Self {
        Self {
            timestep: r.timestep,
            time: r.time.format("%Y-%m-%dT%H:%M").to_string(),
            plugged: r.plugged,
            car_soc: r.car_soc,
            estimated_soc: r.estimated_soc,
            target_soc: r.target_soc,
            charging: r.charging,
            power_kw: r.power_kw,
            price: r.price,
            outcome: r.outcome,
            state: r.state,
            buffer_active: r.buffer_active,
            available_current: r.available_current,
            load_limited: r.load_limited,
            command: r.command.map(|c| c.to_string()),
            departure_soc: r.departure.map(|d| d.soc),
            departure_met: r.departure.map(|d| d.met()),
        }
    }
}

/// Optional range query parameters for the telemetry endpoint.
#[derive(Debug, Deserialize)]
pub struct TelemetryQuery {
    /// Start tick (inclusive).
    pub from: Option<usize>,
    /// End tick (inclusive).
    pub to: Option<usize>,
}

/// Error response body for 4xx errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ActuatorCommand;
    use crate::sim::types::DepartureRecord;
    use chrono::NaiveDate;

    #[test]
    fn telemetry_record_from_step_result_maps_fields() {
        let step = StepResult {
            timestep: 5,
            time: NaiveDate::from_ymd_opt(2026, 2, 2)
                .and_then(|d| d.and_hms_opt(7, 0, 0))
                .unwrap(),
            plugged: false,
            car_soc: 60.0,
            estimated_soc: 81.0,
            charging: false,
            power_kw: 0.0,
            price: Some(1.1),
            target_soc: 80,
            outcome: PlanOutcome::CarNotPlugged,
            state: SessionState::Idle,
            buffer_active: false,
            available_current: None,
            load_limited: false,
            command: Some(ActuatorCommand::Stop),
            departure: Some(DepartureRecord {
                soc: 81.0,
                target_soc: 80,
            }),
        };
        let record = TelemetryRecord::from(&step);

        assert_eq!(record.timestep, 5);
        assert_eq!(record.time, "2026-02-02T07:00");
        assert_eq!(record.command.as_deref(), Some("stop"));
        assert_eq!(record.departure_soc, Some(81.0));
        assert_eq!(record.departure_met, Some(true));

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["outcome"], "car_not_plugged");
        assert_eq!(json["state"], "idle");
    }
}
