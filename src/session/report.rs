//! Per-session history and the final report produced on unplug.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One recorded evaluation during a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPoint {
    pub time: NaiveDateTime,
    pub soc: f64,
    /// Whether the actuator was on after this evaluation.
    pub charging: bool,
    /// Grid power drawn while charging (kW).
    pub power_kw: f64,
    /// Adjusted price of the slot containing `time`, if known.
    pub price: Option<f64>,
}

/// Summary of a finished charging session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub started_at: NaiveDateTime,
    pub ended_at: NaiveDateTime,
    pub start_soc: f64,
    pub end_soc: f64,
    /// Energy drawn from the grid (kWh).
    pub energy_kwh: f64,
    /// Cost of that energy at the slot prices.
    pub cost: f64,
    /// Number of start/stop commands issued.
    pub commands: usize,
    pub history: Vec<SessionPoint>,
}

impl SessionReport {
    /// Builds a report by integrating the session history.
    ///
    /// Each interval between consecutive points is charged at the power and
    /// price of its first point. Points without a price contribute energy but
    /// no cost.
    pub fn from_history(
        started_at: NaiveDateTime,
        ended_at: NaiveDateTime,
        history: Vec<SessionPoint>,
        commands: usize,
    ) -> Self {
        let (energy_kwh, cost) = session_totals(&history);
        let start_soc = history.first().map_or(0.0, |p| p.soc);
        let end_soc = history.last().map_or(start_soc, |p| p.soc);
        Self {
            started_at,
            ended_at,
            start_soc,
            end_soc,
            energy_kwh,
            cost,
            commands,
            history,
        }
    }

    /// Average price paid per kWh, or `None` when no energy was drawn.
    pub fn average_price(&self) -> Option<f64> {
        (self.energy_kwh > 0.0).then(|| self.cost / self.energy_kwh)
    }
}

/// Returns `(energy_kwh, cost)` for a recorded history.
pub fn session_totals(history: &[SessionPoint]) -> (f64, f64) {
    history
        .windows(2)
        .filter(|w| w[0].charging && w[0].power_kw > 0.0)
        .fold((0.0, 0.0), |(kwh, cost), w| {
            let hours = (w[1].time - w[0].time).num_seconds() as f64 / 3600.0;
            let delta = w[0].power_kw * hours;
            (kwh + delta, cost + delta * w[0].price.unwrap_or(0.0))
        })
}

impl fmt::Display for SessionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "session {} -> {}: SOC {:.1}% -> {:.1}%, {:.2} kWh, cost {:.2}",
            self.started_at.format("%Y-%m-%d %H:%M"),
            self.ended_at.format("%Y-%m-%d %H:%M"),
            self.start_soc,
            self.end_soc,
            self.energy_kwh,
            self.cost
        )
    }
}
