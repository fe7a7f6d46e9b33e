//! Per-tick simulation records.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::planner::PlanOutcome;
use crate::session::{ActuatorCommand, SessionState};

/// SOC at a departure compared to the target the planner was working toward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepartureRecord {
    pub soc: f64,
    pub target_soc: u8,
}

impl DepartureRecord {
    /// Slack allowed for tick rounding (percentage points).
    pub const TOLERANCE: f64 = 0.5;

    pub fn met(&self) -> bool {
        self.soc + Self::TOLERANCE >= f64::from(self.target_soc)
    }
}

/// Complete record of one simulation tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    /// Tick index.
    pub timestep: usize,
    /// Start of the tick.
    pub time: NaiveDateTime,
    pub plugged: bool,
    /// True SOC of the car after this tick (percent).
    pub car_soc: f64,
    /// SOC the planner saw (sensor plus integration).
    pub estimated_soc: f64,
    /// Whether the charger was switched on during this tick.
    pub charging: bool,
    /// Power delivered during this tick (kW).
    pub power_kw: f64,
    /// Adjusted price of the current slot.
    pub price: Option<f64>,
    pub target_soc: u8,
    pub outcome: PlanOutcome,
    pub state: SessionState,
    /// Charging was kept on only by the buffer window.
    pub buffer_active: bool,
    /// Current left for the charger under the main fuse (A).
    pub available_current: Option<f64>,
    /// Charging was paused because the house load left too little current.
    pub load_limited: bool,
    /// Command sent to the charger at this tick.
    pub command: Option<ActuatorCommand>,
    /// Set on the tick the car left.
    pub departure: Option<DepartureRecord>,
}

impl StepResult {
    /// Energy drawn during a tick of `dt_hours` (kWh).
    pub fn energy_kwh(&self, dt_hours: f64) -> f64 {
        self.power_kw * dt_hours
    }
}

impl fmt::Display for StepResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "t={:>3} ({}) | soc={:>5.1}% est={:>5.1}% target={:>3}% | \
             {:<15} {:<24} | p={:>5.2} kW price={}",
            self.timestep,
            self.time.format("%m-%d %H:%M"),
            self.car_soc,
            self.estimated_soc,
            self.target_soc,
            self.state.to_string(),
            self.outcome.to_string(),
            self.power_kw,
            self.price
                .map_or_else(|| "  -   ".to_string(), |p| format!("{p:>6.3}")),
        )?;
        if self.buffer_active {
            write!(f, " buffer")?;
        }
        if self.load_limited {
            write!(f, " load-limited")?;
        }
        if let Some(cmd) = self.command {
            write!(f, " cmd={cmd}")?;
        }
        if let Some(d) = self.departure {
            write!(
                f,
                " departed soc={:.1}% ({})",
                d.soc,
                if d.met() { "met" } else { "missed" }
            )?;
        }
        Ok(())
    }
}
