//! Post-hoc KPI computation from simulation results.

use std::fmt;

use serde::Serialize;

use super::types::StepResult;

/// Aggregate key performance indicators derived from a complete simulation run.
///
/// Computed post-hoc from `Vec<StepResult>` to ensure consistency between
/// step data and reported metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiReport {
    /// Energy drawn from the grid (kWh).
    pub energy_kwh: f64,
    /// Cost of that energy at slot prices.
    pub cost: f64,
    /// Cost per kWh, zero when nothing was charged.
    pub avg_price: f64,
    /// Time the charger delivered power (h).
    pub charging_hours: f64,
    /// Start/stop commands accepted by the charger.
    pub commands: usize,
    /// Ticks where only the buffer window kept charging on.
    pub buffer_ticks: usize,
    pub departures_met: usize,
    pub departures_missed: usize,
    /// Mean SOC at departure (percent), zero without departures.
    pub mean_departure_soc: f64,
}

impl KpiReport {
    /// Computes all KPIs from the complete step record vector.
    ///
    /// # Arguments
    ///
    /// * `results` - Complete simulation step results
    /// * `dt_hours` - Tick duration in hours
    ///
    /// # Returns
    ///
    /// A `KpiReport` with all fields populated.
    pub fn from_results(results: &[StepResult], dt_hours: f64) -> Self {
        let mut energy = 0.0;
        let mut cost = 0.0;
        let mut charging_ticks = 0_usize;
        let mut commands = 0_usize;
        let mut buffer_ticks = 0_usize;
        let mut met = 0_usize;
        let mut missed = 0_usize;
        let mut departure_soc_sum = 0.0;

        for r in results {
            let kwh = r.energy_kwh(dt_hours);
            energy += kwh;
            cost += kwh * r.price.unwrap_or(0.0);
            if r.power_kw > 0.0 {
                charging_ticks += 1;
            }
            if r.command.is_some() {
                commands += 1;
            }
            if r.buffer_active {
                buffer_ticks += 1;
            }
            if let Some(d) = r.departure {
                departure_soc_sum += d.soc;
                if d.met() {
                    met += 1;
                } else {
                    missed += 1;
                }
            }
        }

        let departures = met + missed;
        Self {
            energy_kwh: energy,
            cost,
            avg_price: if energy > 0.0 { cost / energy } else { 0.0 },
            charging_hours: charging_ticks as f64 * dt_hours,
            commands,
            buffer_ticks,
            departures_met: met,
            departures_missed: missed,
            mean_departure_soc: if departures > 0 {
                departure_soc_sum / departures as f64
            } else {
                0.0
            },
        }
    }
}

impl fmt::Display for KpiReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- KPI Report ---")?;
        writeln!(f, "Energy charged:        {:.2} kWh", self.energy_kwh)?;
        writeln!(f, "Charging cost:         {:.2}", self.cost)?;
        writeln!(f, "Average price:         {:.4} /kWh", self.avg_price)?;
        writeln!(f, "Charging time:         {:.2} h", self.charging_hours)?;
        writeln!(f, "Charger commands:      {}", self.commands)?;
        writeln!(f, "Buffer ticks:          {}", self.buffer_ticks)?;
        writeln!(f, "Departures met:        {}", self.departures_met)?;
        writeln!(f, "Departures missed:     {}", self.departures_missed)?;
        write!(f, "Mean departure SOC:    {:.1} %", self.mean_departure_soc)
    }
}
