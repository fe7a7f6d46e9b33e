//! Energy and charging-time requirement.

use serde_json::json;

use super::Trace;
use super::types::{PlanningInput, Stage};

/// Energy needed to bring the battery from its current SOC to the target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct EnergyNeed {
    /// Energy that must reach the battery (kWh).
    pub kwh_needed: f64,
    /// Energy drawn from the grid after charger losses (kWh).
    pub kwh_to_pull: f64,
    /// Charging time at maximum power (hours).
    pub hours_needed: f64,
}

impl EnergyNeed {
    /// Computes the requirement from the input's charger parameters.
    ///
    /// # Errors
    ///
    /// Returns the name of the first parameter that is out of range: the
    /// SOC must lie in `[0, 100]`, the charger parameters must be finite and
    /// strictly positive.
    pub(crate) fn compute(input: &PlanningInput, target_soc: u8) -> Result<Self, &'static str> {
        if !(0.0..=100.0).contains(&input.car_soc) {
            return Err("car_soc");
        }
        let params = [
            ("battery_capacity_kwh", input.battery_capacity_kwh),
            ("charger_efficiency", input.charger_efficiency),
            ("max_charging_power_kw", input.max_charging_power_kw),
        ];
        if let Some((name, _)) = params.iter().find(|(_, v)| !v.is_finite() || *v <= 0.0) {
            return Err(*name);
        }

        let kwh_needed =
            (f64::from(target_soc) - input.car_soc) / 100.0 * input.battery_capacity_kwh;
        let kwh_to_pull = kwh_needed / input.charger_efficiency;
        let hours_needed = kwh_to_pull / input.max_charging_power_kw;

        Ok(Self {
            kwh_needed,
            kwh_to_pull,
            hours_needed,
        })
    }

    pub(crate) fn record(&self, trace: &mut Trace) {
        trace.record(
            Stage::Energy,
            format!(
                "Need {:.2} kWh ({:.2} kWh from grid), {:.2} h at full power",
                self.kwh_needed, self.kwh_to_pull, self.hours_needed
            ),
            json!({
                "kwh_needed": self.kwh_needed,
                "kwh_to_pull": self.kwh_to_pull,
                "hours_needed": self.hours_needed,
            }),
        );
    }
}

/// Maximum charging power for a fuse limit: `phases × voltage × amps / 1000`.
pub fn charging_power_kw(phases: u8, voltage: f64, fuse_amps: f64) -> f64 {
    f64::from(phases) * voltage * fuse_amps / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn input(soc: f64) -> PlanningInput {
        PlanningInput {
            now: NaiveDate::from_ymd_opt(2026, 2, 1)
                .and_then(|d| d.and_hms_opt(12, 0, 0))
                .unwrap(),
            car_plugged: true,
            car_soc: soc,
            smart_switch: true,
            manual_override: None,
            calendar_event: None,
            opportunistic_tiers: Vec::new(),
            base_target_soc: 80,
            standard_departure: None,
            battery_capacity_kwh: 64.0,
            charger_efficiency: 0.9,
            max_charging_power_kw: 13.8,
            prices: Vec::new(),
            tomorrow_valid: false,
        }
    }

    #[test]
    fn energy_accounts_for_losses() {
        let need = EnergyNeed::compute(&input(47.0), 80).unwrap();
        // 33% of 64 kWh = 21.12 kWh, / 0.9 = 23.4667 kWh, / 13.8 kW = 1.7005 h
        assert!((need.kwh_needed - 21.12).abs() < 1e-9);
        assert!((need.kwh_to_pull - 23.466_666).abs() < 1e-5);
        assert!((need.hours_needed - 1.700_483).abs() < 1e-5);
    }

    #[test]
    fn rejects_zero_efficiency() {
        let mut i = input(47.0);
        i.charger_efficiency = 0.0;
        assert_eq!(EnergyNeed::compute(&i, 80), Err("charger_efficiency"));
    }

    #[test]
    fn rejects_nan_capacity() {
        let mut i = input(47.0);
        i.battery_capacity_kwh = f64::NAN;
        assert_eq!(EnergyNeed::compute(&i, 80), Err("battery_capacity_kwh"));
    }

    #[test]
    fn rejects_soc_outside_percent_range() {
        assert_eq!(EnergyNeed::compute(&input(f64::NAN), 80), Err("car_soc"));
        assert_eq!(EnergyNeed::compute(&input(-3.0), 80), Err("car_soc"));
        assert_eq!(EnergyNeed::compute(&input(f64::INFINITY), 80), Err("car_soc"));
        assert!(EnergyNeed::compute(&input(0.0), 80).is_ok());
    }

    #[test]
    fn three_phase_sixteen_amps() {
        assert!((charging_power_kw(3, 230.0, 16.0) - 11.04).abs() < 1e-9);
    }
}
