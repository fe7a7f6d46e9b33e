use crate::devices::types::{Device, DeviceContext};
use crate::planner::charging_power_kw;
use crate::session::{Actuator, ActuatorError};

/// A wallbox that charges at full fuse power while switched on, or at its
/// current limit when load balancing sets one.
///
/// Implements [`Actuator`] so the session tracker can drive it directly.
/// Commands can be made to fail a number of times to exercise retries.
#[derive(Debug, Clone)]
pub struct SimCharger {
    /// Maximum charging power in kilowatts.
    pub max_power_kw: f64,
    /// Power per ampere of phase current (kW/A).
    pub kw_per_amp: f64,
    on: bool,
    current_limit: Option<f64>,
    failures_pending: usize,
    accepted_commands: usize,
}

impl SimCharger {
    /// Creates a switched-off three-phase 230 V charger.
    ///
    /// # Panics
    ///
    /// Panics if `max_power_kw` is not positive.
    pub fn new(max_power_kw: f64) -> Self {
        assert!(max_power_kw > 0.0);
        Self {
            max_power_kw,
            kw_per_amp: charging_power_kw(3, 230.0, 1.0),
            on: false,
            current_limit: None,
            failures_pending: 0,
            accepted_commands: 0,
        }
    }

    /// Sets the supply used to convert a current limit into power.
    pub fn with_supply(mut self, phases: u8, voltage: f64) -> Self {
        self.kw_per_amp = charging_power_kw(phases, voltage, 1.0);
        self
    }

    /// Current limit set by load balancing (A).
    pub fn current_limit(&self) -> Option<f64> {
        self.current_limit
    }

    /// Current drawn per phase at `power_kw`.
    pub fn phase_current(&self, power_kw: f64) -> f64 {
        if self.kw_per_amp > 0.0 {
            power_kw / self.kw_per_amp
        } else {
            0.0
        }
    }

    /// Makes the next `count` commands fail with [`ActuatorError::Unavailable`].
    pub fn fail_next(&mut self, count: usize) {
        self.failures_pending = count;
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    /// Number of commands the charger accepted.
    pub fn accepted_commands(&self) -> usize {
        self.accepted_commands
    }

    fn switch(&mut self, on: bool) -> Result<(), ActuatorError> {
        if self.failures_pending > 0 {
            self.failures_pending -= 1;
            return Err(ActuatorError::Unavailable("charger offline".to_string()));
        }
        self.on = on;
        self.accepted_commands += 1;
        Ok(())
    }
}

impl Actuator for SimCharger {
    fn start_charging(&mut self) -> Result<(), ActuatorError> {
        self.switch(true)
    }

    fn stop_charging(&mut self) -> Result<(), ActuatorError> {
        self.switch(false)
    }

    fn set_current_limit(&mut self, amps: f64) -> Result<(), ActuatorError> {
        if !(amps >= 0.0) {
            return Err(ActuatorError::Rejected(format!("current limit {amps} A")));
        }
        self.current_limit = Some(amps);
        Ok(())
    }
}

impl Device for SimCharger {
    /// Returns the power delivered to the car.
    ///
    /// The setpoint is the power the car can accept; without one the charger
    /// delivers its full power.
    fn power_kw(&mut self, context: &DeviceContext) -> f64 {
        if !self.on {
            return 0.0;
        }
        let limit_kw = self
            .current_limit
            .map_or(self.max_power_kw, |a| a * self.kw_per_amp);
        let cap = context.setpoint_kw.unwrap_or(self.max_power_kw).max(0.0);
        cap.min(self.max_power_kw).min(limit_kw)
    }

    fn device_type(&self) -> &'static str {
        "SimCharger"
    }
}
