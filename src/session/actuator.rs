//! Charge-control actuator seam.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Command for the charge-control actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActuatorCommand {
    Start,
    Stop,
}

impl ActuatorCommand {
    /// Command that moves the actuator to `on`.
    pub fn toward(on: bool) -> Self {
        if on { Self::Start } else { Self::Stop }
    }

    /// Sends the command to `actuator`.
    ///
    /// # Errors
    ///
    /// Propagates the actuator's failure.
    pub fn apply(self, actuator: &mut impl Actuator) -> Result<(), ActuatorError> {
        match self {
            Self::Start => actuator.start_charging(),
            Self::Stop => actuator.stop_charging(),
        }
    }
}

impl fmt::Display for ActuatorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Start => "start",
            Self::Stop => "stop",
        })
    }
}

/// Failure reported by an actuator.
#[derive(Debug, Clone, Error)]
pub enum ActuatorError {
    #[error("charger unavailable: {0}")]
    Unavailable(String),
    #[error("command rejected: {0}")]
    Rejected(String),
}

/// Something that can switch charging on and off.
pub trait Actuator {
    /// Switches charging on.
    ///
    /// # Errors
    ///
    /// Returns an [`ActuatorError`] if the charger did not accept the command.
    fn start_charging(&mut self) -> Result<(), ActuatorError>;

    /// Switches charging off.
    ///
    /// # Errors
    ///
    /// Returns an [`ActuatorError`] if the charger did not accept the command.
    fn stop_charging(&mut self) -> Result<(), ActuatorError>;

    /// Caps the charging current per phase.
    ///
    /// Chargers without a current limiter accept and ignore the cap.
    ///
    /// # Errors
    ///
    /// Returns an [`ActuatorError`] if the charger did not accept the limit.
    fn set_current_limit(&mut self, _amps: f64) -> Result<(), ActuatorError> {
        Ok(())
    }
}
