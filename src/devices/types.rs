//! Common types and traits for simulated devices.

use chrono::NaiveDateTime;
use rand::{Rng, rngs::StdRng};

/// Contextual information passed to devices for one simulation tick.
///
/// # Fields
/// * `now` - Start of the tick
/// * `dt_hours` - Tick length in hours
/// * `setpoint_kw` - Optional power limit imposed by the connected load (kW)
#[derive(Debug, Clone, Copy)]
pub struct DeviceContext {
    pub now: NaiveDateTime,
    pub dt_hours: f64,
    pub setpoint_kw: Option<f64>,
}

impl DeviceContext {
    /// Creates a context with no setpoint.
    pub fn new(now: NaiveDateTime, dt_hours: f64) -> Self {
        Self {
            now,
            dt_hours,
            setpoint_kw: None,
        }
    }

    /// Creates a context with the given power limit.
    pub fn with_setpoint(now: NaiveDateTime, dt_hours: f64, setpoint_kw: f64) -> Self {
        Self {
            now,
            dt_hours,
            setpoint_kw: Some(setpoint_kw),
        }
    }
}

/// A device that draws power from the grid.
pub trait Device {
    /// Returns the power drawn during the tick described by `context`.
    ///
    /// # Returns
    ///
    /// Power in kilowatts (kW), zero or positive.
    fn power_kw(&mut self, context: &DeviceContext) -> f64;

    /// Returns a human-readable type name for the device.
    fn device_type(&self) -> &'static str;
}

/// Generates Gaussian noise using the Box-Muller transform.
///
/// # Arguments
///
/// * `rng` - Random number generator
/// * `std_dev` - Standard deviation of the noise
///
/// # Returns
///
/// Random value from a Gaussian distribution with mean 0 and the given
/// standard deviation
pub fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }

    let u1: f64 = rng.random::<f64>().clamp(1e-9, 1.0);
    let u2: f64 = rng.random::<f64>();
    let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    z0 * std_dev
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn zero_std_is_silent() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(gaussian_noise(&mut rng, 0.0), 0.0);
    }

    #[test]
    fn noise_is_roughly_centered() {
        let mut rng = StdRng::seed_from_u64(7);
        let n = 5000;
        let mean = (0..n).map(|_| gaussian_noise(&mut rng, 1.0)).sum::<f64>() / n as f64;
        assert!(mean.abs() < 0.1, "mean {mean}");
    }
}
