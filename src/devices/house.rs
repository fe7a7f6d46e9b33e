use chrono::{NaiveDateTime, Timelike};
use rand::{SeedableRng, rngs::StdRng};

use crate::config::HouseConfig;
use crate::devices::types::{Device, DeviceContext, gaussian_noise};
use crate::session::PhaseCurrents;

/// Share of the house load carried by each phase.
const PHASE_SHARES: [f64; 3] = [1.0, 0.6, 0.35];

/// Household consumption seen by the main meter, excluding the charger.
///
/// Each phase follows a daily cosine peaking at `peak_hour`, scaled by a
/// fixed phase imbalance, plus Gaussian noise. Currents never go negative.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use ev_charge_planner::config::HouseConfig;
/// use ev_charge_planner::devices::HouseLoad;
///
/// let mut house = HouseLoad::new(&HouseConfig::default(), 230.0, 7);
/// let evening = NaiveDate::from_ymd_opt(2026, 2, 1)
///     .and_then(|d| d.and_hms_opt(19, 0, 0))
///     .unwrap();
/// let amps = house.currents(evening);
/// assert!(amps.max() > 0.0);
/// ```
#[derive(Debug, Clone)]
pub struct HouseLoad {
    /// Mean current on the most loaded phase (A).
    pub base_amps: f64,
    /// Daily swing around the mean (A).
    pub swing_amps: f64,
    /// Hour of the daily peak.
    pub peak_hour: u32,
    /// Noise standard deviation (A).
    pub noise_std: f64,
    /// Phase voltage (V).
    pub voltage: f64,
    rng: StdRng,
}

impl HouseLoad {
    pub fn new(cfg: &HouseConfig, voltage: f64, seed: u64) -> Self {
        Self {
            base_amps: cfg.base_amps,
            swing_amps: cfg.swing_amps,
            peak_hour: cfg.peak_hour,
            noise_std: cfg.noise_std,
            voltage,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Per-phase house current at `now`.
    pub fn currents(&mut self, now: NaiveDateTime) -> PhaseCurrents {
        let hour = f64::from(now.hour()) + f64::from(now.minute()) / 60.0;
        let angle = 2.0 * std::f64::consts::PI * (hour - f64::from(self.peak_hour)) / 24.0;
        let level = self.base_amps + self.swing_amps * angle.cos();

        let mut amps = [0.0; 3];
        for (a, share) in amps.iter_mut().zip(PHASE_SHARES) {
            *a = (level * share + gaussian_noise(&mut self.rng, self.noise_std)).max(0.0);
        }
        PhaseCurrents(amps)
    }
}

impl Device for HouseLoad {
    /// Returns the household power at the context time.
    fn power_kw(&mut self, context: &DeviceContext) -> f64 {
        let amps = self.currents(context.now);
        amps.0.iter().sum::<f64>() * self.voltage / 1000.0
    }

    fn device_type(&self) -> &'static str {
        "HouseLoad"
    }
}
