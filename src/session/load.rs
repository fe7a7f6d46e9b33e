//! Fuse-based load balancing.

use serde::{Deserialize, Serialize};

/// Lowest current a charger can run at (A). Below it charging pauses.
pub const MIN_CHARGING_CURRENT_A: f64 = 6.0;

/// Current per phase (A), L1 to L3.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseCurrents(pub [f64; 3]);

impl PhaseCurrents {
    /// Same current on every phase.
    pub fn balanced(amps: f64) -> Self {
        Self([amps; 3])
    }

    /// Highest phase current.
    pub fn max(&self) -> f64 {
        self.0.iter().copied().fold(0.0, f64::max)
    }

    fn is_finite(&self) -> bool {
        self.0.iter().all(|a| a.is_finite())
    }
}

impl std::ops::Add for PhaseCurrents {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self([
            self.0[0] + rhs.0[0],
            self.0[1] + rhs.0[1],
            self.0[2] + rhs.0[2],
        ])
    }
}

/// Current the charger may draw without any phase exceeding `fuse_amps`.
///
/// `grid` is the main meter reading, which includes the charger's own draw;
/// `charger` is that draw as reported by the charger, if it reports one.
/// Unreadable meters yield 0 A so that charging pauses.
pub fn available_current(
    fuse_amps: f64,
    grid: &PhaseCurrents,
    charger: Option<&PhaseCurrents>,
) -> f64 {
    let own = charger.copied().unwrap_or_default();
    if !grid.is_finite() || !own.is_finite() || !fuse_amps.is_finite() {
        return 0.0;
    }
    let house = (0..3)
        .map(|i| (grid.0[i] - own.0[i]).max(0.0))
        .fold(0.0, f64::max);
    (fuse_amps - house).clamp(0.0, fuse_amps.max(0.0))
}

/// Whether `available` amps are enough to run the charger.
pub fn allows_charging(available: f64) -> bool {
    available.floor() >= MIN_CHARGING_CURRENT_A
}
