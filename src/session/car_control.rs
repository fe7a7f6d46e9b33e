//! Car-side control: the car's own charge limit and forced sensor refreshes.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::actuator::ActuatorError;
use crate::planner::{Plan, PlanOutcome};

/// At-target refreshes are spaced at least this far apart.
const AT_TARGET_REFRESH_HOURS: i64 = 12;

/// When to force the car to report a fresh SOC while plugged in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefreshPolicy {
    #[default]
    #[serde(rename = "never")]
    Never,
    #[serde(rename = "30min")]
    Every30Min,
    #[serde(rename = "1h")]
    EveryHour,
    #[serde(rename = "2h")]
    Every2Hours,
    #[serde(rename = "3h")]
    Every3Hours,
    #[serde(rename = "4h")]
    Every4Hours,
    /// Confirm the estimate once it reaches the target.
    #[serde(rename = "at_target")]
    AtTarget,
}

impl RefreshPolicy {
    fn interval(self) -> Option<Duration> {
        match self {
            Self::Every30Min => Some(Duration::minutes(30)),
            Self::EveryHour => Some(Duration::hours(1)),
            Self::Every2Hours => Some(Duration::hours(2)),
            Self::Every3Hours => Some(Duration::hours(3)),
            Self::Every4Hours => Some(Duration::hours(4)),
            Self::Never | Self::AtTarget => None,
        }
    }
}

/// The car's remote interface.
pub trait CarLink {
    /// Sets the SOC at which the car stops accepting energy.
    ///
    /// # Errors
    ///
    /// Returns an [`ActuatorError`] if the car did not accept the limit.
    fn set_charge_limit(&mut self, soc: u8) -> Result<(), ActuatorError>;

    /// Asks the car to report its SOC now.
    ///
    /// # Errors
    ///
    /// Returns an [`ActuatorError`] if the car could not be woken.
    fn request_refresh(&mut self, now: NaiveDateTime) -> Result<(), ActuatorError>;
}

/// What [`CarController::drive`] sent to the car.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CarActions {
    /// Charge limit accepted by the car.
    pub charge_limit: Option<u8>,
    pub refreshed: bool,
}

/// Keeps the car's charge limit on the planned target and refreshes its
/// SOC sensor according to a [`RefreshPolicy`].
#[derive(Debug, Clone, Default)]
pub struct CarController {
    policy: RefreshPolicy,
    applied_limit: Option<u8>,
    last_refresh: Option<NaiveDateTime>,
    was_charging: bool,
}

impl CarController {
    pub fn new(policy: RefreshPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Applies `plan` to the car after the charger was driven.
    ///
    /// The charge limit is sent when the target changes and again whenever
    /// charging starts. Nothing is sent to an unplugged car.
    ///
    /// # Arguments
    ///
    /// * `now` - Evaluation time
    /// * `plan` - Plan the tracker just acted on
    /// * `estimated_soc` - SOC the planner saw
    /// * `charging` - Whether the charger is on after this evaluation
    /// * `car` - Car interface
    pub fn drive(
        &mut self,
        now: NaiveDateTime,
        plan: &Plan,
        estimated_soc: f64,
        charging: bool,
        car: &mut impl CarLink,
    ) -> CarActions {
        let mut actions = CarActions::default();
        if plan.outcome == PlanOutcome::CarNotPlugged {
            self.was_charging = false;
            return actions;
        }

        let starting = charging && !self.was_charging;
        if self.applied_limit != Some(plan.target_soc) || starting {
            match car.set_charge_limit(plan.target_soc) {
                Ok(()) => {
                    info!(limit = plan.target_soc, "car charge limit set");
                    self.applied_limit = Some(plan.target_soc);
                    actions.charge_limit = Some(plan.target_soc);
                }
                Err(e) => warn!(error = %e, "failed to set car charge limit"),
            }
        }

        if self.refresh_due(now, estimated_soc, plan.target_soc) {
            match car.request_refresh(now) {
                Ok(()) => {
                    info!(soc = estimated_soc, "forced car sensor refresh");
                    self.last_refresh = Some(now);
                    actions.refreshed = true;
                }
                Err(e) => warn!(error = %e, "failed to refresh car sensors"),
            }
        }

        self.was_charging = charging;
        actions
    }

    fn refresh_due(&self, now: NaiveDateTime, estimated_soc: f64, target_soc: u8) -> bool {
        let since = self.last_refresh.map(|last| now - last);
        let elapsed = |limit: Duration| since.is_none_or(|d| d > limit);
        match self.policy {
            RefreshPolicy::Never => false,
            RefreshPolicy::AtTarget => {
                elapsed(Duration::hours(AT_TARGET_REFRESH_HOURS))
                    && estimated_soc >= f64::from(target_soc)
            }
            policy => policy.interval().is_some_and(elapsed),
        }
    }

    /// Last limit the car accepted.
    pub fn applied_limit(&self) -> Option<u8> {
        self.applied_limit
    }

    pub fn last_refresh(&self) -> Option<NaiveDateTime> {
        self.last_refresh
    }
}
