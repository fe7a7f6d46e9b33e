//! Session tracker: consumes plans and drives the charge actuator.
//!
//! The tracker owns the most recent [`Plan`], the active [`Session`]
//! (plug-in to unplug), and its belief about the actuator state. It emits
//! start/stop commands only on edges, and applies a buffer window so that
//! short gaps between or after scheduled slots do not toggle the charger.
//! When the house fuse leaves less than [`MIN_CHARGING_CURRENT_A`], charging
//! pauses regardless of the plan.

pub mod actuator;
pub mod car_control;
pub mod load;
pub mod report;

use std::fmt;

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::planner::{self, Plan, PlanOutcome, PlanningInput};

pub use actuator::{Actuator, ActuatorCommand, ActuatorError};
pub use car_control::{CarActions, CarController, CarLink, RefreshPolicy};
pub use load::{MIN_CHARGING_CURRENT_A, PhaseCurrents, allows_charging, available_current};
pub use report::{SessionPoint, SessionReport};

/// Default buffer window around scheduled slots.
pub const DEFAULT_BUFFER_MINUTES: i64 = 15;

/// Externally visible tracker state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    AwaitingPrices,
    Scheduled,
    Charging,
    TargetReached,
}

impl SessionState {
    fn derive(plugged: bool, charging: bool, outcome: PlanOutcome) -> Self {
        match (plugged, charging, outcome) {
            (false, _, _) => Self::Idle,
            (true, true, _) => Self::Charging,
            (true, false, PlanOutcome::TargetReached) => Self::TargetReached,
            (true, false, PlanOutcome::AwaitingPrices | PlanOutcome::MissingPriceData) => {
                Self::AwaitingPrices
            }
            (true, false, _) => Self::Scheduled,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::AwaitingPrices => "awaiting_prices",
            Self::Scheduled => "scheduled",
            Self::Charging => "charging",
            Self::TargetReached => "target_reached",
        })
    }
}

/// One charging session, from plug-in to unplug.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub started_at: NaiveDateTime,
    pub start_soc: f64,
    /// End of the most recently planned slot sequence.
    pub last_scheduled_end: Option<NaiveDateTime>,
    /// Start/stop commands issued so far.
    pub commands: usize,
    /// Evaluations of the session. Runs at an unchanged rate are collapsed
    /// to their first and last point, which keeps the session totals exact.
    pub history: Vec<SessionPoint>,
}

impl Session {
    fn new(started_at: NaiveDateTime, start_soc: f64) -> Self {
        Self {
            started_at,
            start_soc,
            last_scheduled_end: None,
            commands: 0,
            history: Vec::new(),
        }
    }

    /// Updates `last_scheduled_end` from a fresh plan.
    ///
    /// An end whose buffer has expired is cleared. An end that has passed
    /// but is still inside its buffer is kept until the buffer expires.
    fn track_scheduled_end(&mut self, plan: &Plan, now: NaiveDateTime, buffer: Duration) {
        if let Some(end) = self.last_scheduled_end {
            if now >= end + buffer {
                debug!(%end, "clearing expired scheduled end");
                self.last_scheduled_end = None;
            }
        }
        if let Some(end) = plan.session_end() {
            match self.last_scheduled_end {
                Some(prev) if prev <= now => {}
                _ => self.last_scheduled_end = Some(end),
            }
        }
    }

    /// Appends `point`, collapsing runs billed at the same rate.
    fn record(&mut self, point: SessionPoint) {
        if let [.., a, b] = self.history.as_slice() {
            if same_rate(a, b) && same_rate(b, &point) {
                self.history.pop();
            }
        }
        self.history.push(point);
    }

    /// Reason to keep charging although the plan says stop, if any.
    ///
    /// The charger stays on across a gap only when the next scheduled slot
    /// begins by the end of the current price slot and within the buffer,
    /// so at most one unselected slot is bridged. Gaps without price data
    /// are never bridged.
    fn buffer_reason(
        &self,
        plan: &Plan,
        now: NaiveDateTime,
        current_slot_end: Option<NaiveDateTime>,
        buffer: Duration,
    ) -> Option<&'static str> {
        if plan
            .scheduled_start()
            .is_some_and(|s| s <= now + buffer && current_slot_end.is_some_and(|end| s <= end))
        {
            return Some("next scheduled slot follows the current slot");
        }
        if self
            .last_scheduled_end
            .is_some_and(|end| end <= now && now < end + buffer)
        {
            return Some("overrun after last scheduled slot");
        }
        None
    }
}

/// Consecutive points bill the interval between them at the same rate.
fn same_rate(a: &SessionPoint, b: &SessionPoint) -> bool {
    let billed = |p: &SessionPoint| p.charging && p.power_kw > 0.0;
    match (billed(a), billed(b)) {
        (false, false) => true,
        (true, true) => a.power_kw == b.power_kw && a.price == b.price,
        _ => false,
    }
}

/// Serializable view of the tracker for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerSnapshot {
    pub state: SessionState,
    pub actuator_on: bool,
    pub previous_plugged_state: bool,
    pub buffer_active: bool,
    pub buffer_minutes: i64,
    /// Current the fuse leaves for the charger, when a meter is read.
    #[serde(default)]
    pub available_current: Option<f64>,
    /// Charging was wanted but paused by the fuse.
    #[serde(default)]
    pub load_limited: bool,
    pub session: Option<Session>,
    pub last_report: Option<SessionReport>,
}

/// Stateful consumer of charging plans for one charger.
#[derive(Debug, Clone)]
pub struct SessionTracker {
    buffer: Duration,
    state: SessionState,
    actuator_on: bool,
    plugged: bool,
    buffer_active: bool,
    available_current: Option<f64>,
    load_limited: bool,
    applied_current: Option<f64>,
    session: Option<Session>,
    last_plan: Option<Plan>,
    last_report: Option<SessionReport>,
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::new(Duration::minutes(DEFAULT_BUFFER_MINUTES))
    }
}

impl SessionTracker {
    /// Creates an idle tracker with the given buffer window.
    pub fn new(buffer: Duration) -> Self {
        Self {
            buffer: buffer.max(Duration::zero()),
            state: SessionState::Idle,
            actuator_on: false,
            plugged: false,
            buffer_active: false,
            available_current: None,
            load_limited: false,
            applied_current: None,
            session: None,
            last_plan: None,
            last_report: None,
        }
    }

    /// Sets the current the fuse leaves for the charger (A), or `None`
    /// without a meter. Takes effect at the next evaluation.
    pub fn set_available_current(&mut self, amps: Option<f64>) {
        self.available_current = amps;
    }

    /// Re-plans for `input` and returns the plan with the actuator command,
    /// if the effective decision differs from the actuator state.
    ///
    /// The returned plan is the planner's output, unmodified. The buffer can
    /// keep the actuator on while the plan says otherwise; query
    /// [`SessionTracker::buffer_active`] to tell.
    pub fn on_state_change(&mut self, input: &PlanningInput) -> (Plan, Option<ActuatorCommand>) {
        let plan = planner::generate_charging_plan(input);
        let now = input.now;

        if input.car_plugged && !self.plugged {
            info!(soc = input.car_soc, "car plugged in, starting session");
            self.session = Some(Session::new(now, input.car_soc));
        }

        let mut charging = input.car_plugged && plan.should_charge_now;
        self.buffer_active = false;
        if let Some(session) = self.session.as_mut() {
            session.track_scheduled_end(&plan, now, self.buffer);
            if !charging && self.actuator_on && plan.outcome.needs_energy() {
                let slot_end = input.current_slot().map(|s| s.end());
                if let Some(reason) = session.buffer_reason(&plan, now, slot_end, self.buffer) {
                    debug!(reason, "buffer active, keeping charger on");
                    charging = true;
                    self.buffer_active = true;
                }
            }
        }

        self.load_limited = false;
        if let Some(amps) = self.available_current.filter(|&a| charging && !allows_charging(a)) {
            warn!(
                available_amps = amps,
                min_amps = MIN_CHARGING_CURRENT_A,
                "safety cutoff: available current below minimum, pausing"
            );
            charging = false;
            self.buffer_active = false;
            self.load_limited = true;
        }

        let command = (charging != self.actuator_on).then(|| ActuatorCommand::toward(charging));
        if let Some(cmd) = command {
            info!(command = %cmd, outcome = %plan.outcome, "actuator command");
            self.actuator_on = charging;
            if let Some(session) = self.session.as_mut() {
                session.commands += 1;
            }
        }

        if let Some(session) = self.session.as_mut() {
            session.record(SessionPoint {
                time: now,
                soc: input.car_soc,
                charging,
                power_kw: if charging {
                    input.max_charging_power_kw
                } else {
                    0.0
                },
                price: input.current_slot().map(|s| s.price),
            });
        }

        if !input.car_plugged && self.plugged {
            self.finish_session(now);
        }
        self.plugged = input.car_plugged;

        let next = SessionState::derive(input.car_plugged, charging, plan.outcome);
        if next != self.state {
            info!(from = %self.state, to = %next, "session state changed");
            self.state = next;
        }

        self.last_plan = Some(plan.clone());
        (plan, command)
    }

    /// Runs [`SessionTracker::on_state_change`] and applies the resulting
    /// command to `actuator`.
    ///
    /// A failed command is logged and the tracker keeps its previous
    /// actuator state, so the same edge is retried on the next evaluation.
    pub fn drive(&mut self, input: &PlanningInput, actuator: &mut impl Actuator) -> Plan {
        let previous = self.actuator_on;
        let (plan, command) = self.on_state_change(input);
        if let Some(cmd) = command {
            if let Err(e) = cmd.apply(actuator) {
                warn!(command = %cmd, error = %e, "actuator command failed, will retry");
                self.actuator_on = previous;
                self.buffer_active = false;
                if let Some(point) = self.session.as_mut().and_then(|s| s.history.last_mut()) {
                    point.charging = previous;
                    point.power_kw = if previous {
                        input.max_charging_power_kw
                    } else {
                        0.0
                    };
                }
                self.state = SessionState::derive(input.car_plugged, previous, plan.outcome);
            }
        }
        self.apply_current_limit(actuator);
        plan
    }

    /// Sends the available current to a running charger when it changed.
    fn apply_current_limit(&mut self, actuator: &mut impl Actuator) {
        if !self.actuator_on {
            self.applied_current = None;
            return;
        }
        let Some(amps) = self.available_current.map(f64::floor) else {
            return;
        };
        if self.applied_current == Some(amps) {
            return;
        }
        match actuator.set_current_limit(amps) {
            Ok(()) => {
                info!(amps, "load balancing: charger current limit set");
                self.applied_current = Some(amps);
            }
            Err(e) => warn!(amps, error = %e, "failed to set charger current limit"),
        }
    }

    /// Reconciles the tracked actuator state with the real charger.
    pub fn sync_actuator(&mut self, is_on: bool) {
        if is_on != self.actuator_on {
            warn!(tracked = self.actuator_on, actual = is_on, "actuator state out of sync");
            self.actuator_on = is_on;
        }
    }

    fn finish_session(&mut self, now: NaiveDateTime) {
        let Some(session) = self.session.take() else {
            return;
        };
        let report =
            SessionReport::from_history(session.started_at, now, session.history, session.commands);
        info!(
            energy_kwh = report.energy_kwh,
            cost = report.cost,
            "car unplugged, session finished"
        );
        self.last_report = Some(report);
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Tracked actuator state.
    pub fn is_charging(&self) -> bool {
        self.actuator_on
    }

    /// Whether the last evaluation paused charging because of the fuse.
    pub fn load_limited(&self) -> bool {
        self.load_limited
    }

    /// Whether the last evaluation kept charging only because of the buffer.
    pub fn buffer_active(&self) -> bool {
        self.buffer_active
    }

    pub fn buffer(&self) -> Duration {
        self.buffer
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn last_plan(&self) -> Option<&Plan> {
        self.last_plan.as_ref()
    }

    /// Report of the most recently finished session.
    pub fn last_report(&self) -> Option<&SessionReport> {
        self.last_report.as_ref()
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            state: self.state,
            actuator_on: self.actuator_on,
            previous_plugged_state: self.plugged,
            buffer_active: self.buffer_active,
            buffer_minutes: self.buffer.num_minutes(),
            available_current: self.available_current,
            load_limited: self.load_limited,
            session: self.session.clone(),
            last_report: self.last_report.clone(),
        }
    }
}
