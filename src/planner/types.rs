//! Planner input snapshot, plan output, and decision trace types.

use std::fmt;

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// One priced interval of the horizon.
///
/// Times are local wall-clock times of the charger site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSlot {
    /// Slot start (inclusive).
    pub start: NaiveDateTime,
    /// Slot length in minutes.
    pub duration_minutes: u32,
    /// Price per kWh, already adjusted for fees and VAT.
    pub price: f64,
}

impl PriceSlot {
    /// Creates a slot starting at `start` lasting `duration_minutes`.
    pub fn new(start: NaiveDateTime, duration_minutes: u32, price: f64) -> Self {
        Self {
            start,
            duration_minutes,
            price,
        }
    }

    /// Slot end (exclusive).
    pub fn end(&self) -> NaiveDateTime {
        self.start + Duration::minutes(i64::from(self.duration_minutes))
    }

    /// Returns `true` if `t` falls inside `[start, end)`.
    pub fn contains(&self, t: NaiveDateTime) -> bool {
        self.start <= t && t < self.end()
    }

    /// Hours of this slot usable inside the window `[from, until)`.
    ///
    /// Returns 0.0 when the slot does not overlap the window.
    pub fn usable_hours(&self, from: NaiveDateTime, until: NaiveDateTime) -> f64 {
        let lo = self.start.max(from);
        let hi = self.end().min(until);
        if hi <= lo {
            return 0.0;
        }
        (hi - lo).num_seconds() as f64 / 3600.0
    }
}

/// User-requested manual override for the current session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManualOverride {
    pub target_soc: Option<u8>,
    pub departure: Option<NaiveDateTime>,
}

/// Target and departure derived from an upcoming calendar event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarTarget {
    pub target_soc: Option<u8>,
    pub departure: NaiveDateTime,
}

/// Opportunistic price tier: when the cheapest visible price is at or
/// below `price_ceiling`, charge to `target_soc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpportunisticTier {
    pub price_ceiling: f64,
    pub target_soc: u8,
}

/// Immutable snapshot of everything the planner needs for one decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanningInput {
    /// Decision time.
    pub now: NaiveDateTime,
    pub car_plugged: bool,
    /// Current state of charge in percent (0–100).
    pub car_soc: f64,
    /// Master switch for smart charging. When off, a plugged car charges immediately.
    pub smart_switch: bool,
    pub manual_override: Option<ManualOverride>,
    pub calendar_event: Option<CalendarTarget>,
    /// Tiers in ascending `price_ceiling` order.
    pub opportunistic_tiers: Vec<OpportunisticTier>,
    pub base_target_soc: u8,
    /// Next occurrence of the standard daily departure, if one is configured.
    pub standard_departure: Option<NaiveDateTime>,
    pub battery_capacity_kwh: f64,
    /// Fraction of grid energy that reaches the battery (0.0–1.0).
    pub charger_efficiency: f64,
    pub max_charging_power_kw: f64,
    /// Today's slots followed by tomorrow's when published.
    pub prices: Vec<PriceSlot>,
    pub tomorrow_valid: bool,
}

impl PlanningInput {
    /// End of the visible price horizon, or `None` without price data.
    pub fn horizon_end(&self) -> Option<NaiveDateTime> {
        self.prices.iter().map(PriceSlot::end).max()
    }

    /// Slot containing `now`, if any.
    pub fn current_slot(&self) -> Option<&PriceSlot> {
        self.prices.iter().find(|s| s.contains(self.now))
    }
}

/// Machine-readable classification of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanOutcome {
    SmartChargingDisabled,
    CarNotPlugged,
    TargetReached,
    InvalidConfiguration,
    MissingPriceData,
    /// The horizon ends before departure and there is still slack to wait
    /// for the next price publication.
    AwaitingPrices,
    /// The horizon ends before departure and no slack remains.
    UrgentCharge,
    Scheduled,
}

impl PlanOutcome {
    /// Returns `true` for outcomes where the car still needs energy.
    pub fn needs_energy(self) -> bool {
        matches!(
            self,
            Self::AwaitingPrices | Self::UrgentCharge | Self::Scheduled
        )
    }
}

impl fmt::Display for PlanOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::SmartChargingDisabled => "smart charging disabled",
            Self::CarNotPlugged => "car not plugged",
            Self::TargetReached => "target reached",
            Self::InvalidConfiguration => "invalid configuration",
            Self::MissingPriceData => "missing price data",
            Self::AwaitingPrices => "awaiting prices",
            Self::UrgentCharge => "urgent charge",
            Self::Scheduled => "scheduled",
        };
        f.write_str(s)
    }
}

/// Planner stage that produced a trace record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    SmartSwitch,
    Plug,
    Target,
    Departure,
    TargetCheck,
    Energy,
    PriceData,
    Horizon,
    SlotSelection,
    Decision,
}

/// One structured record of the decision trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub stage: Stage,
    pub message: String,
    pub data: serde_json::Value,
}

/// Output of one planner invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Equal to the input's `now`.
    pub generated_at: NaiveDateTime,
    pub should_charge_now: bool,
    pub target_soc: u8,
    /// Resolved departure, when the planner got far enough to need one.
    pub departure: Option<NaiveDateTime>,
    /// Selected slots in chronological order.
    pub selected_slots: Vec<PriceSlot>,
    pub outcome: PlanOutcome,
    pub reasoning: Vec<TraceEntry>,
}

impl Plan {
    /// Start of the first selected slot that lies in the future.
    pub fn scheduled_start(&self) -> Option<NaiveDateTime> {
        self.selected_slots
            .iter()
            .map(|s| s.start)
            .find(|&start| start > self.generated_at)
    }

    /// End of the last selected slot.
    pub fn session_end(&self) -> Option<NaiveDateTime> {
        self.selected_slots.iter().map(PriceSlot::end).max()
    }

    /// Final trace message, used as a one-line summary.
    pub fn summary(&self) -> &str {
        self.reasoning
            .last()
            .map_or("no decision recorded", |e| e.message.as_str())
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {:<24} | charge={:<5} | target={:>3}% | slots={:>3} | {}",
            self.generated_at.format("%Y-%m-%d %H:%M"),
            self.outcome.to_string(),
            self.should_charge_now,
            self.target_soc,
            self.selected_slots.len(),
            self.summary()
        )
    }
}
