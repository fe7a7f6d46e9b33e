//! Charging plan generator.
//!
//! [`generate_charging_plan`] is a pure function of its [`PlanningInput`]:
//! it performs no I/O, holds no state, and identical inputs yield equal
//! plans. Every stage it evaluates appends a [`TraceEntry`] to the plan's
//! reasoning, and failures are reported as conservative plans rather than
//! errors.

pub mod energy;
mod slots;
mod target;
pub mod types;

use chrono::Duration;
use serde_json::json;

use energy::EnergyNeed;

pub use energy::charging_power_kw;
pub use types::{
    CalendarTarget, ManualOverride, OpportunisticTier, Plan, PlanOutcome, PlanningInput,
    PriceSlot, Stage, TraceEntry,
};

/// Ordered decision trace under construction.
///
/// Each record is mirrored to `tracing` at debug level.
#[derive(Debug, Default)]
pub(crate) struct Trace {
    entries: Vec<TraceEntry>,
}

impl Trace {
    pub(crate) fn record(
        &mut self,
        stage: Stage,
        message: impl Into<String>,
        data: serde_json::Value,
    ) {
        let message = message.into();
        tracing::debug!(stage = ?stage, %data, "{message}");
        self.entries.push(TraceEntry {
            stage,
            message,
            data,
        });
    }

    fn into_entries(self) -> Vec<TraceEntry> {
        self.entries
    }
}

/// Partially decided plan, finished once the decision is known.
struct Draft<'a> {
    input: &'a PlanningInput,
    trace: Trace,
    target_soc: u8,
    departure: Option<chrono::NaiveDateTime>,
}

impl Draft<'_> {
    fn finish(
        mut self,
        outcome: PlanOutcome,
        should_charge_now: bool,
        selected_slots: Vec<PriceSlot>,
        message: impl Into<String>,
    ) -> Plan {
        self.trace.record(
            Stage::Decision,
            message,
            json!({
                "outcome": outcome,
                "should_charge_now": should_charge_now,
                "selected_slots": selected_slots.len(),
            }),
        );
        Plan {
            generated_at: self.input.now,
            should_charge_now,
            target_soc: self.target_soc,
            departure: self.departure,
            selected_slots,
            outcome,
            reasoning: self.trace.into_entries(),
        }
    }
}

/// Produces the charging plan for one input snapshot.
///
/// # Arguments
///
/// * `input` - Immutable snapshot of sensors, settings, and prices
///
/// # Returns
///
/// A [`Plan`] with the immediate decision, the target SOC, the selected
/// slots in chronological order, and the ordered decision trace.
pub fn generate_charging_plan(input: &PlanningInput) -> Plan {
    let mut draft = Draft {
        input,
        trace: Trace::default(),
        target_soc: input.base_target_soc.min(100),
        departure: None,
    };

    if !input.smart_switch {
        draft.trace.record(
            Stage::SmartSwitch,
            "Smart charging disabled",
            json!({ "smart_switch": false, "car_plugged": input.car_plugged }),
        );
        let msg = if input.car_plugged {
            "Smart charging disabled: charging immediately"
        } else {
            "Smart charging disabled: no car connected"
        };
        return draft.finish(
            PlanOutcome::SmartChargingDisabled,
            input.car_plugged,
            Vec::new(),
            msg,
        );
    }

    if !input.car_plugged {
        draft.trace.record(
            Stage::Plug,
            "Car not plugged in",
            json!({ "car_plugged": false }),
        );
        return draft.finish(
            PlanOutcome::CarNotPlugged,
            false,
            Vec::new(),
            "No car connected",
        );
    }

    draft.target_soc = target::resolve_target(input, &mut draft.trace);
    draft.departure = target::resolve_departure(input, &mut draft.trace);

    if input.car_soc >= f64::from(draft.target_soc) {
        let msg = format!(
            "SOC {:.1}% already at or above target {}%",
            input.car_soc, draft.target_soc
        );
        draft.trace.record(
            Stage::TargetCheck,
            msg,
            json!({ "car_soc": input.car_soc, "target_soc": draft.target_soc }),
        );
        return draft.finish(
            PlanOutcome::TargetReached,
            false,
            Vec::new(),
            "Target already reached",
        );
    }

    let need = match EnergyNeed::compute(input, draft.target_soc) {
        Ok(need) => need,
        Err(param) => {
            draft.trace.record(
                Stage::Energy,
                format!("Cannot compute energy need: {param} is out of range"),
                json!({ "parameter": param }),
            );
            return draft.finish(
                PlanOutcome::InvalidConfiguration,
                false,
                Vec::new(),
                "Cannot compute plan: invalid input parameters",
            );
        }
    };
    need.record(&mut draft.trace);

    if need.hours_needed <= 0.0 {
        return draft.finish(
            PlanOutcome::TargetReached,
            false,
            Vec::new(),
            "No charging time needed",
        );
    }

    if input.prices.is_empty() {
        draft.trace.record(
            Stage::PriceData,
            "No price data available",
            json!({ "slots": 0 }),
        );
        return draft.finish(
            PlanOutcome::MissingPriceData,
            false,
            Vec::new(),
            "Waiting for price data",
        );
    }

    let Some(departure) = draft.departure else {
        draft.trace.record(
            Stage::PriceData,
            "Price data is stale: every slot has ended",
            json!({ "slots": input.prices.len() }),
        );
        return draft.finish(
            PlanOutcome::MissingPriceData,
            false,
            Vec::new(),
            "Price data is stale",
        );
    };

    // Checked above: prices is non-empty.
    let horizon_end = input.horizon_end().unwrap_or(input.now);
    if horizon_end < departure {
        // Unrepresentable charging times leave no slack.
        let latest_start = Duration::try_seconds((need.hours_needed * 3600.0).ceil() as i64)
            .and_then(|d| departure.checked_sub_signed(d));
        if let Some(latest_start) = latest_start.filter(|&l| input.now < l) {
            draft.trace.record(
                Stage::Horizon,
                format!(
                    "Prices end {} before departure; waiting, latest start {}",
                    horizon_end.format("%Y-%m-%d %H:%M"),
                    latest_start.format("%Y-%m-%d %H:%M")
                ),
                json!({
                    "horizon_end": horizon_end,
                    "departure": departure,
                    "latest_start": latest_start,
                }),
            );
            return draft.finish(
                PlanOutcome::AwaitingPrices,
                false,
                Vec::new(),
                "Waiting for tomorrow's prices",
            );
        }

        let selection =
            slots::select_chronological(&input.prices, input.now, departure, need.hours_needed);
        if !selection.slots.iter().any(|s| s.contains(input.now)) {
            draft.trace.record(
                Stage::PriceData,
                "No slack left but no price covers the current time",
                json!({
                    "horizon_end": horizon_end,
                    "departure": departure,
                    "selected_slots": selection.slots.len(),
                }),
            );
            return draft.finish(
                PlanOutcome::MissingPriceData,
                false,
                Vec::new(),
                "Price data does not cover the current time",
            );
        }
        draft.trace.record(
            Stage::Horizon,
            format!(
                "Prices end before departure and no slack remains: charging now ({} slots, {:.2} h)",
                selection.slots.len(),
                selection.covered_hours
            ),
            json!({
                "horizon_end": horizon_end,
                "departure": departure,
                "latest_start": latest_start,
                "covered_hours": selection.covered_hours,
            }),
        );
        return draft.finish(
            PlanOutcome::UrgentCharge,
            true,
            selection.slots,
            "Urgent charging: departure is close",
        );
    }

    draft.trace.record(
        Stage::Horizon,
        "Price horizon covers departure",
        json!({ "horizon_end": horizon_end, "departure": departure }),
    );

    let selection = slots::select_cheapest(&input.prices, input.now, departure, need.hours_needed);
    if selection.candidate_count == 0 {
        draft.trace.record(
            Stage::SlotSelection,
            "No price slots between now and departure",
            json!({ "departure": departure }),
        );
        return draft.finish(
            PlanOutcome::MissingPriceData,
            false,
            Vec::new(),
            "No usable price slots before departure",
        );
    }

    let shortfall = !selection.covers(need.hours_needed);
    let avg_price = if selection.slots.is_empty() {
        0.0
    } else {
        selection.slots.iter().map(|s| s.price).sum::<f64>() / selection.slots.len() as f64
    };
    let msg = if shortfall {
        format!(
            "Selected all {} slots ({:.2} h), short of {:.2} h needed",
            selection.slots.len(),
            selection.covered_hours,
            need.hours_needed
        )
    } else {
        format!(
            "Selected {} of {} slots ({:.2} h), average price {:.3}",
            selection.slots.len(),
            selection.candidate_count,
            selection.covered_hours,
            avg_price
        )
    };
    draft.trace.record(
        Stage::SlotSelection,
        msg,
        json!({
            "selected": selection.slots.len(),
            "candidates": selection.candidate_count,
            "covered_hours": selection.covered_hours,
            "hours_needed": need.hours_needed,
            "average_price": avg_price,
            "shortfall": shortfall,
        }),
    );

    let charge_now = selection.slots.iter().any(|s| s.contains(input.now));
    let msg = if charge_now {
        "Charging now: current slot is among the cheapest".to_string()
    } else {
        match selection.slots.first() {
            Some(first) => format!(
                "Waiting: charging scheduled from {}",
                first.start.format("%Y-%m-%d %H:%M")
            ),
            None => "Waiting: no slot selected".to_string(),
        }
    };
    draft.finish(PlanOutcome::Scheduled, charge_now, selection.slots, msg)
}
