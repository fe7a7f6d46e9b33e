//! Target SOC and departure resolution.
//!
//! Both follow a strict precedence: manual override, then calendar event,
//! then the configured fallback.

use chrono::NaiveDateTime;
use serde_json::json;

use super::Trace;
use super::types::{OpportunisticTier, PlanningInput, Stage};

/// Where the resolved target SOC came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum TargetSource {
    Manual,
    Calendar,
    Opportunistic { price_ceiling: f64, min_price: f64 },
    Base,
}

/// Resolves the target SOC: manual > calendar > opportunistic tier > base.
pub(crate) fn resolve_target(input: &PlanningInput, trace: &mut Trace) -> u8 {
    let (target, source) = select_target(input);
    let target = target.min(100);

    match source {
        TargetSource::Manual => trace.record(
            Stage::Target,
            format!("Manual override target {target}%"),
            json!({ "source": "manual", "target_soc": target }),
        ),
        TargetSource::Calendar => trace.record(
            Stage::Target,
            format!("Calendar event target {target}%"),
            json!({ "source": "calendar", "target_soc": target }),
        ),
        TargetSource::Opportunistic {
            price_ceiling,
            min_price,
        } => trace.record(
            Stage::Target,
            format!(
                "Opportunistic tier triggered: min price {min_price:.3} <= {price_ceiling:.3}, target {target}%"
            ),
            json!({
                "source": "opportunistic",
                "target_soc": target,
                "price_ceiling": price_ceiling,
                "min_price": min_price,
            }),
        ),
        TargetSource::Base => trace.record(
            Stage::Target,
            format!("Standard target {target}%"),
            json!({ "source": "base", "target_soc": target }),
        ),
    }

    target
}

fn select_target(input: &PlanningInput) -> (u8, TargetSource) {
    if let Some(t) = input.manual_override.as_ref().and_then(|o| o.target_soc) {
        return (t, TargetSource::Manual);
    }
    if let Some(t) = input.calendar_event.as_ref().and_then(|c| c.target_soc) {
        return (t, TargetSource::Calendar);
    }
    if let Some(min_price) = min_visible_price(input) {
        if let Some(tier) = triggered_tier(&input.opportunistic_tiers, min_price) {
            return (
                tier.target_soc,
                TargetSource::Opportunistic {
                    price_ceiling: tier.price_ceiling,
                    min_price,
                },
            );
        }
    }
    (input.base_target_soc, TargetSource::Base)
}

/// Minimum price over slots that have not yet ended.
pub(crate) fn min_visible_price(input: &PlanningInput) -> Option<f64> {
    input
        .prices
        .iter()
        .filter(|s| s.end() > input.now)
        .map(|s| s.price)
        .filter(|p| p.is_finite())
        .min_by(f64::total_cmp)
}

/// First tier, in ascending ceiling order, whose ceiling covers `min_price`.
pub(crate) fn triggered_tier(
    tiers: &[OpportunisticTier],
    min_price: f64,
) -> Option<&OpportunisticTier> {
    let mut ordered: Vec<&OpportunisticTier> = tiers.iter().collect();
    ordered.sort_by(|a, b| a.price_ceiling.total_cmp(&b.price_ceiling));
    ordered.into_iter().find(|t| t.price_ceiling >= min_price)
}

/// Resolves the departure: manual > calendar > standard > end of horizon.
///
/// Candidates at or before `now` are skipped. Returns `None` when no
/// candidate lies in the future.
pub(crate) fn resolve_departure(
    input: &PlanningInput,
    trace: &mut Trace,
) -> Option<NaiveDateTime> {
    let candidates = [
        (
            "manual",
            input.manual_override.as_ref().and_then(|o| o.departure),
        ),
        ("calendar", input.calendar_event.as_ref().map(|c| c.departure)),
        ("standard", input.standard_departure),
        ("horizon_end", input.horizon_end()),
    ];

    for (source, candidate) in candidates {
        let Some(departure) = candidate else {
            continue;
        };
        if departure <= input.now {
            trace.record(
                Stage::Departure,
                format!("Ignoring {source} departure {departure}: not in the future"),
                json!({ "source": source, "departure": departure }),
            );
            continue;
        }
        trace.record(
            Stage::Departure,
            format!("Departure {} ({source})", departure.format("%Y-%m-%d %H:%M")),
            json!({ "source": source, "departure": departure }),
        );
        return Some(departure);
    }

    trace.record(
        Stage::Departure,
        "No future departure could be resolved",
        serde_json::Value::Null,
    );
    None
}
