//! Slot selection over the price horizon.

use chrono::NaiveDateTime;

use super::types::PriceSlot;

/// Slack for floating-point duration comparisons (hours).
const EPSILON_HOURS: f64 = 1e-9;

/// Result of a slot selection pass.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Selection {
    /// Selected slots in chronological order.
    pub slots: Vec<PriceSlot>,
    /// Usable hours covered by the selection.
    pub covered_hours: f64,
    /// Number of slots that were eligible.
    pub candidate_count: usize,
}

impl Selection {
    /// Returns `true` if the selection covers `hours_needed`.
    pub fn covers(&self, hours_needed: f64) -> bool {
        self.covered_hours + EPSILON_HOURS >= hours_needed
    }
}

/// Slots that have not ended and start before departure.
fn candidates(prices: &[PriceSlot], now: NaiveDateTime, departure: NaiveDateTime) -> Vec<&PriceSlot> {
    prices
        .iter()
        .filter(|s| s.end() > now && s.start < departure)
        .collect()
}

/// Greedy cheapest-first selection.
///
/// Candidates are ordered by price, ties broken by earliest start, and
/// accumulated until their usable duration within `[now, departure)`
/// reaches `hours_needed`. If the candidates cannot cover the need, all of
/// them are selected.
pub(crate) fn select_cheapest(
    prices: &[PriceSlot],
    now: NaiveDateTime,
    departure: NaiveDateTime,
    hours_needed: f64,
) -> Selection {
    let mut pool = candidates(prices, now, departure);
    pool.sort_by(|a, b| a.price.total_cmp(&b.price).then(a.start.cmp(&b.start)));
    accumulate(pool, now, departure, hours_needed)
}

/// Chronological selection starting from the slot containing `now`.
pub(crate) fn select_chronological(
    prices: &[PriceSlot],
    now: NaiveDateTime,
    departure: NaiveDateTime,
    hours_needed: f64,
) -> Selection {
    let mut pool = candidates(prices, now, departure);
    pool.sort_by_key(|s| s.start);
    accumulate(pool, now, departure, hours_needed)
}

fn accumulate(
    pool: Vec<&PriceSlot>,
    now: NaiveDateTime,
    departure: NaiveDateTime,
    hours_needed: f64,
) -> Selection {
    let candidate_count = pool.len();
    let mut slots = Vec::new();
    let mut covered_hours = 0.0;

    for slot in pool {
        if covered_hours + EPSILON_HOURS >= hours_needed {
            break;
        }
        let usable = slot.usable_hours(now, departure);
        if usable <= 0.0 {
            continue;
        }
        covered_hours += usable;
        slots.push(slot.clone());
    }

    slots.sort_by_key(|s| s.start);
    Selection {
        slots,
        covered_hours,
        candidate_count,
    }
}
