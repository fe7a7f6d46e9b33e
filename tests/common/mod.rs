//! Shared test fixtures for integration tests.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::{Rng, rngs::StdRng};

use ev_charge_planner::planner::{OpportunisticTier, PlanningInput, PriceSlot};

/// Wall-clock time on February `day`, 2026.
pub fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 2, day)
        .and_then(|d| d.and_hms_opt(h, m, 0))
        .unwrap()
}

/// Consecutive slots of `minutes` starting at midnight of February 1.
pub fn slots(minutes: u32, prices: &[f64]) -> Vec<PriceSlot> {
    prices
        .iter()
        .enumerate()
        .map(|(i, &p)| {
            PriceSlot::new(
                at(1, 0, 0) + Duration::minutes(i64::from(minutes) * i as i64),
                minutes,
                p,
            )
        })
        .collect()
}

/// Default input: plugged-in car at 47% on Feb 1, 13:28, 80% by 07:00,
/// 64 kWh battery, 90% efficiency, 11.04 kW, two days of flat hourly
/// prices at 1.0.
pub fn default_input() -> PlanningInput {
    PlanningInput {
        now: at(1, 13, 28),
        car_plugged: true,
        car_soc: 47.0,
        smart_switch: true,
        manual_override: None,
        calendar_event: None,
        opportunistic_tiers: Vec::new(),
        base_target_soc: 80,
        standard_departure: Some(at(2, 7, 0)),
        battery_capacity_kwh: 64.0,
        charger_efficiency: 0.9,
        max_charging_power_kw: 11.04,
        prices: slots(60, &[1.0; 48]),
        tomorrow_valid: true,
    }
}

/// Random but well-typed input around the default scenario.
///
/// Covers both horizons (tomorrow published or not), quarter-hour and
/// hourly slots, random tiers, and random charger parameters.
pub fn random_input(rng: &mut StdRng) -> PlanningInput {
    let minutes: u32 = if rng.random_bool(0.5) { 15 } else { 60 };
    let per_day = (24 * 60 / minutes) as usize;
    let tomorrow_valid = rng.random_bool(0.7);
    let days = if tomorrow_valid { 2 } else { 1 };
    let prices: Vec<f64> = (0..per_day * days)
        .map(|_| (rng.random_range(0.05..2.5_f64) * 1000.0).round() / 1000.0)
        .collect();

    let tiers = if rng.random_bool(0.4) {
        let low = rng.random_range(0.1..0.6);
        vec![
            OpportunisticTier {
                price_ceiling: low,
                target_soc: 100,
            },
            OpportunisticTier {
                price_ceiling: low + 0.5,
                target_soc: 90,
            },
        ]
    } else {
        Vec::new()
    };

    PlanningInput {
        now: at(1, 0, 0) + Duration::minutes(rng.random_range(0..24 * 60)),
        car_plugged: rng.random_bool(0.9),
        car_soc: rng.random_range(0.0..100.0),
        smart_switch: rng.random_bool(0.9),
        manual_override: None,
        calendar_event: None,
        opportunistic_tiers: tiers,
        base_target_soc: rng.random_range(50..=100),
        standard_departure: Some(at(2, 7, 0)),
        battery_capacity_kwh: rng.random_range(30.0..100.0),
        charger_efficiency: rng.random_range(0.8..=1.0),
        max_charging_power_kw: rng.random_range(3.6..22.0),
        prices: slots(minutes, &prices),
        tomorrow_valid,
    }
}
