//! Planner behaviour on reference scenarios and seeded random inputs.

mod common;

use rand::{SeedableRng, rngs::StdRng};

use common::{at, default_input, random_input, slots};
use ev_charge_planner::planner::{
    OpportunisticTier, Plan, PlanOutcome, PlanningInput, Stage, generate_charging_plan,
};

const RANDOM_CASES: usize = 400;

fn hours_needed(plan: &Plan) -> Option<f64> {
    plan.reasoning
        .iter()
        .find(|e| e.stage == Stage::Energy)
        .and_then(|e| e.data["hours_needed"].as_f64())
}

fn hourly(prices: &[(usize, f64)]) -> Vec<f64> {
    let mut p = vec![1.0; 48];
    for &(i, v) in prices {
        p[i] = v;
    }
    p
}

#[test]
fn identical_inputs_give_identical_plans() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..RANDOM_CASES {
        let input = random_input(&mut rng);
        let copy = input.clone();
        assert_eq!(generate_charging_plan(&input), generate_charging_plan(&copy));
    }
}

#[test]
fn disabled_switch_charges_immediately() {
    let input = PlanningInput {
        smart_switch: false,
        ..default_input()
    };
    let plan = generate_charging_plan(&input);
    assert!(plan.should_charge_now);
    assert_eq!(plan.target_soc, 80);
    assert!(plan.selected_slots.is_empty());
    assert_eq!(plan.outcome, PlanOutcome::SmartChargingDisabled);

    let unplugged = PlanningInput {
        car_plugged: false,
        ..input
    };
    let plan = generate_charging_plan(&unplugged);
    assert!(!plan.should_charge_now);
    assert!(plan.selected_slots.is_empty());
}

#[test]
fn target_reached_means_no_charge() {
    let input = PlanningInput {
        car_soc: 85.0,
        ..default_input()
    };
    let plan = generate_charging_plan(&input);
    assert!(!plan.should_charge_now);
    assert!(plan.selected_slots.is_empty());
    assert_eq!(plan.outcome, PlanOutcome::TargetReached);
}

#[test]
fn lowest_triggered_tier_wins() {
    let input = PlanningInput {
        car_soc: 50.0,
        opportunistic_tiers: vec![
            OpportunisticTier {
                price_ceiling: 0.50,
                target_soc: 100,
            },
            OpportunisticTier {
                price_ceiling: 1.50,
                target_soc: 80,
            },
        ],
        prices: slots(60, &hourly(&[(27, 0.32)])),
        ..default_input()
    };
    let plan = generate_charging_plan(&input);
    assert_eq!(plan.target_soc, 100);
    assert!(plan.selected_slots.iter().any(|s| s.start == at(2, 3, 0)));
}

#[test]
fn cheap_current_slot_triggers_opportunistic_charge() {
    let input = PlanningInput {
        car_soc: 75.0,
        base_target_soc: 80,
        opportunistic_tiers: vec![OpportunisticTier {
            price_ceiling: 0.50,
            target_soc: 100,
        }],
        prices: slots(60, &hourly(&[(13, 0.32)])),
        ..default_input()
    };
    let plan = generate_charging_plan(&input);
    assert_eq!(plan.target_soc, 100);
    assert!(plan.selected_slots.iter().any(|s| s.contains(input.now)));
    assert!(plan.should_charge_now);
    assert_eq!(plan.outcome, PlanOutcome::Scheduled);
}

#[test]
fn missing_prices_mean_no_charge() {
    let input = PlanningInput {
        prices: Vec::new(),
        tomorrow_valid: false,
        ..default_input()
    };
    let plan = generate_charging_plan(&input);
    assert!(!plan.should_charge_now);
    assert!(plan.selected_slots.is_empty());
    assert_eq!(plan.outcome, PlanOutcome::MissingPriceData);
    assert!(plan.reasoning.iter().any(|e| e.stage == Stage::PriceData));
}

#[test]
fn waits_for_prices_while_slack_remains() {
    let input = PlanningInput {
        prices: slots(60, &[1.0; 24]),
        tomorrow_valid: false,
        ..default_input()
    };
    let plan = generate_charging_plan(&input);
    assert_eq!(plan.outcome, PlanOutcome::AwaitingPrices);
    assert!(!plan.should_charge_now);
    assert!(plan.selected_slots.is_empty());
}

#[test]
fn waits_even_when_current_slot_is_cheapest_visible() {
    // 13:00 is strictly the cheapest slot of the only day published.
    let mut today = vec![1.0; 24];
    today[13] = 0.2;
    let input = PlanningInput {
        prices: slots(60, &today),
        tomorrow_valid: false,
        ..default_input()
    };
    let plan = generate_charging_plan(&input);
    assert_eq!(input.current_slot().map(|s| s.price), Some(0.2));
    assert_eq!(plan.outcome, PlanOutcome::AwaitingPrices);
    assert!(!plan.should_charge_now);
    assert!(plan.selected_slots.is_empty());
}

#[test]
fn expired_horizon_never_charges_urgently() {
    // Only yesterday's prices are known half an hour before departure.
    let input = PlanningInput {
        now: at(2, 6, 30),
        prices: slots(60, &[1.0; 24]),
        tomorrow_valid: false,
        ..default_input()
    };
    let plan = generate_charging_plan(&input);
    assert_eq!(plan.outcome, PlanOutcome::MissingPriceData);
    assert!(!plan.should_charge_now);
    assert!(plan.selected_slots.is_empty());
}

#[test]
fn price_gap_at_now_blocks_urgent_charging() {
    let mut prices = slots(60, &[1.0; 24]);
    prices.retain(|s| s.start != at(1, 13, 0));
    let input = PlanningInput {
        car_soc: 5.0,
        base_target_soc: 100,
        max_charging_power_kw: 3.7,
        prices,
        tomorrow_valid: false,
        ..default_input()
    };
    let plan = generate_charging_plan(&input);
    assert_eq!(plan.outcome, PlanOutcome::MissingPriceData);
    assert!(!plan.should_charge_now);
    assert!(plan.reasoning.iter().any(|e| e.stage == Stage::PriceData));
}

#[test]
fn charges_urgently_once_slack_is_gone() {
    // 95% of 64 kWh at 90% and 3.7 kW: over 18 h, more than the time left.
    let input = PlanningInput {
        car_soc: 5.0,
        base_target_soc: 100,
        max_charging_power_kw: 3.7,
        prices: slots(60, &[1.0; 24]),
        tomorrow_valid: false,
        ..default_input()
    };
    let plan = generate_charging_plan(&input);
    assert_eq!(plan.outcome, PlanOutcome::UrgentCharge);
    assert!(plan.should_charge_now);
    assert_eq!(plan.selected_slots.first().map(|s| s.start), Some(at(1, 13, 0)));
    assert!(
        plan.selected_slots
            .windows(2)
            .all(|w| w[0].end() == w[1].start)
    );
}

#[test]
fn selected_slots_respect_horizon_and_departure() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..RANDOM_CASES {
        let input = random_input(&mut rng);
        let plan = generate_charging_plan(&input);

        if plan.should_charge_now {
            assert!(input.car_plugged);
        }
        if !input.smart_switch || plan.outcome == PlanOutcome::TargetReached {
            assert!(plan.selected_slots.is_empty());
        }
        if let Some(departure) = plan.departure {
            for slot in &plan.selected_slots {
                assert!(slot.start < departure, "{slot:?} after {departure}");
                assert!(slot.end() > input.now);
                assert!(input.prices.contains(slot));
            }
        }
        if plan.outcome == PlanOutcome::Scheduled {
            let current_selected = plan.selected_slots.iter().any(|s| s.contains(input.now));
            assert_eq!(plan.should_charge_now, current_selected);
        }
        assert_eq!(
            plan.reasoning.last().map(|e| e.stage),
            Some(Stage::Decision)
        );
    }
}

#[test]
fn cheapest_selection_is_minimal() {
    let mut rng = StdRng::seed_from_u64(2026);
    let mut checked = 0;
    for _ in 0..RANDOM_CASES {
        let input = random_input(&mut rng);
        let plan = generate_charging_plan(&input);
        if plan.outcome != PlanOutcome::Scheduled {
            continue;
        }
        let (Some(needed), Some(departure)) = (hours_needed(&plan), plan.departure) else {
            panic!("scheduled plan without energy trace or departure");
        };
        let usable = |s: &ev_charge_planner::planner::PriceSlot| s.usable_hours(input.now, departure);
        let covered: f64 = plan.selected_slots.iter().map(usable).sum();

        if covered + 1e-6 < needed {
            // Shortfall: every eligible slot is taken.
            let eligible = input
                .prices
                .iter()
                .filter(|s| s.end() > input.now && s.start < departure)
                .count();
            assert_eq!(plan.selected_slots.len(), eligible);
            continue;
        }

        let last_added = plan
            .selected_slots
            .iter()
            .max_by(|a, b| a.price.total_cmp(&b.price).then(a.start.cmp(&b.start)))
            .unwrap();
        let without_last = covered - usable(last_added);
        assert!(
            without_last < needed,
            "dropping {last_added:?} still covers {without_last} of {needed} h"
        );

        // No unselected eligible slot is cheaper than a selected one.
        let max_selected = last_added.price;
        for slot in input
            .prices
            .iter()
            .filter(|s| s.end() > input.now && s.start < departure)
            .filter(|s| !plan.selected_slots.contains(s))
        {
            assert!(slot.price >= max_selected);
        }
        checked += 1;
    }
    assert!(checked > 50, "only {checked} scheduled plans were checked");
}
