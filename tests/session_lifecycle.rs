//! A full night from plug-in to departure through the input assembler,
//! the session tracker, and a simulated charger.

mod common;

use chrono::{Duration, NaiveDateTime};

use common::at;
use ev_charge_planner::config::ScenarioConfig;
use ev_charge_planner::devices::SimCharger;
use ev_charge_planner::input::{InputAssembler, OverrideSetting, SensorReadings};
use ev_charge_planner::planner::PlanOutcome;
use ev_charge_planner::prices::PriceData;
use ev_charge_planner::session::{SessionState, SessionTracker};

/// Day 1 is expensive; on day 2 the 02:00 hour costs 0.5.
fn prices_at(now: NaiveDateTime) -> PriceData {
    let day1 = vec![2.0; 24];
    let mut day2 = vec![1.0; 24];
    day2[2] = 0.5;
    if now.date() == at(1, 0, 0).date() {
        PriceData {
            today: day1,
            tomorrow: day2,
            tomorrow_valid: true,
        }
    } else {
        PriceData {
            today: day2,
            tomorrow: Vec::new(),
            tomorrow_valid: false,
        }
    }
}

struct Night {
    assembler: InputAssembler,
    tracker: SessionTracker,
    charger: SimCharger,
}

impl Night {
    fn new() -> Self {
        let cfg = ScenarioConfig::baseline();
        Self {
            assembler: InputAssembler::from_config(&cfg).unwrap(),
            tracker: SessionTracker::default(),
            charger: SimCharger::new(cfg.charger.max_power_kw()),
        }
    }

    /// Evaluates at `now` with a stale SOC sensor stuck at `sensor_soc`.
    fn tick(&mut self, now: NaiveDateTime, plugged: bool, sensor_soc: f64) -> PlanOutcome {
        let sensors = SensorReadings::new(now, plugged, Some(sensor_soc));
        let input = self
            .assembler
            .assemble(&sensors, &prices_at(now), self.charger.is_on());
        self.tracker.drive(&input, &mut self.charger).outcome
    }
}

#[test]
fn night_session_charges_in_cheapest_hour_and_reports() {
    let mut night = Night::new();
    let mut on_times = Vec::new();

    let mut now = at(1, 18, 0);
    while now < at(2, 7, 0) {
        night.tick(now, true, 70.0);
        if night.charger.is_on() {
            on_times.push(now);
        }
        now += Duration::minutes(15);
    }

    // 10% of 64 kWh at 90% and 11.04 kW: three quarter hours from 02:00,
    // then the SOC estimate passes 80%.
    assert_eq!(on_times, vec![at(2, 2, 0), at(2, 2, 15), at(2, 2, 30)]);
    assert_eq!(night.tracker.state(), SessionState::TargetReached);
    assert!(night.assembler.soc_estimate() > 80.0);

    let outcome = night.tick(at(2, 7, 0), false, 81.0);
    assert_eq!(outcome, PlanOutcome::CarNotPlugged);
    assert_eq!(night.tracker.state(), SessionState::Idle);
    assert!(night.tracker.session().is_none());

    let report = night.tracker.last_report().unwrap();
    assert!((report.energy_kwh - 8.28).abs() < 1e-9);
    assert!((report.cost - 4.14).abs() < 1e-9);
    assert_eq!(report.commands, 2);
    assert_eq!(night.charger.accepted_commands(), 2);
}

#[test]
fn manual_override_lasts_one_session() {
    let mut night = Night::new();
    night.assembler.set_manual_override(Some(OverrideSetting {
        target_soc: Some(100),
        departure_time: None,
    }));

    night.tick(at(1, 18, 0), true, 70.0);
    assert_eq!(night.tracker.last_plan().map(|p| p.target_soc), Some(100));

    night.tick(at(1, 19, 0), false, 70.0);
    night.tick(at(1, 20, 0), true, 70.0);
    assert_eq!(night.tracker.last_plan().map(|p| p.target_soc), Some(80));
}

#[test]
fn failed_start_is_retried_next_tick() {
    let mut night = Night::new();
    night.charger.fail_next(1);

    let mut now = at(1, 18, 0);
    while now < at(2, 2, 0) {
        night.tick(now, true, 70.0);
        now += Duration::minutes(15);
    }
    night.tick(at(2, 2, 0), true, 70.0);
    assert!(!night.charger.is_on());
    assert!(!night.tracker.is_charging());

    night.tick(at(2, 2, 15), true, 70.0);
    assert!(night.charger.is_on());
    assert_eq!(night.tracker.state(), SessionState::Charging);
}

#[test]
fn smart_off_charges_from_plug_in() {
    let mut night = Night::new();
    night.assembler.set_smart_switch(false);
    let outcome = night.tick(at(1, 18, 0), true, 70.0);
    assert_eq!(outcome, PlanOutcome::SmartChargingDisabled);
    assert!(night.charger.is_on());
}
