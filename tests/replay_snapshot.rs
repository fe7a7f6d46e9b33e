//! Diagnostic dumps written by a simulation run replay to the same plan,
//! both through the library and through the `replay` subcommand.

use std::path::PathBuf;
use std::process::Command;

use chrono::Duration;

use ev_charge_planner::config::ScenarioConfig;
use ev_charge_planner::diagnostics::DiagnosticSnapshot;
use ev_charge_planner::sim::engine::Engine;

fn dump_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("ev-charge-planner-{}-{name}.json", std::process::id()))
}

/// Runs `cfg` until the first charging tick and captures that evaluation.
fn charging_snapshot(cfg: &ScenarioConfig) -> DiagnosticSnapshot {
    let mut engine = Engine::from_config(cfg).unwrap();
    let start = cfg.simulation.start_time().unwrap();
    let tick = Duration::minutes(i64::from(cfg.simulation.tick_minutes));
    for t in 0..engine.total_ticks() {
        let step = engine.step(t, start + tick * t as i32);
        if step.charging {
            return engine.snapshot("first charging tick").unwrap();
        }
    }
    panic!("scenario never charged");
}

#[test]
fn written_dump_replays_identically() {
    let snapshot = charging_snapshot(&ScenarioConfig::cheap_night());
    assert!(snapshot.last_plan.as_ref().unwrap().should_charge_now);

    let path = dump_path("library");
    snapshot.write_to(&path).unwrap();
    let restored = DiagnosticSnapshot::read_from(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(restored, snapshot);
    let outcome = restored.replay().unwrap();
    assert!(outcome.matches(), "{outcome}");
    assert_eq!(outcome.replayed, *snapshot.last_plan.as_ref().unwrap());
}

#[test]
fn tampered_plan_is_reported_as_mismatch() {
    let mut snapshot = charging_snapshot(&ScenarioConfig::baseline());
    if let Some(plan) = snapshot.last_plan.as_mut() {
        plan.should_charge_now = !plan.should_charge_now;
    }
    let outcome = snapshot.replay().unwrap();
    assert_eq!(outcome.differences, vec!["should_charge_now"]);
    assert!(outcome.to_string().contains("MISMATCH in should_charge_now"));
}

#[test]
fn replay_subcommand_exit_codes() {
    let snapshot = charging_snapshot(&ScenarioConfig::baseline());
    let good = dump_path("cli-good");
    snapshot.write_to(&good).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_ev-charge-planner"))
        .args(["replay", good.to_str().unwrap()])
        .output()
        .expect("ev-charge-planner process should run");
    assert!(
        output.status.success(),
        "stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(String::from_utf8_lossy(&output.stdout).contains("plan reproduced"));

    let mut tampered = snapshot;
    tampered.planning_input.car_soc = 100.0;
    let bad = dump_path("cli-bad");
    tampered.write_to(&bad).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_ev-charge-planner"))
        .args(["replay", bad.to_str().unwrap()])
        .output()
        .expect("ev-charge-planner process should run");
    assert_eq!(output.status.code(), Some(2));

    std::fs::remove_file(&good).ok();
    std::fs::remove_file(&bad).ok();
}

#[test]
fn simulate_writes_replayable_dump() {
    let path = dump_path("simulate");
    let output = Command::new(env!("CARGO_BIN_EXE_ev-charge-planner"))
        .args(["--preset", "late_prices", "--dump-out", path.to_str().unwrap()])
        .output()
        .expect("ev-charge-planner process should run");
    assert!(
        output.status.success(),
        "stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );

    let snapshot = DiagnosticSnapshot::read_from(&path).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(snapshot.description, "final evaluation of simulation run");
    assert!(snapshot.replay().unwrap().matches());
}
