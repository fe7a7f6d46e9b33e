//! EV charge planner entry point: CLI wiring, simulation runs, and replay.

use std::path::Path;
use std::process;

use tracing::info;
use tracing_subscriber::EnvFilter;

use ev_charge_planner::cli::{self, Command, SimulateOptions};
use ev_charge_planner::config::ScenarioConfig;
use ev_charge_planner::diagnostics::DiagnosticSnapshot;
use ev_charge_planner::io::export::export_csv;
use ev_charge_planner::sim::engine::Engine;
use ev_charge_planner::sim::kpi::KpiReport;

/// Exit status of `replay` when the reproduced plan differs.
const EXIT_REPLAY_MISMATCH: i32 = 2;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_scenario(opts: &SimulateOptions) -> ScenarioConfig {
    // --scenario takes priority, then --preset (defaulted to baseline by the parser)
    let loaded = if let Some(ref path) = opts.scenario {
        ScenarioConfig::from_toml_file(path)
    } else {
        ScenarioConfig::from_preset(opts.preset.as_deref().unwrap_or("baseline"))
    };
    let mut scenario = loaded.unwrap_or_else(|e| {
        eprintln!("{e}");
        process::exit(1);
    });

    if let Some(seed) = opts.seed {
        scenario.simulation.seed = seed;
    }

    let errors = scenario.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }
    scenario
}

fn simulate(opts: &SimulateOptions) {
    let scenario = load_scenario(opts);

    let mut engine = Engine::from_config(&scenario).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        process::exit(1);
    });
    info!(ticks = engine.total_ticks(), "running simulation");
    let results = engine.run();
    let kpi = KpiReport::from_results(&results, engine.tick_hours());

    for r in &results {
        println!("{r}");
    }
    for report in engine.reports() {
        println!("\n{report}");
    }
    println!("\n{kpi}");

    if let Some(ref path) = opts.telemetry_out {
        if let Err(e) = export_csv(&results, path) {
            eprintln!("error: failed to write CSV: {e}");
            process::exit(1);
        }
        eprintln!("Telemetry written to {}", path.display());
    }

    let snapshot = engine.snapshot("final evaluation of simulation run");
    if let Some(ref path) = opts.dump_out {
        let Some(ref snap) = snapshot else {
            eprintln!("error: no evaluation to dump");
            process::exit(1);
        };
        if let Err(e) = snap.write_to(path) {
            eprintln!("error: failed to write dump: {e}");
            process::exit(1);
        }
        eprintln!("Diagnostic dump written to {}", path.display());
    }

    if opts.serve {
        serve(opts.port, scenario, kpi, results, snapshot);
    }
}

#[cfg(feature = "api")]
fn serve(
    port: u16,
    scenario: ScenarioConfig,
    kpi: KpiReport,
    results: Vec<ev_charge_planner::sim::types::StepResult>,
    snapshot: Option<DiagnosticSnapshot>,
) {
    use std::net::SocketAddr;
    use std::sync::Arc;

    let state = Arc::new(ev_charge_planner::api::AppState {
        scenario,
        kpi,
        results,
        snapshot,
    });
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let rt = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("error: failed to create tokio runtime: {e}");
        process::exit(1);
    });
    if let Err(e) = rt.block_on(ev_charge_planner::api::serve(state, addr)) {
        eprintln!("error: API server failed on {addr}: {e}");
        process::exit(1);
    }
}

#[cfg(not(feature = "api"))]
fn serve(
    _port: u16,
    _scenario: ScenarioConfig,
    _kpi: KpiReport,
    _results: Vec<ev_charge_planner::sim::types::StepResult>,
    _snapshot: Option<DiagnosticSnapshot>,
) {
    eprintln!("error: --serve requires building with `--features api`");
    process::exit(1);
}

fn replay(dump: &Path) {
    let snapshot = DiagnosticSnapshot::read_from(dump).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        process::exit(1);
    });
    let outcome = snapshot.replay().unwrap_or_else(|e| {
        eprintln!("error: {e}");
        process::exit(1);
    });
    println!("Snapshot: {} ({})", snapshot.description, snapshot.timestamp);
    println!("{outcome}");
    if !outcome.matches() {
        process::exit(EXIT_REPLAY_MISMATCH);
    }
}

fn main() {
    let command = cli::parse_args().unwrap_or_else(|e| {
        eprintln!("error: {e}");
        cli::print_usage();
        process::exit(1);
    });

    init_tracing();

    match command {
        Command::Help => cli::print_usage(),
        Command::Simulate(opts) => simulate(&opts),
        Command::Replay { dump } => replay(&dump),
    }
}
