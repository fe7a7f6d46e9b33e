//! Command-line parsing for the `ev-charge-planner` binary.

use std::env;
use std::path::PathBuf;

/// Port used by `--serve` when `--port` is not given.
pub const DEFAULT_PORT: u16 = 3000;

/// Options of the `simulate` subcommand (the default).
#[derive(Debug, Clone, PartialEq)]
pub struct SimulateOptions {
    pub scenario: Option<PathBuf>,
    pub preset: Option<String>,
    pub seed: Option<u64>,
    pub telemetry_out: Option<PathBuf>,
    pub dump_out: Option<PathBuf>,
    pub serve: bool,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Simulate(SimulateOptions),
    /// Replay a diagnostic dump through the planner.
    Replay { dump: PathBuf },
    Help,
}

pub fn parse_args() -> Result<Command, String> {
    let args: Vec<String> = env::args().skip(1).collect();
    parse_args_from(args)
}

/// Parses arguments (without the program name).
///
/// # Errors
///
/// Returns a message naming the offending argument.
pub fn parse_args_from(args: Vec<String>) -> Result<Command, String> {
    match args.first().map(String::as_str) {
        Some("--help" | "-h" | "help") => Ok(Command::Help),
        Some("replay") => parse_replay(&args[1..]),
        Some("simulate") => parse_simulate(&args[1..]).map(Command::Simulate),
        _ => parse_simulate(&args).map(Command::Simulate),
    }
}

fn parse_replay(args: &[String]) -> Result<Command, String> {
    match args {
        [dump] if !dump.starts_with("--") => Ok(Command::Replay {
            dump: PathBuf::from(dump),
        }),
        [] => Err("missing dump path for replay (expected a JSON file)".to_string()),
        _ => Err("replay takes exactly one dump path".to_string()),
    }
}

fn parse_simulate(args: &[String]) -> Result<SimulateOptions, String> {
    let mut i = 0usize;
    let mut scenario = None;
    let mut preset = None;
    let mut seed = None;
    let mut telemetry_out = None;
    let mut dump_out = None;
    let mut serve = false;
    let mut port = None;

    while i < args.len() {
        match args[i].as_str() {
            "--scenario" => {
                i += 1;
                let path = args.next_or_err(
                    i,
                    "missing value for --scenario (expected a TOML file path)",
                )?;
                if scenario.replace(PathBuf::from(path)).is_some() {
                    return Err("--scenario provided more than once".to_string());
                }
            }
            "--preset" => {
                i += 1;
                let name =
                    args.next_or_err(i, "missing value for --preset (expected a preset name)")?;
                if preset.replace(name.to_string()).is_some() {
                    return Err("--preset provided more than once".to_string());
                }
            }
            "--seed" => {
                i += 1;
                let raw = args.next_or_err(i, "missing value for --seed (expected an integer)")?;
                let value = raw
                    .parse::<u64>()
                    .map_err(|_| format!("invalid --seed \"{raw}\" (expected an integer)"))?;
                seed = Some(value);
            }
            "--telemetry-out" => {
                i += 1;
                let path = args.next_or_err(
                    i,
                    "missing value for --telemetry-out (expected a file path)",
                )?;
                if telemetry_out.replace(PathBuf::from(path)).is_some() {
                    return Err("--telemetry-out provided more than once".to_string());
                }
            }
            "--dump-out" => {
                i += 1;
                let path =
                    args.next_or_err(i, "missing value for --dump-out (expected a file path)")?;
                if dump_out.replace(PathBuf::from(path)).is_some() {
                    return Err("--dump-out provided more than once".to_string());
                }
            }
            "--serve" => serve = true,
            "--port" => {
                i += 1;
                let raw = args.next_or_err(i, "missing value for --port (expected 1-65535)")?;
                let value = raw
                    .parse::<u16>()
                    .ok()
                    .filter(|&p| p > 0)
                    .ok_or_else(|| format!("invalid --port \"{raw}\" (expected 1-65535)"))?;
                port = Some(value);
            }
            other => return Err(format!("unknown argument: {other}")),
        }
        i += 1;
    }

    if scenario.is_some() && preset.is_some() {
        return Err(
            "arguments `--scenario` and `--preset` are mutually exclusive; choose one source"
                .to_string(),
        );
    }
    if port.is_some() && !serve {
        return Err("--port requires --serve".to_string());
    }

    if scenario.is_none() && preset.is_none() {
        preset = Some("baseline".to_string());
    }

    Ok(SimulateOptions {
        scenario,
        preset,
        seed,
        telemetry_out,
        dump_out,
        serve,
        port: port.unwrap_or(DEFAULT_PORT),
    })
}

trait SliceArgExt {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String>;
}

impl SliceArgExt for [String] {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String> {
        self.get(index)
            .map(String::as_str)
            .ok_or_else(|| err.to_string())
    }
}

pub fn print_usage() {
    eprintln!("Usage:");
    eprintln!(
        "  ev-charge-planner [simulate] [--scenario <path> | --preset <name>] [--seed <u64>]"
    );
    eprintln!(
        "                    [--telemetry-out <path>] [--dump-out <path>] [--serve] [--port <u16>]"
    );
    eprintln!("  ev-charge-planner replay <dump.json>");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn simulate(list: &[&str]) -> SimulateOptions {
        match parse_args_from(args(list)).expect("parse should succeed") {
            Command::Simulate(opts) => opts,
            other => panic!("expected simulate, got {other:?}"),
        }
    }

    #[test]
    fn defaults_to_baseline_preset() {
        let opts = simulate(&[]);
        assert_eq!(opts.preset.as_deref(), Some("baseline"));
        assert!(!opts.serve);
        assert_eq!(opts.port, DEFAULT_PORT);
    }

    #[test]
    fn supports_scenario_cli() {
        let opts = simulate(&["simulate", "--scenario", "scenarios/baseline.toml"]);
        assert_eq!(
            opts.scenario.as_deref().and_then(|p| p.to_str()),
            Some("scenarios/baseline.toml")
        );
        assert!(opts.preset.is_none());
    }

    #[test]
    fn parses_all_simulate_flags() {
        let opts = simulate(&[
            "--preset",
            "cheap_night",
            "--seed",
            "7",
            "--telemetry-out",
            "out.csv",
            "--dump-out",
            "dump.json",
            "--serve",
            "--port",
            "8080",
        ]);
        assert_eq!(opts.preset.as_deref(), Some("cheap_night"));
        assert_eq!(opts.seed, Some(7));
        assert!(opts.telemetry_out.is_some());
        assert!(opts.dump_out.is_some());
        assert!(opts.serve);
        assert_eq!(opts.port, 8080);
    }

    #[test]
    fn scenario_and_preset_conflict() {
        let err = parse_args_from(args(&["--scenario", "a.toml", "--preset", "baseline"]));
        assert!(err.unwrap_err().contains("mutually exclusive"));
    }

    #[test]
    fn replay_needs_one_path() {
        assert_eq!(
            parse_args_from(args(&["replay", "dump.json"])),
            Ok(Command::Replay {
                dump: PathBuf::from("dump.json")
            })
        );
        assert!(parse_args_from(args(&["replay"])).is_err());
        assert!(parse_args_from(args(&["replay", "a", "b"])).is_err());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(parse_args_from(args(&["--seed", "abc"])).is_err());
        assert!(parse_args_from(args(&["--serve", "--port", "0"])).is_err());
        assert!(parse_args_from(args(&["--port", "8080"])).is_err());
        assert!(parse_args_from(args(&["--bogus"])).is_err());
    }

    #[test]
    fn help() {
        assert_eq!(parse_args_from(args(&["--help"])), Ok(Command::Help));
    }
}
