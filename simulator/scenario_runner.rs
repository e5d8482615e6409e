// Scenario Runner - Load and execute scenario YAML files
//
// Usage:
//   cargo run --bin scenario_runner scenarios/simple_line.yaml
//   cargo run --bin scenario_runner scenarios/  (runs all .yaml files in directory)
//   cargo run --bin scenario_runner scenarios/simple_line.yaml --seed 0x1234...

mod factory_flow;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use simple_logger::SimpleLogger;

use factory_flow::{FactoryLayout, FlowRunner, FlowSimConfig};
use netsim::{reset_id_pool, structure_report, TimeOffset};

/// Scenario file format
#[derive(Debug, serde::Deserialize)]
struct ScenarioFile {
    /// Scenario metadata
    #[serde(default)]
    meta: ScenarioMeta,

    /// Run configuration
    config: ScenarioConfig,

    /// Network layout
    factory: FactoryLayout,
}

#[derive(Debug, Default, serde::Deserialize)]
struct ScenarioMeta {
    name: Option<String>,
    description: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct ScenarioConfig {
    turns: TimeOffset,

    #[serde(default)]
    report_interval: Option<TimeOffset>,
}

fn main() {
    SimpleLogger::new().init().unwrap();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!(
            "Usage: {} <scenario.yaml | directory/> [--seed SEED_HEX]",
            args[0]
        );
        eprintln!();
        eprintln!("Examples:");
        eprintln!("  {} scenarios/simple_line.yaml", args[0]);
        eprintln!("  {} scenarios/simple_line.yaml --seed 0x123456...", args[0]);
        std::process::exit(1);
    }

    // Parse optional seed
    let seed: Option<[u8; 32]> = if args.len() >= 4 && args[2] == "--seed" {
        Some(parse_seed_hex(&args[3]))
    } else {
        None
    };

    let path = Path::new(&args[1]);
    if path.is_file() {
        run_scenario_file(path.to_path_buf(), seed);
    } else if path.is_dir() {
        run_scenario_directory(path, seed);
    } else {
        eprintln!("No such file or directory: {}", path.display());
        std::process::exit(1);
    }
}

fn run_scenario_directory(dir: &Path, seed: Option<[u8; 32]>) {
    let mut scenario_paths: Vec<PathBuf> = match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                matches!(p.extension().and_then(|s| s.to_str()), Some("yaml") | Some("yml"))
            })
            .collect(),
        Err(e) => {
            eprintln!("Cannot read directory {}: {e}", dir.display());
            std::process::exit(1);
        }
    };
    scenario_paths.sort();

    if scenario_paths.is_empty() {
        eprintln!("No .yaml scenarios in {}", dir.display());
        return;
    }

    for scenario_path in scenario_paths {
        run_scenario_file(scenario_path, seed);
    }
}

fn run_scenario_file(path: PathBuf, seed: Option<[u8; 32]>) {
    let text = match fs::read_to_string(&path) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Cannot read {}: {e}", path.display());
            return;
        }
    };

    let scenario: ScenarioFile = match serde_yaml::from_str(&text) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Invalid scenario {}: {e}", path.display());
            return;
        }
    };

    if let Some(name) = &scenario.meta.name {
        info!("scenario: {name}");
    }
    if let Some(description) = &scenario.meta.description {
        info!("  {description}");
    }

    // each scenario starts with a fresh package id space
    reset_id_pool();

    let config = FlowSimConfig {
        turns: scenario.config.turns,
        seed,
        report_interval: scenario.config.report_interval,
        layout: scenario.factory,
    };

    let runner = match FlowRunner::new(config) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Cannot build factory from {}: {e}", path.display());
            return;
        }
    };

    print!("{}", structure_report(runner.factory()));

    match runner.run() {
        Ok(result) => result.print_summary(),
        Err(e) => eprintln!("Run failed for {}: {e}", path.display()),
    }
}

fn parse_seed_hex(hex: &str) -> [u8; 32] {
    let hex = hex.trim_start_matches("0x");
    let mut seed = [0u8; 32];
    for (i, chunk) in hex.as_bytes().chunks(2).take(32).enumerate() {
        let byte_str = std::str::from_utf8(chunk).unwrap_or("00");
        seed[i] = u8::from_str_radix(byte_str, 16).unwrap_or_else(|e| {
            eprintln!("Invalid hex seed: {e}");
            std::process::exit(1);
        });
    }
    seed
}
