// ==========================================
// Delivery Window Planner - command line entry
// ==========================================
// plan:   CSV orders + travel-time matrix -> movement table (+ JSON result)
// config: print the default configuration snapshot
// ==========================================

use anyhow::{anyhow, Context, Result};
use clap::{arg, Command};
use delivery_window_planner::config::ConfigManager;
use delivery_window_planner::domain::TravelTimeMatrix;
use delivery_window_planner::engine::{CheapestInsertionRouter, PlanningOrchestrator, RunInput, RunResult};
use delivery_window_planner::importer::OrderImporter;
use delivery_window_planner::logging;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

fn cli() -> Command {
    Command::new("window-planner")
        .about(format!(
            "{}: allocates same-day delivery orders to windows and reconciles the result",
            delivery_window_planner::APP_NAME
        ))
        .version(delivery_window_planner::VERSION)
        .arg_required_else_help(true)
        .arg(arg!(--"log-json" "Emit log events as JSON lines").global(true))
        .subcommand(
            Command::new("plan")
                .about("Runs one planning pass")
                .arg(
                    arg!(--orders <PATH> "Order CSV (current or legacy column scheme)")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--matrix <PATH> "Travel-time matrix JSON, depot at index 0")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--config [PATH] "Flat JSON configuration object")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--capacity [OVERRIDE] "Window capacity override as WINDOW=UNITS (repeatable)")
                        .action(clap::ArgAction::Append)
                        .value_parser(clap::value_parser!(String)),
                )
                .arg(
                    arg!(--output [PATH] "Write the full run result as JSON")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
        .subcommand(Command::new("config").about("Prints the default configuration snapshot"))
}

fn main() {
    let matches = cli().get_matches();
    if matches.get_flag("log-json") {
        logging::init_json();
    } else {
        logging::init();
    }

    if let Err(e) = match matches.subcommand() {
        Some(("plan", sub_m)) => plan(
            sub_m.get_one::<PathBuf>("orders").cloned(),
            sub_m.get_one::<PathBuf>("matrix").cloned(),
            sub_m.get_one::<PathBuf>("config").cloned(),
            sub_m
                .get_many::<String>("capacity")
                .map(|values| values.cloned().collect())
                .unwrap_or_default(),
            sub_m.get_one::<PathBuf>("output").cloned(),
        ),
        Some(("config", _)) => print_default_config(),
        _ => Err(anyhow!("Invalid subcommand")),
    } {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn plan(
    orders_path: Option<PathBuf>,
    matrix_path: Option<PathBuf>,
    config_path: Option<PathBuf>,
    capacity_overrides: Vec<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    let orders_path = orders_path.ok_or_else(|| anyhow!("--orders is required"))?;
    let matrix_path = matrix_path.ok_or_else(|| anyhow!("--matrix is required"))?;

    let manager = match config_path {
        Some(path) => ConfigManager::from_json_file(&path)?,
        None => ConfigManager::new(),
    };
    let config = manager.to_planner_config();

    let imported = OrderImporter::new(config.default_vehicle_capacity).import_file(&orders_path)?;
    for issue in &imported.batch.issues {
        eprintln!(
            "row {}: {} ({})",
            issue.row_number,
            issue.message,
            issue.order_id.as_deref().unwrap_or("no id")
        );
    }

    let matrix_text = fs::read_to_string(&matrix_path)
        .with_context(|| format!("reading matrix {}", matrix_path.display()))?;
    let matrix: TravelTimeMatrix = serde_json::from_str(&matrix_text)
        .with_context(|| format!("parsing matrix {}", matrix_path.display()))?;

    let input = RunInput {
        orders: imported.batch.orders,
        windows: imported.batch.windows,
        capacities: parse_capacities(&capacity_overrides)?,
        matrix,
    };

    let orchestrator = PlanningOrchestrator::new(Arc::new(CheapestInsertionRouter::new()), config);
    let result = orchestrator.run_blocking(input)?;

    print_summary(&result);

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&result)?;
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
        println!("run result written to {}", path.display());
    }
    Ok(())
}

/// `WINDOW=UNITS`; the split is on the last '=' so window labels stay intact.
fn parse_capacities(overrides: &[String]) -> Result<HashMap<String, u32>> {
    let mut capacities = HashMap::new();
    for raw in overrides {
        let (window, units) = raw
            .rsplit_once('=')
            .ok_or_else(|| anyhow!("capacity override '{}' is not WINDOW=UNITS", raw))?;
        let units: u32 = units
            .trim()
            .parse()
            .with_context(|| format!("capacity override '{}' has a bad unit count", raw))?;
        capacities.insert(window.trim().to_string(), units);
    }
    Ok(capacities)
}

fn print_summary(result: &RunResult) {
    println!("run {} ({} router)", result.run_id, result.router);
    println!();
    println!("{}", result.movement.render());
    println!();
    for report in &result.windows {
        match (&report.metrics, report.degraded) {
            (Some(m), false) => println!(
                "{}: {} stops, {} units ({:.1}% load), {} min drive + {} min service",
                report.window.window_id, m.stops, m.total_units, m.load_factor_pct, m.drive_minutes, m.service_minutes
            ),
            _ => println!(
                "{}: DEGRADED, {} orders without a route",
                report.window.window_id,
                report.kept_orders.len()
            ),
        }
    }
    for warning in &result.warnings {
        println!("warning: {}", warning);
    }
}

fn print_default_config() -> Result<()> {
    let manager = ConfigManager::from_planner_config(&Default::default())?;
    println!("{}", manager.get_config_snapshot()?);
    Ok(())
}
