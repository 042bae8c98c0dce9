mod error;
mod expr;
mod io;
mod model;
mod report;
mod simulation;

use crate::error::ReportError;
use crate::report::registry::ReportRegistry;
use crate::report::traits::TracingSink;
use crate::simulation::config::AppConfig;
use crate::simulation::engine::FarmSimulation;
use anyhow::Context;
use std::env;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    // Logging honours FARM_OUTPUT_LOG, then RUST_LOG, then "info".
    let log_level = env::var("FARM_OUTPUT_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level)),
        )
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        let exit_code = match e.downcast_ref::<ReportError>() {
            Some(ReportError::Config(_)) | Some(ReportError::PenOutOfRange { .. }) => 2,
            Some(ReportError::Io { .. }) | Some(ReportError::Csv { .. }) => 3,
            Some(ReportError::Parse { .. }) | Some(ReportError::Evaluation { .. }) => 4,
            _ => 1,
        };
        process::exit(exit_code);
    }
}

fn run() -> anyhow::Result<()> {
    println!("=== Farm Output Reports ===");

    // 1. SETUP CONFIGURATION
    // An optional JSON file as the only argument; defaults otherwise.
    let config = match env::args().nth(1).map(PathBuf::from) {
        Some(path) => AppConfig::load(&path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => AppConfig::default(),
    };

    // 2. INITIALIZE SIMULATION
    let mut sim = FarmSimulation::new(config.run.clone())?;

    // 3. WIRE UP REPORTS
    // Pens are discovered from the initial state and stay fixed for the run.
    let mut registry = ReportRegistry::from_config(&config.output, &sim.snapshot()?)?;
    registry.initialize_output_dir(&config.output.output_dir)?;
    if config.run.produce_graphics {
        registry.initialize_diagnostic_dir(&config.output.diagnostic_dir)?;
    }
    registry.initialize_reports(&TracingSink)?;
    println!(
        "Reports: {}",
        registry.keys().collect::<Vec<_>>().join(", ")
    );

    // 4. RUN SIMULATION
    println!(
        "Running {} year(s) from {} with {} pen(s)...",
        config.run.years, config.run.start_year, config.run.pens
    );
    sim.run(&mut registry)?;
    println!(
        "Success! Reports written to ./{}",
        config.output.output_dir.display()
    );

    // 5. CHARTS
    if config.run.produce_graphics {
        let summary = registry.produce_graphics()?;
        println!(
            "Charts: {} rendered, {} failed, in ./{}",
            summary.rendered,
            summary.failures.len(),
            config.output.diagnostic_dir.display()
        );
    }

    println!("\nSimulation Complete.");
    Ok(())
}
