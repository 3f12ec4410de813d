//! drift - delay-tolerant network simulator
//!
//! Runs ONE-style scenario files or small built-in demo scenarios and
//! writes the configured reports.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use drift_core::{Scenario, Settings};

mod demos;

#[derive(Parser)]
#[command(
    name = "drift",
    about = "Discrete-event simulator for delay-tolerant networks",
    version
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario from a settings file
    Run {
        /// Path to the key=value settings file
        config: PathBuf,

        /// Override the movement RNG seed
        #[arg(short, long)]
        seed: Option<u64>,
    },

    /// Run a built-in demo scenario
    Demo {
        /// Demo name: two-hosts, relay-line, spray
        name: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().compact())
        .with(filter)
        .init();

    match cli.command {
        Commands::Run { config, seed } => run_scenario(&config, seed),
        Commands::Demo { name } => demos::run(&name),
    }
}

fn run_scenario(config: &PathBuf, seed: Option<u64>) -> anyhow::Result<()> {
    let started = chrono::Utc::now();
    let mut settings = Settings::from_file(config)
        .with_context(|| format!("reading settings from {}", config.display()))?;
    if let Some(seed) = seed {
        settings.set("MovementModel.rngSeed", seed.to_string());
    }

    let mut scenario = Scenario::from_settings(&settings)?;
    for report in drift_reports::from_settings(&settings, &scenario.name)? {
        scenario.world.add_report(report);
    }

    info!(scenario = %scenario.name, end_time = scenario.end_time, "run starting");
    scenario.world.run_until(scenario.end_time)?;
    scenario.world.finalize()?;
    info!(
        elapsed = %(chrono::Utc::now() - started),
        "run complete, reports flushed"
    );
    Ok(())
}
