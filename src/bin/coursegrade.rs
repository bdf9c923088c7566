//! Coursegrade CLI Binary
//!
//! Command-line interface for resolving and inspecting course grades.

use anyhow::Context;
use clap::Parser;
use coursegrade::cli::{Cli, RunContext};
use coursegrade::config::ConfigLoader;
use coursegrade::logging::{init_logging, LoggingConfig};
use std::process;
use tracing::{error, info};

fn main() {
    let cli = Cli::parse();

    let logging_config = build_logging_config(&cli);
    if let Err(e) = init_logging(Some(&logging_config)) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    info!("Coursegrade CLI starting");

    if let Err(e) = run(cli) {
        error!("Command failed: {:#}", e);
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let context = RunContext::new(cli.workspace.clone(), cli.config.clone())
        .with_context(|| format!("initializing workspace {}", cli.workspace.display()))?;
    let output = context.execute(&cli.command)?;
    info!("Command completed successfully");
    println!("{}", output);
    Ok(())
}

/// Build logging configuration from CLI args and config file.
/// Precedence: CLI flags override config file override defaults.
fn build_logging_config(cli: &Cli) -> LoggingConfig {
    let mut config = match cli.config {
        Some(ref config_path) => ConfigLoader::load_from_file(config_path)
            .ok()
            .map(|c| c.logging)
            .unwrap_or_default(),
        None => ConfigLoader::load(&cli.workspace)
            .ok()
            .map(|c| c.logging)
            .unwrap_or_default(),
    };

    if cli.verbose {
        config.level = "debug".to_string();
    }
    if let Some(ref level) = cli.log_level {
        config.level = level.clone();
    }
    if let Some(ref format) = cli.log_format {
        config.format = format.clone();
    }
    config
}
