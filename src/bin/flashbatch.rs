//! Flashbatch CLI Binary
//!
//! Headless driver for the batch controller and the text cleanup worker.

use anyhow::Context;
use clap::Parser;
use flashbatch::cli::{Cli, RunContext};
use flashbatch::config::ConfigLoader;
use flashbatch::logging::{init_logging, LoggingConfig};
use std::process;
use tracing::{error, info};

fn main() {
    let cli = Cli::parse();

    let logging_config = build_logging_config(&cli);
    if let Err(e) = init_logging(Some(&logging_config)) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    info!("Flashbatch CLI starting");

    match run(&cli) {
        Ok(output) => {
            info!("Command completed successfully");
            println!("{}", output);
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<String> {
    let context = RunContext::new(cli.config.clone(), cli.model.clone())
        .context("failed to load configuration")?;
    Ok(context.execute(&cli.command)?)
}

/// Build logging configuration from CLI args, environment, and config file
fn build_logging_config(cli: &Cli) -> LoggingConfig {
    if !cli.verbose && cli.log_level.is_none() {
        return LoggingConfig {
            level: "off".to_string(),
            ..LoggingConfig::default()
        };
    }

    let loaded = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path),
        None => std::env::current_dir()
            .map_err(Into::into)
            .and_then(|dir| ConfigLoader::load(&dir)),
    };
    let mut config = loaded.map(|c| c.logging).unwrap_or_default();

    if cli.verbose && config.level == LoggingConfig::default().level {
        config.level = "info".to_string();
    }
    if let Some(level) = &cli.log_level {
        config.level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.format = format.clone();
    }
    if let Some(output) = &cli.log_output {
        config.output = output.clone();
    }
    if let Some(file) = &cli.log_file {
        config.file = file.clone();
    }

    config
}
