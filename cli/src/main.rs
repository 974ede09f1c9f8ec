// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Colony CLI
//!
//! The `colony` binary runs swarm optimisations in-process, serves the
//! fitness evaluation endpoint for remote swarms and runs broker workers.
//!
//! ## Commands
//!
//! - `colony swarm run|show` - Run a swarm from a definition file, inspect checkpoints
//! - `colony worker serve` - Serve `POST /agents/{agentId}/evaluate_fitness`
//! - `colony worker broker` - Consume evaluation tasks from a networked broker
//! - `colony config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use colony_cli::commands::{self, ConfigCommand, SwarmCommand, WorkerCommand};
use colony_core::domain::node_config::{LogFormat, NodeConfig};

/// Colony - agent runtime and swarm optimisation engine
#[derive(Parser)]
#[command(name = "colony")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "COLONY_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); defaults to logging.level
    #[arg(long, global = true, env = "COLONY_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Swarm optimisation
    #[command(name = "swarm")]
    Swarm {
        #[command(subcommand)]
        command: SwarmCommand,
    },

    /// Remote evaluation worker
    #[command(name = "worker")]
    Worker {
        #[command(subcommand)]
        command: WorkerCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // A broken config file is reported by the command itself.
    let logging = NodeConfig::load_or_default(cli.config.clone())
        .map(|c| c.logging)
        .unwrap_or_default();
    let level = cli.log_level.clone().unwrap_or(logging.level);
    init_logging(&level, logging.format)?;

    match cli.command {
        Some(Commands::Swarm { command }) => commands::swarm::handle_command(command, cli.config).await,
        Some(Commands::Worker { command }) => commands::worker::handle_command(command, cli.config).await,
        Some(Commands::Config { command }) => commands::config::handle_command(command, cli.config).await,
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }

    Ok(())
}
