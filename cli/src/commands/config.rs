// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::{Path, PathBuf};

use colony_core::domain::node_config::NodeConfig;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,

        /// Print the effective configuration as YAML
        #[arg(long)]
        yaml: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate a configuration file with every default spelled out
    Generate {
        /// Output path
        #[arg(short, long, default_value = "./colony-config.yaml")]
        output: PathBuf,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths, yaml } => show(config_override, paths, yaml).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output } => generate(&output).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool, as_yaml: bool) -> Result<()> {
    let config = NodeConfig::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. COLONY_CONFIG_PATH: {}",
            std::env::var("COLONY_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./colony-config.yaml");
        println!("  4. ~/.colony/config.yaml");
        println!();
    }

    if as_yaml {
        print!("{}", config.to_yaml_string()?);
        return Ok(());
    }

    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Agents:".bold());
    println!("  Stop grace: {:?}", config.agents.stop_grace);
    println!();

    println!("{}", "Swarm:".bold());
    match &config.swarm.checkpoint_path {
        Some(path) => println!("  Checkpoint: {}", path.display()),
        None => println!("  Checkpoint: {}", "(disabled)".dimmed()),
    }
    println!("  Auto-persist: {}", config.swarm.auto_persist);
    println!("  Iteration delay: {:?}", config.swarm.iteration_delay);
    println!();

    println!("{}", "Dispatcher:".bold());
    println!(
        "  Broker: {}",
        config.dispatcher.broker_url.as_deref().unwrap_or("(none)")
    );
    println!("  Work queue: {}", config.dispatcher.work_queue);
    println!("  Collection budget: {:?}", config.dispatcher.collection_budget);
    println!("  Agent base URL: {}", config.dispatcher.agent_base_url);
    println!(
        "  Timeouts: connect {:?}, request {:?}",
        config.dispatcher.connect_timeout, config.dispatcher.request_timeout
    );
    println!();

    println!("{}", "Logging:".bold());
    println!("  Level: {}", config.logging.level);
    println!("  Format: {:?}", config.logging.format);

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = NodeConfig::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: &Path) -> Result<()> {
    let yaml = NodeConfig::default().to_yaml_string()?;
    std::fs::write(output, yaml)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_generated_config_loads_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("colony-config.yaml");
        generate(&path).await.unwrap();

        let loaded = NodeConfig::from_yaml_file(&path).unwrap();
        assert_eq!(loaded, NodeConfig::default());
        validate(Some(path)).await.unwrap();
    }

    #[tokio::test]
    async fn test_validate_rejects_empty_work_queue() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "dispatcher:\n  work_queue: \"\"\n").unwrap();
        assert!(validate(Some(path)).await.is_err());
    }
}
