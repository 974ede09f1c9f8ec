// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Swarm commands
//!
//! Commands: run, show

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use colored::Colorize;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use colony_core::domain::events::SwarmEvent;
use colony_core::domain::node_config::{DispatcherSettings, NodeConfig};
use colony_core::infrastructure::event_bus::EventBus;
use colony_swarm::application::{EvaluationDispatcher, SwarmManager};
use colony_swarm::domain::problem::{Bound, ObjectiveRegistry, OptimizationProblem};
use colony_swarm::domain::swarm::{SwarmConfig, SwarmId};
use colony_swarm::infrastructure::broker::{BrokerPool, EvaluationWorker};
use colony_swarm::infrastructure::checkpoint::{CheckpointStore, SwarmRecord};

#[derive(Subcommand)]
pub enum SwarmCommand {
    /// Run a swarm to completion from a definition file
    Run {
        /// Path to swarm definition YAML file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// In-process evaluation workers on the configured broker
        #[arg(long, default_value_t = 0)]
        workers: usize,
    },

    /// Show checkpointed swarms
    Show {
        /// Swarm ID (default: list all)
        #[arg(value_name = "SWARM_ID")]
        swarm_id: Option<Uuid>,
    },
}

/// YAML description of one optimisation run.
#[derive(Debug, Clone, Deserialize)]
pub struct SwarmDefinition {
    pub name: String,
    pub algorithm: String,
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
    /// Registered objective name, e.g. `rastrigin`
    pub objective: String,
    #[serde(default)]
    pub description: String,
    pub bounds: Vec<Bound>,
    /// Defaults to the number of bounds
    #[serde(default)]
    pub dimensions: Option<usize>,
    #[serde(default = "default_minimize")]
    pub minimize: bool,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u64,
    #[serde(default)]
    pub target_fitness: Option<f64>,
}

fn default_minimize() -> bool {
    true
}

fn default_max_iterations() -> u64 {
    100
}

impl SwarmDefinition {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read swarm definition {:?}", path))?;
        Self::from_yaml_str(&content).with_context(|| format!("Invalid swarm definition {:?}", path))
    }

    pub fn into_config(self, objectives: &ObjectiveRegistry) -> Result<SwarmConfig> {
        let Some(objective) = objectives.get(&self.objective) else {
            bail!(
                "Unknown objective '{}' (registered: {})",
                self.objective,
                objectives.names().join(", ")
            );
        };
        let dimensions = self.dimensions.unwrap_or(self.bounds.len());
        let problem = OptimizationProblem::new(dimensions, self.bounds, objective, self.minimize)?;

        let mut config = SwarmConfig::new(self.name, self.algorithm, problem)
            .with_params(serde_json::Value::Object(self.params))
            .with_max_iterations(self.max_iterations);
        config.objective_description = self.description;
        if let Some(target) = self.target_fitness {
            config = config.with_target_fitness(target);
        }
        config.validate()?;
        Ok(config)
    }
}

pub async fn handle_command(command: SwarmCommand, config_path: Option<PathBuf>) -> Result<()> {
    let config = NodeConfig::load_or_default(config_path).context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;

    match command {
        SwarmCommand::Run { file, workers } => run(&config, &file, workers).await,
        SwarmCommand::Show { swarm_id } => show(&config, swarm_id.map(SwarmId)).await,
    }
}

async fn run(config: &NodeConfig, file: &Path, workers: usize) -> Result<()> {
    let objectives = Arc::new(ObjectiveRegistry::with_builtins());
    let definition = SwarmDefinition::from_file(file)?.into_config(&objectives)?;

    let token = CancellationToken::new();
    let (dispatcher, worker_handles) =
        build_dispatcher(&config.dispatcher, &objectives, workers, &token).await?;

    let events = EventBus::default();
    let manager = SwarmManager::new(&config.swarm, dispatcher, objectives, events.clone());
    match manager.restore().await {
        Ok(0) => {}
        Ok(n) => info!("Restored {} swarm(s) from checkpoint", n),
        Err(e) => warn!("Ignoring unreadable checkpoint: {}", e),
    }

    let id = manager.create_swarm(definition).await?;
    let mut progress = events.subscribe_swarm(id);
    manager.start_swarm(id).await?;
    println!("{} {}", "Started swarm".bold(), id);

    let printer = tokio::spawn(async move {
        while let Ok(event) = progress.recv().await {
            match event {
                SwarmEvent::SwarmBestImproved { iteration, fitness, .. } => {
                    println!("  iteration {:>6}  best {}", iteration, fitness);
                }
                SwarmEvent::SwarmFinished { .. } => break,
                _ => {}
            }
        }
    });

    let swarm = tokio::select! {
        swarm = manager.wait_for_swarm(id) => swarm?,
        _ = tokio::signal::ctrl_c() => {
            println!("{}", "Interrupted; stopping swarm at the next iteration".yellow());
            manager.stop_swarm(id).await?;
            manager.wait_for_swarm(id).await?
        }
    };
    let _ = printer.await;

    token.cancel();
    for handle in worker_handles {
        let _ = handle.await;
    }

    println!();
    println!("{} {}", "Status:".bold(), swarm.status);
    println!("{} {}", "Iterations:".bold(), swarm.current_iteration);
    match &swarm.best_solution {
        Some(best) => {
            println!("{} {}", "Best fitness:".bold(), best.fitness_value().unwrap_or(f64::NAN));
            println!("{} {:?}", "Best position:".bold(), best.position);
        }
        None => println!("{} {}", "Best fitness:".bold(), "(none)".dimmed()),
    }
    Ok(())
}

/// Broker tier plus any in-process workers consuming its queue.
async fn build_dispatcher(
    settings: &DispatcherSettings,
    objectives: &Arc<ObjectiveRegistry>,
    workers: usize,
    token: &CancellationToken,
) -> Result<(EvaluationDispatcher, Vec<JoinHandle<()>>)> {
    let pool = settings
        .broker_url
        .as_ref()
        .map(|_| Arc::new(BrokerPool::with_default_connectors()));
    let dispatcher = EvaluationDispatcher::from_settings(settings, pool.clone())
        .context("Failed to build evaluation dispatcher")?;

    let mut handles = Vec::new();
    if workers == 0 {
        return Ok((dispatcher, handles));
    }
    let (Some(pool), Some(url)) = (pool, &settings.broker_url) else {
        warn!("--workers given but no dispatcher.broker_url is configured; evaluating locally");
        return Ok((dispatcher, handles));
    };
    for n in 0..workers {
        let broker = pool
            .get(url)
            .await
            .with_context(|| format!("In-process workers could not reach broker '{}'", url))?;
        let worker = EvaluationWorker::new(
            format!("local-{}", n),
            broker,
            settings.work_queue.clone(),
            objectives.clone(),
        );
        handles.push(worker.spawn(token.clone()));
    }
    info!("Spawned {} evaluation worker(s) on {}", workers, url);
    Ok((dispatcher, handles))
}

async fn show(config: &NodeConfig, swarm_id: Option<SwarmId>) -> Result<()> {
    let Some(path) = &config.swarm.checkpoint_path else {
        bail!("swarm.checkpoint_path is not configured");
    };
    let checkpoint = CheckpointStore::new(path.clone())
        .load()
        .await
        .with_context(|| format!("Failed to read checkpoint {:?}", path))?;

    match swarm_id {
        Some(id) => {
            let record = checkpoint
                .get(&id.to_string())
                .with_context(|| format!("Swarm {} not found in {:?}", id, path))?;
            print_record(record);
        }
        None if checkpoint.is_empty() => println!("{}", "No checkpointed swarms".dimmed()),
        None => {
            println!(
                "{:<38} {:<20} {:<10} {:<6} {:>10} {}",
                "ID".bold(),
                "NAME".bold(),
                "STATUS".bold(),
                "ALGO".bold(),
                "ITERATION".bold(),
                "BEST".bold()
            );
            for record in checkpoint.values() {
                println!(
                    "{:<38} {:<20} {:<10} {:<6} {:>10} {}",
                    record.id,
                    record.name,
                    record.status,
                    record.config.algorithm_type,
                    record.current_iteration,
                    best_fitness(record)
                );
            }
        }
    }
    Ok(())
}

fn best_fitness(record: &SwarmRecord) -> String {
    record
        .best_solution_found
        .as_ref()
        .and_then(|s| s.fitness_value())
        .map(|f| f.to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn print_record(record: &SwarmRecord) {
    let problem = &record.config.problem_definition;
    println!("{} {}", "Swarm:".bold(), record.id);
    println!("  Name: {}", record.name);
    println!("  Status: {}", record.status);
    println!("  Algorithm: {} {}", record.config.algorithm_type, serde_json::Value::Object(record.config.algorithm_params.clone()));
    println!(
        "  Objective: {} ({})",
        problem.objective_function_name.as_deref().unwrap_or("(anonymous)"),
        if problem.is_minimization { "minimize" } else { "maximize" }
    );
    println!("  Dimensions: {}", problem.dimensions);
    println!("  Iteration: {}/{}", record.current_iteration, record.config.max_iterations);
    println!("  Best fitness: {}", best_fitness(record));
    println!("  Agents: {}", record.agents.len());
    println!("  Updated: {}", record.updated_at);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definition_builds_config() {
        let definition = SwarmDefinition::from_yaml_str(
            r#"
name: rastrigin-3d
algorithm: de
objective: rastrigin
bounds: [[-5.12, 5.12], [-5.12, 5.12], [-5, 5]]
params:
  population_size: 16
  seed: 7
max_iterations: 250
target_fitness: 0.01
"#,
        )
        .unwrap();
        let config = definition.into_config(&ObjectiveRegistry::with_builtins()).unwrap();

        assert_eq!(config.algorithm_type, "de");
        assert_eq!(config.max_iterations, 250);
        assert_eq!(config.target_fitness, Some(0.01));
        assert_eq!(config.problem.dimensions(), 3);
        assert!(config.problem.is_minimization());
        assert_eq!(config.problem.objective_name(), Some("rastrigin"));
        assert_eq!(config.algorithm_params["population_size"], serde_json::json!(16));
    }

    #[test]
    fn test_definition_errors() {
        let registry = ObjectiveRegistry::with_builtins();

        let unknown = SwarmDefinition::from_yaml_str(
            "name: x\nalgorithm: pso\nobjective: himmelblau\nbounds: [[0, 1]]\n",
        )
        .unwrap();
        let err = unknown.into_config(&registry).unwrap_err().to_string();
        assert!(err.contains("himmelblau"));

        let mismatched = SwarmDefinition::from_yaml_str(
            "name: x\nalgorithm: pso\nobjective: sphere\ndimensions: 2\nbounds: [[0, 1]]\n",
        )
        .unwrap();
        assert!(mismatched.into_config(&registry).is_err());

        let inverted = SwarmDefinition::from_yaml_str(
            "name: x\nalgorithm: pso\nobjective: sphere\nbounds: [[1, 0]]\n",
        )
        .unwrap();
        assert!(inverted.into_config(&registry).is_err());
    }
}
