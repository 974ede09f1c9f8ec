// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Evaluation worker commands
//!
//! Commands: serve, broker

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use colony_core::domain::node_config::{DispatcherSettings, NodeConfig};
use colony_swarm::domain::problem::ObjectiveRegistry;
use colony_swarm::infrastructure::broker::{BrokerPool, EvaluationWorker};
use colony_swarm::presentation::api;

#[derive(Subcommand)]
pub enum WorkerCommand {
    /// Serve the fitness evaluation endpoint for remote swarms
    Serve {
        /// Bind address
        #[arg(long, env = "COLONY_HOST", default_value = "127.0.0.1")]
        host: String,

        /// Bind port
        #[arg(long, env = "COLONY_PORT", default_value_t = 8000)]
        port: u16,
    },

    /// Consume evaluation tasks from the broker work queue
    Broker {
        /// Broker connection string (default: dispatcher.broker_url)
        #[arg(long)]
        url: Option<String>,

        /// Work queue to consume (default: dispatcher.work_queue)
        #[arg(long)]
        queue: Option<String>,

        /// Number of concurrent workers in this process
        #[arg(long, default_value_t = 1)]
        concurrency: usize,
    },
}

pub async fn handle_command(command: WorkerCommand, config_path: Option<PathBuf>) -> Result<()> {
    match command {
        WorkerCommand::Serve { host, port } => serve(&host, port).await,
        WorkerCommand::Broker {
            url,
            queue,
            concurrency,
        } => {
            let config = NodeConfig::load_or_default(config_path).context("Failed to load configuration")?;
            config.validate().context("Configuration validation failed")?;
            let (url, queue) = broker_target(url, queue, &config.dispatcher)?;
            consume(&url, &queue, concurrency).await
        }
    }
}

async fn serve(host: &str, port: u16) -> Result<()> {
    let objectives = Arc::new(ObjectiveRegistry::with_builtins());
    let names = objectives.names().join(", ");
    let app = api::app(objectives);

    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", host, port))?;
    let addr = listener.local_addr()?;
    info!("Evaluation endpoint listening on {}", addr);
    println!(
        "{} http://{}/agents/{{agentId}}/evaluate_fitness",
        "Serving".green().bold(),
        addr
    );
    println!("  Objectives: {}", names);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("Evaluation server failed")?;

    info!("Evaluation endpoint stopped");
    Ok(())
}

/// Resolve the broker and queue a standalone worker should consume.
fn broker_target(
    url: Option<String>,
    queue: Option<String>,
    settings: &DispatcherSettings,
) -> Result<(String, String)> {
    let Some(url) = url.or_else(|| settings.broker_url.clone()) else {
        bail!("No broker configured; pass --url or set dispatcher.broker_url");
    };
    if url.starts_with("memory://") {
        bail!("'{}' only exists inside one process; a standalone worker needs a networked broker", url);
    }
    let queue = queue.unwrap_or_else(|| settings.work_queue.clone());
    if queue.trim().is_empty() {
        bail!("Work queue name must not be empty");
    }
    Ok((url, queue))
}

async fn consume(url: &str, queue: &str, concurrency: usize) -> Result<()> {
    if concurrency == 0 {
        bail!("--concurrency must be at least 1");
    }
    let objectives = Arc::new(ObjectiveRegistry::with_builtins());
    let pool = BrokerPool::with_default_connectors();
    let broker = pool
        .get(url)
        .await
        .with_context(|| format!("Failed to connect to broker '{}'", url))?;

    let prefix = Uuid::new_v4().simple().to_string();
    let token = CancellationToken::new();
    let handles: Vec<_> = (0..concurrency)
        .map(|n| {
            EvaluationWorker::new(
                format!("worker-{}-{}", &prefix[..8], n),
                broker.clone(),
                queue,
                objectives.clone(),
            )
            .spawn(token.clone())
        })
        .collect();

    println!(
        "{} {} worker(s) on {} queue '{}'",
        "Consuming".green().bold(),
        concurrency,
        url,
        queue
    );
    println!("  Objectives: {}", objectives.names().join(", "));

    let _ = tokio::signal::ctrl_c().await;
    println!("{}", "Stopping workers".yellow());
    token.cancel();
    for handle in handles {
        let _ = handle.await;
    }
    info!("Broker workers stopped");
    Ok(())
}
