// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Distributed Evaluation Dispatcher
//!
//! Turns a batch of candidate positions into one fitness value per candidate,
//! trying in order:
//!
//! 1. the broker work queue, when a broker is configured;
//! 2. round-robin HTTP calls to the swarm's member agents;
//! 3. local evaluation with the problem's objective.
//!
//! Both remote tiers need a named objective; anonymous objectives are always
//! evaluated locally. Any candidate a remote tier fails to resolve keeps the
//! worst possible fitness, so a partial failure only degrades ranking.

use colony_core::domain::agent::AgentId;
use colony_core::domain::node_config::DispatcherSettings;
use futures::future::join_all;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::evaluation::{EvaluationResult, EvaluationTask};
use crate::domain::problem::OptimizationProblem;
use crate::domain::swarm::SwarmId;
use crate::infrastructure::agent_client::{AgentClientError, AgentEvaluationClient};
use crate::infrastructure::broker::{BrokerError, BrokerPool};

struct BrokerTier {
    pool: Arc<BrokerPool>,
    url: String,
    work_queue: String,
    collection_budget: Duration,
}

pub struct EvaluationDispatcher {
    broker: Option<BrokerTier>,
    agents: Option<AgentEvaluationClient>,
}

impl EvaluationDispatcher {
    /// Local evaluation only.
    pub fn local() -> Self {
        Self {
            broker: None,
            agents: None,
        }
    }

    /// Build the tiers `settings` enable. The broker tier needs a pool.
    pub fn from_settings(
        settings: &DispatcherSettings,
        pool: Option<Arc<BrokerPool>>,
    ) -> Result<Self, AgentClientError> {
        let mut dispatcher = Self::local().with_agent_client(AgentEvaluationClient::new(
            settings.agent_base_url.clone(),
            settings.connect_timeout,
            settings.request_timeout,
        )?);
        if let (Some(url), Some(pool)) = (&settings.broker_url, pool) {
            dispatcher = dispatcher.with_broker(
                pool,
                url.clone(),
                settings.work_queue.clone(),
                settings.collection_budget,
            );
        }
        Ok(dispatcher)
    }

    pub fn with_broker(
        mut self,
        pool: Arc<BrokerPool>,
        url: impl Into<String>,
        work_queue: impl Into<String>,
        collection_budget: Duration,
    ) -> Self {
        self.broker = Some(BrokerTier {
            pool,
            url: url.into(),
            work_queue: work_queue.into(),
            collection_budget,
        });
        self
    }

    pub fn with_agent_client(mut self, client: AgentEvaluationClient) -> Self {
        self.agents = Some(client);
        self
    }

    /// One fitness per position, aligned by index.
    pub async fn evaluate(
        &self,
        swarm_id: SwarmId,
        problem: &OptimizationProblem,
        positions: &[Vec<f64>],
        members: &[AgentId],
    ) -> Vec<f64> {
        if positions.is_empty() {
            return Vec::new();
        }

        if let Some(objective) = problem.objective_name() {
            if let Some(tier) = &self.broker {
                match self.evaluate_via_broker(tier, swarm_id, objective, problem, positions).await {
                    Ok(fitness) => return fitness,
                    Err(e) => warn!(
                        "Broker {} unavailable for swarm {}: {}; falling back",
                        tier.url, swarm_id, e
                    ),
                }
            }
            if let (Some(client), false) = (&self.agents, members.is_empty()) {
                return self
                    .evaluate_via_agents(client, swarm_id, objective, problem, positions, members)
                    .await;
            }
        }

        metrics::counter!("colony_evaluations_total", "tier" => "local")
            .increment(positions.len() as u64);
        positions.iter().map(|p| problem.evaluate(p)).collect()
    }

    async fn evaluate_via_broker(
        &self,
        tier: &BrokerTier,
        swarm_id: SwarmId,
        objective: &str,
        problem: &OptimizationProblem,
        positions: &[Vec<f64>],
    ) -> Result<Vec<f64>, BrokerError> {
        let broker = tier.pool.get(&tier.url).await?;
        let slice = tier.collection_budget / positions.len() as u32;
        let mut fitness = vec![problem.worst_fitness(); positions.len()];

        let mut pending = Vec::with_capacity(positions.len());
        for (index, position) in positions.iter().enumerate() {
            let task = EvaluationTask {
                eval_task_id: Uuid::new_v4(),
                swarm_id,
                position_data: position.clone(),
                objective_function_name: objective.to_string(),
                reply_to_list: format!("{}:reply:{}", tier.work_queue, Uuid::new_v4()),
            };
            let payload = serde_json::to_string(&task)?;
            match broker.push(&tier.work_queue, payload).await {
                Ok(()) => pending.push((index, task)),
                Err(e) => {
                    metrics::counter!("colony_evaluation_failures_total", "tier" => "broker").increment(1);
                    warn!("Failed to enqueue evaluation task {}: {}", task.eval_task_id, e);
                }
            }
        }
        metrics::counter!("colony_evaluations_total", "tier" => "broker")
            .increment(pending.len() as u64);

        // Task k may be waited on until k+1 budget slices have elapsed, so the
        // whole batch is bounded by the collection budget. Replies queue on
        // their own lists meanwhile, so collecting them in order loses nothing.
        let started = Instant::now();
        for (slot, (index, task)) in pending.iter().enumerate() {
            let deadline = started + slice * (slot as u32 + 1);
            let remaining = deadline.saturating_duration_since(Instant::now());
            let reply = broker.pop(&task.reply_to_list, remaining).await;
            match reply {
                Ok(Some(raw)) => match serde_json::from_str::<EvaluationResult>(&raw) {
                    Ok(result) if result.eval_task_id != task.eval_task_id => {
                        metrics::counter!("colony_evaluation_failures_total", "tier" => "broker").increment(1);
                        warn!("Reply for task {} carried id {}", task.eval_task_id, result.eval_task_id);
                    }
                    Ok(EvaluationResult {
                        fitness: Some(value),
                        error: None,
                        worker_id,
                        ..
                    }) => {
                        debug!("Task {} evaluated by worker {}", task.eval_task_id, worker_id);
                        fitness[*index] = problem.sanitize(value);
                    }
                    Ok(result) => {
                        metrics::counter!("colony_evaluation_failures_total", "tier" => "broker").increment(1);
                        warn!(
                            "Worker {} failed task {}: {}",
                            result.worker_id,
                            task.eval_task_id,
                            result.error.as_deref().unwrap_or("no fitness in reply")
                        );
                    }
                    Err(e) => {
                        metrics::counter!("colony_evaluation_failures_total", "tier" => "broker").increment(1);
                        warn!("Malformed reply for task {}: {}", task.eval_task_id, e);
                    }
                },
                Ok(None) => {
                    metrics::counter!("colony_evaluation_failures_total", "tier" => "broker").increment(1);
                    warn!(
                        "Evaluation task {} timed out after {:?}",
                        task.eval_task_id,
                        started.elapsed()
                    );
                }
                Err(e) => {
                    metrics::counter!("colony_evaluation_failures_total", "tier" => "broker").increment(1);
                    warn!("Failed to collect reply for task {}: {}", task.eval_task_id, e);
                }
            }
        }
        Ok(fitness)
    }

    async fn evaluate_via_agents(
        &self,
        client: &AgentEvaluationClient,
        swarm_id: SwarmId,
        objective: &str,
        problem: &OptimizationProblem,
        positions: &[Vec<f64>],
        members: &[AgentId],
    ) -> Vec<f64> {
        let definition = problem.definition();
        let context = json!({
            "swarm_id": swarm_id,
            "dimensions": definition.dimensions,
            "bounds": definition.bounds,
            "is_minimization": definition.is_minimization,
        });
        metrics::counter!("colony_evaluations_total", "tier" => "agent")
            .increment(positions.len() as u64);

        let calls = positions.iter().enumerate().map(|(index, position)| {
            let agent = members[index % members.len()];
            let context = context.clone();
            async move {
                (
                    agent,
                    client.evaluate_fitness(agent, objective, position, context).await,
                )
            }
        });

        join_all(calls)
            .await
            .into_iter()
            .map(|(agent, result)| match result {
                Ok(fitness) => problem.sanitize(fitness),
                Err(e) => {
                    metrics::counter!("colony_evaluation_failures_total", "tier" => "agent").increment(1);
                    warn!("Agent {} failed to evaluate candidate: {}", agent, e);
                    problem.worst_fitness()
                }
            })
            .collect()
    }
}
