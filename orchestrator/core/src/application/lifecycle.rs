// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Agent Lifecycle Service
//!
//! Drives agents through their state machine and runs one background loop per
//! started agent. The loop sleeps on the agent's notification handle while the
//! queue is empty or the agent is paused, and exits when cancelled or when the
//! agent reaches a terminal status.

use async_trait::async_trait;
use chrono::Utc;
use futures::FutureExt;
use serde_json::json;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::application::agent::AgentLifecycleService;
use crate::domain::ability::{AbilityContext, AbilityRegistry};
use crate::domain::agent::{
    Agent, AgentConfig, AgentError, AgentId, AgentSnapshot, AgentStatus, RunLoopHandle,
    StartOutcome,
};
use crate::domain::events::{AgentLifecycleEvent, TaskEvent};
use crate::domain::llm::LlmClient;
use crate::domain::node_config::AgentSettings;
use crate::domain::swarm::SwarmId;
use crate::domain::task::{AgentTask, TaskId, TaskResult};
use crate::infrastructure::agent_registry::InMemoryAgentRegistry;
use crate::infrastructure::event_bus::EventBus;

pub struct StandardAgentLifecycleService {
    registry: Arc<InMemoryAgentRegistry>,
    abilities: Arc<AbilityRegistry>,
    llm: Option<Arc<dyn LlmClient>>,
    events: EventBus,
    settings: AgentSettings,
}

impl StandardAgentLifecycleService {
    pub fn new(
        registry: Arc<InMemoryAgentRegistry>,
        abilities: Arc<AbilityRegistry>,
        events: EventBus,
        settings: AgentSettings,
    ) -> Self {
        Self {
            registry,
            abilities,
            llm: None,
            events,
            settings,
        }
    }

    /// Handle given to agents whose `llm_config.enabled` is set.
    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn registry(&self) -> &Arc<InMemoryAgentRegistry> {
        &self.registry
    }

    pub fn abilities(&self) -> &Arc<AbilityRegistry> {
        &self.abilities
    }

    pub fn agent(&self, id: AgentId) -> Result<Arc<Agent>, AgentError> {
        self.registry.get(id).ok_or(AgentError::NotFound(id))
    }

    pub fn join_swarm(&self, id: AgentId, swarm_id: SwarmId) -> Result<(), AgentError> {
        self.agent(id)?.join_swarm(swarm_id);
        Ok(())
    }

    pub fn leave_swarm(&self, id: AgentId) -> Result<(), AgentError> {
        self.agent(id)?.leave_swarm();
        Ok(())
    }

    /// Stop every registered agent.
    pub async fn shutdown(&self) {
        for agent in self.registry.all() {
            if agent.status().is_terminal() {
                continue;
            }
            if let Err(e) = self.stop_agent(agent.id()).await {
                warn!("Failed to stop agent {} during shutdown: {}", agent.id(), e);
            }
        }
    }

    fn publish_status(&self, agent_id: AgentId, from: AgentStatus, to: AgentStatus) {
        self.events.publish_agent_event(AgentLifecycleEvent::AgentStatusChanged {
            agent_id,
            from,
            to,
            changed_at: Utc::now(),
        });
    }

    fn spawn_loop(&self, agent: &Arc<Agent>) {
        let token = CancellationToken::new();
        let join = tokio::spawn(run_agent_loop(
            agent.clone(),
            self.abilities.clone(),
            self.events.clone(),
            token.clone(),
        ));
        agent.attach_loop(RunLoopHandle { token, join });
    }
}

#[async_trait]
impl AgentLifecycleService for StandardAgentLifecycleService {
    async fn create_agent(&self, config: AgentConfig) -> Result<AgentId, AgentError> {
        let agent = Arc::new(Agent::new(config, self.llm.clone())?);
        let id = agent.id();
        info!("Created agent {} ({})", agent.name(), id);

        self.events.publish_agent_event(AgentLifecycleEvent::AgentCreated {
            agent_id: id,
            name: agent.name().to_string(),
            created_at: Utc::now(),
        });
        self.registry.insert(agent);
        Ok(id)
    }

    async fn start_agent(&self, id: AgentId) -> Result<(), AgentError> {
        let agent = self.agent(id)?;
        let from = match agent.begin_start()? {
            StartOutcome::AlreadyRunning => {
                debug!("Agent {} already running", id);
                return Ok(());
            }
            StartOutcome::Initializing { from } => from,
        };
        self.publish_status(id, from, AgentStatus::Initializing);

        if !agent.has_loop() {
            self.spawn_loop(&agent);
        }

        agent.transition(AgentStatus::Running)?;
        self.publish_status(id, AgentStatus::Initializing, AgentStatus::Running);
        info!("Agent {} running", id);
        Ok(())
    }

    async fn pause_agent(&self, id: AgentId) -> Result<(), AgentError> {
        let agent = self.agent(id)?;
        let from = agent.transition(AgentStatus::Paused)?;
        self.publish_status(id, from, AgentStatus::Paused);
        info!("Agent {} paused", id);
        Ok(())
    }

    async fn stop_agent(&self, id: AgentId) -> Result<(), AgentError> {
        let agent = self.agent(id)?;
        if agent.status() == AgentStatus::Stopped {
            return Ok(());
        }
        let from = agent.transition(AgentStatus::Stopped)?;
        self.publish_status(id, from, AgentStatus::Stopped);

        if let Some(handle) = agent.take_loop() {
            handle.token.cancel();
            let abort = handle.join.abort_handle();
            if tokio::time::timeout(self.settings.stop_grace, handle.join)
                .await
                .is_err()
            {
                warn!(
                    "Agent {} run loop did not exit within {:?}, aborting",
                    id, self.settings.stop_grace
                );
                abort.abort();
            }
        }

        info!("Agent {} stopped", id);
        Ok(())
    }

    async fn remove_agent(&self, id: AgentId) -> Result<(), AgentError> {
        let agent = self.agent(id)?;
        if agent.swarm().is_some() {
            return Err(AgentError::InUse(id));
        }
        if !agent.status().is_terminal() {
            self.stop_agent(id).await?;
        }
        self.registry.remove(id);
        self.events.publish_agent_event(AgentLifecycleEvent::AgentRemoved {
            agent_id: id,
            removed_at: Utc::now(),
        });
        Ok(())
    }

    async fn get_agent(&self, id: AgentId) -> Result<AgentSnapshot, AgentError> {
        Ok(self.agent(id)?.snapshot())
    }

    async fn list_agents(&self) -> Vec<AgentSnapshot> {
        self.registry.snapshots()
    }

    async fn execute_agent_task(
        &self,
        id: AgentId,
        task: AgentTask,
    ) -> Result<serde_json::Value, AgentError> {
        let agent = self.agent(id)?;
        let status = agent.status();
        if status != AgentStatus::Running {
            return Err(AgentError::NotRunning { agent_id: id, status });
        }
        agent.track(&task);
        execute_task(&agent, &self.abilities, &self.events, task).await
    }

    async fn submit_agent_task(&self, id: AgentId, task: AgentTask) -> Result<TaskId, AgentError> {
        let agent = self.agent(id)?;
        let status = agent.status();
        if status.is_terminal() {
            return Err(AgentError::NotRunning { agent_id: id, status });
        }
        debug!("Queueing task {} ({}) on agent {}", task.id, task.ability, id);
        Ok(agent.enqueue(task))
    }

    async fn cancel_task(&self, id: AgentId, task_id: TaskId) -> Result<bool, AgentError> {
        self.agent(id)?.cancel_task(task_id)
    }

    async fn get_task_result(&self, id: AgentId, task_id: TaskId) -> Result<TaskResult, AgentError> {
        self.agent(id)?
            .task_result(task_id)
            .ok_or(AgentError::TaskNotFound(task_id))
    }

    async fn task_history(&self, id: AgentId) -> Result<Vec<TaskResult>, AgentError> {
        Ok(self.agent(id)?.task_history())
    }
}

/// Background loop for one agent.
async fn run_agent_loop(
    agent: Arc<Agent>,
    abilities: Arc<AbilityRegistry>,
    events: EventBus,
    token: CancellationToken,
) {
    debug!("Run loop started for agent {}", agent.id());
    loop {
        if token.is_cancelled() {
            break;
        }
        let status = agent.status();
        if status.is_terminal() {
            break;
        }
        if status == AgentStatus::Running {
            if let Some(task) = agent.next_task() {
                // Failures are recorded on the task result.
                let _ = execute_task(&agent, &abilities, &events, task).await;
                continue;
            }
        }
        tokio::select! {
            _ = token.cancelled() => break,
            _ = agent.notified() => {}
        }
    }
    debug!("Run loop exited for agent {}", agent.id());
}

/// Run one already-tracked task to completion and record the outcome.
pub(crate) async fn execute_task(
    agent: &Arc<Agent>,
    abilities: &AbilityRegistry,
    events: &EventBus,
    task: AgentTask,
) -> Result<serde_json::Value, AgentError> {
    let task_id = task.id;
    let ability = task.ability.clone();
    agent.mark_running(task_id);

    let outcome = invoke_ability(agent, abilities, task).await;
    match &outcome {
        Ok(output) => {
            agent.complete_task(task_id, output.clone());
            metrics::counter!("colony_agent_tasks_total", "outcome" => "completed").increment(1);
            events.publish_task_event(TaskEvent::TaskCompleted {
                agent_id: agent.id(),
                task_id,
                ability,
                completed_at: Utc::now(),
            });
        }
        Err(e) => {
            warn!("Task {} ({}) failed on agent {}: {}", task_id, ability, agent.id(), e);
            agent.fail_task(task_id, json!({ "kind": error_kind(e), "message": e.to_string() }));
            metrics::counter!("colony_agent_tasks_total", "outcome" => "failed").increment(1);
            events.publish_task_event(TaskEvent::TaskFailed {
                agent_id: agent.id(),
                task_id,
                ability,
                error: e.to_string(),
                failed_at: Utc::now(),
            });
        }
    }
    outcome
}

async fn invoke_ability(
    agent: &Arc<Agent>,
    abilities: &AbilityRegistry,
    task: AgentTask,
) -> Result<serde_json::Value, AgentError> {
    if !agent.config().permits(&task.ability) {
        return Err(AgentError::AbilityNotPermitted {
            agent_id: agent.id(),
            ability: task.ability,
        });
    }
    let handler = abilities
        .get(&task.ability)
        .ok_or_else(|| AgentError::AbilityNotFound(task.ability.clone()))?;

    let ctx = AbilityContext {
        agent: agent.clone(),
        task_id: task.id,
    };
    match AssertUnwindSafe(handler.invoke(ctx, task.params)).catch_unwind().await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(AgentError::AbilityFailed {
            ability: task.ability,
            message: format!("{:#}", e),
        }),
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!("Ability '{}' panicked on agent {}: {}", task.ability, agent.id(), message);
            agent.fail(format!("ability '{}' panicked: {}", task.ability, message));
            Err(AgentError::AbilityFailed {
                ability: task.ability,
                message,
            })
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn error_kind(e: &AgentError) -> &'static str {
    match e {
        AgentError::AbilityNotFound(_) => "ability_not_found",
        AgentError::AbilityNotPermitted { .. } => "ability_not_permitted",
        AgentError::AbilityFailed { .. } => "ability_failed",
        _ => "agent_error",
    }
}
