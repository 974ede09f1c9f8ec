// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Agent Aggregate
//!
//! The [`Agent`] is a long-lived stateful worker that executes named abilities.
//! All mutable agent state lives behind the agent's own lock; callers only ever
//! see cloned snapshots.
//!
//! ## Lifecycle
//!
//! ```text
//! Created ──► Initializing ──► Running ⇄ Paused
//!                                 │
//!                                 └──► Stopped
//! (any non-terminal) ──► Stopped | Error
//! ```
//!
//! `Stopped` and `Error` are terminal: a new agent must be created to retry.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::futures::Notified;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::domain::llm::{GenerationOptions, LlmClient};
use crate::domain::memory::{AgentMemory, MemoryConfig};
use crate::domain::queue::{QueueConfig, TaskQueue};
use crate::domain::swarm::SwarmId;
use crate::domain::task::{AgentTask, TaskId, TaskResult, TaskStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub Uuid);

impl AgentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    Trading,
    Monitor,
    Arbitrage,
    DataCollection,
    Notification,
    #[default]
    Custom,
    Dev,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Created,
    Initializing,
    Running,
    Paused,
    Stopped,
    Error,
}

impl AgentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, AgentStatus::Stopped | AgentStatus::Error)
    }

    /// Whether the state machine permits moving from `self` to `next`.
    pub fn can_transition_to(self, next: AgentStatus) -> bool {
        use AgentStatus::*;
        match (self, next) {
            (Stopped | Error, _) => false,
            (_, Error) | (_, Stopped) => true,
            (Created | Paused, Initializing) => true,
            (Initializing, Running) => true,
            (Running, Paused) | (Paused, Running) => true,
            _ => false,
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgentStatus::Created => "created",
            AgentStatus::Initializing => "initializing",
            AgentStatus::Running => "running",
            AgentStatus::Paused => "paused",
            AgentStatus::Stopped => "stopped",
            AgentStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// LLM settings for an agent. The handle itself is injected by the runtime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct LlmConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl LlmConfig {
    pub fn generation_options(&self) -> GenerationOptions {
        let defaults = GenerationOptions::default();
        GenerationOptions {
            model: self.model.clone(),
            max_tokens: self.max_tokens.or(defaults.max_tokens),
            temperature: self.temperature.or(defaults.temperature),
            stop_sequences: None,
        }
    }
}

/// Immutable agent configuration.
///
/// Every sub-configuration defaults when omitted or given as an empty map, so
/// `{"name": "a", "memory_config": {}}` yields an ordered memory of 1000 entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    pub name: String,
    #[serde(default, rename = "type")]
    pub agent_type: AgentType,
    /// Ability names this agent may run. Empty means unrestricted.
    #[serde(default)]
    pub abilities: BTreeSet<String>,
    #[serde(default)]
    pub chains: Vec<String>,
    #[serde(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub llm_config: LlmConfig,
    #[serde(default)]
    pub memory_config: MemoryConfig,
    #[serde(default)]
    pub queue_config: QueueConfig,
    #[serde(default = "default_max_task_history")]
    pub max_task_history: usize,
}

fn default_max_task_history() -> usize {
    100
}

impl AgentConfig {
    pub fn new(name: impl Into<String>, agent_type: AgentType) -> Self {
        Self {
            name: name.into(),
            agent_type,
            abilities: BTreeSet::new(),
            chains: Vec::new(),
            parameters: serde_json::Map::new(),
            llm_config: LlmConfig::default(),
            memory_config: MemoryConfig::default(),
            queue_config: QueueConfig::default(),
            max_task_history: default_max_task_history(),
        }
    }

    pub fn with_abilities<I, S>(mut self, abilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.abilities = abilities.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate(&self) -> Result<(), AgentError> {
        if self.name.trim().is_empty() {
            return Err(AgentError::Configuration("agent name must not be empty".to_string()));
        }
        if self.max_task_history == 0 {
            return Err(AgentError::Configuration(
                "max_task_history must be greater than zero".to_string(),
            ));
        }
        if self.memory_config.max_size == 0 {
            return Err(AgentError::Configuration(
                "memory_config.max_size must be greater than zero".to_string(),
            ));
        }
        if let Some(name) = self.abilities.iter().find(|a| a.trim().is_empty()) {
            return Err(AgentError::Configuration(format!(
                "declared ability name {:?} is empty",
                name
            )));
        }
        Ok(())
    }

    /// Whether this agent is allowed to run `ability`.
    pub fn permits(&self, ability: &str) -> bool {
        self.abilities.is_empty() || self.abilities.contains(ability)
    }
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Invalid agent configuration: {0}")]
    Configuration(String),

    #[error("Agent not found: {0}")]
    NotFound(AgentId),

    #[error("Ability not found: {0}")]
    AbilityNotFound(String),

    #[error("Ability '{ability}' is not declared by agent {agent_id}")]
    AbilityNotPermitted { agent_id: AgentId, ability: String },

    #[error("Ability '{ability}' failed: {message}")]
    AbilityFailed { ability: String, message: String },

    #[error("Invalid transition for agent {agent_id}: {from} -> {to}")]
    InvalidTransition {
        agent_id: AgentId,
        from: AgentStatus,
        to: AgentStatus,
    },

    #[error("Agent {agent_id} is not running (status: {status})")]
    NotRunning { agent_id: AgentId, status: AgentStatus },

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Agent {0} is still referenced by a swarm")]
    InUse(AgentId),
}

/// Handle to an agent's background run loop.
pub struct RunLoopHandle {
    pub token: CancellationToken,
    pub join: JoinHandle<()>,
}

/// Outcome of [`Agent::begin_start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    AlreadyRunning,
    Initializing { from: AgentStatus },
}

/// Serializable point-in-time view of an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub id: AgentId,
    pub name: String,
    pub agent_type: AgentType,
    pub status: AgentStatus,
    pub swarm_id: Option<SwarmId>,
    pub last_error: Option<String>,
    pub memory_size: usize,
    pub queued_tasks: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

struct AgentState {
    status: AgentStatus,
    memory: Box<dyn AgentMemory>,
    queue: Box<dyn TaskQueue>,
    history: VecDeque<TaskId>,
    results: HashMap<TaskId, TaskResult>,
    swarm: Option<SwarmId>,
    last_error: Option<String>,
    updated_at: DateTime<Utc>,
}

impl AgentState {
    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

pub struct Agent {
    id: AgentId,
    config: AgentConfig,
    created_at: DateTime<Utc>,
    llm: Option<Arc<dyn LlmClient>>,
    state: Mutex<AgentState>,
    run_loop: Mutex<Option<RunLoopHandle>>,
    wakeup: Notify,
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.id)
            .field("name", &self.config.name)
            .field("status", &self.status())
            .finish()
    }
}

impl Agent {
    /// Build an agent in `Created` from a validated configuration.
    pub fn new(config: AgentConfig, llm: Option<Arc<dyn LlmClient>>) -> Result<Self, AgentError> {
        config.validate()?;
        let memory = config.memory_config.build()?;
        let queue = config.queue_config.build();
        let now = Utc::now();
        let llm = if config.llm_config.enabled { llm } else { None };

        Ok(Self {
            id: AgentId::new(),
            config,
            created_at: now,
            llm,
            state: Mutex::new(AgentState {
                status: AgentStatus::Created,
                memory,
                queue,
                history: VecDeque::new(),
                results: HashMap::new(),
                swarm: None,
                last_error: None,
                updated_at: now,
            }),
            run_loop: Mutex::new(None),
            wakeup: Notify::new(),
        })
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn agent_type(&self) -> AgentType {
        self.config.agent_type
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn llm(&self) -> Option<Arc<dyn LlmClient>> {
        self.llm.clone()
    }

    pub fn status(&self) -> AgentStatus {
        self.state.lock().status
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.lock().last_error.clone()
    }

    pub fn swarm(&self) -> Option<SwarmId> {
        self.state.lock().swarm
    }

    pub fn snapshot(&self) -> AgentSnapshot {
        let state = self.state.lock();
        AgentSnapshot {
            id: self.id,
            name: self.config.name.clone(),
            agent_type: self.config.agent_type,
            status: state.status,
            swarm_id: state.swarm,
            last_error: state.last_error.clone(),
            memory_size: state.memory.size(),
            queued_tasks: state.queue.len(),
            created_at: self.created_at,
            updated_at: state.updated_at,
        }
    }

    /// Future that resolves the next time the agent's queue or status changes.
    pub fn notified(&self) -> Notified<'_> {
        self.wakeup.notified()
    }

    /// Move to `next`, returning the previous status.
    pub fn transition(&self, next: AgentStatus) -> Result<AgentStatus, AgentError> {
        let mut state = self.state.lock();
        let from = state.status;
        if !from.can_transition_to(next) {
            return Err(AgentError::InvalidTransition {
                agent_id: self.id,
                from,
                to: next,
            });
        }
        state.status = next;
        state.touch();
        drop(state);
        self.wakeup.notify_one();
        Ok(from)
    }

    /// Atomically check for `Running` and otherwise enter `Initializing`.
    pub fn begin_start(&self) -> Result<StartOutcome, AgentError> {
        let mut state = self.state.lock();
        let from = state.status;
        if from == AgentStatus::Running {
            return Ok(StartOutcome::AlreadyRunning);
        }
        if !from.can_transition_to(AgentStatus::Initializing) {
            return Err(AgentError::InvalidTransition {
                agent_id: self.id,
                from,
                to: AgentStatus::Initializing,
            });
        }
        state.status = AgentStatus::Initializing;
        state.touch();
        Ok(StartOutcome::Initializing { from })
    }

    /// Record a fatal error and move to `Error`. No-op on terminal agents.
    pub fn fail(&self, reason: impl Into<String>) {
        let mut state = self.state.lock();
        if state.status.is_terminal() {
            return;
        }
        state.status = AgentStatus::Error;
        state.last_error = Some(reason.into());
        state.touch();
        drop(state);
        self.wakeup.notify_one();
    }

    pub fn join_swarm(&self, swarm_id: SwarmId) {
        let mut state = self.state.lock();
        state.swarm = Some(swarm_id);
        state.touch();
    }

    pub fn leave_swarm(&self) {
        let mut state = self.state.lock();
        state.swarm = None;
        state.touch();
    }

    pub(crate) fn attach_loop(&self, handle: RunLoopHandle) {
        *self.run_loop.lock() = Some(handle);
    }

    pub(crate) fn has_loop(&self) -> bool {
        self.run_loop
            .lock()
            .as_ref()
            .map(|h| !h.join.is_finished())
            .unwrap_or(false)
    }

    pub(crate) fn take_loop(&self) -> Option<RunLoopHandle> {
        self.run_loop.lock().take()
    }

    // ---------------------------------------------------------------------
    // Memory
    // ---------------------------------------------------------------------

    pub fn remember(&self, key: impl Into<String>, value: serde_json::Value) {
        let mut state = self.state.lock();
        state.memory.set(key.into(), value);
        state.touch();
    }

    pub fn recall(&self, key: &str) -> Option<serde_json::Value> {
        self.state.lock().memory.get(key)
    }

    pub fn forget(&self, key: &str) -> Option<serde_json::Value> {
        let mut state = self.state.lock();
        let removed = state.memory.delete(key);
        state.touch();
        removed
    }

    pub fn clear_memory(&self) {
        let mut state = self.state.lock();
        state.memory.clear();
        state.touch();
    }

    pub fn memory_size(&self) -> usize {
        self.state.lock().memory.size()
    }

    pub fn memory_keys(&self) -> Vec<String> {
        self.state.lock().memory.keys()
    }

    // ---------------------------------------------------------------------
    // Tasks
    // ---------------------------------------------------------------------

    /// Register `task` as `Pending` in the result table and history.
    pub fn track(&self, task: &AgentTask) -> TaskResult {
        let mut state = self.state.lock();
        let result = TaskResult::pending(task.clone());
        Self::record(&mut state, self.config.max_task_history, result.clone());
        result
    }

    fn record(state: &mut AgentState, cap: usize, result: TaskResult) {
        let task_id = result.task_id;
        if state.results.insert(task_id, result).is_none() {
            state.history.push_back(task_id);
        }
        while state.history.len() > cap {
            if let Some(evicted) = state.history.pop_front() {
                state.results.remove(&evicted);
            }
        }
        state.touch();
    }

    /// Track `task` and push it onto the queue, waking the run loop when the
    /// queue was empty.
    pub fn enqueue(&self, task: AgentTask) -> TaskId {
        let task_id = task.id;
        let mut state = self.state.lock();
        Self::record(&mut state, self.config.max_task_history, TaskResult::pending(task.clone()));
        let was_empty = state.queue.is_empty();
        state.queue.enqueue(task);
        drop(state);
        if was_empty {
            self.wakeup.notify_one();
        }
        task_id
    }

    pub fn next_task(&self) -> Option<AgentTask> {
        self.state.lock().queue.dequeue()
    }

    pub fn queued_tasks(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn peek_task(&self) -> Option<TaskId> {
        self.state.lock().queue.peek().map(|t| t.id)
    }

    pub fn mark_running(&self, task_id: TaskId) {
        self.update_task(task_id, |r| r.start());
    }

    pub fn complete_task(&self, task_id: TaskId, output: serde_json::Value) {
        self.update_task(task_id, |r| r.complete(output));
    }

    pub fn fail_task(&self, task_id: TaskId, error: serde_json::Value) {
        self.update_task(task_id, |r| r.fail(error));
    }

    fn update_task(&self, task_id: TaskId, f: impl FnOnce(&mut TaskResult)) {
        let mut state = self.state.lock();
        if let Some(result) = state.results.get_mut(&task_id) {
            f(result);
            state.touch();
        }
    }

    /// Cancel a task that is still waiting in the queue.
    ///
    /// Returns `false` when the task already left the queue.
    pub fn cancel_task(&self, task_id: TaskId) -> Result<bool, AgentError> {
        let mut state = self.state.lock();
        if !state.results.contains_key(&task_id) {
            return Err(AgentError::TaskNotFound(task_id));
        }
        if state.queue.remove(task_id).is_none() {
            return Ok(false);
        }
        if let Some(result) = state.results.get_mut(&task_id) {
            result.cancel();
        }
        state.touch();
        Ok(true)
    }

    pub fn task_result(&self, task_id: TaskId) -> Option<TaskResult> {
        self.state.lock().results.get(&task_id).cloned()
    }

    /// Task results, oldest first.
    pub fn task_history(&self) -> Vec<TaskResult> {
        let state = self.state.lock();
        state
            .history
            .iter()
            .filter_map(|id| state.results.get(id).cloned())
            .collect()
    }

    pub fn count_tasks(&self, status: TaskStatus) -> usize {
        self.state
            .lock()
            .results
            .values()
            .filter(|r| r.status == status)
            .count()
    }
}
