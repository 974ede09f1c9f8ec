// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;

use crate::domain::agent::{AgentConfig, AgentError, AgentId, AgentSnapshot};
use crate::domain::task::{AgentTask, TaskId, TaskResult};

/// Use cases the (external) API layer drives agents through.
#[async_trait]
pub trait AgentLifecycleService: Send + Sync {
    async fn create_agent(&self, config: AgentConfig) -> Result<AgentId, AgentError>;
    async fn start_agent(&self, id: AgentId) -> Result<(), AgentError>;
    async fn pause_agent(&self, id: AgentId) -> Result<(), AgentError>;
    async fn stop_agent(&self, id: AgentId) -> Result<(), AgentError>;
    async fn remove_agent(&self, id: AgentId) -> Result<(), AgentError>;
    async fn get_agent(&self, id: AgentId) -> Result<AgentSnapshot, AgentError>;
    async fn list_agents(&self) -> Vec<AgentSnapshot>;

    /// Run `task` inline and return its output.
    async fn execute_agent_task(
        &self,
        id: AgentId,
        task: AgentTask,
    ) -> Result<serde_json::Value, AgentError>;

    /// Queue `task` for the agent's run loop.
    async fn submit_agent_task(&self, id: AgentId, task: AgentTask) -> Result<TaskId, AgentError>;
    async fn cancel_task(&self, id: AgentId, task_id: TaskId) -> Result<bool, AgentError>;
    async fn get_task_result(&self, id: AgentId, task_id: TaskId) -> Result<TaskResult, AgentError>;
    async fn task_history(&self, id: AgentId) -> Result<Vec<TaskResult>, AgentError>;
}
