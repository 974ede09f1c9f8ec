// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Agent task and task result types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A request for an agent to run one ability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentTask {
    #[serde(default)]
    pub id: TaskId,
    pub ability: String,
    #[serde(default)]
    pub params: serde_json::Value,
    /// Higher values are dequeued first.
    #[serde(default)]
    pub priority: i32,
}

impl AgentTask {
    pub fn new(ability: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            id: TaskId::new(),
            ability: ability.into(),
            params,
            priority: 0,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl TaskStatus {
    pub fn is_finished(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub input: AgentTask,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<serde_json::Value>,
}

impl TaskResult {
    pub fn pending(task: AgentTask) -> Self {
        Self {
            task_id: task.id,
            status: TaskStatus::Pending,
            submitted_at: Utc::now(),
            started_at: None,
            ended_at: None,
            input: task,
            output: None,
            error: None,
        }
    }

    pub(crate) fn start(&mut self) {
        self.status = TaskStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub(crate) fn complete(&mut self, output: serde_json::Value) {
        self.status = TaskStatus::Completed;
        self.ended_at = Some(Utc::now());
        self.output = Some(output);
    }

    pub(crate) fn fail(&mut self, error: serde_json::Value) {
        self.status = TaskStatus::Failed;
        self.ended_at = Some(Utc::now());
        self.error = Some(error);
    }

    pub(crate) fn cancel(&mut self) {
        self.status = TaskStatus::Cancelled;
        self.ended_at = Some(Utc::now());
    }
}
