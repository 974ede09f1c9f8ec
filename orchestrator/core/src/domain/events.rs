// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::agent::{AgentId, AgentStatus};
use crate::domain::swarm::{SwarmId, SwarmStatus};
use crate::domain::task::TaskId;

/// Agent lifecycle events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AgentLifecycleEvent {
    AgentCreated {
        agent_id: AgentId,
        name: String,
        created_at: DateTime<Utc>,
    },
    AgentStatusChanged {
        agent_id: AgentId,
        from: AgentStatus,
        to: AgentStatus,
        changed_at: DateTime<Utc>,
    },
    AgentRemoved {
        agent_id: AgentId,
        removed_at: DateTime<Utc>,
    },
}

/// Per-task execution events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TaskEvent {
    TaskCompleted {
        agent_id: AgentId,
        task_id: TaskId,
        ability: String,
        completed_at: DateTime<Utc>,
    },
    TaskFailed {
        agent_id: AgentId,
        task_id: TaskId,
        ability: String,
        error: String,
        failed_at: DateTime<Utc>,
    },
}

/// Swarm optimization events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SwarmEvent {
    SwarmCreated {
        swarm_id: SwarmId,
        name: String,
        created_at: DateTime<Utc>,
    },
    SwarmStarted {
        swarm_id: SwarmId,
        started_at: DateTime<Utc>,
    },
    SwarmBestImproved {
        swarm_id: SwarmId,
        iteration: u64,
        fitness: f64,
        improved_at: DateTime<Utc>,
    },
    SwarmFinished {
        swarm_id: SwarmId,
        status: SwarmStatus,
        iteration: u64,
        finished_at: DateTime<Utc>,
    },
}

impl SwarmEvent {
    pub fn swarm_id(&self) -> SwarmId {
        match self {
            SwarmEvent::SwarmCreated { swarm_id, .. }
            | SwarmEvent::SwarmStarted { swarm_id, .. }
            | SwarmEvent::SwarmBestImproved { swarm_id, .. }
            | SwarmEvent::SwarmFinished { swarm_id, .. } => *swarm_id,
        }
    }
}
