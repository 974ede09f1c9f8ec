// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Swarm use cases: the manager that drives optimisation loops and the
//! dispatcher that evaluates their candidates.

pub mod dispatcher;
pub mod manager;

pub use dispatcher::EvaluationDispatcher;
pub use manager::SwarmManager;

use async_trait::async_trait;
use colony_core::domain::agent::AgentId;

use crate::domain::swarm::{Swarm, SwarmConfig, SwarmError, SwarmId};

/// Call surface the outer API layer drives.
#[async_trait]
pub trait SwarmService: Send + Sync {
    async fn create_swarm(&self, config: SwarmConfig) -> Result<SwarmId, SwarmError>;
    async fn start_swarm(&self, id: SwarmId) -> Result<(), SwarmError>;
    async fn stop_swarm(&self, id: SwarmId) -> Result<(), SwarmError>;
    async fn delete_swarm(&self, id: SwarmId) -> Result<(), SwarmError>;
    async fn get_swarm(&self, id: SwarmId) -> Result<Swarm, SwarmError>;
    async fn list_swarms(&self) -> Vec<Swarm>;
    async fn add_agent_to_swarm(&self, id: SwarmId, agent_id: AgentId) -> Result<(), SwarmError>;
    async fn remove_agent_from_swarm(&self, id: SwarmId, agent_id: AgentId) -> Result<(), SwarmError>;
    async fn wait_for_swarm(&self, id: SwarmId) -> Result<Swarm, SwarmError>;
}

#[async_trait]
impl SwarmService for SwarmManager {
    async fn create_swarm(&self, config: SwarmConfig) -> Result<SwarmId, SwarmError> {
        SwarmManager::create_swarm(self, config).await
    }

    async fn start_swarm(&self, id: SwarmId) -> Result<(), SwarmError> {
        SwarmManager::start_swarm(self, id).await
    }

    async fn stop_swarm(&self, id: SwarmId) -> Result<(), SwarmError> {
        SwarmManager::stop_swarm(self, id).await
    }

    async fn delete_swarm(&self, id: SwarmId) -> Result<(), SwarmError> {
        SwarmManager::delete_swarm(self, id).await
    }

    async fn get_swarm(&self, id: SwarmId) -> Result<Swarm, SwarmError> {
        SwarmManager::get_swarm(self, id)
    }

    async fn list_swarms(&self) -> Vec<Swarm> {
        SwarmManager::list_swarms(self)
    }

    async fn add_agent_to_swarm(&self, id: SwarmId, agent_id: AgentId) -> Result<(), SwarmError> {
        SwarmManager::add_agent_to_swarm(self, id, agent_id).await
    }

    async fn remove_agent_from_swarm(&self, id: SwarmId, agent_id: AgentId) -> Result<(), SwarmError> {
        SwarmManager::remove_agent_from_swarm(self, id, agent_id).await
    }

    async fn wait_for_swarm(&self, id: SwarmId) -> Result<Swarm, SwarmError> {
        SwarmManager::wait_for_swarm(self, id).await
    }
}
