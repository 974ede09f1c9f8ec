// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Process-wide agent table.
//!
//! One coarse lock covers registration, lookup and removal only. Per-agent
//! state is guarded by each [`Agent`]'s own lock, so holding an `Arc<Agent>`
//! never serialises unrelated agents.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::agent::{Agent, AgentId, AgentSnapshot};

#[derive(Default)]
pub struct InMemoryAgentRegistry {
    agents: RwLock<HashMap<AgentId, Arc<Agent>>>,
}

impl InMemoryAgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, agent: Arc<Agent>) {
        self.agents.write().insert(agent.id(), agent);
    }

    pub fn get(&self, id: AgentId) -> Option<Arc<Agent>> {
        self.agents.read().get(&id).cloned()
    }

    pub fn find_by_name(&self, name: &str) -> Option<Arc<Agent>> {
        self.agents.read().values().find(|a| a.name() == name).cloned()
    }

    pub fn remove(&self, id: AgentId) -> Option<Arc<Agent>> {
        self.agents.write().remove(&id)
    }

    pub fn all(&self) -> Vec<Arc<Agent>> {
        self.agents.read().values().cloned().collect()
    }

    /// Snapshots taken after the table lock is released.
    pub fn snapshots(&self) -> Vec<AgentSnapshot> {
        self.all().iter().map(|a| a.snapshot()).collect()
    }

    pub fn len(&self) -> usize {
        self.agents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
