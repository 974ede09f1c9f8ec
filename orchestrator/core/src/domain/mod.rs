// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod ability;
pub mod agent;
pub mod events;
pub mod llm;
pub mod memory;
pub mod node_config;
pub mod queue;
pub mod swarm;
pub mod task;
