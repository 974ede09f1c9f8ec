// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod abilities;
pub mod agent;
pub mod lifecycle;

// Re-export use cases for convenience
pub use abilities::register_builtin_abilities;
pub use agent::AgentLifecycleService;
pub use lifecycle::StandardAgentLifecycleService;
