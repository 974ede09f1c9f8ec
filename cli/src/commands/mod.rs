// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the Colony CLI

pub mod config;
pub mod swarm;
pub mod worker;

pub use self::config::ConfigCommand;
pub use self::swarm::SwarmCommand;
pub use self::worker::WorkerCommand;
