// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Colony Core
//!
//! Agent runtime shared by every Colony component: agent identity and
//! lifecycle, per-agent memory and task queues, the ability registry, the
//! domain event bus and node configuration.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain model and application services for agents

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
