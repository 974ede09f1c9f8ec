// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `colony-swarm`: Swarm Optimisation Engine
//!
//! Runs population-based optimisers (PSO, DE, GA) as managed swarms and
//! farms their fitness evaluations out to workers or member agents.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | `OptimizationProblem`, objective registry, `SwarmAlgorithm` + PSO/DE/GA, `Swarm` aggregate, evaluation wire payloads |
//! | [`application`] | Application | `SwarmManager` iteration loop, `EvaluationDispatcher`, `SwarmService` trait |
//! | [`infrastructure`] | Infrastructure | Broker abstraction + pool + worker, agent evaluation HTTP client, JSON checkpoint store |
//! | [`presentation`] | Interface | Axum router for `POST /agents/{agentId}/evaluate_fitness` |
//!
//! ## Key Concepts
//!
//! - **Swarm**: one optimisation run. Its loop owns the algorithm instance;
//!   the [`domain::swarm::Swarm`] record only carries observable state.
//! - **Evaluation tiers**: broker work queue, then member agents over HTTP,
//!   then local evaluation. Unresolved candidates get the worst fitness.
//! - **Checkpoint**: the swarm table as JSON, objectives stored by name and
//!   resolved through the [`domain::problem::ObjectiveRegistry`] on restore.

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
