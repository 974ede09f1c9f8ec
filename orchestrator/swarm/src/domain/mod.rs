// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod algorithm;
pub mod algorithms;
pub mod evaluation;
pub mod problem;
pub mod swarm;
