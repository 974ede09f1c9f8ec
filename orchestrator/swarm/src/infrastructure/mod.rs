// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod agent_client;
pub mod broker;
pub mod checkpoint;
