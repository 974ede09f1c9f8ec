// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Wire payloads exchanged with evaluation workers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::swarm::SwarmId;

/// Pushed onto the broker work queue, one per candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationTask {
    pub eval_task_id: Uuid,
    pub swarm_id: SwarmId,
    pub position_data: Vec<f64>,
    pub objective_function_name: String,
    /// Reply channel for this task only
    pub reply_to_list: String,
}

/// Pushed by a worker onto the task's reply channel.
///
/// `fitness` is absent (or `null`, which is how JSON carries a non-finite
/// value) when the worker could not evaluate the candidate; `error` then says
/// why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub eval_task_id: Uuid,
    #[serde(default)]
    pub fitness: Option<f64>,
    pub worker_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EvaluationResult {
    pub fn success(eval_task_id: Uuid, fitness: f64, worker_id: String) -> Self {
        Self {
            eval_task_id,
            fitness: Some(fitness),
            worker_id,
            error: None,
        }
    }

    pub fn failure(eval_task_id: Uuid, error: impl Into<String>, worker_id: String) -> Self {
        Self {
            eval_task_id,
            fitness: None,
            worker_id,
            error: Some(error.into()),
        }
    }
}

/// Body of `POST /agents/{agentId}/evaluate_fitness`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitnessRequest {
    pub objective_function_id: String,
    pub candidate_solution: Vec<f64>,
    #[serde(default)]
    pub problem_context: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitnessResponse {
    pub fitness_value: f64,
}
