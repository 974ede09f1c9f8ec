// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Worker side of the evaluation RPC. A process that serves this router can
//! stand in as a swarm member for any objective it has registered.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use colony_core::domain::agent::AgentId;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use crate::domain::evaluation::{FitnessRequest, FitnessResponse};
use crate::domain::problem::ObjectiveRegistry;

pub struct AppState {
    pub objectives: Arc<ObjectiveRegistry>,
}

pub fn app(objectives: Arc<ObjectiveRegistry>) -> Router {
    let state = Arc::new(AppState { objectives });

    Router::new()
        .route("/agents/{agent_id}/evaluate_fitness", post(evaluate_fitness))
        .with_state(state)
}

fn error(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

async fn evaluate_fitness(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
    Json(request): Json<FitnessRequest>,
) -> Response {
    let agent_id = match AgentId::from_string(&agent_id) {
        Ok(id) => id,
        Err(_) => return error(StatusCode::BAD_REQUEST, format!("invalid agent id '{}'", agent_id)),
    };

    let Some(objective) = state.objectives.get(&request.objective_function_id) else {
        return error(
            StatusCode::NOT_FOUND,
            format!("objective '{}' is not registered", request.objective_function_id),
        );
    };

    let expected = request
        .problem_context
        .get("dimensions")
        .and_then(|d| d.as_u64())
        .map(|d| d as usize);
    let actual = request.candidate_solution.len();
    if actual == 0 || expected.is_some_and(|d| d != actual) {
        return error(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("candidate has {} dimension(s), expected {}", actual, expected.unwrap_or(1)),
        );
    }

    let fitness_value = objective.call(&request.candidate_solution);
    if !fitness_value.is_finite() {
        return error(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("objective produced {}", fitness_value),
        );
    }
    debug!(
        "Agent {} evaluated '{}' -> {}",
        agent_id, request.objective_function_id, fitness_value
    );
    Json(FitnessResponse { fitness_value }).into_response()
}
