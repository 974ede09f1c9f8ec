// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP client for the fitness-evaluation endpoint remote agents expose.

use colony_core::domain::agent::AgentId;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

use crate::domain::evaluation::{FitnessRequest, FitnessResponse};

#[derive(Debug, Error)]
pub enum AgentClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("agent returned status {0}")]
    Status(u16),

    #[error("agent returned a non-finite fitness")]
    NonFinite,
}

#[derive(Clone)]
pub struct AgentEvaluationClient {
    base_url: String,
    client: Client,
}

impl AgentEvaluationClient {
    pub fn new(
        base_url: impl Into<String>,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, AgentClientError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `POST {base}/agents/{id}/evaluate_fitness`
    pub async fn evaluate_fitness(
        &self,
        agent_id: AgentId,
        objective_function_id: &str,
        candidate: &[f64],
        problem_context: serde_json::Value,
    ) -> Result<f64, AgentClientError> {
        let url = format!("{}/agents/{}/evaluate_fitness", self.base_url, agent_id);
        let body = FitnessRequest {
            objective_function_id: objective_function_id.to_string(),
            candidate_solution: candidate.to_vec(),
            problem_context,
        };

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(AgentClientError::Status(status.as_u16()));
        }
        let parsed: FitnessResponse = response.json().await?;
        if parsed.fitness_value.is_nan() {
            return Err(AgentClientError::NonFinite);
        }
        Ok(parsed.fitness_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client(url: String) -> AgentEvaluationClient {
        AgentEvaluationClient::new(url, Duration::from_secs(1), Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn test_evaluate_fitness_success() {
        let mut server = mockito::Server::new_async().await;
        let agent = AgentId::new();
        let mock = server
            .mock("POST", format!("/agents/{}/evaluate_fitness", agent).as_str())
            .match_body(mockito::Matcher::PartialJson(json!({
                "objective_function_id": "sphere",
                "candidate_solution": [1.0, 2.0]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"fitness_value": 5.0}"#)
            .create_async()
            .await;

        let fitness = client(server.url())
            .evaluate_fitness(agent, "sphere", &[1.0, 2.0], json!({}))
            .await
            .unwrap();
        assert_eq!(fitness, 5.0);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_other_2xx_statuses_are_errors() {
        let mut server = mockito::Server::new_async().await;
        let accepted = AgentId::new();
        let _m = server
            .mock("POST", format!("/agents/{}/evaluate_fitness", accepted).as_str())
            .with_status(202)
            .with_body(r#"{"fitness_value": 1.0}"#)
            .create_async()
            .await;

        let result = client(server.url())
            .evaluate_fitness(accepted, "sphere", &[1.0], json!({}))
            .await;
        assert!(matches!(result, Err(AgentClientError::Status(202))));
    }

    #[tokio::test]
    async fn test_non_200_and_malformed_bodies_are_errors() {
        let mut server = mockito::Server::new_async().await;
        let failing = AgentId::new();
        let garbled = AgentId::new();
        let _m1 = server
            .mock("POST", format!("/agents/{}/evaluate_fitness", failing).as_str())
            .with_status(500)
            .create_async()
            .await;
        let _m2 = server
            .mock("POST", format!("/agents/{}/evaluate_fitness", garbled).as_str())
            .with_status(200)
            .with_body(r#"{"score": 1}"#)
            .create_async()
            .await;

        let client = client(server.url());
        assert!(matches!(
            client.evaluate_fitness(failing, "sphere", &[0.0], json!({})).await,
            Err(AgentClientError::Status(500))
        ));
        assert!(matches!(
            client.evaluate_fitness(garbled, "sphere", &[0.0], json!({})).await,
            Err(AgentClientError::Http(_))
        ));
    }
}
