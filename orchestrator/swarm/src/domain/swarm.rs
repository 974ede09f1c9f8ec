// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Swarm Domain Aggregates
//!
//! - [`Swarm`]: aggregate root: status, members, iteration counter and the
//!   best solution found so far.
//! - [`SwarmConfig`]: what to optimise and with which algorithm.
//! - [`SwarmSolution`]: a snapshot of one evaluated position.
//!
//! [`SwarmId`] and [`SwarmStatus`] live in `colony_core` so agents can carry a
//! swarm membership reference.

use chrono::{DateTime, Utc};
use colony_core::domain::agent::AgentId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use colony_core::domain::swarm::{SwarmId, SwarmStatus};

use crate::domain::algorithm::AlgorithmError;
use crate::domain::problem::{OptimizationProblem, ProblemError};

#[derive(Debug, Error)]
pub enum SwarmError {
    #[error("swarm {0} not found")]
    NotFound(SwarmId),

    #[error("agent {0} not found")]
    AgentNotFound(AgentId),

    #[error("invalid swarm configuration: {0}")]
    Configuration(String),

    #[error(transparent)]
    Problem(#[from] ProblemError),

    #[error("cannot {operation} swarm {swarm_id} in status {status}")]
    InvalidState {
        swarm_id: SwarmId,
        status: SwarmStatus,
        operation: &'static str,
    },

    #[error("failed to instantiate algorithm: {0}")]
    AlgorithmInstantiation(#[from] AlgorithmError),

    #[error("swarm loop failed: {0}")]
    Loop(String),
}

/// Scalar fitness, or one value per objective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Fitness {
    Scalar(#[serde(with = "lossless_f64")] f64),
    Vector(Vec<f64>),
}

impl Fitness {
    pub fn scalar(&self) -> Option<f64> {
        match self {
            Fitness::Scalar(v) => Some(*v),
            Fitness::Vector(_) => None,
        }
    }
}

/// JSON has no infinities; encode them as strings so worst-case fitness
/// values survive a checkpoint.
mod lossless_f64 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if value.is_nan() {
            serializer.serialize_str("NaN")
        } else if *value > 0.0 {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(v) => Ok(v),
            Repr::Text(s) => match s.as_str() {
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                "NaN" => Ok(f64::NAN),
                other => Err(serde::de::Error::custom(format!("invalid fitness value '{}'", other))),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmSolution {
    pub position: Vec<f64>,
    pub fitness: Fitness,
    #[serde(default = "default_feasible")]
    pub is_feasible: bool,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

fn default_feasible() -> bool {
    true
}

impl SwarmSolution {
    pub fn new(position: Vec<f64>, fitness: Fitness) -> Self {
        Self {
            position,
            fitness,
            is_feasible: true,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn scalar(position: Vec<f64>, fitness: f64) -> Self {
        Self::new(position, Fitness::Scalar(fitness))
    }

    pub fn fitness_value(&self) -> Option<f64> {
        self.fitness.scalar()
    }
}

#[derive(Debug, Clone)]
pub struct SwarmConfig {
    pub name: String,
    /// Factory tag, e.g. `pso`, `de`, `ga`
    pub algorithm_type: String,
    pub algorithm_params: serde_json::Map<String, serde_json::Value>,
    pub objective_description: String,
    pub max_iterations: u64,
    /// Early-stop threshold
    pub target_fitness: Option<f64>,
    pub problem: OptimizationProblem,
}

impl SwarmConfig {
    pub fn new(
        name: impl Into<String>,
        algorithm_type: impl Into<String>,
        problem: OptimizationProblem,
    ) -> Self {
        Self {
            name: name.into(),
            algorithm_type: algorithm_type.into(),
            algorithm_params: serde_json::Map::new(),
            objective_description: String::new(),
            max_iterations: 100,
            target_fitness: None,
            problem,
        }
    }

    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        if let serde_json::Value::Object(map) = params {
            self.algorithm_params = map;
        }
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u64) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_target_fitness(mut self, target: f64) -> Self {
        self.target_fitness = Some(target);
        self
    }

    pub fn validate(&self) -> Result<(), SwarmError> {
        if self.name.trim().is_empty() {
            return Err(SwarmError::Configuration("swarm name must not be empty".to_string()));
        }
        if self.algorithm_type.trim().is_empty() {
            return Err(SwarmError::Configuration("algorithm_type must not be empty".to_string()));
        }
        if self.max_iterations == 0 {
            return Err(SwarmError::Configuration(
                "max_iterations must be greater than zero".to_string(),
            ));
        }
        if let Some(target) = self.target_fitness {
            if !target.is_finite() {
                return Err(SwarmError::Configuration(format!(
                    "target_fitness {} must be finite",
                    target
                )));
            }
        }
        Ok(())
    }
}

/// Aggregate root for one optimisation run.
///
/// The live algorithm instance is owned by the swarm's loop task, not by this
/// record; only the observable state lives here.
#[derive(Debug, Clone)]
pub struct Swarm {
    pub id: SwarmId,
    pub name: String,
    pub status: SwarmStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub config: SwarmConfig,
    /// Member agents in join order
    pub agents: Vec<AgentId>,
    pub current_iteration: u64,
    pub best_solution: Option<SwarmSolution>,
    pub shared_data: serde_json::Map<String, serde_json::Value>,
    pub task_queue: Vec<serde_json::Value>,
}

impl Swarm {
    pub fn new(config: SwarmConfig) -> Result<Self, SwarmError> {
        config.validate()?;
        let now = Utc::now();
        Ok(Self {
            id: SwarmId::new(),
            name: config.name.clone(),
            status: SwarmStatus::Created,
            created_at: now,
            updated_at: now,
            config,
            agents: Vec::new(),
            current_iteration: 0,
            best_solution: None,
            shared_data: serde_json::Map::new(),
            task_queue: Vec::new(),
        })
    }

    pub fn problem(&self) -> &OptimizationProblem {
        &self.config.problem
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Returns `false` when the agent was already a member.
    pub fn add_agent(&mut self, agent_id: AgentId) -> bool {
        if self.agents.contains(&agent_id) {
            return false;
        }
        self.agents.push(agent_id);
        self.touch();
        true
    }

    pub fn remove_agent(&mut self, agent_id: AgentId) -> bool {
        let before = self.agents.len();
        self.agents.retain(|a| *a != agent_id);
        let removed = self.agents.len() != before;
        if removed {
            self.touch();
        }
        removed
    }

    pub fn best_fitness(&self) -> Option<f64> {
        self.best_solution.as_ref().and_then(SwarmSolution::fitness_value)
    }

    /// Replace the best solution iff `candidate` is strictly better.
    pub fn offer_best(&mut self, candidate: &SwarmSolution) -> bool {
        let Some(fitness) = candidate.fitness_value() else {
            return false;
        };
        let improved = match self.best_fitness() {
            None => true,
            Some(best) => self.config.problem.is_better(fitness, best),
        };
        if improved {
            self.best_solution = Some(candidate.clone());
            self.touch();
        }
        improved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::problem::ObjectiveRegistry;

    fn config() -> SwarmConfig {
        let registry = ObjectiveRegistry::with_builtins();
        let problem =
            OptimizationProblem::new(1, vec![(-5.0, 5.0)], registry.get("sphere").unwrap(), true)
                .unwrap();
        SwarmConfig::new("unit", "pso", problem)
    }

    #[test]
    fn test_config_validation() {
        assert!(Swarm::new(config()).is_ok());
        assert!(matches!(
            Swarm::new(config().with_max_iterations(0)),
            Err(SwarmError::Configuration(_))
        ));
        let mut unnamed = config();
        unnamed.name = " ".to_string();
        assert!(Swarm::new(unnamed).is_err());
    }

    #[test]
    fn test_offer_best_requires_strict_improvement() {
        let mut swarm = Swarm::new(config()).unwrap();
        assert!(swarm.offer_best(&SwarmSolution::scalar(vec![1.0], 1.0)));
        assert!(!swarm.offer_best(&SwarmSolution::scalar(vec![-1.0], 1.0)));
        assert!(swarm.offer_best(&SwarmSolution::scalar(vec![0.5], 0.25)));
        assert_eq!(swarm.best_solution.as_ref().unwrap().position, vec![0.5]);
    }

    #[test]
    fn test_membership_is_a_set() {
        let mut swarm = Swarm::new(config()).unwrap();
        let agent = AgentId::new();
        assert!(swarm.add_agent(agent));
        assert!(!swarm.add_agent(agent));
        assert!(swarm.remove_agent(agent));
        assert!(swarm.agents.is_empty());
    }

    #[test]
    fn test_infinite_fitness_survives_json() {
        let solution = SwarmSolution::scalar(vec![0.0], f64::INFINITY);
        let json = serde_json::to_value(&solution).unwrap();
        assert_eq!(json["fitness"], "inf");
        let back: SwarmSolution = serde_json::from_value(json).unwrap();
        assert_eq!(back, solution);

        let vector: SwarmSolution = serde_json::from_value(serde_json::json!({
            "position": [1.0],
            "fitness": [1.0, 2.0]
        }))
        .unwrap();
        assert_eq!(vector.fitness, Fitness::Vector(vec![1.0, 2.0]));
        assert!(vector.is_feasible);
    }
}
