// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Algorithm Plugins
//!
//! Every optimizer follows the same protocol, driven by the swarm loop:
//!
//! 1. [`SwarmAlgorithm::initialize`] builds and directly evaluates the first
//!    population.
//! 2. [`SwarmAlgorithm::current_positions`] hands positions to the dispatcher.
//! 3. [`SwarmAlgorithm::absorb_fitness`] feeds evaluated fitness back.
//! 4. [`SwarmAlgorithm::advance`] produces the next candidates.
//! 5. [`SwarmAlgorithm::select`] merges evaluated candidates when
//!    [`SwarmAlgorithm::requires_selection`] is set.
//!
//! Implementations are picked by string tag through [`create_algorithm`].

use colony_core::domain::agent::AgentId;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::algorithms::{
    DifferentialEvolution, GeneticAlgorithm, MockAlgorithm, ParticleSwarm,
};
use crate::domain::problem::OptimizationProblem;
use crate::domain::swarm::SwarmSolution;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AlgorithmError {
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("unknown algorithm type '{0}'")]
    UnknownAlgorithm(String),

    #[error("algorithm has not been initialized")]
    NotInitialized,

    #[error("expected {expected} values, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}

impl AlgorithmError {
    pub fn invalid(name: &str, reason: impl Into<String>) -> Self {
        AlgorithmError::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

pub trait SwarmAlgorithm: Send {
    fn name(&self) -> &'static str;

    /// Build the initial population and evaluate it directly.
    fn initialize(
        &mut self,
        problem: &OptimizationProblem,
        members: &[AgentId],
    ) -> Result<(), AlgorithmError>;

    fn current_positions(&self) -> Vec<Vec<f64>>;

    /// `fitnesses` is aligned with the last [`current_positions`](Self::current_positions).
    fn absorb_fitness(
        &mut self,
        problem: &OptimizationProblem,
        fitnesses: &[f64],
    ) -> Result<(), AlgorithmError>;

    /// Produce the next positions that need evaluation.
    fn advance(
        &mut self,
        problem: &OptimizationProblem,
        members: &[AgentId],
        iteration: u64,
        shared_state: &mut Map<String, Value>,
    ) -> Result<Vec<Vec<f64>>, AlgorithmError>;

    fn requires_selection(&self) -> bool;

    /// Merge evaluated candidates from [`advance`](Self::advance).
    fn select(
        &mut self,
        problem: &OptimizationProblem,
        candidates: &[Vec<f64>],
        fitnesses: &[f64],
    ) -> Result<(), AlgorithmError>;

    fn global_best(&self) -> Option<SwarmSolution>;

    fn should_terminate(
        &self,
        iteration: u64,
        max_iterations: u64,
        best: Option<&SwarmSolution>,
        target_fitness: Option<f64>,
        problem: &OptimizationProblem,
    ) -> bool {
        if iteration >= max_iterations {
            return true;
        }
        match (best.and_then(SwarmSolution::fitness_value), target_fitness) {
            (Some(fitness), Some(target)) => problem.meets_target(fitness, target),
            _ => false,
        }
    }
}

/// Typed view over a swarm's JSON parameter map.
pub struct AlgorithmParams<'a> {
    params: &'a Map<String, Value>,
}

impl<'a> AlgorithmParams<'a> {
    pub fn new(params: &'a Map<String, Value>) -> Self {
        Self { params }
    }

    pub fn f64(&self, name: &str, default: f64) -> Result<f64, AlgorithmError> {
        match self.params.get(name) {
            None | Some(Value::Null) => Ok(default),
            Some(value) => value
                .as_f64()
                .filter(|v| v.is_finite())
                .ok_or_else(|| AlgorithmError::invalid(name, format!("expected a number, got {}", value))),
        }
    }

    pub fn usize(&self, name: &str, default: usize) -> Result<usize, AlgorithmError> {
        match self.params.get(name) {
            None | Some(Value::Null) => Ok(default),
            Some(value) => value
                .as_u64()
                .map(|v| v as usize)
                .ok_or_else(|| {
                    AlgorithmError::invalid(name, format!("expected a non-negative integer, got {}", value))
                }),
        }
    }

    pub fn seed(&self) -> Result<Option<u64>, AlgorithmError> {
        match self.params.get("seed") {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value
                .as_u64()
                .map(Some)
                .ok_or_else(|| AlgorithmError::invalid("seed", format!("expected an unsigned integer, got {}", value))),
        }
    }

    /// Seeded generator when `seed` is given, OS entropy otherwise.
    pub fn rng(&self) -> Result<StdRng, AlgorithmError> {
        Ok(match self.seed()? {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        })
    }
}

pub fn check_rate(name: &str, value: f64) -> Result<f64, AlgorithmError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(AlgorithmError::invalid(name, format!("{} is outside [0, 1]", value)))
    }
}

/// Instantiate the optimizer registered under `tag`.
pub fn create_algorithm(
    tag: &str,
    params: &Map<String, Value>,
) -> Result<Box<dyn SwarmAlgorithm>, AlgorithmError> {
    match tag.to_ascii_lowercase().as_str() {
        "pso" | "particle_swarm" => Ok(Box::new(ParticleSwarm::from_params(params)?)),
        "de" | "differential_evolution" => Ok(Box::new(DifferentialEvolution::from_params(params)?)),
        "ga" | "genetic_algorithm" => Ok(Box::new(GeneticAlgorithm::from_params(params)?)),
        "mock" => Ok(Box::new(MockAlgorithm)),
        other => Err(AlgorithmError::UnknownAlgorithm(other.to_string())),
    }
}

pub(crate) fn check_len(expected: usize, actual: usize) -> Result<(), AlgorithmError> {
    if expected == actual {
        Ok(())
    } else {
        Err(AlgorithmError::LengthMismatch { expected, actual })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_factory_tags() {
        let empty = Map::new();
        assert_eq!(create_algorithm("pso", &empty).unwrap().name(), "pso");
        assert_eq!(create_algorithm("Particle_Swarm", &empty).unwrap().name(), "pso");
        assert_eq!(create_algorithm("differential_evolution", &empty).unwrap().name(), "de");
        assert_eq!(create_algorithm("ga", &empty).unwrap().name(), "ga");
        assert_eq!(create_algorithm("mock", &empty).unwrap().name(), "mock");
        assert_eq!(
            create_algorithm("annealing", &empty).err(),
            Some(AlgorithmError::UnknownAlgorithm("annealing".to_string()))
        );
    }

    #[test]
    fn test_construction_time_validation() {
        let cases = [
            ("de", json!({"population_size": 3})),
            ("de", json!({"mutation_factor": 0.0})),
            ("de", json!({"mutation_factor": 2.5})),
            ("de", json!({"crossover_rate": 1.5})),
            ("ga", json!({"mutation_rate": -0.1})),
            ("ga", json!({"population_size": 10, "elitism_count": 10})),
            ("ga", json!({"population_size": 10, "tournament_size": 0})),
            ("ga", json!({"population_size": 10, "tournament_size": 11})),
            ("pso", json!({"population_size": 0})),
            ("pso", json!({"inertia_weight": "fast"})),
            ("pso", json!({"seed": -1})),
        ];
        for (tag, params) in cases {
            let result = create_algorithm(tag, &map(params.clone()));
            assert!(
                matches!(result, Err(AlgorithmError::InvalidParameter { .. })),
                "{} with {} should be rejected",
                tag,
                params
            );
        }
        assert!(create_algorithm("de", &map(json!({"population_size": 4, "mutation_factor": 2.0}))).is_ok());
        assert!(create_algorithm("ga", &map(json!({"population_size": 5, "elitism_count": 0, "tournament_size": 5}))).is_ok());
    }
}
