// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use colony_core::domain::agent::AgentId;
use serde_json::{Map, Value};

use crate::domain::algorithm::{AlgorithmError, SwarmAlgorithm};
use crate::domain::problem::OptimizationProblem;
use crate::domain::swarm::SwarmSolution;

/// No-op optimizer with an empty population; terminates on the first check.
#[derive(Debug, Default)]
pub struct MockAlgorithm;

impl SwarmAlgorithm for MockAlgorithm {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn initialize(&mut self, _problem: &OptimizationProblem, _members: &[AgentId]) -> Result<(), AlgorithmError> {
        Ok(())
    }

    fn current_positions(&self) -> Vec<Vec<f64>> {
        Vec::new()
    }

    fn absorb_fitness(&mut self, _problem: &OptimizationProblem, _fitnesses: &[f64]) -> Result<(), AlgorithmError> {
        Ok(())
    }

    fn advance(
        &mut self,
        _problem: &OptimizationProblem,
        _members: &[AgentId],
        _iteration: u64,
        _shared_state: &mut Map<String, Value>,
    ) -> Result<Vec<Vec<f64>>, AlgorithmError> {
        Ok(Vec::new())
    }

    fn requires_selection(&self) -> bool {
        false
    }

    fn select(
        &mut self,
        _problem: &OptimizationProblem,
        _candidates: &[Vec<f64>],
        _fitnesses: &[f64],
    ) -> Result<(), AlgorithmError> {
        Ok(())
    }

    fn global_best(&self) -> Option<SwarmSolution> {
        None
    }

    fn should_terminate(
        &self,
        _iteration: u64,
        _max_iterations: u64,
        _best: Option<&SwarmSolution>,
        _target_fitness: Option<f64>,
        _problem: &OptimizationProblem,
    ) -> bool {
        true
    }
}
