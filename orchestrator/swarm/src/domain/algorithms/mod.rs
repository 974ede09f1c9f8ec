// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

mod de;
mod ga;
mod mock;
mod pso;

pub use de::DifferentialEvolution;
pub use ga::GeneticAlgorithm;
pub use mock::MockAlgorithm;
pub use pso::ParticleSwarm;

use crate::domain::problem::OptimizationProblem;
use crate::domain::swarm::SwarmSolution;

/// One evaluated member of a DE/GA population.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Individual {
    pub position: Vec<f64>,
    pub fitness: f64,
}

/// Running global best with strict-improvement updates.
#[derive(Debug, Clone, Default)]
pub(crate) struct BestTracker {
    best: Option<Individual>,
}

impl BestTracker {
    pub fn offer(&mut self, problem: &OptimizationProblem, position: &[f64], fitness: f64) -> bool {
        let improved = match &self.best {
            None => true,
            Some(best) => problem.is_better(fitness, best.fitness),
        };
        if improved {
            self.best = Some(Individual {
                position: position.to_vec(),
                fitness,
            });
        }
        improved
    }

    pub fn position(&self) -> Option<&[f64]> {
        self.best.as_ref().map(|b| b.position.as_slice())
    }

    pub fn solution(&self) -> Option<SwarmSolution> {
        self.best
            .as_ref()
            .map(|b| SwarmSolution::scalar(b.position.clone(), b.fitness))
    }
}
