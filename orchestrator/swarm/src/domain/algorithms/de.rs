// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Differential evolution (rand/1/bin).
//!
//! `advance` builds one trial vector per target; `select` keeps a trial iff it
//! is at least as good as its target.

use colony_core::domain::agent::AgentId;
use rand::rngs::StdRng;
use rand::Rng;
use serde_json::{Map, Value};

use super::{BestTracker, Individual};
use crate::domain::algorithm::{
    check_len, check_rate, AlgorithmError, AlgorithmParams, SwarmAlgorithm,
};
use crate::domain::problem::OptimizationProblem;
use crate::domain::swarm::SwarmSolution;

pub struct DifferentialEvolution {
    population_size: usize,
    mutation_factor: f64,
    crossover_rate: f64,
    rng: StdRng,
    population: Vec<Individual>,
    best: BestTracker,
}

impl DifferentialEvolution {
    pub fn from_params(params: &Map<String, Value>) -> Result<Self, AlgorithmError> {
        let p = AlgorithmParams::new(params);
        let population_size = p.usize("population_size", 20)?;
        if population_size < 4 {
            return Err(AlgorithmError::invalid(
                "population_size",
                format!("{} is below 4; mutation needs three distinct partners", population_size),
            ));
        }
        let mutation_factor = p.f64("mutation_factor", 0.8)?;
        if !(mutation_factor > 0.0 && mutation_factor <= 2.0) {
            return Err(AlgorithmError::invalid(
                "mutation_factor",
                format!("{} is outside (0, 2]", mutation_factor),
            ));
        }
        Ok(Self {
            population_size,
            mutation_factor,
            crossover_rate: check_rate("crossover_rate", p.f64("crossover_rate", 0.9)?)?,
            rng: p.rng()?,
            population: Vec::new(),
            best: BestTracker::default(),
        })
    }

    /// Three distinct indices, none equal to `target`.
    fn partners(&mut self, target: usize) -> [usize; 3] {
        let n = self.population.len();
        let mut picked = [0usize; 3];
        let mut count = 0;
        while count < 3 {
            let candidate = self.rng.random_range(0..n);
            if candidate != target && !picked[..count].contains(&candidate) {
                picked[count] = candidate;
                count += 1;
            }
        }
        picked
    }
}

impl SwarmAlgorithm for DifferentialEvolution {
    fn name(&self) -> &'static str {
        "de"
    }

    fn initialize(
        &mut self,
        problem: &OptimizationProblem,
        _members: &[AgentId],
    ) -> Result<(), AlgorithmError> {
        self.best = BestTracker::default();
        self.population = (0..self.population_size)
            .map(|_| {
                let position = problem.random_position(&mut self.rng);
                let fitness = problem.evaluate(&position);
                Individual { position, fitness }
            })
            .collect();
        for individual in &self.population {
            self.best.offer(problem, &individual.position, individual.fitness);
        }
        Ok(())
    }

    fn current_positions(&self) -> Vec<Vec<f64>> {
        self.population.iter().map(|i| i.position.clone()).collect()
    }

    fn absorb_fitness(
        &mut self,
        problem: &OptimizationProblem,
        fitnesses: &[f64],
    ) -> Result<(), AlgorithmError> {
        check_len(self.population.len(), fitnesses.len())?;
        for (individual, &fitness) in self.population.iter_mut().zip(fitnesses) {
            individual.fitness = problem.sanitize(fitness);
            self.best.offer(problem, &individual.position, individual.fitness);
        }
        Ok(())
    }

    fn advance(
        &mut self,
        problem: &OptimizationProblem,
        _members: &[AgentId],
        _iteration: u64,
        _shared_state: &mut Map<String, Value>,
    ) -> Result<Vec<Vec<f64>>, AlgorithmError> {
        if self.population.len() < 4 {
            return Err(AlgorithmError::NotInitialized);
        }
        let dimensions = problem.dimensions();
        let mut trials = Vec::with_capacity(self.population.len());

        for target in 0..self.population.len() {
            let [r1, r2, r3] = self.partners(target);
            let forced = self.rng.random_range(0..dimensions);
            let mut trial = self.population[target].position.clone();
            for (d, gene) in trial.iter_mut().enumerate() {
                if d == forced || self.rng.random::<f64>() < self.crossover_rate {
                    let donor = self.population[r1].position[d]
                        + self.mutation_factor
                            * (self.population[r2].position[d] - self.population[r3].position[d]);
                    *gene = problem.clamp(d, donor);
                }
            }
            trials.push(trial);
        }
        Ok(trials)
    }

    fn requires_selection(&self) -> bool {
        true
    }

    fn select(
        &mut self,
        problem: &OptimizationProblem,
        candidates: &[Vec<f64>],
        fitnesses: &[f64],
    ) -> Result<(), AlgorithmError> {
        check_len(self.population.len(), candidates.len())?;
        check_len(candidates.len(), fitnesses.len())?;
        for ((target, trial), &fitness) in self.population.iter_mut().zip(candidates).zip(fitnesses) {
            let fitness = problem.sanitize(fitness);
            if problem.is_at_least_as_good(fitness, target.fitness) {
                target.position = trial.clone();
                target.fitness = fitness;
                self.best.offer(problem, trial, fitness);
            }
        }
        Ok(())
    }

    fn global_best(&self) -> Option<SwarmSolution> {
        self.best.solution()
    }
}
