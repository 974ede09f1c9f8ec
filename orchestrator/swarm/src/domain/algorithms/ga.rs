// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Real-coded genetic algorithm: tournament selection, averaging crossover,
//! random-reset mutation and elitism.

use colony_core::domain::agent::AgentId;
use rand::rngs::StdRng;
use rand::Rng;
use serde_json::{Map, Value};
use tracing::warn;

use super::{BestTracker, Individual};
use crate::domain::algorithm::{
    check_len, check_rate, AlgorithmError, AlgorithmParams, SwarmAlgorithm,
};
use crate::domain::problem::OptimizationProblem;
use crate::domain::swarm::SwarmSolution;

pub struct GeneticAlgorithm {
    population_size: usize,
    crossover_rate: f64,
    mutation_rate: f64,
    elitism_count: usize,
    tournament_size: usize,
    rng: StdRng,
    population: Vec<Individual>,
    /// Elites carried over by the last `advance`, waiting for `select`
    elites: Vec<Individual>,
    best: BestTracker,
}

impl GeneticAlgorithm {
    pub fn from_params(params: &Map<String, Value>) -> Result<Self, AlgorithmError> {
        let p = AlgorithmParams::new(params);
        let population_size = p.usize("population_size", 20)?;
        if population_size == 0 {
            return Err(AlgorithmError::invalid("population_size", "must be at least 1"));
        }
        let elitism_count = p.usize("elitism_count", 1)?;
        if elitism_count >= population_size {
            return Err(AlgorithmError::invalid(
                "elitism_count",
                format!("{} must be below population_size {}", elitism_count, population_size),
            ));
        }
        let tournament_size = p.usize("tournament_size", 3.min(population_size))?;
        if tournament_size == 0 || tournament_size > population_size {
            return Err(AlgorithmError::invalid(
                "tournament_size",
                format!("{} is outside (0, {}]", tournament_size, population_size),
            ));
        }
        Ok(Self {
            population_size,
            crossover_rate: check_rate("crossover_rate", p.f64("crossover_rate", 0.8)?)?,
            mutation_rate: check_rate("mutation_rate", p.f64("mutation_rate", 0.1)?)?,
            elitism_count,
            tournament_size,
            rng: p.rng()?,
            population: Vec::new(),
            elites: Vec::new(),
            best: BestTracker::default(),
        })
    }

    fn tournament(&mut self, problem: &OptimizationProblem) -> usize {
        let n = self.population.len();
        let mut winner = self.rng.random_range(0..n);
        for _ in 1..self.tournament_size {
            let challenger = self.rng.random_range(0..n);
            if problem.is_better(self.population[challenger].fitness, self.population[winner].fitness) {
                winner = challenger;
            }
        }
        winner
    }

    fn offspring(&mut self, problem: &OptimizationProblem) -> Vec<f64> {
        let a = self.tournament(problem);
        let b = self.tournament(problem);
        let mut child = if self.rng.random::<f64>() < self.crossover_rate {
            self.population[a]
                .position
                .iter()
                .zip(&self.population[b].position)
                .map(|(x, y)| (x + y) / 2.0)
                .collect()
        } else {
            self.population[a].position.clone()
        };
        for (d, gene) in child.iter_mut().enumerate() {
            if self.rng.random::<f64>() < self.mutation_rate {
                *gene = problem.random_coordinate(d, &mut self.rng);
            }
        }
        child
    }
}

impl SwarmAlgorithm for GeneticAlgorithm {
    fn name(&self) -> &'static str {
        "ga"
    }

    fn initialize(
        &mut self,
        problem: &OptimizationProblem,
        _members: &[AgentId],
    ) -> Result<(), AlgorithmError> {
        self.best = BestTracker::default();
        self.elites.clear();
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
        if self.population.is_empty() {
            return Err(AlgorithmError::NotInitialized);
        }
        let mut ranked = self.population.clone();
        ranked.sort_by(|a, b| problem.compare(a.fitness, b.fitness));
        ranked.truncate(self.elitism_count);
        self.elites = ranked;

        let count = self.population_size - self.elites.len();
        Ok((0..count).map(|_| self.offspring(problem)).collect())
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
        check_len(candidates.len(), fitnesses.len())?;
        let mut next: Vec<Individual> = std::mem::take(&mut self.elites);
        for (position, &fitness) in candidates.iter().zip(fitnesses) {
            let fitness = problem.sanitize(fitness);
            self.best.offer(problem, position, fitness);
            next.push(Individual {
                position: position.clone(),
                fitness,
            });
        }
        next.truncate(self.population_size);

        if next.len() < self.population_size {
            warn!(
                "GA generation underflow: {} of {} individuals, back-filling by duplication",
                next.len(),
                self.population_size
            );
            let source = if next.is_empty() {
                self.population.clone()
            } else {
                next.clone()
            };
            let mut i = 0;
            while next.len() < self.population_size && !source.is_empty() {
                next.push(source[i % source.len()].clone());
                i += 1;
            }
        }
        self.population = next;
        Ok(())
    }

    fn global_best(&self) -> Option<SwarmSolution> {
        self.best.solution()
    }
}
