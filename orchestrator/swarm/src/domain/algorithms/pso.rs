// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Particle swarm optimisation. Particles replace themselves, so there is no
//! selection phase.

use colony_core::domain::agent::AgentId;
use rand::rngs::StdRng;
use rand::Rng;
use serde_json::{Map, Value};

use super::BestTracker;
use crate::domain::algorithm::{check_len, AlgorithmError, AlgorithmParams, SwarmAlgorithm};
use crate::domain::problem::OptimizationProblem;
use crate::domain::swarm::SwarmSolution;

#[derive(Debug, Clone)]
struct Particle {
    position: Vec<f64>,
    velocity: Vec<f64>,
    fitness: f64,
    best_position: Vec<f64>,
    best_fitness: f64,
}

pub struct ParticleSwarm {
    population_size: usize,
    inertia_weight: f64,
    cognitive_coeff: f64,
    social_coeff: f64,
    /// Max speed per dimension as a fraction of that dimension's range
    velocity_clamp: f64,
    rng: StdRng,
    particles: Vec<Particle>,
    best: BestTracker,
}

impl ParticleSwarm {
    pub fn from_params(params: &Map<String, Value>) -> Result<Self, AlgorithmError> {
        let p = AlgorithmParams::new(params);
        let population_size = p.usize("population_size", 20)?;
        if population_size == 0 {
            return Err(AlgorithmError::invalid("population_size", "must be at least 1"));
        }
        let velocity_clamp = p.f64("velocity_clamp", 0.2)?;
        if velocity_clamp <= 0.0 {
            return Err(AlgorithmError::invalid("velocity_clamp", "must be positive"));
        }
        Ok(Self {
            population_size,
            inertia_weight: p.f64("inertia_weight", 0.7)?,
            cognitive_coeff: p.f64("cognitive_coeff", 1.5)?,
            social_coeff: p.f64("social_coeff", 1.5)?,
            velocity_clamp,
            rng: p.rng()?,
            particles: Vec::new(),
            best: BestTracker::default(),
        })
    }

    fn max_speed(&self, problem: &OptimizationProblem, dimension: usize) -> f64 {
        let (min, max) = problem.bounds()[dimension];
        (max - min) * self.velocity_clamp
    }
}

impl SwarmAlgorithm for ParticleSwarm {
    fn name(&self) -> &'static str {
        "pso"
    }

    fn initialize(
        &mut self,
        problem: &OptimizationProblem,
        _members: &[AgentId],
    ) -> Result<(), AlgorithmError> {
        self.particles.clear();
        self.best = BestTracker::default();
        let limits: Vec<f64> = (0..problem.dimensions())
            .map(|d| self.max_speed(problem, d))
            .collect();
        for _ in 0..self.population_size {
            let position = problem.random_position(&mut self.rng);
            let velocity = limits
                .iter()
                .map(|&limit| self.rng.random_range(-limit..limit))
                .collect();
            let fitness = problem.evaluate(&position);
            self.best.offer(problem, &position, fitness);
            self.particles.push(Particle {
                best_position: position.clone(),
                best_fitness: fitness,
                position,
                velocity,
                fitness,
            });
        }
        Ok(())
    }

    fn current_positions(&self) -> Vec<Vec<f64>> {
        self.particles.iter().map(|p| p.position.clone()).collect()
    }

    fn absorb_fitness(
        &mut self,
        problem: &OptimizationProblem,
        fitnesses: &[f64],
    ) -> Result<(), AlgorithmError> {
        check_len(self.particles.len(), fitnesses.len())?;
        for (particle, &fitness) in self.particles.iter_mut().zip(fitnesses) {
            let fitness = problem.sanitize(fitness);
            particle.fitness = fitness;
            if problem.is_better(fitness, particle.best_fitness) {
                particle.best_fitness = fitness;
                particle.best_position = particle.position.clone();
            }
            self.best.offer(problem, &particle.position, fitness);
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
        let global = self
            .best
            .position()
            .map(<[f64]>::to_vec)
            .ok_or(AlgorithmError::NotInitialized)?;
        let limits: Vec<f64> = (0..problem.dimensions())
            .map(|d| self.max_speed(problem, d))
            .collect();

        for particle in &mut self.particles {
            for d in 0..problem.dimensions() {
                let r1: f64 = self.rng.random();
                let r2: f64 = self.rng.random();
                let x = particle.position[d];
                let v = self.inertia_weight * particle.velocity[d]
                    + self.cognitive_coeff * r1 * (particle.best_position[d] - x)
                    + self.social_coeff * r2 * (global[d] - x);
                let v = v.clamp(-limits[d], limits[d]);
                particle.velocity[d] = v;
                particle.position[d] = problem.clamp(d, x + v);
            }
        }
        Ok(self.current_positions())
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
        // Particles already moved in `advance`.
        Ok(())
    }

    fn global_best(&self) -> Option<SwarmSolution> {
        self.best.solution()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::problem::ObjectiveRegistry;
    use serde_json::json;

    fn problem() -> OptimizationProblem {
        let registry = ObjectiveRegistry::with_builtins();
        OptimizationProblem::new(
            3,
            vec![(-5.0, 5.0), (0.0, 2.0), (-1.0, 10.0)],
            registry.get("sphere").unwrap(),
            true,
        )
        .unwrap()
    }

    fn pso(params: Value) -> ParticleSwarm {
        match params {
            Value::Object(map) => ParticleSwarm::from_params(&map).unwrap(),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_positions_stay_within_bounds() {
        let problem = problem();
        let mut algo = pso(json!({"population_size": 12, "seed": 3}));
        algo.initialize(&problem, &[]).unwrap();

        let positions = algo.current_positions();
        assert_eq!(positions.len(), 12);
        assert!(positions.iter().all(|p| p.len() == 3 && problem.contains(p)));

        let mut shared = Map::new();
        for iteration in 0..20 {
            let fitness: Vec<f64> = algo.current_positions().iter().map(|p| problem.evaluate(p)).collect();
            algo.absorb_fitness(&problem, &fitness).unwrap();
            let next = algo.advance(&problem, &[], iteration, &mut shared).unwrap();
            assert!(next.iter().all(|p| problem.contains(p)));
        }
    }

    #[test]
    fn test_global_best_is_monotone_and_improves() {
        let problem = problem();
        let mut algo = pso(json!({"seed": 11}));
        algo.initialize(&problem, &[]).unwrap();
        let initial = algo.global_best().unwrap().fitness_value().unwrap();

        let mut previous = initial;
        let mut shared = Map::new();
        for iteration in 0..50 {
            let fitness: Vec<f64> = algo.current_positions().iter().map(|p| problem.evaluate(p)).collect();
            algo.absorb_fitness(&problem, &fitness).unwrap();
            algo.advance(&problem, &[], iteration, &mut shared).unwrap();
            let best = algo.global_best().unwrap().fitness_value().unwrap();
            assert!(best <= previous);
            previous = best;
        }
        assert!(previous < initial);
    }

    #[test]
    fn test_absorb_rejects_misaligned_batch() {
        let problem = problem();
        let mut algo = pso(json!({"population_size": 4, "seed": 1}));
        algo.initialize(&problem, &[]).unwrap();
        assert_eq!(
            algo.absorb_fitness(&problem, &[1.0]),
            Err(AlgorithmError::LengthMismatch { expected: 4, actual: 1 })
        );
    }
}
