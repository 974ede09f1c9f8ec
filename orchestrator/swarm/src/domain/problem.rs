// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Optimization Problem Model
//!
//! Immutable description of a search space shared by every algorithm:
//!
//! - [`OptimizationProblem`]: bounds, one objective, minimise/maximise sense.
//! - [`ObjectiveRegistry`]: stable names for objective functions, so problems
//!   can be checkpointed and evaluated by remote workers.
//! - [`MultiObjectiveProblem`] and [`ConstrainedProblem`]: variants that
//!   scalarise back into an [`OptimizationProblem`] for the optimizers.

use parking_lot::RwLock;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::f64::consts::{E, PI};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::domain::swarm::{Fitness, SwarmSolution};

pub type ObjectiveFn = Arc<dyn Fn(&[f64]) -> f64 + Send + Sync>;
pub type ConstraintFn = Arc<dyn Fn(&[f64]) -> f64 + Send + Sync>;

/// Inclusive `(min, max)` pair for one dimension.
pub type Bound = (f64, f64);

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProblemError {
    #[error("problem must have at least one dimension")]
    NoDimensions,

    #[error("expected {dimensions} bounds, got {bounds}")]
    BoundsMismatch { dimensions: usize, bounds: usize },

    #[error("bound {index} is invalid: min {min} must be finite and strictly less than max {max}")]
    InvalidBound { index: usize, min: f64, max: f64 },

    #[error("objective function '{0}' is not registered")]
    UnknownObjective(String),

    #[error("multi-objective problem needs at least one objective")]
    NoObjectives,

    #[error("expected {expected} values, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}

/// An objective function, optionally registered under a stable name.
#[derive(Clone)]
pub struct ObjectiveFunction {
    name: Option<String>,
    func: ObjectiveFn,
}

impl ObjectiveFunction {
    pub fn named(name: impl Into<String>, func: ObjectiveFn) -> Self {
        Self {
            name: Some(name.into()),
            func,
        }
    }

    /// Objective that cannot be dispatched remotely or checkpointed.
    pub fn anonymous<F>(func: F) -> Self
    where
        F: Fn(&[f64]) -> f64 + Send + Sync + 'static,
    {
        Self {
            name: None,
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn call(&self, position: &[f64]) -> f64 {
        (self.func)(position)
    }
}

impl fmt::Debug for ObjectiveFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectiveFunction")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Serializable shape of a problem; the objective travels by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemDefinition {
    pub dimensions: usize,
    pub bounds: Vec<Bound>,
    pub objective_function_name: Option<String>,
    pub is_minimization: bool,
}

#[derive(Debug, Clone)]
pub struct OptimizationProblem {
    dimensions: usize,
    bounds: Vec<Bound>,
    objective: ObjectiveFunction,
    minimize: bool,
}

fn validate_bounds(dimensions: usize, bounds: &[Bound]) -> Result<(), ProblemError> {
    if dimensions == 0 {
        return Err(ProblemError::NoDimensions);
    }
    if bounds.len() != dimensions {
        return Err(ProblemError::BoundsMismatch {
            dimensions,
            bounds: bounds.len(),
        });
    }
    for (index, &(min, max)) in bounds.iter().enumerate() {
        // `!(min < max)` also rejects NaN
        if !min.is_finite() || !max.is_finite() || !(min < max) {
            return Err(ProblemError::InvalidBound { index, min, max });
        }
    }
    Ok(())
}

impl OptimizationProblem {
    pub fn new(
        dimensions: usize,
        bounds: Vec<Bound>,
        objective: ObjectiveFunction,
        minimize: bool,
    ) -> Result<Self, ProblemError> {
        validate_bounds(dimensions, &bounds)?;
        Ok(Self {
            dimensions,
            bounds,
            objective,
            minimize,
        })
    }

    /// Rebuild a problem, resolving its objective through `registry`.
    pub fn from_definition(
        definition: &ProblemDefinition,
        registry: &ObjectiveRegistry,
    ) -> Result<Self, ProblemError> {
        let name = definition
            .objective_function_name
            .as_deref()
            .ok_or_else(|| ProblemError::UnknownObjective("<anonymous>".to_string()))?;
        let objective = registry
            .get(name)
            .ok_or_else(|| ProblemError::UnknownObjective(name.to_string()))?;
        Self::new(
            definition.dimensions,
            definition.bounds.clone(),
            objective,
            definition.is_minimization,
        )
    }

    pub fn definition(&self) -> ProblemDefinition {
        ProblemDefinition {
            dimensions: self.dimensions,
            bounds: self.bounds.clone(),
            objective_function_name: self.objective.name().map(str::to_string),
            is_minimization: self.minimize,
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn bounds(&self) -> &[Bound] {
        &self.bounds
    }

    pub fn objective(&self) -> &ObjectiveFunction {
        &self.objective
    }

    pub fn objective_name(&self) -> Option<&str> {
        self.objective.name()
    }

    pub fn is_minimization(&self) -> bool {
        self.minimize
    }

    /// Evaluate locally. NaN is reported as the worst fitness.
    pub fn evaluate(&self, position: &[f64]) -> f64 {
        self.sanitize(self.objective.call(position))
    }

    pub fn sanitize(&self, fitness: f64) -> f64 {
        if fitness.is_nan() {
            self.worst_fitness()
        } else {
            fitness
        }
    }

    /// `+inf` when minimising, `-inf` when maximising.
    pub fn worst_fitness(&self) -> f64 {
        if self.minimize {
            f64::INFINITY
        } else {
            f64::NEG_INFINITY
        }
    }

    /// Strict improvement; ties keep the incumbent.
    pub fn is_better(&self, candidate: f64, incumbent: f64) -> bool {
        if self.minimize {
            candidate < incumbent
        } else {
            candidate > incumbent
        }
    }

    pub fn is_at_least_as_good(&self, candidate: f64, incumbent: f64) -> bool {
        if self.minimize {
            candidate <= incumbent
        } else {
            candidate >= incumbent
        }
    }

    /// Whether `fitness` satisfies an early-stop `target`.
    pub fn meets_target(&self, fitness: f64, target: f64) -> bool {
        self.is_at_least_as_good(fitness, target)
    }

    /// Order two fitness values best-first.
    pub fn compare(&self, a: f64, b: f64) -> std::cmp::Ordering {
        let ord = a.total_cmp(&b);
        if self.minimize {
            ord
        } else {
            ord.reverse()
        }
    }

    pub fn contains(&self, position: &[f64]) -> bool {
        position.len() == self.dimensions
            && position
                .iter()
                .zip(&self.bounds)
                .all(|(x, (min, max))| x >= min && x <= max)
    }

    pub fn clamp(&self, dimension: usize, value: f64) -> f64 {
        let (min, max) = self.bounds[dimension];
        value.clamp(min, max)
    }

    /// Uniform sample in `[min, max)` per dimension.
    pub fn random_position<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
        self.bounds
            .iter()
            .map(|&(min, max)| rng.random_range(min..max))
            .collect()
    }

    /// Fresh value for one gene, drawn from that dimension's bounds.
    pub fn random_coordinate<R: Rng + ?Sized>(&self, dimension: usize, rng: &mut R) -> f64 {
        let (min, max) = self.bounds[dimension];
        rng.random_range(min..max)
    }
}

/// Process-wide name → objective mapping.
pub struct ObjectiveRegistry {
    functions: RwLock<HashMap<String, ObjectiveFn>>,
}

impl ObjectiveRegistry {
    pub fn new() -> Self {
        Self {
            functions: RwLock::new(HashMap::new()),
        }
    }

    /// Registry preloaded with `sphere`, `rastrigin`, `rosenbrock` and `ackley`.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register_fn("sphere", sphere);
        registry.register_fn("rastrigin", rastrigin);
        registry.register_fn("rosenbrock", rosenbrock);
        registry.register_fn("ackley", ackley);
        registry
    }

    pub fn register(&self, name: impl Into<String>, func: ObjectiveFn) {
        self.functions.write().insert(name.into(), func);
    }

    pub fn register_fn<F>(&self, name: impl Into<String>, func: F)
    where
        F: Fn(&[f64]) -> f64 + Send + Sync + 'static,
    {
        self.register(name, Arc::new(func));
    }

    pub fn get(&self, name: &str) -> Option<ObjectiveFunction> {
        self.functions
            .read()
            .get(name)
            .map(|func| ObjectiveFunction::named(name, func.clone()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.read().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for ObjectiveRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

pub fn sphere(x: &[f64]) -> f64 {
    x.iter().map(|v| v * v).sum()
}

pub fn rastrigin(x: &[f64]) -> f64 {
    10.0 * x.len() as f64
        + x.iter()
            .map(|v| v * v - 10.0 * (2.0 * PI * v).cos())
            .sum::<f64>()
}

pub fn rosenbrock(x: &[f64]) -> f64 {
    x.windows(2)
        .map(|w| 100.0 * (w[1] - w[0] * w[0]).powi(2) + (1.0 - w[0]).powi(2))
        .sum()
}

pub fn ackley(x: &[f64]) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    let n = x.len() as f64;
    let sum_sq = x.iter().map(|v| v * v).sum::<f64>() / n;
    let sum_cos = x.iter().map(|v| (2.0 * PI * v).cos()).sum::<f64>() / n;
    -20.0 * (-0.2 * sum_sq.sqrt()).exp() - sum_cos.exp() + 20.0 + E
}

/// Several objectives over one search space, each with its own sense.
#[derive(Debug, Clone)]
pub struct MultiObjectiveProblem {
    dimensions: usize,
    bounds: Vec<Bound>,
    objectives: Vec<ObjectiveFunction>,
    minimize: Vec<bool>,
}

impl MultiObjectiveProblem {
    pub fn new(
        dimensions: usize,
        bounds: Vec<Bound>,
        objectives: Vec<ObjectiveFunction>,
        minimize: Vec<bool>,
    ) -> Result<Self, ProblemError> {
        validate_bounds(dimensions, &bounds)?;
        if objectives.is_empty() {
            return Err(ProblemError::NoObjectives);
        }
        if minimize.len() != objectives.len() {
            return Err(ProblemError::LengthMismatch {
                expected: objectives.len(),
                actual: minimize.len(),
            });
        }
        Ok(Self {
            dimensions,
            bounds,
            objectives,
            minimize,
        })
    }

    pub fn objective_count(&self) -> usize {
        self.objectives.len()
    }

    pub fn evaluate(&self, position: &[f64]) -> Vec<f64> {
        self.objectives.iter().map(|f| f.call(position)).collect()
    }

    pub fn solution(&self, position: Vec<f64>) -> SwarmSolution {
        let fitness = self.evaluate(&position);
        SwarmSolution::new(position, Fitness::Vector(fitness))
    }

    /// Pareto dominance: `a` is no worse on every objective and strictly
    /// better on at least one.
    pub fn dominates(&self, a: &[f64], b: &[f64]) -> bool {
        if a.len() != self.minimize.len() || b.len() != self.minimize.len() {
            return false;
        }
        let mut strictly_better = false;
        for ((&fa, &fb), &minimize) in a.iter().zip(b).zip(&self.minimize) {
            let (better, worse) = if minimize {
                (fa < fb, fa > fb)
            } else {
                (fa > fb, fa < fb)
            };
            if worse {
                return false;
            }
            strictly_better |= better;
        }
        strictly_better
    }

    /// Scalarise into a single minimisation problem. Maximised objectives
    /// enter the sum negated.
    pub fn weighted_sum(&self, weights: &[f64]) -> Result<OptimizationProblem, ProblemError> {
        if weights.len() != self.objectives.len() {
            return Err(ProblemError::LengthMismatch {
                expected: self.objectives.len(),
                actual: weights.len(),
            });
        }
        let terms: Vec<(f64, ObjectiveFunction)> = weights
            .iter()
            .zip(&self.objectives)
            .zip(&self.minimize)
            .map(|((&w, f), &minimize)| (if minimize { w } else { -w }, f.clone()))
            .collect();
        let objective = ObjectiveFunction::anonymous(move |x: &[f64]| {
            terms.iter().map(|(w, f)| w * f.call(x)).sum::<f64>()
        });
        OptimizationProblem::new(self.dimensions, self.bounds.clone(), objective, true)
    }
}

/// A base problem plus constraints `g_i(x) <= 0`.
#[derive(Clone)]
pub struct ConstrainedProblem {
    base: OptimizationProblem,
    constraints: Vec<ConstraintFn>,
}

impl ConstrainedProblem {
    pub fn new(base: OptimizationProblem, constraints: Vec<ConstraintFn>) -> Self {
        Self { base, constraints }
    }

    pub fn base(&self) -> &OptimizationProblem {
        &self.base
    }

    /// Sum of positive constraint values; zero iff feasible.
    pub fn violation(&self, position: &[f64]) -> f64 {
        self.constraints
            .iter()
            .map(|g| g(position).max(0.0))
            .sum()
    }

    pub fn is_feasible(&self, position: &[f64]) -> bool {
        self.constraints.iter().all(|g| g(position) <= 0.0)
    }

    pub fn solution(&self, position: Vec<f64>) -> SwarmSolution {
        let fitness = self.base.evaluate(&position);
        let mut solution = SwarmSolution::new(position, Fitness::Scalar(fitness));
        solution.is_feasible = self.is_feasible(&solution.position);
        solution
    }

    /// Problem whose objective is worsened by `coefficient * violation`.
    pub fn penalized(&self, coefficient: f64) -> OptimizationProblem {
        let this = self.clone();
        let sign = if self.base.is_minimization() { 1.0 } else { -1.0 };
        let objective = ObjectiveFunction::anonymous(move |x: &[f64]| {
            this.base.objective().call(x) + sign * coefficient * this.violation(x)
        });
        OptimizationProblem {
            dimensions: self.base.dimensions,
            bounds: self.base.bounds.clone(),
            objective,
            minimize: self.base.minimize,
        }
    }
}

impl fmt::Debug for ConstrainedProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstrainedProblem")
            .field("base", &self.base)
            .field("constraints", &self.constraints.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sphere_problem(bounds: Vec<Bound>) -> Result<OptimizationProblem, ProblemError> {
        let registry = ObjectiveRegistry::with_builtins();
        OptimizationProblem::new(bounds.len(), bounds, registry.get("sphere").unwrap(), true)
    }

    #[test]
    fn test_invalid_bounds_fail_construction() {
        let objective = ObjectiveFunction::anonymous(sphere);
        assert_eq!(
            OptimizationProblem::new(2, vec![(-1.0, 1.0)], objective.clone(), true).unwrap_err(),
            ProblemError::BoundsMismatch { dimensions: 2, bounds: 1 }
        );
        assert!(matches!(
            OptimizationProblem::new(1, vec![(1.0, 1.0)], objective.clone(), true),
            Err(ProblemError::InvalidBound { index: 0, .. })
        ));
        assert!(matches!(
            OptimizationProblem::new(2, vec![(0.0, 1.0), (3.0, -3.0)], objective.clone(), true),
            Err(ProblemError::InvalidBound { index: 1, .. })
        ));
        assert!(matches!(
            OptimizationProblem::new(1, vec![(f64::NAN, 1.0)], objective.clone(), true),
            Err(ProblemError::InvalidBound { .. })
        ));
        assert_eq!(
            OptimizationProblem::new(0, vec![], objective, true).unwrap_err(),
            ProblemError::NoDimensions
        );
    }

    #[test]
    fn test_valid_problem_and_random_positions() {
        let problem = sphere_problem(vec![(-5.0, 5.0), (0.0, 1.0)]).unwrap();
        assert_eq!(problem.bounds().len(), problem.dimensions());
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let x = problem.random_position(&mut rng);
            assert!(problem.contains(&x));
        }
        assert_eq!(problem.evaluate(&[3.0, 4.0]), 25.0);
        assert_eq!(problem.worst_fitness(), f64::INFINITY);
    }

    #[test]
    fn test_sense_comparisons() {
        let min = sphere_problem(vec![(-1.0, 1.0)]).unwrap();
        assert!(min.is_better(1.0, 2.0));
        assert!(!min.is_better(2.0, 2.0));
        assert!(min.is_at_least_as_good(2.0, 2.0));

        let max = OptimizationProblem::new(
            1,
            vec![(-1.0, 1.0)],
            ObjectiveFunction::anonymous(|x: &[f64]| x[0]),
            false,
        )
        .unwrap();
        assert!(max.is_better(3.0, 2.0));
        assert_eq!(max.worst_fitness(), f64::NEG_INFINITY);
        assert!(max.meets_target(5.0, 4.0));
        assert_eq!(max.sanitize(f64::NAN), f64::NEG_INFINITY);
    }

    #[test]
    fn test_definition_round_trip_through_registry() {
        let registry = ObjectiveRegistry::with_builtins();
        let problem = sphere_problem(vec![(-2.0, 2.0)]).unwrap();
        let definition = problem.definition();
        assert_eq!(definition.objective_function_name.as_deref(), Some("sphere"));

        let restored = OptimizationProblem::from_definition(&definition, &registry).unwrap();
        assert_eq!(restored.definition(), definition);

        let mut unknown = definition.clone();
        unknown.objective_function_name = Some("nope".to_string());
        assert_eq!(
            OptimizationProblem::from_definition(&unknown, &registry).unwrap_err(),
            ProblemError::UnknownObjective("nope".to_string())
        );
    }

    #[test]
    fn test_builtin_objectives_at_optimum() {
        assert_eq!(sphere(&[0.0, 0.0]), 0.0);
        assert!(rastrigin(&[0.0, 0.0]).abs() < 1e-12);
        assert_eq!(rosenbrock(&[1.0, 1.0, 1.0]), 0.0);
        assert!(ackley(&[0.0, 0.0]).abs() < 1e-12);
    }

    #[test]
    fn test_multi_objective_dominance_and_weighted_sum() {
        let problem = MultiObjectiveProblem::new(
            1,
            vec![(-2.0, 2.0)],
            vec![
                ObjectiveFunction::anonymous(|x: &[f64]| x[0] * x[0]),
                ObjectiveFunction::anonymous(|x: &[f64]| x[0]),
            ],
            vec![true, false],
        )
        .unwrap();

        assert_eq!(problem.evaluate(&[1.5]), vec![2.25, 1.5]);
        assert!(problem.dominates(&[1.0, 2.0], &[2.0, 1.0]));
        assert!(!problem.dominates(&[1.0, 1.0], &[1.0, 1.0]));
        assert!(!problem.dominates(&[0.5, 0.5], &[1.0, 1.0]));

        let scalar = problem.weighted_sum(&[1.0, 2.0]).unwrap();
        assert!(scalar.is_minimization());
        assert_eq!(scalar.evaluate(&[1.0]), 1.0 - 2.0);
        assert!(problem.weighted_sum(&[1.0]).is_err());
    }

    #[test]
    fn test_constrained_violation_and_penalty() {
        let base = sphere_problem(vec![(-5.0, 5.0)]).unwrap();
        // x >= 1
        let constrained = ConstrainedProblem::new(base, vec![Arc::new(|x: &[f64]| 1.0 - x[0])]);

        assert_eq!(constrained.violation(&[0.0]), 1.0);
        assert_eq!(constrained.violation(&[2.0]), 0.0);
        assert!(!constrained.is_feasible(&[0.5]));
        assert!(constrained.solution(vec![3.0]).is_feasible);

        let penalized = constrained.penalized(10.0);
        assert_eq!(penalized.evaluate(&[0.0]), 10.0);
        assert_eq!(penalized.evaluate(&[2.0]), 4.0);
        assert!(penalized.objective_name().is_none());
    }
}
