// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Swarm Checkpoint File
//!
//! JSON object mapping swarm id to [`SwarmRecord`]. Writes go to a sibling
//! temp file which is then renamed over the checkpoint, so readers never see
//! a partial file. Objectives are stored by name and resolved through the
//! [`ObjectiveRegistry`] on load.

use chrono::{DateTime, Utc};
use colony_core::domain::agent::AgentId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::domain::problem::{ObjectiveRegistry, OptimizationProblem, ProblemDefinition, ProblemError};
use crate::domain::swarm::{Swarm, SwarmConfig, SwarmId, SwarmSolution, SwarmStatus};

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("checkpoint is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("cannot restore swarm: {0}")]
    Problem(#[from] ProblemError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmConfigRecord {
    pub name: String,
    pub algorithm_type: String,
    #[serde(default)]
    pub algorithm_params: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub objective_description: String,
    pub max_iterations: u64,
    #[serde(default)]
    pub target_fitness: Option<f64>,
    pub problem_definition: ProblemDefinition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmRecord {
    pub id: SwarmId,
    pub name: String,
    pub status: SwarmStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub config: SwarmConfigRecord,
    #[serde(default)]
    pub agents: Vec<AgentId>,
    #[serde(default)]
    pub current_iteration: u64,
    #[serde(default)]
    pub best_solution_found: Option<SwarmSolution>,
    #[serde(default)]
    pub shared_data: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub task_queue: Vec<serde_json::Value>,
}

impl SwarmRecord {
    pub fn from_swarm(swarm: &Swarm) -> Self {
        let config = &swarm.config;
        Self {
            id: swarm.id,
            name: swarm.name.clone(),
            status: swarm.status,
            created_at: swarm.created_at,
            updated_at: swarm.updated_at,
            config: SwarmConfigRecord {
                name: config.name.clone(),
                algorithm_type: config.algorithm_type.clone(),
                algorithm_params: config.algorithm_params.clone(),
                objective_description: config.objective_description.clone(),
                max_iterations: config.max_iterations,
                target_fitness: config.target_fitness,
                problem_definition: config.problem.definition(),
            },
            agents: swarm.agents.clone(),
            current_iteration: swarm.current_iteration,
            best_solution_found: swarm.best_solution.clone(),
            shared_data: swarm.shared_data.clone(),
            task_queue: swarm.task_queue.clone(),
        }
    }

    /// Rebuild the swarm, resolving its objective by name.
    pub fn into_swarm(self, registry: &ObjectiveRegistry) -> Result<Swarm, CheckpointError> {
        let problem = OptimizationProblem::from_definition(&self.config.problem_definition, registry)?;
        Ok(Swarm {
            id: self.id,
            name: self.name,
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
            config: SwarmConfig {
                name: self.config.name,
                algorithm_type: self.config.algorithm_type,
                algorithm_params: self.config.algorithm_params,
                objective_description: self.config.objective_description,
                max_iterations: self.config.max_iterations,
                target_fitness: self.config.target_fitness,
                problem,
            },
            agents: self.agents,
            current_iteration: self.current_iteration,
            best_solution: self.best_solution_found,
            shared_data: self.shared_data,
            task_queue: self.task_queue,
        })
    }
}

pub type Checkpoint = BTreeMap<String, SwarmRecord>;

pub struct CheckpointStore {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }

    pub async fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        self.save_with(|| checkpoint.clone()).await
    }

    /// Take the snapshot under the write lock, so writes land in the order
    /// their snapshots were taken.
    pub async fn save_with<F>(&self, snapshot: F) -> Result<(), CheckpointError>
    where
        F: FnOnce() -> Checkpoint,
    {
        let _guard = self.write_lock.lock().await;
        let checkpoint = snapshot();
        let json = serde_json::to_vec_pretty(&checkpoint)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!("Wrote checkpoint with {} swarm(s) to {:?}", checkpoint.len(), self.path);
        Ok(())
    }

    /// A missing file is an empty checkpoint.
    pub async fn load(&self) -> Result<Checkpoint, CheckpointError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Checkpoint::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn swarm(registry: &ObjectiveRegistry) -> Swarm {
        let problem = OptimizationProblem::new(
            2,
            vec![(-5.0, 5.0), (0.0, 1.0)],
            registry.get("rosenbrock").unwrap(),
            false,
        )
        .unwrap();
        let config = crate::domain::swarm::SwarmConfig::new("persisted", "de", problem)
            .with_params(json!({"population_size": 8}))
            .with_max_iterations(50)
            .with_target_fitness(1.5);
        let mut swarm = Swarm::new(config).unwrap();
        swarm.status = SwarmStatus::Completed;
        swarm.add_agent(AgentId::new());
        swarm.current_iteration = 17;
        swarm.offer_best(&SwarmSolution::scalar(vec![0.5, 0.25], 1.25));
        swarm.shared_data.insert("phase".to_string(), json!("explore"));
        swarm
    }

    #[tokio::test]
    async fn test_round_trip_preserves_observable_state() {
        let registry = ObjectiveRegistry::with_builtins();
        let original = swarm(&registry);
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("nested").join("swarms.json"));

        let mut checkpoint = Checkpoint::new();
        checkpoint.insert(original.id.to_string(), SwarmRecord::from_swarm(&original));
        store.save(&checkpoint).await.unwrap();
        assert!(!store.temp_path().exists());

        let mut loaded = store.load().await.unwrap();
        let record = loaded.remove(&original.id.to_string()).unwrap();
        let restored = record.into_swarm(&registry).unwrap();

        assert_eq!(restored.id, original.id);
        assert_eq!(restored.name, original.name);
        assert_eq!(restored.status, original.status);
        assert_eq!(restored.agents, original.agents);
        assert_eq!(restored.current_iteration, original.current_iteration);
        assert_eq!(restored.best_solution, original.best_solution);
        assert_eq!(restored.problem().definition(), original.problem().definition());
        assert_eq!(restored.problem().objective_name(), Some("rosenbrock"));
        assert_eq!(restored.config.target_fitness, Some(1.5));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_saves_keep_the_latest_snapshot() {
        use std::sync::atomic::{AtomicU64, Ordering};
        use std::sync::Arc;

        let registry = ObjectiveRegistry::with_builtins();
        let base = SwarmRecord::from_swarm(&swarm(&registry));
        let key = base.id.to_string();
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(CheckpointStore::new(dir.path().join("swarms.json")));
        let taken = Arc::new(AtomicU64::new(0));

        let writers: Vec<_> = (0..32)
            .map(|_| {
                let store = store.clone();
                let taken = taken.clone();
                let base = base.clone();
                let key = key.clone();
                tokio::spawn(async move {
                    store
                        .save_with(|| {
                            let mut record = base;
                            record.current_iteration = taken.fetch_add(1, Ordering::SeqCst) + 1;
                            Checkpoint::from([(key, record)])
                        })
                        .await
                        .unwrap();
                })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap();
        }

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded[&key].current_iteration, 32);
    }

    #[tokio::test]
    async fn test_wire_format() {
        let registry = ObjectiveRegistry::with_builtins();
        let record = SwarmRecord::from_swarm(&swarm(&registry));
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["status"], json!(4));
        assert_eq!(value["config"]["problem_definition"]["objective_function_name"], "rosenbrock");
        assert_eq!(value["config"]["problem_definition"]["is_minimization"], false);
        assert_eq!(value["config"]["problem_definition"]["bounds"], json!([[-5.0, 5.0], [0.0, 1.0]]));
        assert_eq!(value["best_solution_found"]["fitness"], json!(1.25));
        assert_eq!(value["best_solution_found"]["is_feasible"], true);
        assert!(value["task_queue"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_and_unknown_objective_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("absent.json"));
        assert!(store.load().await.unwrap().is_empty());

        let registry = ObjectiveRegistry::with_builtins();
        let mut record = SwarmRecord::from_swarm(&swarm(&registry));
        record.config.problem_definition.objective_function_name = Some("custom".to_string());
        assert!(matches!(
            record.into_swarm(&registry),
            Err(CheckpointError::Problem(ProblemError::UnknownObjective(_)))
        ));
    }
}
