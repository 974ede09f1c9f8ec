// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Swarm Manager
//!
//! Owns the swarm table and drives one iteration loop per running swarm.
//!
//! Each swarm sits behind its own [`SwarmHandle`]; the table lock only covers
//! registration, lookup and removal. A running swarm's loop owns its algorithm
//! instance and observes cancellation once per iteration boundary, so an
//! evaluation batch already in flight always finishes first.
//!
//! Lock order, where both are taken: `run_loop` before `state`.

use chrono::Utc;
use colony_core::domain::agent::AgentId;
use colony_core::domain::events::SwarmEvent;
use colony_core::domain::node_config::SwarmSettings;
use colony_core::infrastructure::agent_registry::InMemoryAgentRegistry;
use colony_core::infrastructure::event_bus::EventBus;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::application::dispatcher::EvaluationDispatcher;
use crate::domain::algorithm::create_algorithm;
use crate::domain::problem::ObjectiveRegistry;
use crate::domain::swarm::{Swarm, SwarmConfig, SwarmError, SwarmId, SwarmSolution, SwarmStatus};
use crate::infrastructure::checkpoint::{Checkpoint, CheckpointError, CheckpointStore, SwarmRecord};

type SwarmTable = Arc<RwLock<HashMap<SwarmId, Arc<SwarmHandle>>>>;

struct LoopHandle {
    token: CancellationToken,
}

struct SwarmHandle {
    state: Mutex<Swarm>,
    run_loop: Mutex<Option<LoopHandle>>,
    finished: Notify,
}

impl SwarmHandle {
    fn new(swarm: Swarm) -> Self {
        Self {
            state: Mutex::new(swarm),
            run_loop: Mutex::new(None),
            finished: Notify::new(),
        }
    }

    fn has_loop(&self) -> bool {
        self.run_loop.lock().is_some()
    }
}

/// Writes the whole swarm table to the checkpoint file.
#[derive(Clone)]
struct Persister {
    swarms: SwarmTable,
    store: Option<Arc<CheckpointStore>>,
    auto_persist: bool,
}

impl Persister {
    fn snapshot(&self) -> Checkpoint {
        let handles: Vec<Arc<SwarmHandle>> = self.swarms.read().values().cloned().collect();
        handles
            .iter()
            .map(|h| {
                let swarm = h.state.lock();
                (swarm.id.to_string(), SwarmRecord::from_swarm(&swarm))
            })
            .collect()
    }

    async fn save(&self) -> Result<(), CheckpointError> {
        match &self.store {
            Some(store) => store.save_with(|| self.snapshot()).await,
            None => Ok(()),
        }
    }

    /// Auto-persist hook; failures are logged, never propagated.
    async fn persist(&self) {
        if !self.auto_persist {
            return;
        }
        if let Err(e) = self.save().await {
            warn!("Failed to persist swarm checkpoint: {}", e);
        }
    }
}

pub struct SwarmManager {
    swarms: SwarmTable,
    dispatcher: Arc<EvaluationDispatcher>,
    objectives: Arc<ObjectiveRegistry>,
    persister: Persister,
    events: EventBus,
    agents: Option<Arc<InMemoryAgentRegistry>>,
    iteration_delay: Duration,
}

impl SwarmManager {
    pub fn new(
        settings: &SwarmSettings,
        dispatcher: EvaluationDispatcher,
        objectives: Arc<ObjectiveRegistry>,
        events: EventBus,
    ) -> Self {
        let swarms: SwarmTable = Arc::new(RwLock::new(HashMap::new()));
        let store = settings
            .checkpoint_path
            .as_ref()
            .map(|path| Arc::new(CheckpointStore::new(path.clone())));
        Self {
            persister: Persister {
                swarms: swarms.clone(),
                store,
                auto_persist: settings.auto_persist,
            },
            swarms,
            dispatcher: Arc::new(dispatcher),
            objectives,
            events,
            agents: None,
            iteration_delay: settings.iteration_delay,
        }
    }

    /// Resolve members against `agents` and keep their swarm reference current.
    pub fn with_agent_registry(mut self, agents: Arc<InMemoryAgentRegistry>) -> Self {
        self.agents = Some(agents);
        self
    }

    pub fn objectives(&self) -> &Arc<ObjectiveRegistry> {
        &self.objectives
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    fn handle(&self, id: SwarmId) -> Result<Arc<SwarmHandle>, SwarmError> {
        self.swarms.read().get(&id).cloned().ok_or(SwarmError::NotFound(id))
    }

    pub async fn create_swarm(&self, config: SwarmConfig) -> Result<SwarmId, SwarmError> {
        let swarm = Swarm::new(config)?;
        let id = swarm.id;
        let name = swarm.name.clone();
        if swarm.problem().objective_name().is_none() && self.persister.store.is_some() {
            warn!("Swarm '{}' uses an anonymous objective and cannot be restored from a checkpoint", name);
        }

        self.swarms.write().insert(id, Arc::new(SwarmHandle::new(swarm)));
        info!("Created swarm {} ('{}')", id, name);
        self.events.publish_swarm_event(SwarmEvent::SwarmCreated {
            swarm_id: id,
            name,
            created_at: Utc::now(),
        });
        self.persister.persist().await;
        Ok(id)
    }

    /// Idempotent while running. A swarm in ERROR must be recreated.
    pub async fn start_swarm(&self, id: SwarmId) -> Result<(), SwarmError> {
        let handle = self.handle(id)?;
        {
            let mut run_loop = handle.run_loop.lock();
            let mut swarm = handle.state.lock();
            if run_loop.is_some() {
                if swarm.status == SwarmStatus::Running {
                    debug!("Swarm {} already running", id);
                    return Ok(());
                }
                // Stopped but the previous loop has not exited yet.
                return Err(SwarmError::InvalidState {
                    swarm_id: id,
                    status: swarm.status,
                    operation: "start",
                });
            }
            if swarm.status == SwarmStatus::Error {
                return Err(SwarmError::InvalidState {
                    swarm_id: id,
                    status: swarm.status,
                    operation: "start",
                });
            }

            swarm.status = SwarmStatus::Running;
            swarm.touch();
            let token = CancellationToken::new();
            let ctx = LoopContext {
                handle: handle.clone(),
                dispatcher: self.dispatcher.clone(),
                persister: self.persister.clone(),
                events: self.events.clone(),
                iteration_delay: self.iteration_delay,
            };
            self.events.publish_swarm_event(SwarmEvent::SwarmStarted {
                swarm_id: id,
                started_at: Utc::now(),
            });
            tokio::spawn(ctx.run(token.clone()));
            *run_loop = Some(LoopHandle { token });
        }

        info!("Started swarm {}", id);
        self.persister.persist().await;
        Ok(())
    }

    /// Cooperative: the loop exits at its next iteration boundary. A swarm
    /// that is not running is left untouched.
    pub async fn stop_swarm(&self, id: SwarmId) -> Result<(), SwarmError> {
        let handle = self.handle(id)?;
        let token = {
            let run_loop = handle.run_loop.lock();
            let mut swarm = handle.state.lock();
            if swarm.status != SwarmStatus::Running {
                debug!("Swarm {} is {}; nothing to stop", id, swarm.status);
                return Ok(());
            }
            swarm.status = SwarmStatus::Stopped;
            swarm.touch();
            run_loop.as_ref().map(|l| l.token.clone())
        };
        if let Some(token) = token {
            token.cancel();
        }
        info!("Stopping swarm {}", id);
        self.persister.persist().await;
        Ok(())
    }

    /// Resolves once the swarm has no live loop.
    pub async fn wait_for_swarm(&self, id: SwarmId) -> Result<Swarm, SwarmError> {
        let handle = self.handle(id)?;
        loop {
            let finished = handle.finished.notified();
            tokio::pin!(finished);
            finished.as_mut().enable();
            if !handle.has_loop() {
                break;
            }
            finished.await;
        }
        let swarm = handle.state.lock().clone();
        Ok(swarm)
    }

    pub async fn delete_swarm(&self, id: SwarmId) -> Result<(), SwarmError> {
        self.stop_swarm(id).await?;
        let swarm = self.wait_for_swarm(id).await?;
        self.swarms.write().remove(&id);

        if let Some(agents) = &self.agents {
            for agent_id in &swarm.agents {
                if let Some(agent) = agents.get(*agent_id) {
                    if agent.swarm() == Some(id) {
                        agent.leave_swarm();
                    }
                }
            }
        }
        info!("Deleted swarm {}", id);
        self.persister.persist().await;
        Ok(())
    }

    pub fn get_swarm(&self, id: SwarmId) -> Result<Swarm, SwarmError> {
        let handle = self.handle(id)?;
        let swarm = handle.state.lock().clone();
        Ok(swarm)
    }

    /// Oldest first.
    pub fn list_swarms(&self) -> Vec<Swarm> {
        let handles: Vec<Arc<SwarmHandle>> = self.swarms.read().values().cloned().collect();
        let mut swarms: Vec<Swarm> = handles.iter().map(|h| h.state.lock().clone()).collect();
        swarms.sort_by_key(|s| s.created_at);
        swarms
    }

    pub async fn add_agent_to_swarm(&self, id: SwarmId, agent_id: AgentId) -> Result<(), SwarmError> {
        let handle = self.handle(id)?;
        if let Some(agents) = &self.agents {
            let agent = agents.get(agent_id).ok_or(SwarmError::AgentNotFound(agent_id))?;
            match agent.swarm() {
                Some(other) if other != id => {
                    return Err(SwarmError::Configuration(format!(
                        "agent {} already belongs to swarm {}",
                        agent_id, other
                    )));
                }
                _ => agent.join_swarm(id),
            }
        }

        if handle.state.lock().add_agent(agent_id) {
            info!("Agent {} joined swarm {}", agent_id, id);
            self.persister.persist().await;
        }
        Ok(())
    }

    pub async fn remove_agent_from_swarm(&self, id: SwarmId, agent_id: AgentId) -> Result<(), SwarmError> {
        let handle = self.handle(id)?;
        let removed = handle.state.lock().remove_agent(agent_id);
        if let Some(agent) = self.agents.as_ref().and_then(|a| a.get(agent_id)) {
            if agent.swarm() == Some(id) {
                agent.leave_swarm();
            }
        }
        if removed {
            info!("Agent {} left swarm {}", agent_id, id);
            self.persister.persist().await;
        }
        Ok(())
    }

    /// Write the checkpoint now, regardless of `auto_persist`.
    pub async fn save_checkpoint(&self) -> Result<(), CheckpointError> {
        self.persister.save().await
    }

    /// Load swarms from the checkpoint file. Returns how many were restored.
    pub async fn restore(&self) -> Result<usize, CheckpointError> {
        let Some(store) = &self.persister.store else {
            return Ok(0);
        };
        let checkpoint = store.load().await?;
        let mut restored = 0;
        for (key, record) in checkpoint {
            let mut swarm = match record.into_swarm(&self.objectives) {
                Ok(swarm) => swarm,
                Err(e) => {
                    warn!("Skipping checkpointed swarm {}: {}", key, e);
                    continue;
                }
            };
            if swarm.status == SwarmStatus::Running {
                swarm.status = SwarmStatus::Stopped;
            }
            debug!("Restored swarm {} ('{}') as {}", swarm.id, swarm.name, swarm.status);
            self.swarms.write().insert(swarm.id, Arc::new(SwarmHandle::new(swarm)));
            restored += 1;
        }
        info!("Restored {} swarm(s) from {:?}", restored, store.path());
        Ok(restored)
    }

    /// Stop every running swarm and wait for the loops to exit.
    pub async fn shutdown(&self) {
        let ids: Vec<SwarmId> = self.swarms.read().keys().copied().collect();
        for id in ids {
            if let Err(e) = self.stop_swarm(id).await {
                warn!("Failed to stop swarm {} during shutdown: {}", id, e);
                continue;
            }
            let _ = self.wait_for_swarm(id).await;
        }
    }
}

/// Everything one iteration loop needs, detached from the manager.
struct LoopContext {
    handle: Arc<SwarmHandle>,
    dispatcher: Arc<EvaluationDispatcher>,
    persister: Persister,
    events: EventBus,
    iteration_delay: Duration,
}

impl LoopContext {
    async fn run(self, token: CancellationToken) {
        let id = self.handle.state.lock().id;
        let outcome = match AssertUnwindSafe(self.iterate(&token)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => Err(SwarmError::Loop(panic_message(panic.as_ref()))),
        };

        let status = match outcome {
            Ok(status) => status,
            Err(e) => {
                error!("Swarm {} failed: {}", id, e);
                SwarmStatus::Error
            }
        };

        let iteration = {
            let mut swarm = self.handle.state.lock();
            swarm.status = status;
            swarm.touch();
            swarm.current_iteration
        };
        info!("Swarm {} finished as {} after {} iteration(s)", id, status, iteration);
        self.persister.persist().await;
        self.events.publish_swarm_event(SwarmEvent::SwarmFinished {
            swarm_id: id,
            status,
            iteration,
            finished_at: Utc::now(),
        });

        self.handle.run_loop.lock().take();
        self.handle.finished.notify_waiters();
    }

    /// Returns the status the swarm should end in.
    async fn iterate(&self, token: &CancellationToken) -> Result<SwarmStatus, SwarmError> {
        let (id, config, mut iteration, mut members) = {
            let swarm = self.handle.state.lock();
            (swarm.id, swarm.config.clone(), swarm.current_iteration, swarm.agents.clone())
        };
        let problem = &config.problem;

        let mut algorithm = create_algorithm(&config.algorithm_type, &config.algorithm_params)?;
        algorithm.initialize(problem, &members)?;
        if let Some(best) = algorithm.global_best() {
            self.offer_best(id, iteration, &best).await;
        }
        let mut positions = algorithm.current_positions();
        debug!(
            "Swarm {} initialised {} with {} candidate(s)",
            id,
            algorithm.name(),
            positions.len()
        );

        while iteration < config.max_iterations {
            let (status, shared) = {
                let swarm = self.handle.state.lock();
                members = swarm.agents.clone();
                (swarm.status, swarm.shared_data.clone())
            };
            if token.is_cancelled() || status != SwarmStatus::Running {
                return Ok(SwarmStatus::Stopped);
            }

            let fitness = self.dispatcher.evaluate(id, problem, &positions, &members).await;
            algorithm.absorb_fitness(problem, &fitness)?;

            let mut shared = shared;
            let candidates = algorithm.advance(problem, &members, iteration, &mut shared)?;
            if algorithm.requires_selection() {
                let candidate_fitness = self.dispatcher.evaluate(id, problem, &candidates, &members).await;
                algorithm.select(problem, &candidates, &candidate_fitness)?;
                positions = algorithm.current_positions();
            } else {
                positions = candidates;
            }

            iteration += 1;
            {
                let mut swarm = self.handle.state.lock();
                swarm.current_iteration = iteration;
                swarm.shared_data = shared;
                swarm.touch();
            }
            metrics::counter!("colony_swarm_iterations_total").increment(1);
            if let Some(best) = algorithm.global_best() {
                self.offer_best(id, iteration, &best).await;
            }

            let best = self.handle.state.lock().best_solution.clone();
            debug!(
                "Swarm {} iteration {}/{} best {:?}",
                id,
                iteration,
                config.max_iterations,
                best.as_ref().and_then(SwarmSolution::fitness_value)
            );
            if algorithm.should_terminate(
                iteration,
                config.max_iterations,
                best.as_ref(),
                config.target_fitness,
                problem,
            ) {
                return Ok(SwarmStatus::Completed);
            }

            tokio::select! {
                _ = token.cancelled() => return Ok(SwarmStatus::Stopped),
                _ = tokio::time::sleep(self.iteration_delay) => {}
            }
        }
        Ok(SwarmStatus::Completed)
    }

    /// Record `best` if it strictly improves on the swarm's snapshot.
    async fn offer_best(&self, id: SwarmId, iteration: u64, best: &SwarmSolution) {
        let improved = self.handle.state.lock().offer_best(best);
        if !improved {
            return;
        }
        let fitness = best.fitness_value().unwrap_or(f64::NAN);
        info!("Swarm {} improved best fitness to {} at iteration {}", id, fitness, iteration);
        self.events.publish_swarm_event(SwarmEvent::SwarmBestImproved {
            swarm_id: id,
            iteration,
            fitness,
            improved_at: Utc::now(),
        });
        self.persister.persist().await;
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic in swarm loop".to_string()
    }
}
