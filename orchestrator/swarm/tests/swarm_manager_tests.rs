// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use colony_core::application::{AgentLifecycleService, StandardAgentLifecycleService};
use colony_core::domain::ability::AbilityRegistry;
use colony_core::domain::agent::{AgentConfig, AgentError, AgentId, AgentType};
use colony_core::domain::events::SwarmEvent;
use colony_core::domain::node_config::{AgentSettings, SwarmSettings};
use colony_core::infrastructure::agent_registry::InMemoryAgentRegistry;
use colony_core::infrastructure::event_bus::{DomainEvent, EventBus};
use colony_swarm::application::{EvaluationDispatcher, SwarmManager};
use colony_swarm::domain::problem::{ObjectiveRegistry, OptimizationProblem};
use colony_swarm::domain::swarm::{SwarmConfig, SwarmError, SwarmStatus};
use colony_swarm::infrastructure::agent_client::AgentEvaluationClient;
use colony_swarm::infrastructure::broker::{BrokerPool, EvaluationWorker, MemoryBrokerConnector};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn settings(checkpoint_path: Option<PathBuf>) -> SwarmSettings {
    SwarmSettings {
        checkpoint_path,
        auto_persist: true,
        iteration_delay: Duration::from_millis(1),
    }
}

fn manager_with(dispatcher: EvaluationDispatcher, objectives: Arc<ObjectiveRegistry>) -> SwarmManager {
    SwarmManager::new(&settings(None), dispatcher, objectives, EventBus::new(10_000))
}

fn problem(objective: &str, dimensions: usize, minimize: bool) -> OptimizationProblem {
    let registry = ObjectiveRegistry::with_builtins();
    OptimizationProblem::new(
        dimensions,
        vec![(-5.12, 5.12); dimensions],
        registry.get(objective).unwrap(),
        minimize,
    )
    .unwrap()
}

/// Best-fitness values in the order they were announced.
fn improvements(events: &mut colony_core::infrastructure::event_bus::EventReceiver) -> Vec<(u64, f64)> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let DomainEvent::Swarm(SwarmEvent::SwarmBestImproved { iteration, fitness, .. }) = event {
            seen.push((iteration, fitness));
        }
    }
    seen
}

#[tokio::test]
async fn test_best_fitness_is_monotone_for_every_algorithm() {
    for algorithm in ["pso", "de", "ga"] {
        let manager = manager_with(EvaluationDispatcher::local(), Arc::new(ObjectiveRegistry::with_builtins()));
        let mut events = manager.events().subscribe();
        let config = SwarmConfig::new(format!("{}-min", algorithm), algorithm, problem("rastrigin", 3, true))
            .with_params(json!({"population_size": 12, "seed": 5}))
            .with_max_iterations(30);
        let id = manager.create_swarm(config).await.unwrap();
        manager.start_swarm(id).await.unwrap();
        let swarm = manager.wait_for_swarm(id).await.unwrap();
        assert_eq!(swarm.status, SwarmStatus::Completed, "{}", algorithm);

        let seen = improvements(&mut events);
        assert!(!seen.is_empty(), "{}", algorithm);
        for pair in seen.windows(2) {
            assert!(pair[1].1 < pair[0].1, "{} regressed: {:?}", algorithm, pair);
            assert!(pair[1].0 >= pair[0].0);
        }
        assert_eq!(swarm.best_fitness(), seen.last().map(|(_, f)| *f));
    }
}

#[tokio::test]
async fn test_maximisation_improvements_increase() {
    let manager = manager_with(EvaluationDispatcher::local(), Arc::new(ObjectiveRegistry::with_builtins()));
    let mut events = manager.events().subscribe();
    let config = SwarmConfig::new("max", "de", problem("sphere", 2, false))
        .with_params(json!({"population_size": 10, "seed": 3}))
        .with_max_iterations(25);
    let id = manager.create_swarm(config).await.unwrap();
    manager.start_swarm(id).await.unwrap();
    manager.wait_for_swarm(id).await.unwrap();

    let seen = improvements(&mut events);
    assert!(seen.windows(2).all(|p| p[1].1 > p[0].1));
}

#[tokio::test]
async fn test_target_fitness_stops_early() {
    let manager = manager_with(EvaluationDispatcher::local(), Arc::new(ObjectiveRegistry::with_builtins()));
    let config = SwarmConfig::new("easy", "pso", problem("sphere", 1, true))
        .with_params(json!({"population_size": 20, "seed": 1}))
        .with_max_iterations(10_000)
        .with_target_fitness(1.0);
    let id = manager.create_swarm(config).await.unwrap();
    manager.start_swarm(id).await.unwrap();

    let swarm = manager.wait_for_swarm(id).await.unwrap();
    assert_eq!(swarm.status, SwarmStatus::Completed);
    assert!(swarm.current_iteration < 10_000);
    assert!(swarm.best_fitness().unwrap() <= 1.0);
}

#[tokio::test]
async fn test_restart_continues_from_current_iteration() {
    let manager = SwarmManager::new(
        &SwarmSettings {
            iteration_delay: Duration::from_millis(5),
            ..settings(None)
        },
        EvaluationDispatcher::local(),
        Arc::new(ObjectiveRegistry::with_builtins()),
        EventBus::new(10_000),
    );
    let config = SwarmConfig::new("resume", "pso", problem("sphere", 2, true))
        .with_params(json!({"population_size": 6}))
        .with_max_iterations(40);
    let id = manager.create_swarm(config).await.unwrap();

    manager.start_swarm(id).await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    manager.stop_swarm(id).await.unwrap();
    let stopped = manager.wait_for_swarm(id).await.unwrap();
    assert_eq!(stopped.status, SwarmStatus::Stopped);

    manager.start_swarm(id).await.unwrap();
    let finished = manager.wait_for_swarm(id).await.unwrap();
    assert_eq!(finished.status, SwarmStatus::Completed);
    assert_eq!(finished.current_iteration, 40);
    assert!(finished.best_fitness().unwrap() <= stopped.best_fitness().unwrap());
}

#[tokio::test]
async fn test_checkpoint_restore_marks_running_swarms_stopped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("swarms.json");

    let objectives = Arc::new(ObjectiveRegistry::with_builtins());
    objectives.register_fn("shifted", |x: &[f64]| x.iter().map(|v| (v - 1.0).powi(2)).sum::<f64>());
    let manager = SwarmManager::new(
        &SwarmSettings {
            iteration_delay: Duration::from_millis(20),
            ..settings(Some(path.clone()))
        },
        EvaluationDispatcher::local(),
        objectives.clone(),
        EventBus::new(10_000),
    );

    let running = manager
        .create_swarm(
            SwarmConfig::new("long", "pso", problem("sphere", 2, true))
                .with_params(json!({"population_size": 5}))
                .with_max_iterations(1_000_000),
        )
        .await
        .unwrap();
    let custom = OptimizationProblem::new(1, vec![(-2.0, 2.0)], objectives.get("shifted").unwrap(), true).unwrap();
    manager
        .create_swarm(SwarmConfig::new("custom", "de", custom).with_params(json!({"population_size": 4})))
        .await
        .unwrap();
    manager.add_agent_to_swarm(running, AgentId::new()).await.unwrap();
    manager.start_swarm(running).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    manager.save_checkpoint().await.unwrap();
    let original = manager.get_swarm(running).unwrap();

    // A fresh process that only knows the built-in objectives.
    let restored = SwarmManager::new(
        &settings(Some(path.clone())),
        EvaluationDispatcher::local(),
        Arc::new(ObjectiveRegistry::with_builtins()),
        EventBus::new(100),
    );
    assert_eq!(restored.restore().await.unwrap(), 1);
    let swarm = restored.get_swarm(running).unwrap();
    assert_eq!(swarm.status, SwarmStatus::Stopped);
    assert_eq!(swarm.name, "long");
    assert_eq!(swarm.agents, original.agents);
    assert_eq!(swarm.problem().objective_name(), Some("sphere"));
    assert!(swarm.best_solution.is_some());

    manager.shutdown().await;
    assert_eq!(manager.get_swarm(running).unwrap().status, SwarmStatus::Stopped);
}

#[tokio::test]
async fn test_membership_tracks_agent_references() {
    let agents = Arc::new(InMemoryAgentRegistry::new());
    let runtime = StandardAgentLifecycleService::new(
        agents.clone(),
        Arc::new(AbilityRegistry::new()),
        EventBus::new(100),
        AgentSettings::default(),
    );
    let manager = manager_with(EvaluationDispatcher::local(), Arc::new(ObjectiveRegistry::with_builtins()))
        .with_agent_registry(agents.clone());

    let agent = runtime
        .create_agent(AgentConfig::new("evaluator", AgentType::Custom))
        .await
        .unwrap();
    let first = manager
        .create_swarm(SwarmConfig::new("a", "mock", problem("sphere", 1, true)))
        .await
        .unwrap();
    let second = manager
        .create_swarm(SwarmConfig::new("b", "mock", problem("sphere", 1, true)))
        .await
        .unwrap();

    manager.add_agent_to_swarm(first, agent).await.unwrap();
    manager.add_agent_to_swarm(first, agent).await.unwrap();
    assert_eq!(manager.get_swarm(first).unwrap().agents, vec![agent]);
    assert!(matches!(
        manager.add_agent_to_swarm(second, agent).await,
        Err(SwarmError::Configuration(_))
    ));
    assert!(matches!(
        manager.add_agent_to_swarm(first, AgentId::new()).await,
        Err(SwarmError::AgentNotFound(_))
    ));
    assert!(matches!(runtime.remove_agent(agent).await, Err(AgentError::InUse(_))));

    manager.delete_swarm(first).await.unwrap();
    assert!(manager.get_swarm(first).is_err());
    assert_eq!(manager.list_swarms().len(), 1);
    runtime.remove_agent(agent).await.unwrap();
}

#[tokio::test]
async fn test_swarm_evaluates_through_broker_workers() {
    let objectives = Arc::new(ObjectiveRegistry::with_builtins());
    let pool = Arc::new(BrokerPool::new(Arc::new(MemoryBrokerConnector::new())));
    let token = CancellationToken::new();
    let workers: Vec<_> = (0..2)
        .map(|n| {
            let pool = pool.clone();
            let objectives = objectives.clone();
            let token = token.clone();
            tokio::spawn(async move {
                let broker = pool.get("memory://cluster").await.unwrap();
                EvaluationWorker::new(format!("w-{}", n), broker, "colony:eval_tasks", objectives)
                    .run(token)
                    .await
            })
        })
        .collect();

    let dispatcher = EvaluationDispatcher::local().with_broker(
        pool,
        "memory://cluster",
        "colony:eval_tasks",
        Duration::from_secs(10),
    );
    let manager = manager_with(dispatcher, objectives);
    let id = manager
        .create_swarm(
            SwarmConfig::new("distributed", "de", problem("sphere", 2, true))
                .with_params(json!({"population_size": 6, "seed": 9}))
                .with_max_iterations(10),
        )
        .await
        .unwrap();
    manager.start_swarm(id).await.unwrap();
    let swarm = manager.wait_for_swarm(id).await.unwrap();

    assert_eq!(swarm.status, SwarmStatus::Completed);
    assert_eq!(swarm.current_iteration, 10);
    assert!(swarm.best_fitness().unwrap().is_finite());

    token.cancel();
    for worker in workers {
        worker.await.unwrap();
    }
}

#[tokio::test]
async fn test_failing_member_agents_do_not_break_the_loop() {
    let mut server = mockito::Server::new_async().await;
    let _m = server
        .mock("POST", mockito::Matcher::Any)
        .with_status(500)
        .create_async()
        .await;
    let client = AgentEvaluationClient::new(server.url(), Duration::from_millis(200), Duration::from_millis(500)).unwrap();
    let manager = manager_with(
        EvaluationDispatcher::local().with_agent_client(client),
        Arc::new(ObjectiveRegistry::with_builtins()),
    );
    let id = manager
        .create_swarm(
            SwarmConfig::new("remote", "ga", problem("sphere", 2, true))
                .with_params(json!({"population_size": 6, "seed": 2}))
                .with_max_iterations(3),
        )
        .await
        .unwrap();
    manager.add_agent_to_swarm(id, AgentId::new()).await.unwrap();
    manager.start_swarm(id).await.unwrap();

    let swarm = manager.wait_for_swarm(id).await.unwrap();
    assert_eq!(swarm.status, SwarmStatus::Completed);
    assert_eq!(swarm.current_iteration, 3);
    // Only the directly evaluated first generation can hold a finite best.
    assert!(swarm.best_fitness().unwrap().is_finite());
}
