// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use colony_core::application::{
    register_builtin_abilities, AgentLifecycleService, StandardAgentLifecycleService,
};
use colony_core::domain::ability::AbilityRegistry;
use colony_core::domain::agent::{AgentConfig, AgentStatus, AgentType};
use colony_core::domain::events::{AgentLifecycleEvent, TaskEvent};
use colony_core::domain::node_config::AgentSettings;
use colony_core::domain::task::{AgentTask, TaskStatus};
use colony_core::infrastructure::agent_registry::InMemoryAgentRegistry;
use colony_core::infrastructure::event_bus::{DomainEvent, EventBus};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

fn runtime(events: EventBus) -> StandardAgentLifecycleService {
    let abilities = Arc::new(AbilityRegistry::new());
    register_builtin_abilities(&abilities);
    StandardAgentLifecycleService::new(
        Arc::new(InMemoryAgentRegistry::new()),
        abilities,
        events,
        AgentSettings::default(),
    )
}

#[tokio::test]
async fn test_agent_config_from_json_and_memory_round_trip() {
    let service = runtime(EventBus::new(100));
    let config: AgentConfig = serde_json::from_value(json!({
        "name": "collector",
        "type": "data_collection",
        "memory_config": {},
        "queue_config": {"type": "fifo"}
    }))
    .unwrap();
    let id = service.create_agent(config).await.unwrap();
    service.start_agent(id).await.unwrap();

    service
        .execute_agent_task(
            id,
            AgentTask::new("memory_set", json!({"key": "last_price", "value": 101.5})),
        )
        .await
        .unwrap();
    let value = service
        .execute_agent_task(id, AgentTask::new("memory_get", json!({"key": "last_price"})))
        .await
        .unwrap();
    assert_eq!(value, json!(101.5));

    let history = service.task_history(id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|r| r.status == TaskStatus::Completed));

    service.shutdown().await;
    assert_eq!(service.get_agent(id).await.unwrap().status, AgentStatus::Stopped);
}

#[tokio::test]
async fn test_lifecycle_and_task_events_are_published() {
    let events = EventBus::new(100);
    let mut receiver = events.subscribe();
    let service = runtime(events);

    let id = service
        .create_agent(AgentConfig::new("reporter", AgentType::Notification))
        .await
        .unwrap();
    service.start_agent(id).await.unwrap();
    let task_id = service
        .submit_agent_task(id, AgentTask::new("echo", json!({"n": 1})))
        .await
        .unwrap();

    let mut saw_created = false;
    let mut saw_running = false;
    let completed = timeout(Duration::from_secs(5), async {
        loop {
            match receiver.recv().await.unwrap() {
                DomainEvent::AgentLifecycle(AgentLifecycleEvent::AgentCreated { agent_id, .. }) => {
                    assert_eq!(agent_id, id);
                    saw_created = true;
                }
                DomainEvent::AgentLifecycle(AgentLifecycleEvent::AgentStatusChanged {
                    to: AgentStatus::Running,
                    ..
                }) => saw_running = true,
                DomainEvent::Task(TaskEvent::TaskCompleted { task_id: done, .. }) => break done,
                _ => {}
            }
        }
    })
    .await
    .expect("task completion event");

    assert_eq!(completed, task_id);
    assert!(saw_created);
    assert!(saw_running);
    service.stop_agent(id).await.unwrap();
}

#[tokio::test]
async fn test_cancel_queued_task_before_it_runs() {
    let service = runtime(EventBus::default());
    let id = service
        .create_agent(AgentConfig::new("idle", AgentType::Custom))
        .await
        .unwrap();

    let task_id = service
        .submit_agent_task(id, AgentTask::new("echo", json!(null)))
        .await
        .unwrap();
    assert!(service.cancel_task(id, task_id).await.unwrap());
    assert!(!service.cancel_task(id, task_id).await.unwrap());
    assert_eq!(
        service.get_task_result(id, task_id).await.unwrap().status,
        TaskStatus::Cancelled
    );
}
