// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Evaluation Broker
//!
//! List-oriented queue abstraction used to farm fitness evaluations out to
//! workers, plus:
//!
//! - [`InMemoryBroker`] / [`MemoryBrokerConnector`]: in-process backend
//!   addressed as `memory://<name>`.
//! - [`RedisBroker`] / [`RedisBrokerConnector`]: networked backend addressed
//!   as `redis://host:port[/db]`, shared by dispatchers and worker processes.
//! - [`SchemeBrokerConnector`]: picks one of the above by URL scheme.
//! - [`BrokerPool`]: connection cache keyed by connection string; every
//!   checkout pings and reconnects a dead connection.
//! - [`EvaluationWorker`]: worker lifecycle consuming the work queue.

use async_trait::async_trait;
use parking_lot::Mutex;
use redis::aio::MultiplexedConnection;
use std::collections::{HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::evaluation::{EvaluationResult, EvaluationTask};
use crate::domain::problem::ObjectiveRegistry;

/// How long an unread reply list survives on the broker.
pub const DEFAULT_REPLY_TTL: Duration = Duration::from_secs(60);

/// Below this a blocking pop would round to "wait forever" on redis.
const MIN_BLOCKING_POP: Duration = Duration::from_millis(1);

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("unsupported broker url '{0}'")]
    UnsupportedScheme(String),

    #[error("broker connection closed")]
    Closed,

    #[error("broker error: {0}")]
    Backend(String),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("malformed payload: {0}")]
    Payload(#[from] serde_json::Error),
}

#[async_trait]
pub trait Broker: Send + Sync {
    /// Append `payload` to the tail of `list`.
    async fn push(&self, list: &str, payload: String) -> Result<(), BrokerError>;

    /// Pop from the head of `list`, waiting up to `timeout`.
    async fn pop(&self, list: &str, timeout: Duration) -> Result<Option<String>, BrokerError>;

    /// Drop `list` once `ttl` has passed, whether or not anyone read it.
    async fn expire(&self, list: &str, ttl: Duration) -> Result<(), BrokerError>;

    async fn ping(&self) -> Result<(), BrokerError>;
}

#[async_trait]
pub trait BrokerConnector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Arc<dyn Broker>, BrokerError>;
}

#[derive(Default)]
struct MemoryList {
    items: VecDeque<String>,
    expires_at: Option<Instant>,
}

impl MemoryList {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Default)]
pub struct InMemoryBroker {
    lists: Mutex<HashMap<String, MemoryList>>,
    pushed: Notify,
    closed: AtomicBool,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a dropped connection.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.pushed.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn len(&self, list: &str) -> usize {
        let now = Instant::now();
        self.lists
            .lock()
            .get(list)
            .filter(|l| !l.is_expired(now))
            .map(|l| l.items.len())
            .unwrap_or(0)
    }

    /// Number of live lists.
    pub fn list_count(&self) -> usize {
        let mut lists = self.lists.lock();
        Self::evict_expired(&mut lists);
        lists.len()
    }

    fn evict_expired(lists: &mut HashMap<String, MemoryList>) {
        let now = Instant::now();
        lists.retain(|_, l| !l.is_expired(now));
    }

    fn check_open(&self) -> Result<(), BrokerError> {
        if self.is_closed() {
            Err(BrokerError::Closed)
        } else {
            Ok(())
        }
    }

    fn try_pop(&self, list: &str) -> Option<String> {
        let mut lists = self.lists.lock();
        Self::evict_expired(&mut lists);
        let queue = lists.get_mut(list)?;
        let item = queue.items.pop_front();
        if queue.items.is_empty() {
            lists.remove(list);
        }
        item
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn push(&self, list: &str, payload: String) -> Result<(), BrokerError> {
        self.check_open()?;
        {
            let mut lists = self.lists.lock();
            Self::evict_expired(&mut lists);
            lists.entry(list.to_string()).or_default().items.push_back(payload);
        }
        self.pushed.notify_waiters();
        Ok(())
    }

    async fn pop(&self, list: &str, timeout: Duration) -> Result<Option<String>, BrokerError> {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.pushed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            self.check_open()?;
            if let Some(item) = self.try_pop(list) {
                return Ok(Some(item));
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn expire(&self, list: &str, ttl: Duration) -> Result<(), BrokerError> {
        self.check_open()?;
        if let Some(entry) = self.lists.lock().get_mut(list) {
            entry.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), BrokerError> {
        self.check_open()
    }
}

/// Redis-backed broker: `RPUSH` / `BLPOP` / `PEXPIRE` / `PING`.
///
/// Blocking pops hold a redis connection for their whole wait, so they run on
/// connections of their own; everything else shares one multiplexed
/// connection.
pub struct RedisBroker {
    client: redis::Client,
    shared: MultiplexedConnection,
    idle_blocking: Mutex<Vec<MultiplexedConnection>>,
}

impl RedisBroker {
    pub async fn connect(url: &str) -> Result<Self, BrokerError> {
        let client = redis::Client::open(url)?;
        let shared = client.get_multiplexed_async_connection().await?;
        Ok(Self {
            client,
            shared,
            idle_blocking: Mutex::new(Vec::new()),
        })
    }

    async fn blocking_connection(&self) -> Result<MultiplexedConnection, BrokerError> {
        let idle = self.idle_blocking.lock().pop();
        match idle {
            Some(conn) => Ok(conn),
            None => Ok(self.client.get_multiplexed_async_connection().await?),
        }
    }
}

#[async_trait]
impl Broker for RedisBroker {
    async fn push(&self, list: &str, payload: String) -> Result<(), BrokerError> {
        let mut conn = self.shared.clone();
        let _len: i64 = redis::cmd("RPUSH")
            .arg(list)
            .arg(payload)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn pop(&self, list: &str, timeout: Duration) -> Result<Option<String>, BrokerError> {
        if timeout < MIN_BLOCKING_POP {
            let mut conn = self.shared.clone();
            let item: Option<String> = redis::cmd("LPOP").arg(list).query_async(&mut conn).await?;
            return Ok(item);
        }

        let mut conn = self.blocking_connection().await?;
        let popped: Option<(String, String)> = redis::cmd("BLPOP")
            .arg(list)
            .arg(timeout.as_secs_f64())
            .query_async(&mut conn)
            .await?;
        self.idle_blocking.lock().push(conn);
        Ok(popped.map(|(_, item)| item))
    }

    async fn expire(&self, list: &str, ttl: Duration) -> Result<(), BrokerError> {
        let mut conn = self.shared.clone();
        let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
        let _set: i64 = redis::cmd("PEXPIRE")
            .arg(list)
            .arg(millis)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), BrokerError> {
        let mut conn = self.shared.clone();
        let _pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

/// Opens a [`RedisBroker`] for `redis://` and `rediss://` URLs.
#[derive(Default)]
pub struct RedisBrokerConnector;

#[async_trait]
impl BrokerConnector for RedisBrokerConnector {
    async fn connect(&self, url: &str) -> Result<Arc<dyn Broker>, BrokerError> {
        if !is_redis_url(url) {
            return Err(BrokerError::UnsupportedScheme(url.to_string()));
        }
        let broker: Arc<dyn Broker> = Arc::new(RedisBroker::connect(url).await?);
        Ok(broker)
    }
}

fn is_redis_url(url: &str) -> bool {
    url.starts_with("redis://") || url.starts_with("rediss://")
}

/// Resolves `memory://<name>` to a process-wide named [`InMemoryBroker`].
#[derive(Default)]
pub struct MemoryBrokerConnector {
    brokers: Mutex<HashMap<String, Arc<InMemoryBroker>>>,
}

impl MemoryBrokerConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// The live broker behind `url`, creating it on first use.
    pub fn broker(&self, url: &str) -> Result<Arc<InMemoryBroker>, BrokerError> {
        let name = url
            .strip_prefix("memory://")
            .ok_or_else(|| BrokerError::UnsupportedScheme(url.to_string()))?;
        let mut brokers = self.brokers.lock();
        let broker = brokers
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(InMemoryBroker::new()));
        if broker.is_closed() {
            *broker = Arc::new(InMemoryBroker::new());
        }
        Ok(broker.clone())
    }
}

#[async_trait]
impl BrokerConnector for MemoryBrokerConnector {
    async fn connect(&self, url: &str) -> Result<Arc<dyn Broker>, BrokerError> {
        let broker: Arc<dyn Broker> = self.broker(url)?;
        Ok(broker)
    }
}

/// Routes `memory://` and `redis://` URLs to their connectors.
#[derive(Default)]
pub struct SchemeBrokerConnector {
    memory: MemoryBrokerConnector,
    redis: RedisBrokerConnector,
}

impl SchemeBrokerConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn memory(&self) -> &MemoryBrokerConnector {
        &self.memory
    }
}

#[async_trait]
impl BrokerConnector for SchemeBrokerConnector {
    async fn connect(&self, url: &str) -> Result<Arc<dyn Broker>, BrokerError> {
        if url.starts_with("memory://") {
            self.memory.connect(url).await
        } else if is_redis_url(url) {
            self.redis.connect(url).await
        } else {
            Err(BrokerError::UnsupportedScheme(url.to_string()))
        }
    }
}

/// Connection cache keyed by connection string.
pub struct BrokerPool {
    connector: Arc<dyn BrokerConnector>,
    connections: tokio::sync::Mutex<HashMap<String, Arc<dyn Broker>>>,
}

impl BrokerPool {
    pub fn new(connector: Arc<dyn BrokerConnector>) -> Self {
        Self {
            connector,
            connections: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Pool over every backend [`SchemeBrokerConnector`] understands.
    pub fn with_default_connectors() -> Self {
        Self::new(Arc::new(SchemeBrokerConnector::new()))
    }

    /// Cached connection for `url` if it still answers a ping, else a fresh one.
    pub async fn get(&self, url: &str) -> Result<Arc<dyn Broker>, BrokerError> {
        let mut connections = self.connections.lock().await;
        if let Some(existing) = connections.get(url) {
            match existing.ping().await {
                Ok(()) => return Ok(existing.clone()),
                Err(e) => {
                    warn!("Broker connection to {} failed liveness check: {}; reconnecting", url, e);
                    connections.remove(url);
                }
            }
        }

        let broker = self.connector.connect(url).await?;
        broker.ping().await?;
        info!("Connected to broker {}", url);
        connections.insert(url.to_string(), broker.clone());
        Ok(broker)
    }

    pub async fn len(&self) -> usize {
        self.connections.lock().await.len()
    }
}

/// Consumes evaluation tasks from a work queue and answers on each task's
/// reply channel.
pub struct EvaluationWorker {
    worker_id: String,
    broker: Arc<dyn Broker>,
    work_queue: String,
    objectives: Arc<ObjectiveRegistry>,
    poll_interval: Duration,
    reply_ttl: Duration,
}

impl EvaluationWorker {
    pub fn new(
        worker_id: impl Into<String>,
        broker: Arc<dyn Broker>,
        work_queue: impl Into<String>,
        objectives: Arc<ObjectiveRegistry>,
    ) -> Self {
        Self {
            worker_id: worker_id.into(),
            broker,
            work_queue: work_queue.into(),
            objectives,
            poll_interval: Duration::from_millis(250),
            reply_ttl: DEFAULT_REPLY_TTL,
        }
    }

    pub fn with_reply_ttl(mut self, reply_ttl: Duration) -> Self {
        self.reply_ttl = reply_ttl;
        self
    }

    pub fn spawn(self, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(token))
    }

    pub async fn run(self, token: CancellationToken) {
        info!("Evaluation worker {} listening on {}", self.worker_id, self.work_queue);
        loop {
            let popped = tokio::select! {
                _ = token.cancelled() => break,
                popped = self.broker.pop(&self.work_queue, self.poll_interval) => popped,
            };
            match popped {
                Ok(Some(raw)) => {
                    if let Err(e) = self.handle(&raw).await {
                        warn!("Worker {} dropped evaluation task: {}", self.worker_id, e);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("Worker {} failed to pop from {}: {}", self.worker_id, self.work_queue, e);
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = tokio::time::sleep(self.poll_interval) => {}
                    }
                }
            }
        }
        info!("Evaluation worker {} stopped", self.worker_id);
    }

    async fn handle(&self, raw: &str) -> Result<(), BrokerError> {
        let task: EvaluationTask = serde_json::from_str(raw)?;
        let result = match self.objectives.get(&task.objective_function_name) {
            Some(objective) => self.evaluate(&task, |position| objective.call(position)),
            None => {
                warn!(
                    "Worker {} has no objective '{}' for task {}",
                    self.worker_id, task.objective_function_name, task.eval_task_id
                );
                EvaluationResult::failure(
                    task.eval_task_id,
                    format!("objective '{}' is not registered", task.objective_function_name),
                    self.worker_id.clone(),
                )
            }
        };
        self.broker
            .push(&task.reply_to_list, serde_json::to_string(&result)?)
            .await?;
        self.broker.expire(&task.reply_to_list, self.reply_ttl).await?;
        metrics::counter!("colony_worker_evaluations_total").increment(1);
        Ok(())
    }

    /// A panicking objective becomes a failure reply instead of killing the worker.
    fn evaluate(&self, task: &EvaluationTask, objective: impl Fn(&[f64]) -> f64) -> EvaluationResult {
        match std::panic::catch_unwind(AssertUnwindSafe(|| objective(&task.position_data))) {
            Ok(fitness) => {
                debug!(
                    "Worker {} evaluated task {} for swarm {}: {}",
                    self.worker_id, task.eval_task_id, task.swarm_id, fitness
                );
                EvaluationResult::success(task.eval_task_id, fitness, self.worker_id.clone())
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                warn!(
                    "Objective '{}' panicked on task {}: {}",
                    task.objective_function_name, task.eval_task_id, message
                );
                metrics::counter!("colony_worker_evaluation_panics_total").increment(1);
                EvaluationResult::failure(task.eval_task_id, message, self.worker_id.clone())
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "objective panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::swarm::SwarmId;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_pop_waits_for_push_and_times_out() {
        let broker = Arc::new(InMemoryBroker::new());
        assert_eq!(broker.pop("q", Duration::from_millis(20)).await.unwrap(), None);

        let producer = broker.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            producer.push("q", "hello".to_string()).await.unwrap();
        });
        let item = broker.pop("q", Duration::from_secs(2)).await.unwrap();
        assert_eq!(item.as_deref(), Some("hello"));
        assert_eq!(broker.len("q"), 0);
    }

    #[tokio::test]
    async fn test_pool_reconnects_after_failed_ping() {
        let connector = Arc::new(MemoryBrokerConnector::new());
        let pool = BrokerPool::new(connector.clone());

        let first = pool.get("memory://evals").await.unwrap();
        first.push("q", "1".to_string()).await.unwrap();
        let again = pool.get("memory://evals").await.unwrap();
        assert_eq!(again.pop("q", Duration::ZERO).await.unwrap().as_deref(), Some("1"));

        connector.broker("memory://evals").unwrap().close();
        assert!(first.ping().await.is_err());

        let fresh = pool.get("memory://evals").await.unwrap();
        assert!(fresh.ping().await.is_ok());
        assert_eq!(pool.len().await, 1);

        assert!(matches!(
            pool.get("redis://localhost").await,
            Err(BrokerError::UnsupportedScheme(_))
        ));
    }

    #[tokio::test]
    async fn test_worker_answers_on_reply_channel() {
        let broker: Arc<dyn Broker> = Arc::new(InMemoryBroker::new());
        let objectives = Arc::new(ObjectiveRegistry::with_builtins());
        let token = CancellationToken::new();
        let worker = EvaluationWorker::new("w-1", broker.clone(), "work", objectives).spawn(token.clone());

        let task = EvaluationTask {
            eval_task_id: Uuid::new_v4(),
            swarm_id: SwarmId::new(),
            position_data: vec![1.0, 2.0],
            objective_function_name: "sphere".to_string(),
            reply_to_list: "reply:1".to_string(),
        };
        broker
            .push("work", serde_json::to_string(&task).unwrap())
            .await
            .unwrap();

        let raw = broker.pop("reply:1", Duration::from_secs(5)).await.unwrap().unwrap();
        let result: EvaluationResult = serde_json::from_str(&raw).unwrap();
        assert_eq!(result.eval_task_id, task.eval_task_id);
        assert_eq!(result.fitness, Some(5.0));
        assert_eq!(result.worker_id, "w-1");
        assert_eq!(result.error, None);

        token.cancel();
        worker.await.unwrap();
    }

    fn task(objective: &str, position: Vec<f64>, reply_to: &str) -> EvaluationTask {
        EvaluationTask {
            eval_task_id: Uuid::new_v4(),
            swarm_id: SwarmId::new(),
            position_data: position,
            objective_function_name: objective.to_string(),
            reply_to_list: reply_to.to_string(),
        }
    }

    async fn reply(broker: &Arc<dyn Broker>, list: &str) -> EvaluationResult {
        let raw = broker.pop(list, Duration::from_secs(5)).await.unwrap().unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    #[tokio::test]
    async fn test_worker_survives_panicking_and_unknown_objectives() {
        let broker: Arc<dyn Broker> = Arc::new(InMemoryBroker::new());
        let objectives = Arc::new(ObjectiveRegistry::with_builtins());
        objectives.register_fn("exploding", |_: &[f64]| -> f64 { panic!("boom") });
        let token = CancellationToken::new();
        let worker = EvaluationWorker::new("w-1", broker.clone(), "work", objectives).spawn(token.clone());

        for t in [
            task("exploding", vec![1.0], "reply:a"),
            task("himmelblau", vec![1.0], "reply:b"),
            task("sphere", vec![3.0], "reply:c"),
        ] {
            broker.push("work", serde_json::to_string(&t).unwrap()).await.unwrap();
        }

        let panicked = reply(&broker, "reply:a").await;
        assert_eq!(panicked.fitness, None);
        assert_eq!(panicked.error.as_deref(), Some("boom"));

        let unknown = reply(&broker, "reply:b").await;
        assert_eq!(unknown.fitness, None);
        assert!(unknown.error.unwrap().contains("himmelblau"));

        assert_eq!(reply(&broker, "reply:c").await.fitness, Some(9.0));

        token.cancel();
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_lists_are_dropped() {
        let broker = InMemoryBroker::new();
        broker.push("reply:late", "1".to_string()).await.unwrap();
        broker.push("keep", "2".to_string()).await.unwrap();
        broker.expire("reply:late", Duration::from_millis(20)).await.unwrap();
        assert_eq!(broker.len("reply:late"), 1);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(broker.len("reply:late"), 0);
        assert_eq!(broker.pop("reply:late", Duration::ZERO).await.unwrap(), None);
        assert_eq!(broker.list_count(), 1);

        // A fresh push recreates the list without the old expiry.
        broker.push("reply:late", "3".to_string()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(broker.len("reply:late"), 1);
    }

    #[tokio::test]
    async fn test_unread_replies_expire() {
        let memory = Arc::new(InMemoryBroker::new());
        let broker: Arc<dyn Broker> = memory.clone();
        let token = CancellationToken::new();
        let worker = EvaluationWorker::new("w-1", broker.clone(), "work", Arc::new(ObjectiveRegistry::with_builtins()))
            .with_reply_ttl(Duration::from_millis(30))
            .spawn(token.clone());

        for n in 0..5 {
            let t = task("sphere", vec![n as f64], &format!("reply:{}", n));
            broker.push("work", serde_json::to_string(&t).unwrap()).await.unwrap();
        }
        let deadline = Instant::now() + Duration::from_secs(5);
        while memory.len("reply:4") == 0 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(memory.len("reply:4"), 1);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(memory.list_count(), 0);

        token.cancel();
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn test_scheme_connector_routes_by_url() {
        let connector = SchemeBrokerConnector::new();

        let broker = connector.connect("memory://routed").await.unwrap();
        broker.push("q", "x".to_string()).await.unwrap();
        assert_eq!(connector.memory().broker("memory://routed").unwrap().len("q"), 1);

        assert!(matches!(
            connector.connect("amqp://localhost").await,
            Err(BrokerError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            connector.connect("redis://127.0.0.1:1").await,
            Err(BrokerError::Redis(_))
        ));
    }

    /// Runs against a live server when `COLONY_TEST_REDIS_URL` is set.
    #[tokio::test]
    async fn test_redis_round_trip_through_worker() {
        let Ok(url) = std::env::var("COLONY_TEST_REDIS_URL") else {
            return;
        };
        let pool = BrokerPool::with_default_connectors();
        let broker = pool.get(&url).await.unwrap();
        let queue = format!("colony-test:{}", Uuid::new_v4());

        assert_eq!(broker.pop(&queue, Duration::ZERO).await.unwrap(), None);
        assert_eq!(broker.pop(&queue, Duration::from_millis(50)).await.unwrap(), None);

        let token = CancellationToken::new();
        let worker = EvaluationWorker::new(
            "w-redis",
            pool.get(&url).await.unwrap(),
            queue.clone(),
            Arc::new(ObjectiveRegistry::with_builtins()),
        )
        .spawn(token.clone());

        let reply_to = format!("{}:reply", queue);
        let t = task("sphere", vec![1.0, 2.0], &reply_to);
        broker.push(&queue, serde_json::to_string(&t).unwrap()).await.unwrap();
        let result = reply(&broker, &reply_to).await;
        assert_eq!(result.eval_task_id, t.eval_task_id);
        assert_eq!(result.fitness, Some(5.0));

        token.cancel();
        worker.await.unwrap();
    }
}
