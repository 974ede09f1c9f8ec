// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Ability Registry
//!
//! Maps ability names to callable handlers. Agents invoke abilities by name;
//! the registry is owned by the runtime and shared by reference with every
//! agent manager that needs it.

use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use crate::domain::agent::Agent;
use crate::domain::task::TaskId;

/// What a handler sees about the invocation.
#[derive(Clone)]
pub struct AbilityContext {
    pub agent: Arc<Agent>,
    pub task_id: TaskId,
}

#[async_trait]
pub trait Ability: Send + Sync {
    async fn invoke(
        &self,
        ctx: AbilityContext,
        params: serde_json::Value,
    ) -> anyhow::Result<serde_json::Value>;
}

type HandlerFn =
    dyn Fn(AbilityContext, serde_json::Value) -> BoxFuture<'static, anyhow::Result<serde_json::Value>>
        + Send
        + Sync;

/// Adapts an async closure into an [`Ability`].
pub struct FnAbility {
    handler: Box<HandlerFn>,
}

impl FnAbility {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(AbilityContext, serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<serde_json::Value>> + Send + 'static,
    {
        Self {
            handler: Box::new(move |ctx, params| Box::pin(f(ctx, params))),
        }
    }
}

#[async_trait]
impl Ability for FnAbility {
    async fn invoke(
        &self,
        ctx: AbilityContext,
        params: serde_json::Value,
    ) -> anyhow::Result<serde_json::Value> {
        (self.handler)(ctx, params).await
    }
}

#[derive(Default)]
pub struct AbilityRegistry {
    abilities: RwLock<HashMap<String, Arc<dyn Ability>>>,
}

impl AbilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `ability` under `name`, replacing any previous handler.
    pub fn register(&self, name: impl Into<String>, ability: Arc<dyn Ability>) {
        let name = name.into();
        tracing::debug!("Registering ability '{}'", name);
        self.abilities.write().insert(name, ability);
    }

    pub fn register_fn<F, Fut>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(AbilityContext, serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<serde_json::Value>> + Send + 'static,
    {
        self.register(name, Arc::new(FnAbility::new(f)));
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.abilities.write().remove(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Ability>> {
        self.abilities.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.abilities.read().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.abilities.read().keys().cloned().collect();
        names.sort();
        names
    }
}
