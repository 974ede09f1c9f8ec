// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Agent Memory
//!
//! Pluggable key-value memory owned by a single agent. Implementations are not
//! thread-safe on their own; the owning [`Agent`](crate::domain::agent::Agent)
//! serialises access through its lock.
//!
//! | Selector | Implementation |
//! |----------|----------------|
//! | `ordered` / `lru` | [`LruMemory`]: bounded, evicts the least-recently touched key |

use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;

use crate::domain::agent::AgentError;

/// Key-value capability exposed by agent memories.
pub trait AgentMemory: Send {
    /// Look up `key`, counting as a touch for recency purposes.
    fn get(&mut self, key: &str) -> Option<serde_json::Value>;
    fn set(&mut self, key: String, value: serde_json::Value);
    fn delete(&mut self, key: &str) -> Option<serde_json::Value>;
    fn clear(&mut self);
    fn size(&self) -> usize;
    /// Keys from most to least recently touched.
    fn keys(&self) -> Vec<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemoryKind {
    #[default]
    #[serde(alias = "lru")]
    Ordered,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default, rename = "type")]
    pub kind: MemoryKind,
    #[serde(default = "default_max_size")]
    pub max_size: usize,
}

fn default_max_size() -> usize {
    1000
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            kind: MemoryKind::default(),
            max_size: default_max_size(),
        }
    }
}

impl MemoryConfig {
    pub fn build(&self) -> Result<Box<dyn AgentMemory>, AgentError> {
        match self.kind {
            MemoryKind::Ordered => Ok(Box::new(LruMemory::new(self.max_size)?)),
        }
    }
}

/// Bounded LRU memory backed by [`lru::LruCache`].
pub struct LruMemory {
    entries: LruCache<String, serde_json::Value>,
}

impl LruMemory {
    pub fn new(max_size: usize) -> Result<Self, AgentError> {
        let cap = NonZeroUsize::new(max_size).ok_or_else(|| {
            AgentError::Configuration("memory max_size must be greater than zero".to_string())
        })?;
        Ok(Self {
            entries: LruCache::new(cap),
        })
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }
}

impl AgentMemory for LruMemory {
    fn get(&mut self, key: &str) -> Option<serde_json::Value> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: String, value: serde_json::Value) {
        self.entries.put(key, value);
    }

    fn delete(&mut self, key: &str) -> Option<serde_json::Value> {
        self.entries.pop(key)
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn size(&self) -> usize {
        self.entries.len()
    }

    fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|(k, _)| k.clone()).collect()
    }
}
