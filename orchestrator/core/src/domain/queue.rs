// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Agent task queues.
//!
//! The priority queue orders by descending priority and keeps submission order
//! among equal priorities.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};

use crate::domain::task::{AgentTask, TaskId};

pub trait TaskQueue: Send {
    fn enqueue(&mut self, task: AgentTask);
    fn dequeue(&mut self) -> Option<AgentTask>;
    fn peek(&self) -> Option<&AgentTask>;
    fn len(&self) -> usize;
    /// Remove a specific task that has not been dequeued yet.
    fn remove(&mut self, id: TaskId) -> Option<AgentTask>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QueueKind {
    #[default]
    Priority,
    Fifo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct QueueConfig {
    #[serde(default, rename = "type")]
    pub kind: QueueKind,
}

impl QueueConfig {
    pub fn build(&self) -> Box<dyn TaskQueue> {
        match self.kind {
            QueueKind::Priority => Box::new(PriorityTaskQueue::default()),
            QueueKind::Fifo => Box::new(FifoTaskQueue::default()),
        }
    }
}

struct QueuedTask {
    seq: u64,
    task: AgentTask,
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueuedTask {}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> Ordering {
        self.task
            .priority
            .cmp(&other.task.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
pub struct PriorityTaskQueue {
    heap: BinaryHeap<QueuedTask>,
    next_seq: u64,
}

impl TaskQueue for PriorityTaskQueue {
    fn enqueue(&mut self, task: AgentTask) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(QueuedTask { seq, task });
    }

    fn dequeue(&mut self) -> Option<AgentTask> {
        self.heap.pop().map(|q| q.task)
    }

    fn peek(&self) -> Option<&AgentTask> {
        self.heap.peek().map(|q| &q.task)
    }

    fn len(&self) -> usize {
        self.heap.len()
    }

    fn remove(&mut self, id: TaskId) -> Option<AgentTask> {
        let mut removed = None;
        let remaining: Vec<QueuedTask> = std::mem::take(&mut self.heap)
            .into_vec()
            .into_iter()
            .filter_map(|q| {
                if removed.is_none() && q.task.id == id {
                    removed = Some(q.task);
                    None
                } else {
                    Some(q)
                }
            })
            .collect();
        self.heap = BinaryHeap::from(remaining);
        removed
    }
}

#[derive(Default)]
pub struct FifoTaskQueue {
    items: VecDeque<AgentTask>,
}

impl TaskQueue for FifoTaskQueue {
    fn enqueue(&mut self, task: AgentTask) {
        self.items.push_back(task);
    }

    fn dequeue(&mut self) -> Option<AgentTask> {
        self.items.pop_front()
    }

    fn peek(&self) -> Option<&AgentTask> {
        self.items.front()
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn remove(&mut self, id: TaskId) -> Option<AgentTask> {
        let idx = self.items.iter().position(|t| t.id == id)?;
        self.items.remove(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task(name: &str, priority: i32) -> AgentTask {
        AgentTask::new(name, json!(null)).with_priority(priority)
    }

    #[test]
    fn test_priority_order_with_fifo_ties() {
        let mut queue = QueueConfig::default().build();
        queue.enqueue(task("low", 1));
        queue.enqueue(task("high-a", 5));
        queue.enqueue(task("high-b", 5));
        queue.enqueue(task("mid", 3));

        assert_eq!(queue.len(), 4);
        assert_eq!(queue.peek().map(|t| t.ability.as_str()), Some("high-a"));

        let order: Vec<String> = std::iter::from_fn(|| queue.dequeue())
            .map(|t| t.ability)
            .collect();
        assert_eq!(order, vec!["high-a", "high-b", "mid", "low"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_remove_keeps_ordering() {
        let mut queue = PriorityTaskQueue::default();
        let a = task("a", 1);
        let b = task("b", 2);
        let c = task("c", 3);
        let b_id = b.id;
        queue.enqueue(a);
        queue.enqueue(b);
        queue.enqueue(c);

        assert_eq!(queue.remove(b_id).map(|t| t.ability), Some("b".to_string()));
        assert!(queue.remove(b_id).is_none());
        assert_eq!(queue.dequeue().map(|t| t.ability), Some("c".to_string()));
        assert_eq!(queue.dequeue().map(|t| t.ability), Some("a".to_string()));
    }

    #[test]
    fn test_fifo_ignores_priority() {
        let config: QueueConfig = serde_json::from_value(json!({"type": "fifo"})).unwrap();
        let mut queue = config.build();
        queue.enqueue(task("first", 0));
        queue.enqueue(task("second", 9));
        assert_eq!(queue.dequeue().map(|t| t.ability), Some("first".to_string()));
    }
}
