// ==========================================
// Delivery Window Planner - relocation work queue
// ==========================================
// Responsibility: FIFO of dropped/displaced orders awaiting disposition
// Rule: an order is queued at most once at a time
// Rule: bounded; once the task budget is spent the queue stops yielding
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskCause {
    /// dropped by the initial solve of its window
    RouterDrop,
    /// was kept, then dropped by a re-solve after another order moved in
    Displaced,
    /// cancelled by the allocator for capacity; a later window freed units
    CapacityRescue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelocationTask {
    pub task_id: String, // assigned by the queue on push
    pub order_id: String,
    pub from_rank: usize, // window the order was dropped from
    pub cause: TaskCause,
}

impl RelocationTask {
    pub fn new(order_id: impl Into<String>, from_rank: usize, cause: TaskCause) -> Self {
        Self {
            task_id: String::new(),
            order_id: order_id.into(),
            from_rank,
            cause,
        }
    }
}

#[derive(Debug)]
pub struct RelocationQueue {
    pending: VecDeque<RelocationTask>,
    queued: HashSet<String>,
    pushed: usize,
    processed: usize,
    max_tasks: usize,
}

impl RelocationQueue {
    pub fn new(max_tasks: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            queued: HashSet::new(),
            pushed: 0,
            processed: 0,
            max_tasks,
        }
    }

    /// Queues a task; false when the order is already waiting.
    /// Task ids derive from (order, window, push sequence) so identical
    /// runs produce identical ids.
    pub fn push(&mut self, mut task: RelocationTask) -> bool {
        if !self.queued.insert(task.order_id.clone()) {
            return false;
        }
        let name = format!("{}:{}:{}", task.order_id, task.from_rank, self.pushed);
        task.task_id = Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string();
        self.pushed += 1;
        self.pending.push_back(task);
        true
    }

    /// Next task, or `None` when empty or the task budget is spent.
    pub fn pop(&mut self) -> Option<RelocationTask> {
        if self.is_exhausted() {
            return None;
        }
        let task = self.pending.pop_front()?;
        self.queued.remove(&task.order_id);
        self.processed += 1;
        Some(task)
    }

    pub fn is_exhausted(&self) -> bool {
        self.processed >= self.max_tasks
    }

    /// Removes every waiting task (loop guard tripped).
    pub fn drain_remaining(&mut self) -> Vec<RelocationTask> {
        self.queued.clear();
        self.pending.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn processed(&self) -> usize {
        self.processed
    }
}
