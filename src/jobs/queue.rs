use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use dashmap::DashMap;

use crate::jobs::types::{JobId, JobPriority};

/// Heap entry: highest priority first, then lowest enqueue sequence.
///
/// Handed out by [`PriorityQueue::take`] so a caller that cannot run the
/// job can put it back at the same position with [`PriorityQueue::restore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueEntry {
    pub priority: JobPriority,
    sequence: u64,
    pub job_id: JobId,
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// In-memory priority queues, one per job type
///
/// Each type's heap lives behind its dashmap shard lock, so `dequeue`
/// is atomic: concurrent callers never receive the same job.
#[derive(Debug, Default)]
pub struct PriorityQueue {
    queues: DashMap<String, BinaryHeap<QueueEntry>>,
    sequence: AtomicU64,
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, job_type: &str, job_id: JobId, priority: JobPriority) {
        let entry = QueueEntry {
            priority,
            sequence: self.sequence.fetch_add(1, AtomicOrdering::Relaxed),
            job_id,
        };
        self.queues
            .entry(job_type.to_string())
            .or_default()
            .push(entry);
    }

    /// Remove and return the head for `job_type`; `None` when empty.
    pub fn dequeue(&self, job_type: &str) -> Option<JobId> {
        self.take(job_type).map(|entry| entry.job_id)
    }

    /// Like [`dequeue`](Self::dequeue) but keeps the entry's position.
    pub fn take(&self, job_type: &str) -> Option<QueueEntry> {
        self.queues.get_mut(job_type).and_then(|mut heap| heap.pop())
    }

    /// Put back an entry obtained from [`take`](Self::take). It keeps its
    /// original sequence, so it is ahead of anything enqueued since.
    pub fn restore(&self, job_type: &str, entry: QueueEntry) {
        self.queues
            .entry(job_type.to_string())
            .or_default()
            .push(entry);
    }

    pub fn peek(&self, job_type: &str) -> Option<JobId> {
        self.queues
            .get(job_type)
            .and_then(|heap| heap.peek().map(|entry| entry.job_id))
    }

    pub fn size(&self, job_type: &str) -> usize {
        self.queues.get(job_type).map(|heap| heap.len()).unwrap_or(0)
    }

    /// Returns whether the job was still waiting in the queue.
    pub fn remove(&self, job_type: &str, job_id: JobId) -> bool {
        let Some(mut heap) = self.queues.get_mut(job_type) else {
            return false;
        };
        let before = heap.len();
        heap.retain(|entry| entry.job_id != job_id);
        heap.len() != before
    }

    /// Drop every waiting job of `job_type`, returning their ids.
    pub fn clear(&self, job_type: &str) -> Vec<JobId> {
        match self.queues.get_mut(job_type) {
            Some(mut heap) => heap.drain().map(|entry| entry.job_id).collect(),
            None => Vec::new(),
        }
    }

    /// Job types that currently have waiting jobs, sorted.
    pub fn types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .queues
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| entry.key().clone())
            .collect();
        types.sort();
        types
    }

    pub fn total_size(&self) -> usize {
        self.queues.iter().map(|entry| entry.value().len()).sum()
    }
}
