use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) accepted: AtomicU64,
    pub(crate) rejected: AtomicU64,
    pub(crate) applied: AtomicU64,
    pub(crate) dropped: AtomicU64,
    pub(crate) discarded: AtomicU64,
}

impl Counters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, queue_depth: usize) -> PipelineStats {
        PipelineStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            applied: self.applied.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            queue_depth,
        }
    }
}

/// Point-in-time view of the pipeline counters.
///
/// - `accepted`: votes taken into the queue
/// - `rejected`: submissions turned away (queue full or pipeline closed)
/// - `applied`: votes a worker applied to the store
/// - `dropped`: votes a worker dequeued but the store refused
/// - `discarded`: votes still queued when a timed-out close gave up on them
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub accepted: u64,
    pub rejected: u64,
    pub applied: u64,
    pub dropped: u64,
    pub discarded: u64,
    pub queue_depth: usize,
}

impl PipelineStats {
    /// Accepted votes that have reached a final outcome.
    pub fn settled(&self) -> u64 {
        self.applied + self.dropped + self.discarded
    }
}

/// Outcome of closing the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CloseReport {
    /// Whether the queue was fully drained before the shutdown timeout.
    pub drained: bool,
    /// Queued votes thrown away because the timeout expired.
    pub discarded: u64,
    pub elapsed: Duration,
    pub stats: PipelineStats,
}
