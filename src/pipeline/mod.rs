//! Asynchronous vote ingestion.
//!
//! Submitters push [`VoteRequest`]s into a bounded queue without blocking; a
//! fixed pool of workers pulls them off and applies them to a [`PollStore`].
//! A full queue is the only admission control: the submission is refused on
//! the spot and the caller decides whether to retry.
//!
//! Requests leave the queue in FIFO order, but with several workers there is
//! no guarantee they are applied in that order. Only votes on the same poll
//! are serialized (by the poll's lock). Final counts are exact either way.
//!
//! Votes the store refuses after they were accepted (poll deleted or closed,
//! option gone, duplicate voter) are dropped. They are counted in
//! [`PipelineStats::dropped`] and logged at debug level; the submitter is not
//! told.

mod stats;

pub use stats::{CloseReport, PipelineStats};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use flume::{Receiver, Sender, TrySendError};
use log::{debug, error, info, warn};
use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::config::{ConfigError, TallyConfig};
use crate::db::{ErrorKind, PollStore};
use crate::models::VoteRequest;
use stats::Counters;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("vote queue is full ({capacity} pending), retry later")]
    Overloaded { capacity: usize },
    #[error("vote pipeline is closed")]
    Closed,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Overload
    }
}

pub struct VotePipeline {
    sender: RwLock<Option<Sender<VoteRequest>>>,
    // Kept for queue depth and for discarding leftovers after a timed-out close.
    receiver: Receiver<VoteRequest>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    counters: Arc<Counters>,
    stop: Arc<AtomicBool>,
    capacity: usize,
    worker_count: usize,
    shutdown_timeout: Duration,
}

impl VotePipeline {
    /// Create the queue and spawn the workers. Must be called from within a
    /// Tokio runtime.
    pub fn start(store: Arc<dyn PollStore>, config: &TallyConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let (sender, receiver) = flume::bounded(config.queue_capacity);
        let counters = Arc::new(Counters::default());
        let stop = Arc::new(AtomicBool::new(false));

        let workers = (0..config.worker_count)
            .map(|id| {
                let store = Arc::clone(&store);
                let receiver = receiver.clone();
                let counters = Arc::clone(&counters);
                let stop = Arc::clone(&stop);
                tokio::task::spawn_blocking(move || run_worker(id, store, receiver, counters, stop))
            })
            .collect();

        info!(
            "Vote pipeline started: capacity {}, {} worker(s)",
            config.queue_capacity, config.worker_count
        );

        Ok(Self {
            sender: RwLock::new(Some(sender)),
            receiver,
            workers: Mutex::new(workers),
            counters,
            stop,
            capacity: config.queue_capacity,
            worker_count: config.worker_count,
            shutdown_timeout: config.shutdown_timeout(),
        })
    }

    /// Offer a vote without blocking. `false` means the queue is full or the
    /// pipeline is closed; the vote was not taken.
    pub fn enqueue(&self, vote: VoteRequest) -> bool {
        self.try_submit(vote).is_ok()
    }

    /// Same admission decision as [`enqueue`](Self::enqueue), with the reason
    /// for a refusal.
    pub fn try_submit(&self, vote: VoteRequest) -> Result<(), PipelineError> {
        let guard = self.sender.read();
        let Some(sender) = guard.as_ref() else {
            Counters::bump(&self.counters.rejected);
            return Err(PipelineError::Closed);
        };

        match sender.try_send(vote) {
            Ok(()) => {
                Counters::bump(&self.counters.accepted);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                Counters::bump(&self.counters.rejected);
                Err(PipelineError::Overloaded {
                    capacity: self.capacity,
                })
            }
            Err(TrySendError::Disconnected(_)) => {
                Counters::bump(&self.counters.rejected);
                Err(PipelineError::Closed)
            }
        }
    }

    pub fn stats(&self) -> PipelineStats {
        self.counters.snapshot(self.receiver.len())
    }

    pub fn queue_len(&self) -> usize {
        self.receiver.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn is_closed(&self) -> bool {
        self.sender.read().is_none()
    }

    /// Stop accepting votes and shut the workers down.
    ///
    /// Workers keep draining the queue until it is empty or the shutdown
    /// timeout passes. Past the timeout they stop after the vote they are
    /// currently applying, and whatever is still queued is discarded and
    /// reported. Either way this returns only once no worker is mid-apply.
    /// Closing twice is harmless; the second call just reports current stats.
    pub async fn close(&self) -> CloseReport {
        let started = Instant::now();
        let sender = self.sender.write().take();
        let Some(sender) = sender else {
            debug!("Vote pipeline already closed");
            return CloseReport {
                drained: true,
                discarded: 0,
                elapsed: started.elapsed(),
                stats: self.stats(),
            };
        };
        // Dropping the only sender lets workers see the end of the queue.
        drop(sender);

        let mut handles = std::mem::take(&mut *self.workers.lock());
        info!(
            "Closing vote pipeline: {} queued vote(s), draining for up to {:?}",
            self.receiver.len(),
            self.shutdown_timeout
        );

        let drained = tokio::time::timeout(self.shutdown_timeout, join_workers(&mut handles))
            .await
            .is_ok();

        let mut discarded = 0;
        if !drained {
            self.stop.store(true, Ordering::Release);
            join_workers(&mut handles).await;
            discarded = self.receiver.drain().count() as u64;
            self.counters
                .discarded
                .fetch_add(discarded, Ordering::Relaxed);
            warn!(
                "Vote pipeline shutdown timed out after {:?}; discarded {} queued vote(s)",
                self.shutdown_timeout, discarded
            );
        }

        let report = CloseReport {
            drained,
            discarded,
            elapsed: started.elapsed(),
            stats: self.stats(),
        };
        info!(
            "Vote pipeline closed in {:?}: {} applied, {} dropped, {} discarded",
            report.elapsed, report.stats.applied, report.stats.dropped, report.stats.discarded
        );
        report
    }
}

async fn join_workers(handles: &mut Vec<JoinHandle<()>>) {
    while let Some(handle) = handles.last_mut() {
        if let Err(e) = handle.await {
            error!("Vote worker terminated abnormally: {}", e);
        }
        handles.pop();
    }
}

fn run_worker(
    id: usize,
    store: Arc<dyn PollStore>,
    receiver: Receiver<VoteRequest>,
    counters: Arc<Counters>,
    stop: Arc<AtomicBool>,
) {
    debug!("Vote worker {} started", id);
    while !stop.load(Ordering::Acquire) {
        // Err means every sender is gone and the queue is empty.
        let Ok(vote) = receiver.recv() else {
            break;
        };
        match store.apply_vote(&vote) {
            Ok(()) => Counters::bump(&counters.applied),
            Err(e) => {
                Counters::bump(&counters.dropped);
                debug!(
                    "Dropped vote for option {} in poll {} from '{}': {}",
                    vote.option_id, vote.poll_id, vote.voter_id, e
                );
            }
        }
    }
    debug!("Vote worker {} stopped", id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryPollStore;

    fn config(capacity: usize, workers: usize) -> TallyConfig {
        TallyConfig {
            queue_capacity: capacity,
            worker_count: workers,
            ..Default::default()
        }
    }

    fn seeded_store() -> Arc<MemoryPollStore> {
        let store = Arc::new(MemoryPollStore::new(true));
        store.create_poll(1, "Q", true).unwrap();
        store.add_option(1, 10, "A").unwrap();
        store.add_option(1, 20, "B").unwrap();
        store
    }

    #[tokio::test]
    async fn queued_votes_reach_the_store() {
        let store = seeded_store();
        let pipeline = VotePipeline::start(store.clone(), &config(16, 2)).unwrap();

        assert!(pipeline.enqueue(VoteRequest::new(1, 10, "v1")));
        assert!(pipeline.enqueue(VoteRequest::new(1, 20, "v2")));
        assert!(pipeline.enqueue(VoteRequest::new(1, 10, "v3")));

        let report = pipeline.close().await;
        assert!(report.drained);
        assert_eq!(report.stats.applied, 3);
        assert_eq!(store.get_option(10).unwrap().votes, 2);
        assert_eq!(store.get_option(20).unwrap().votes, 1);
    }

    #[tokio::test]
    async fn refused_votes_are_dropped_and_counted() {
        let store = seeded_store();
        let pipeline = VotePipeline::start(store.clone(), &config(16, 1)).unwrap();

        assert!(pipeline.enqueue(VoteRequest::new(1, 10, "v1")));
        assert!(pipeline.enqueue(VoteRequest::new(1, 10, "v1")));
        assert!(pipeline.enqueue(VoteRequest::new(9, 10, "v2")));

        let report = pipeline.close().await;
        assert_eq!(report.stats.accepted, 3);
        assert_eq!(report.stats.applied, 1);
        assert_eq!(report.stats.dropped, 2);
        assert_eq!(report.stats.settled(), 3);
        assert_eq!(store.get_option(10).unwrap().votes, 1);
    }

    #[tokio::test]
    async fn closed_pipeline_refuses_submissions() {
        let pipeline = VotePipeline::start(seeded_store(), &config(4, 1)).unwrap();
        pipeline.close().await;

        assert!(pipeline.is_closed());
        assert!(!pipeline.enqueue(VoteRequest::new(1, 10, "late")));
        assert_eq!(
            pipeline.try_submit(VoteRequest::new(1, 10, "late")),
            Err(PipelineError::Closed)
        );
        assert_eq!(pipeline.stats().rejected, 2);

        let again = pipeline.close().await;
        assert!(again.drained);
        assert_eq!(again.discarded, 0);
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let result = VotePipeline::start(seeded_store(), &config(0, 1));
        assert!(matches!(result, Err(ConfigError::ZeroQueueCapacity)));
        let result = VotePipeline::start(seeded_store(), &config(8, 0));
        assert!(matches!(result, Err(ConfigError::ZeroWorkers)));
    }

    #[test]
    fn overload_errors_share_one_kind() {
        assert_eq!(PipelineError::Overloaded { capacity: 1 }.kind(), ErrorKind::Overload);
        assert_eq!(PipelineError::Closed.kind(), ErrorKind::Overload);
    }
}
