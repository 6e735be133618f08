use crate::pipeline::{PipelineStats, VotePipeline};
use chrono::Utc;
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

// Periodically log pipeline counters until `shutdown` flips to true or its sender goes away.
// This is where dropped and rejected votes become visible to operators.
pub async fn report_pipeline_stats(
    pipeline: Arc<VotePipeline>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("Starting pipeline stats reporter (every {:?})", period);
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await; // First tick completes immediately

    let mut last = pipeline.stats();
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let current = pipeline.stats();
                log_delta(&last, &current, pipeline.capacity());
                last = current;
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    info!("Pipeline stats reporter stopped");
}

fn log_delta(last: &PipelineStats, current: &PipelineStats, capacity: usize) {
    let applied = current.applied - last.applied;
    let dropped = current.dropped - last.dropped;
    let rejected = current.rejected - last.rejected;

    info!(
        "[{}] queue {}/{}, +{} applied, +{} dropped, +{} rejected (totals: {} accepted, {} applied, {} dropped)",
        Utc::now().to_rfc3339(),
        current.queue_depth,
        capacity,
        applied,
        dropped,
        rejected,
        current.accepted,
        current.applied,
        current.dropped
    );
    if rejected > 0 {
        warn!("Vote queue saturated: {} submission(s) turned away since last report", rejected);
    }
}
