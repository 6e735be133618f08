use log::{error, info, warn};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::watch;
use vote_tally::tasks::load::{self, LoadPlan};
use vote_tally::tasks::stats_reporter;
use vote_tally::{MemoryPollStore, PollStore, TallyConfig, VotePipeline};

#[tokio::main]
async fn main() {
    // Initialize logging
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = TallyConfig::from_env();
    let plan = LoadPlan::from_env();
    info!("Configuration: {:?}", config);
    info!("Load plan: {:?}", plan);

    let store = Arc::new(MemoryPollStore::from_config(&config));
    if let Err(e) = load::register_polls(store.as_ref(), &plan) {
        error!("Failed to register polls: {}", e);
        return;
    }

    let pipeline = match VotePipeline::start(store.clone(), &config) {
        Ok(pipeline) => Arc::new(pipeline),
        Err(e) => {
            error!("Failed to start vote pipeline: {}", e);
            return;
        }
    };

    // --- Start Background Task for Pipeline Stats ---
    let (stop_tx, stop_rx) = watch::channel(false);
    let reporter = config.stats_interval().map(|period| {
        tokio::spawn(stats_reporter::report_pipeline_stats(
            Arc::clone(&pipeline),
            period,
            stop_rx,
        ))
    });
    // --- End Background Task ---

    let summary = load::run(Arc::clone(&pipeline), &plan).await;
    let report = pipeline.close().await;

    let _ = stop_tx.send(true);
    if let Some(reporter) = reporter {
        if let Err(e) = reporter.await {
            warn!("Stats reporter ended abnormally: {}", e);
        }
    }

    let secs = summary.elapsed.as_secs_f64().max(f64::EPSILON);
    info!(
        "Submitted {} vote(s) in {:?} ({:.0}/s), {} retries after overload, {} abandoned",
        summary.submitted,
        summary.elapsed,
        summary.submitted as f64 / secs,
        summary.retries,
        summary.abandoned
    );
    if !report.drained {
        warn!("{} accepted vote(s) were discarded at shutdown", report.discarded);
    }

    for snapshot in store.list_poll_snapshots() {
        let standings = json!({
            "poll_id": snapshot.id,
            "question": snapshot.question,
            "is_open": snapshot.is_open,
            "total_votes": snapshot.total_votes(),
            "leader": snapshot.leader().map(|option| option.label.clone()),
            "options": snapshot.options,
            "voters": snapshot.voters.len(),
        });
        info!("{}", standings);
    }
}
