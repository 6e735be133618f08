use crate::db::{PollStore, StoreResult};
use crate::models::{OptionId, PollId, VoteRequest};
use crate::pipeline::{PipelineError, VotePipeline};
use log::{info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

const LABELS: [&str; 8] = ["A", "B", "C", "D", "E", "F", "G", "H"];

// Shape of a synthetic voting run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadPlan {
    pub polls: u32,
    pub options_per_poll: u32,
    pub votes: u64,
    pub submitters: usize,
}

impl Default for LoadPlan {
    fn default() -> Self {
        Self {
            polls: 1,
            options_per_poll: 3,
            votes: 100_000,
            submitters: 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    pub submitted: u64,
    pub retries: u64,
    pub abandoned: u64,
    pub elapsed: Duration,
}

impl LoadPlan {
    // Read LOAD_POLLS, LOAD_OPTIONS, LOAD_VOTES and LOAD_SUBMITTERS, keeping defaults for anything unset or invalid
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let read = |key: &str, fallback: u64| -> u64 {
            match lookup(key).map(|raw| raw.trim().parse::<u64>()) {
                Some(Ok(n)) if n > 0 => n,
                Some(_) => {
                    warn!("invalid {}, using default {}", key, fallback);
                    fallback
                }
                None => fallback,
            }
        };

        Self {
            // Option IDs are derived as poll_id * 100 + n, keep them inside u32
            polls: read("LOAD_POLLS", defaults.polls.into()).min(1_000_000) as u32,
            options_per_poll: read("LOAD_OPTIONS", defaults.options_per_poll.into())
                .min(LABELS.len() as u64) as u32,
            votes: read("LOAD_VOTES", defaults.votes),
            submitters: read("LOAD_SUBMITTERS", defaults.submitters as u64) as usize,
        }
    }

    // Poll IDs start at 1 since 0 is reserved
    pub fn poll_id(&self, n: u64) -> PollId {
        (n % u64::from(self.polls)) as PollId + 1
    }

    pub fn option_id(poll_id: PollId, index: u32) -> OptionId {
        poll_id * 100 + index + 1
    }
}

// Create the demo polls through the regular store contract
pub fn register_polls(store: &dyn PollStore, plan: &LoadPlan) -> StoreResult<()> {
    for n in 0..plan.polls {
        let poll_id = n + 1;
        store.create_poll(poll_id, &format!("Poll {}: which option do you prefer?", poll_id), true)?;
        for index in 0..plan.options_per_poll {
            let label = format!("Option {}", LABELS[index as usize]);
            store.add_option(poll_id, LoadPlan::option_id(poll_id, index), &label)?;
        }
    }
    info!(
        "Registered {} poll(s) with {} option(s) each",
        plan.polls, plan.options_per_poll
    );
    Ok(())
}

// Fire `plan.votes` votes through the pipeline from `plan.submitters` concurrent tasks.
// Rejected submissions are retried after yielding, the way a well-behaved client backs off.
pub async fn run(pipeline: Arc<VotePipeline>, plan: &LoadPlan) -> LoadSummary {
    let started = Instant::now();
    let submitters = plan.submitters.max(1) as u64;
    let mut handles = Vec::with_capacity(submitters as usize);

    for submitter in 0..submitters {
        let pipeline = Arc::clone(&pipeline);
        let plan = plan.clone();
        handles.push(tokio::spawn(async move {
            let mut submitted = 0u64;
            let mut retries = 0u64;
            let mut abandoned = 0u64;
            let mut n = submitter;
            while n < plan.votes {
                let poll_id = plan.poll_id(n);
                let index = (n / u64::from(plan.polls) % u64::from(plan.options_per_poll)) as u32;
                let vote = VoteRequest::new(
                    poll_id,
                    LoadPlan::option_id(poll_id, index),
                    Uuid::new_v4().to_string(),
                );
                loop {
                    match pipeline.try_submit(vote.clone()) {
                        Ok(()) => {
                            submitted += 1;
                            break;
                        }
                        Err(PipelineError::Overloaded { .. }) => {
                            retries += 1;
                            tokio::task::yield_now().await;
                        }
                        Err(PipelineError::Closed) => {
                            abandoned += 1;
                            break;
                        }
                    }
                }
                n += submitters;
            }
            (submitted, retries, abandoned)
        }));
    }

    let mut summary = LoadSummary {
        submitted: 0,
        retries: 0,
        abandoned: 0,
        elapsed: Duration::ZERO,
    };
    for handle in handles {
        match handle.await {
            Ok((submitted, retries, abandoned)) => {
                summary.submitted += submitted;
                summary.retries += retries;
                summary.abandoned += abandoned;
            }
            Err(e) => warn!("Load submitter failed: {}", e),
        }
    }
    summary.elapsed = started.elapsed();
    summary
}
