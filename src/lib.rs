//! Concurrent vote tallying.
//!
//! Two pieces do the work:
//!
//! - [`db`]: the [`PollStore`] contract and [`MemoryPollStore`], a store with
//!   one structural lock for the poll catalog and one lock per poll, so votes
//!   on different polls never wait on each other.
//! - [`pipeline`]: [`VotePipeline`], a bounded queue plus a worker pool that
//!   accepts votes without blocking and applies them in the background. A full
//!   queue rejects new votes immediately.
//!
//! ```no_run
//! use std::sync::Arc;
//! use vote_tally::{MemoryPollStore, PollStore, TallyConfig, VotePipeline, VoteRequest};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = TallyConfig::from_env();
//!     let store = Arc::new(MemoryPollStore::from_config(&config));
//!     store.create_poll(1, "Which option do you prefer?", true).unwrap();
//!     store.add_option(1, 10, "Option A").unwrap();
//!
//!     let pipeline = VotePipeline::start(store.clone(), &config).unwrap();
//!     if !pipeline.enqueue(VoteRequest::new(1, 10, "voter-1")) {
//!         eprintln!("busy, retry later");
//!     }
//!     pipeline.close().await;
//!     assert_eq!(store.get_option(10).unwrap().votes, 1);
//! }
//! ```

pub mod config;
pub mod db;
pub mod models;
pub mod pipeline;
pub mod tasks;

pub use config::{ConfigError, TallyConfig};
pub use db::{ErrorKind, MemoryPollStore, PollStore, StoreError, StoreResult};
pub use models::{OptionId, OptionItem, PollId, PollSnapshot, VoteRequest, ALL_POLLS};
pub use pipeline::{CloseReport, PipelineError, PipelineStats, VotePipeline};
