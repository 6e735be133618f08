use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};

use super::{PollStore, StoreError, StoreResult};
use crate::config::TallyConfig;
use crate::models::{self, OptionId, OptionItem, PollId, PollSnapshot, VoteRequest, ALL_POLLS};

// Shared by every caller that touches this poll. Handed out as an Arc so the
// structural lock can be released before the poll lock is taken.
struct PollEntry {
    id: PollId,
    state: Mutex<PollState>,
}

struct PollState {
    question: String,
    is_open: bool,
    options: HashMap<OptionId, OptionState>,
    voters: HashSet<String>,
    // Set under the poll lock when the poll leaves the catalog, so a vote that
    // resolved the entry just before deletion cannot land on it.
    deleted: bool,
}

struct OptionState {
    label: String,
    votes: u64,
}

#[derive(Default)]
struct Catalog {
    polls: HashMap<PollId, Arc<PollEntry>>,
    option_index: HashMap<OptionId, Arc<PollEntry>>,
}

/// In-memory poll store with one structural lock and one lock per poll.
///
/// The catalog lock guards which polls exist and which poll owns each option
/// ID. Everything inside a poll (question, open flag, voters, option labels
/// and counts) is guarded by that poll's own mutex. Locks are always taken in
/// catalog-then-poll order.
pub struct MemoryPollStore {
    catalog: RwLock<Catalog>,
    track_voters: bool,
}

impl MemoryPollStore {
    /// Create an empty store.
    ///
    /// With `track_voters` off, `apply_vote` skips the duplicate-voter check
    /// and never records voters, so one voter ID can vote any number of times.
    /// That mode exists for measuring raw tally throughput.
    pub fn new(track_voters: bool) -> Self {
        if track_voters {
            info!("Poll store created with voter tracking enabled");
        } else {
            warn!("Poll store created with voter tracking DISABLED; repeat votes are accepted");
        }
        Self {
            catalog: RwLock::new(Catalog::default()),
            track_voters,
        }
    }

    pub fn from_config(config: &TallyConfig) -> Self {
        Self::new(!config.skip_voter_tracking)
    }

    pub fn tracks_voters(&self) -> bool {
        self.track_voters
    }

    pub fn poll_count(&self) -> usize {
        self.catalog.read().polls.len()
    }

    pub fn option_count(&self) -> usize {
        self.catalog.read().option_index.len()
    }

    fn resolve_poll(&self, id: PollId) -> StoreResult<Arc<PollEntry>> {
        self.catalog
            .read()
            .polls
            .get(&id)
            .cloned()
            .ok_or(StoreError::PollNotFound(id))
    }

    fn snapshot(entry: &PollEntry) -> PollSnapshot {
        let state = entry.state.lock();
        let mut options: Vec<OptionItem> = state
            .options
            .iter()
            .map(|(id, option)| option.to_item(*id))
            .collect();
        let mut voters: Vec<String> = state.voters.iter().cloned().collect();
        let question = state.question.clone();
        let is_open = state.is_open;
        drop(state);

        models::sort_options(&mut options);
        voters.sort();
        PollSnapshot {
            id: entry.id,
            question,
            is_open,
            options,
            voters,
        }
    }
}

impl OptionState {
    fn to_item(&self, id: OptionId) -> OptionItem {
        OptionItem {
            id,
            label: self.label.clone(),
            votes: self.votes,
        }
    }
}

impl PollStore for MemoryPollStore {
    fn create_poll(&self, id: PollId, question: &str, is_open: bool) -> StoreResult<()> {
        let mut catalog = self.catalog.write();
        if catalog.polls.contains_key(&id) {
            return Err(StoreError::PollExists(id));
        }
        let entry = PollEntry {
            id,
            state: Mutex::new(PollState {
                question: question.to_string(),
                is_open,
                options: HashMap::new(),
                voters: HashSet::new(),
                deleted: false,
            }),
        };
        catalog.polls.insert(id, Arc::new(entry));
        debug!("Created poll {} (open: {})", id, is_open);
        Ok(())
    }

    fn update_poll(&self, id: PollId, question: &str, is_open: bool) -> StoreResult<()> {
        let entry = self.resolve_poll(id)?;
        let mut state = entry.state.lock();
        if state.deleted {
            return Err(StoreError::PollNotFound(id));
        }
        state.question = question.to_string();
        state.is_open = is_open;
        debug!("Updated poll {} (open: {})", id, is_open);
        Ok(())
    }

    fn delete_poll(&self, id: PollId) -> StoreResult<()> {
        let mut catalog = self.catalog.write();
        let entry = catalog
            .polls
            .remove(&id)
            .ok_or(StoreError::PollNotFound(id))?;

        let mut state = entry.state.lock();
        for option_id in state.options.keys() {
            catalog.option_index.remove(option_id);
        }
        let removed = state.options.len();
        state.options.clear();
        state.deleted = true;
        debug!("Deleted poll {} and {} option(s)", id, removed);
        Ok(())
    }

    fn add_option(&self, poll_id: PollId, option_id: OptionId, label: &str) -> StoreResult<()> {
        let mut catalog = self.catalog.write();
        let entry = catalog
            .polls
            .get(&poll_id)
            .cloned()
            .ok_or(StoreError::PollNotFound(poll_id))?;
        if catalog.option_index.contains_key(&option_id) {
            return Err(StoreError::OptionExists(option_id));
        }

        entry.state.lock().options.insert(
            option_id,
            OptionState {
                label: label.to_string(),
                votes: 0,
            },
        );
        catalog.option_index.insert(option_id, entry);
        debug!("Added option {} to poll {}", option_id, poll_id);
        Ok(())
    }

    fn update_option(&self, option_id: OptionId, label: &str) -> StoreResult<()> {
        let entry = self
            .catalog
            .read()
            .option_index
            .get(&option_id)
            .cloned()
            .ok_or(StoreError::OptionNotFound(option_id))?;

        let mut state = entry.state.lock();
        match state.options.get_mut(&option_id) {
            Some(option) => {
                option.label = label.to_string();
                Ok(())
            }
            None => Err(StoreError::OptionNotFound(option_id)),
        }
    }

    fn delete_option(&self, option_id: OptionId) -> StoreResult<()> {
        let mut catalog = self.catalog.write();
        let entry = catalog
            .option_index
            .remove(&option_id)
            .ok_or(StoreError::OptionNotFound(option_id))?;
        entry.state.lock().options.remove(&option_id);
        debug!("Deleted option {} from poll {}", option_id, entry.id);
        Ok(())
    }

    fn add_voter(&self, poll_id: PollId, voter_id: &str) -> StoreResult<()> {
        let entry = self.resolve_poll(poll_id)?;
        let mut state = entry.state.lock();
        if state.deleted {
            return Err(StoreError::PollNotFound(poll_id));
        }
        if !state.voters.insert(voter_id.to_string()) {
            return Err(StoreError::VoterExists {
                poll_id,
                voter_id: voter_id.to_string(),
            });
        }
        Ok(())
    }

    fn delete_voter(&self, poll_id: PollId, voter_id: &str) -> StoreResult<()> {
        let entry = self.resolve_poll(poll_id)?;
        let mut state = entry.state.lock();
        if state.deleted {
            return Err(StoreError::PollNotFound(poll_id));
        }
        if !state.voters.remove(voter_id) {
            return Err(StoreError::VoterNotFound {
                poll_id,
                voter_id: voter_id.to_string(),
            });
        }
        Ok(())
    }

    fn check_poll_and_option(&self, poll_id: PollId, option_id: OptionId) -> StoreResult<()> {
        let catalog = self.catalog.read();
        let entry = catalog
            .polls
            .get(&poll_id)
            .ok_or(StoreError::PollNotFound(poll_id))?;
        let state = entry.state.lock();
        if !state.is_open {
            return Err(StoreError::PollClosed(poll_id));
        }
        if !state.options.contains_key(&option_id) {
            return Err(StoreError::OptionNotInPoll { poll_id, option_id });
        }
        Ok(())
    }

    fn apply_vote(&self, vote: &VoteRequest) -> StoreResult<()> {
        let poll_id = vote.poll_id;
        let option_id = vote.option_id;

        // Resolve under the shared catalog lock, then drop it before
        // contending on the poll itself.
        let entry = {
            let catalog = self.catalog.read();
            let entry = catalog
                .polls
                .get(&poll_id)
                .cloned()
                .ok_or(StoreError::PollNotFound(poll_id))?;
            match catalog.option_index.get(&option_id) {
                Some(owner) if owner.id == poll_id => {}
                _ => return Err(StoreError::OptionNotInPoll { poll_id, option_id }),
            }
            entry
        };

        let mut guard = entry.state.lock();
        let state = &mut *guard;
        if state.deleted {
            return Err(StoreError::PollNotFound(poll_id));
        }
        if !state.is_open {
            return Err(StoreError::PollClosed(poll_id));
        }
        // The option may have been deleted between resolution and here.
        let Some(option) = state.options.get_mut(&option_id) else {
            return Err(StoreError::OptionNotInPoll { poll_id, option_id });
        };
        if self.track_voters {
            if state.voters.contains(&vote.voter_id) {
                return Err(StoreError::DuplicateVoter {
                    poll_id,
                    voter_id: vote.voter_id.clone(),
                });
            }
            state.voters.insert(vote.voter_id.clone());
        }
        option.votes += 1;
        Ok(())
    }

    fn get_option(&self, option_id: OptionId) -> StoreResult<OptionItem> {
        let catalog = self.catalog.read();
        let entry = catalog
            .option_index
            .get(&option_id)
            .ok_or(StoreError::OptionNotFound(option_id))?;
        let state = entry.state.lock();
        state
            .options
            .get(&option_id)
            .map(|option| option.to_item(option_id))
            .ok_or(StoreError::OptionNotFound(option_id))
    }

    fn get_poll_snapshot(&self, poll_id: PollId) -> StoreResult<PollSnapshot> {
        let catalog = self.catalog.read();
        let entry = catalog
            .polls
            .get(&poll_id)
            .ok_or(StoreError::PollNotFound(poll_id))?;
        Ok(Self::snapshot(entry))
    }

    fn list_poll_snapshots(&self) -> Vec<PollSnapshot> {
        let catalog = self.catalog.read();
        let mut snapshots: Vec<PollSnapshot> = catalog
            .polls
            .values()
            .map(|entry| Self::snapshot(entry))
            .collect();
        drop(catalog);

        models::sort_snapshots(&mut snapshots);
        snapshots
    }

    fn list_options(&self, poll_id: PollId) -> Vec<OptionItem> {
        let catalog = self.catalog.read();
        let mut out = Vec::new();

        if poll_id == ALL_POLLS {
            // Walk the global index, locking each owning poll once.
            let mut owners: HashMap<PollId, &Arc<PollEntry>> = HashMap::new();
            for owner in catalog.option_index.values() {
                owners.entry(owner.id).or_insert(owner);
            }
            for owner in owners.values() {
                let state = owner.state.lock();
                out.extend(
                    state
                        .options
                        .iter()
                        .filter(|(id, _)| catalog.option_index.contains_key(*id))
                        .map(|(id, option)| option.to_item(*id)),
                );
            }
        } else if let Some(entry) = catalog.polls.get(&poll_id) {
            let state = entry.state.lock();
            out.extend(
                state
                    .options
                    .iter()
                    .map(|(id, option)| option.to_item(*id)),
            );
        }
        drop(catalog);

        models::sort_options(&mut out);
        out
    }
}
