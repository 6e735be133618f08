mod memory;

pub use memory::MemoryPollStore;

use crate::models::{OptionId, OptionItem, PollId, PollSnapshot, VoteRequest};
use thiserror::Error;

/// Category of a failure, for callers that map errors onto responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    InvalidState,
    Overload,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("poll {0} not found")]
    PollNotFound(PollId),
    #[error("option {0} not found")]
    OptionNotFound(OptionId),
    #[error("option {option_id} not found in poll {poll_id}")]
    OptionNotInPoll { poll_id: PollId, option_id: OptionId },
    #[error("voter '{voter_id}' not found in poll {poll_id}")]
    VoterNotFound { poll_id: PollId, voter_id: String },
    #[error("poll {0} already exists")]
    PollExists(PollId),
    #[error("option {0} already exists")]
    OptionExists(OptionId),
    #[error("voter '{voter_id}' already registered in poll {poll_id}")]
    VoterExists { poll_id: PollId, voter_id: String },
    #[error("voter '{voter_id}' has already voted in poll {poll_id}")]
    DuplicateVoter { poll_id: PollId, voter_id: String },
    #[error("poll {0} is closed")]
    PollClosed(PollId),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PollNotFound(_)
            | Self::OptionNotFound(_)
            | Self::OptionNotInPoll { .. }
            | Self::VoterNotFound { .. } => ErrorKind::NotFound,
            Self::PollExists(_)
            | Self::OptionExists(_)
            | Self::VoterExists { .. }
            | Self::DuplicateVoter { .. } => ErrorKind::Conflict,
            Self::PollClosed(_) => ErrorKind::InvalidState,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Operations every poll backend provides.
///
/// The in-memory store is the reference implementation. A durable backend
/// plugs into the ingestion pipeline by implementing the same contract:
///
/// - `apply_vote` is the only path that changes vote counts. Its open check,
///   duplicate-voter check and increment happen as one atomic step per poll.
/// - Vote counts only ever go up, by exactly one per successful `apply_vote`.
/// - Option IDs are unique across the whole store, not just within a poll.
/// - Deleting a poll makes all of its option IDs unresolvable.
/// - Snapshots and listings are independent copies in a deterministic order.
pub trait PollStore: Send + Sync {
    fn create_poll(&self, id: PollId, question: &str, is_open: bool) -> StoreResult<()>;
    fn update_poll(&self, id: PollId, question: &str, is_open: bool) -> StoreResult<()>;
    fn delete_poll(&self, id: PollId) -> StoreResult<()>;

    fn add_option(&self, poll_id: PollId, option_id: OptionId, label: &str) -> StoreResult<()>;
    fn update_option(&self, option_id: OptionId, label: &str) -> StoreResult<()>;
    fn delete_option(&self, option_id: OptionId) -> StoreResult<()>;

    fn add_voter(&self, poll_id: PollId, voter_id: &str) -> StoreResult<()>;
    fn delete_voter(&self, poll_id: PollId, voter_id: &str) -> StoreResult<()>;

    /// Advisory pre-check. Nothing stops the poll or option from changing
    /// right after this returns; only `apply_vote` is authoritative.
    fn check_poll_and_option(&self, poll_id: PollId, option_id: OptionId) -> StoreResult<()>;
    fn apply_vote(&self, vote: &VoteRequest) -> StoreResult<()>;

    fn get_option(&self, option_id: OptionId) -> StoreResult<OptionItem>;
    fn get_poll_snapshot(&self, poll_id: PollId) -> StoreResult<PollSnapshot>;
    /// All polls, ordered by question and then ID.
    fn list_poll_snapshots(&self) -> Vec<PollSnapshot>;
    /// Options of one poll, or of every poll when `poll_id` is [`crate::models::ALL_POLLS`].
    fn list_options(&self, poll_id: PollId) -> Vec<OptionItem>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds_cover_taxonomy() {
        assert_eq!(StoreError::PollNotFound(1).kind(), ErrorKind::NotFound);
        assert_eq!(
            StoreError::OptionNotInPoll { poll_id: 1, option_id: 2 }.kind(),
            ErrorKind::NotFound
        );
        assert_eq!(StoreError::OptionExists(3).kind(), ErrorKind::Conflict);
        assert_eq!(
            StoreError::DuplicateVoter { poll_id: 1, voter_id: "v".into() }.kind(),
            ErrorKind::Conflict
        );
        assert_eq!(StoreError::PollClosed(1).kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn error_messages_name_the_ids() {
        let err = StoreError::OptionNotInPoll { poll_id: 7, option_id: 70 };
        assert_eq!(err.to_string(), "option 70 not found in poll 7");
    }
}
