use serde::{Deserialize, Serialize};

pub type PollId = u32;
pub type OptionId = u32;

/// Poll ID reserved by `list_options` to mean "every option in the store".
pub const ALL_POLLS: PollId = 0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionItem {
    pub id: OptionId,
    pub label: String,
    pub votes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoteRequest {
    pub poll_id: PollId,
    pub option_id: OptionId,
    pub voter_id: String,
}

impl VoteRequest {
    pub fn new(poll_id: PollId, option_id: OptionId, voter_id: impl Into<String>) -> Self {
        Self {
            poll_id,
            option_id,
            voter_id: voter_id.into(),
        }
    }
}

/// Point-in-time copy of a poll.
///
/// Options are ordered by label, then ID. Voters are ordered lexicographically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSnapshot {
    pub id: PollId,
    pub question: String,
    pub is_open: bool,
    pub options: Vec<OptionItem>,
    pub voters: Vec<String>,
}

impl PollSnapshot {
    // Sum of all option counts at the time the snapshot was taken
    pub fn total_votes(&self) -> u64 {
        self.options.iter().map(|option| option.votes).sum()
    }

    // Option with the most votes. Ties go to the option listed first.
    pub fn leader(&self) -> Option<&OptionItem> {
        self.options
            .iter()
            .filter(|option| option.votes > 0)
            .fold(None, |best: Option<&OptionItem>, option| match best {
                Some(current) if current.votes >= option.votes => Some(current),
                _ => Some(option),
            })
    }
}

pub(crate) fn sort_options(options: &mut [OptionItem]) {
    options.sort_by(|a, b| a.label.cmp(&b.label).then(a.id.cmp(&b.id)));
}

pub(crate) fn sort_snapshots(snapshots: &mut [PollSnapshot]) {
    snapshots.sort_by(|a, b| a.question.cmp(&b.question).then(a.id.cmp(&b.id)));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(id: OptionId, label: &str, votes: u64) -> OptionItem {
        OptionItem {
            id,
            label: label.to_string(),
            votes,
        }
    }

    fn snapshot(options: Vec<OptionItem>) -> PollSnapshot {
        PollSnapshot {
            id: 1,
            question: "Q".to_string(),
            is_open: true,
            options,
            voters: Vec::new(),
        }
    }

    #[test]
    fn options_sort_by_label_then_id() {
        let mut options = vec![option(3, "B", 0), option(2, "A", 0), option(1, "B", 0)];
        sort_options(&mut options);
        let ids: Vec<OptionId> = options.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[test]
    fn leader_prefers_first_on_tie() {
        let snap = snapshot(vec![option(1, "A", 4), option(2, "B", 4), option(3, "C", 1)]);
        assert_eq!(snap.leader().map(|o| o.id), Some(1));
        assert_eq!(snap.total_votes(), 9);
    }

    #[test]
    fn leader_is_none_without_votes() {
        let snap = snapshot(vec![option(1, "A", 0)]);
        assert!(snap.leader().is_none());
        assert_eq!(snap.total_votes(), 0);
    }

    #[test]
    fn vote_request_serializes_with_snake_case_fields() {
        let req = VoteRequest::new(1, 10, "v1");
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["poll_id"], 1);
        assert_eq!(json["option_id"], 10);
        assert_eq!(json["voter_id"], "v1");
    }
}
