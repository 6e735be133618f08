use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

use vote_tally::{
    ErrorKind, MemoryPollStore, OptionId, PollStore, StoreError, VoteRequest, ALL_POLLS,
};

#[test]
fn two_options_three_votes() {
    let store = MemoryPollStore::new(true);
    store.create_poll(1, "Q", true).unwrap();
    store.add_option(1, 10, "A").unwrap();
    store.add_option(1, 20, "B").unwrap();
    store.apply_vote(&VoteRequest::new(1, 10, "v1")).unwrap();
    store.apply_vote(&VoteRequest::new(1, 20, "v2")).unwrap();
    store.apply_vote(&VoteRequest::new(1, 10, "v3")).unwrap();

    assert_eq!(store.get_option(10).unwrap().votes, 2);
    assert_eq!(store.get_option(20).unwrap().votes, 1);
    let snapshot = store.get_poll_snapshot(1).unwrap();
    assert_eq!(snapshot.leader().map(|o| o.id), Some(10));
    assert_eq!(snapshot.voters, vec!["v1", "v2", "v3"]);
}

#[test]
fn snapshot_lists_options_alphabetically() {
    let store = MemoryPollStore::new(true);
    store.create_poll(7, "Pick one", true).unwrap();
    store.add_option(7, 1, "B").unwrap();
    store.add_option(7, 2, "A").unwrap();
    store.add_option(7, 3, "C").unwrap();

    let labels: Vec<String> = store
        .get_poll_snapshot(7)
        .unwrap()
        .options
        .into_iter()
        .map(|o| o.label)
        .collect();
    assert_eq!(labels, vec!["A", "B", "C"]);
}

#[test]
fn closing_a_poll_freezes_its_counts() {
    let store = MemoryPollStore::new(true);
    store.create_poll(1, "Q", true).unwrap();
    store.add_option(1, 10, "A").unwrap();
    store.apply_vote(&VoteRequest::new(1, 10, "early")).unwrap();
    store.update_poll(1, "Q (closed)", false).unwrap();

    let err = store.apply_vote(&VoteRequest::new(1, 10, "late")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    let snapshot = store.get_poll_snapshot(1).unwrap();
    assert_eq!(snapshot.question, "Q (closed)");
    assert!(!snapshot.is_open);
    assert_eq!(snapshot.total_votes(), 1);
}

#[test]
fn error_kinds_for_crud_failures() {
    let store = MemoryPollStore::new(true);
    assert_eq!(store.update_poll(1, "Q", true).unwrap_err().kind(), ErrorKind::NotFound);
    store.create_poll(1, "Q", true).unwrap();
    assert_eq!(store.create_poll(1, "Q", true).unwrap_err().kind(), ErrorKind::Conflict);
    store.add_option(1, 10, "A").unwrap();
    assert_eq!(store.add_option(1, 10, "A").unwrap_err().kind(), ErrorKind::Conflict);
    assert_eq!(store.get_option(11).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(store.delete_voter(1, "nobody").unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn list_options_unknown_poll_is_empty() {
    let store = MemoryPollStore::new(true);
    store.create_poll(1, "Q", true).unwrap();
    store.add_option(1, 10, "A").unwrap();

    assert!(store.list_options(2).is_empty());
    assert_eq!(store.list_options(ALL_POLLS).len(), 1);
}

#[test]
fn concurrent_crud_and_votes_keep_index_consistent() {
    let store = Arc::new(MemoryPollStore::new(false));
    for poll in 1..=4u32 {
        store.create_poll(poll, &format!("Q{poll}"), true).unwrap();
        store.add_option(poll, poll * 1000, "base").unwrap();
    }

    let mut handles = Vec::new();
    for poll in 1..=4u32 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            for n in 1..=200u32 {
                let option = poll * 1000 + n;
                store.add_option(poll, option, &format!("opt{n}")).unwrap();
                store.apply_vote(&VoteRequest::new(poll, poll * 1000, "x")).unwrap();
                if n % 3 == 0 {
                    store.delete_option(option).unwrap();
                }
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let global: BTreeSet<OptionId> = store.list_options(ALL_POLLS).iter().map(|o| o.id).collect();
    let union: BTreeSet<OptionId> = (1..=4u32)
        .flat_map(|poll| store.list_options(poll))
        .map(|o| o.id)
        .collect();
    assert_eq!(global, union);
    // 1 base + 200 added - 66 deleted, per poll
    assert_eq!(global.len(), 4 * 135);
    for poll in 1..=4u32 {
        assert_eq!(store.get_option(poll * 1000).unwrap().votes, 200);
    }
}

#[test]
fn removed_option_reports_option_not_in_poll() {
    let store = MemoryPollStore::new(true);
    store.create_poll(1, "Q", true).unwrap();
    store.add_option(1, 10, "A").unwrap();
    store.delete_option(10).unwrap();

    assert_eq!(
        store.check_poll_and_option(1, 10),
        Err(StoreError::OptionNotInPoll { poll_id: 1, option_id: 10 })
    );
}
