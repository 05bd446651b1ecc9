//! Tests for the SQLite history store.

use tcore::{History, Turn};
use tern_memory::SqliteHistory;

fn turn(user: &str, group: Option<&str>, message: &str, tokens: Option<u32>) -> Turn {
    Turn::new(user, group, message, "a reply", Vec::new(), tokens)
}

#[test]
fn open_on_disk_and_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.db");
    {
        let store = SqliteHistory::open(&path).unwrap();
        store.append(&turn("alice", None, "hello", Some(5))).unwrap();
    }
    let store = SqliteHistory::open(&path).unwrap();
    let turns = store.user_history("alice", 0).unwrap();
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].message, "hello");
}

#[test]
fn round_trips_images_and_tokens() {
    let store = SqliteHistory::in_memory().unwrap();
    let mut sent = turn("alice", Some("42"), "look", Some(9));
    sent.images = vec!["/tmp/a.png".into(), "/tmp/b.png".into()];
    store.append(&sent).unwrap();

    let got = &store.user_history("alice", 0).unwrap()[0];
    assert_eq!(got.images, sent.images);
    assert_eq!(got.tokens, Some(9));
    assert_eq!(got.group.as_deref(), Some("42"));
    assert!(got.history);
}

#[test]
fn unknown_tokens_round_trip_as_none() {
    let store = SqliteHistory::in_memory().unwrap();
    store.append(&turn("alice", None, "hi", None)).unwrap();
    let got = &store.user_history("alice", 0).unwrap()[0];
    assert_eq!(got.tokens, None);
}

#[test]
fn private_group_round_trips_as_none() {
    let store = SqliteHistory::in_memory().unwrap();
    store.append(&turn("alice", None, "hi", None)).unwrap();
    assert_eq!(store.user_history("alice", 0).unwrap()[0].group, None);
}

#[test]
fn history_is_bounded_and_oldest_first() {
    let store = SqliteHistory::in_memory().unwrap();
    for i in 0..5 {
        store
            .append(&turn("alice", None, &format!("m{i}"), None))
            .unwrap();
    }
    let turns = store.user_history("alice", 3).unwrap();
    assert_eq!(turns.len(), 3);
    assert_eq!(turns[0].message, "m2");
    assert_eq!(turns[2].message, "m4");
}

#[test]
fn group_history_excludes_other_groups() {
    let store = SqliteHistory::in_memory().unwrap();
    store.append(&turn("alice", Some("42"), "in 42", None)).unwrap();
    store.append(&turn("bob", Some("43"), "in 43", None)).unwrap();
    store.append(&turn("carol", None, "private", None)).unwrap();

    let turns = store.group_history("42", 0).unwrap();
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].user, "alice");
}

#[test]
fn soft_delete_hides_from_history_not_usage() {
    let store = SqliteHistory::in_memory().unwrap();
    store.append(&turn("alice", None, "hello", Some(10))).unwrap();
    store.mark_unavailable("alice").unwrap();

    assert!(store.user_history("alice", 0).unwrap().is_empty());
    let (_, total) = store.usage().unwrap();
    assert_eq!(total, 10);
}

#[test]
fn remove_last_deletes_exactly_the_newest_row() {
    let store = SqliteHistory::in_memory().unwrap();
    store.append(&turn("alice", Some("42"), "first", None)).unwrap();
    store.append(&turn("bob", None, "unrelated", None)).unwrap();
    store.append(&turn("alice", None, "second", None)).unwrap();

    let removed = store.remove_last("alice").unwrap().unwrap();
    assert_eq!(removed.message, "second");

    let rest = store.user_history("alice", 0).unwrap();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].message, "first");
    assert_eq!(store.user_history("bob", 0).unwrap().len(), 1);
}

#[test]
fn remove_last_on_empty_returns_none() {
    let store = SqliteHistory::in_memory().unwrap();
    assert!(store.remove_last("nobody").unwrap().is_none());
}

#[test]
fn usage_splits_today_from_total() {
    let store = SqliteHistory::in_memory().unwrap();
    store.append(&turn("alice", None, "today", Some(7))).unwrap();

    let mut old = turn("alice", None, "last year", Some(11));
    old.time = "2021.01.01 09:00:00".into();
    store.append(&old).unwrap();

    let mut unknown = turn("alice", None, "unknown", None);
    unknown.time = "2021.01.02 09:00:00".into();
    store.append(&unknown).unwrap();

    let (today, total) = store.usage().unwrap();
    assert_eq!(today, 7);
    assert_eq!(total, 18);
}
