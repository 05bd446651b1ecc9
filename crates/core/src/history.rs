//! Conversation history contract.
//!
//! The orchestrator only needs an append-only turn log keyed by user and
//! group with monotonic ordering; the storage engine behind it is a
//! collaborator's concern. [`MemHistory`] is the in-process implementation;
//! the sqlite-backed one lives in its own crate.

use crate::{HistoryError, Turn};
use chrono::Local;
use std::sync::Mutex;

/// The persistence contract the orchestrator needs.
///
/// Retrieval returns the most recent `limit` turns ordered oldest first;
/// `limit == 0` means no bound. All methods take `&self`; implementations
/// handle interior mutability.
pub trait History: Send + Sync {
    /// Append one completed turn.
    fn append(&self, turn: &Turn) -> Result<(), HistoryError>;

    /// A user's turns that still count toward history.
    fn user_history(&self, user: &str, limit: usize) -> Result<Vec<Turn>, HistoryError>;

    /// A group's turns that still count toward history.
    fn group_history(&self, group: &str, limit: usize) -> Result<Vec<Turn>, HistoryError>;

    /// Soft-delete: exclude all of a user's turns from future retrieval.
    fn mark_unavailable(&self, user: &str) -> Result<(), HistoryError>;

    /// Physically remove the user's most recent turn and return it.
    fn remove_last(&self, user: &str) -> Result<Option<Turn>, HistoryError>;

    /// Token usage aggregation as `(today, total)`.
    fn usage(&self) -> Result<(u64, u64), HistoryError>;
}

/// Vec-backed history for tests and ephemeral deployments.
#[derive(Debug, Default)]
pub struct MemHistory {
    turns: Mutex<Vec<Turn>>,
}

impl MemHistory {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored turns, soft-deleted ones included.
    pub fn len(&self) -> usize {
        self.turns.lock().expect("history lock poisoned").len()
    }

    /// Whether the store holds no turns at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn bounded(mut turns: Vec<Turn>, limit: usize) -> Vec<Turn> {
    if limit > 0 && turns.len() > limit {
        turns.drain(..turns.len() - limit);
    }
    turns
}

impl History for MemHistory {
    fn append(&self, turn: &Turn) -> Result<(), HistoryError> {
        self.turns
            .lock()
            .expect("history lock poisoned")
            .push(turn.clone());
        Ok(())
    }

    fn user_history(&self, user: &str, limit: usize) -> Result<Vec<Turn>, HistoryError> {
        let turns = self.turns.lock().expect("history lock poisoned");
        let matched = turns
            .iter()
            .filter(|t| t.history && t.user == user)
            .cloned()
            .collect();
        Ok(bounded(matched, limit))
    }

    fn group_history(&self, group: &str, limit: usize) -> Result<Vec<Turn>, HistoryError> {
        let turns = self.turns.lock().expect("history lock poisoned");
        let matched = turns
            .iter()
            .filter(|t| t.history && t.group.as_deref() == Some(group))
            .cloned()
            .collect();
        Ok(bounded(matched, limit))
    }

    fn mark_unavailable(&self, user: &str) -> Result<(), HistoryError> {
        let mut turns = self.turns.lock().expect("history lock poisoned");
        for turn in turns.iter_mut().filter(|t| t.user == user) {
            turn.history = false;
        }
        Ok(())
    }

    fn remove_last(&self, user: &str) -> Result<Option<Turn>, HistoryError> {
        let mut turns = self.turns.lock().expect("history lock poisoned");
        let at = turns.iter().rposition(|t| t.user == user);
        Ok(at.map(|at| turns.remove(at)))
    }

    fn usage(&self) -> Result<(u64, u64), HistoryError> {
        let today = Local::now().format("%Y.%m.%d").to_string();
        let turns = self.turns.lock().expect("history lock poisoned");
        let mut today_total = 0u64;
        let mut total = 0u64;
        for turn in turns.iter() {
            let Some(tokens) = turn.tokens else { continue };
            total += u64::from(tokens);
            if turn.time.starts_with(&today) {
                today_total += u64::from(tokens);
            }
        }
        Ok((today_total, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(user: &str, group: Option<&str>, message: &str) -> Turn {
        Turn::new(user, group, message, "reply", Vec::new(), Some(10))
    }

    #[test]
    fn user_history_is_bounded_and_oldest_first() {
        let store = MemHistory::new();
        for i in 0..5 {
            store.append(&turn("alice", None, &format!("m{i}"))).unwrap();
        }
        let turns = store.user_history("alice", 2).unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].message, "m3");
        assert_eq!(turns[1].message, "m4");
    }

    #[test]
    fn zero_limit_returns_everything() {
        let store = MemHistory::new();
        for i in 0..4 {
            store.append(&turn("alice", None, &format!("m{i}"))).unwrap();
        }
        assert_eq!(store.user_history("alice", 0).unwrap().len(), 4);
    }

    #[test]
    fn mark_unavailable_hides_but_keeps_turns() {
        let store = MemHistory::new();
        store.append(&turn("alice", None, "hello")).unwrap();
        store.mark_unavailable("alice").unwrap();
        assert!(store.user_history("alice", 0).unwrap().is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn remove_last_pops_newest_only() {
        let store = MemHistory::new();
        store.append(&turn("alice", None, "first")).unwrap();
        store.append(&turn("bob", None, "other")).unwrap();
        store.append(&turn("alice", None, "second")).unwrap();
        let removed = store.remove_last("alice").unwrap().unwrap();
        assert_eq!(removed.message, "second");
        let rest = store.user_history("alice", 0).unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].message, "first");
    }

    #[test]
    fn remove_last_on_empty_is_none() {
        let store = MemHistory::new();
        assert!(store.remove_last("nobody").unwrap().is_none());
    }

    #[test]
    fn group_history_filters_by_group() {
        let store = MemHistory::new();
        store.append(&turn("alice", Some("42"), "in group")).unwrap();
        store.append(&turn("alice", None, "private")).unwrap();
        let turns = store.group_history("42", 0).unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].message, "in group");
    }

    #[test]
    fn usage_counts_known_tokens() {
        let store = MemHistory::new();
        store.append(&turn("alice", None, "a")).unwrap();
        let mut unknown = turn("alice", None, "b");
        unknown.tokens = None;
        store.append(&unknown).unwrap();
        let (today, total) = store.usage().unwrap();
        assert_eq!(total, 10);
        assert_eq!(today, 10);
    }
}
