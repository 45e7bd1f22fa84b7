//! Per-session conversation memory.
//!
//! Sessions are created implicitly on first append and never expire on
//! their own; retention is bounded only by `max_turns` with FIFO eviction.
//! Each session sits behind its own `Mutex`, so concurrent appends to the
//! same session serialize while different sessions stay independent. The
//! outer map takes a short-lived `RwLock` only to locate or create the
//! session entry.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};

use crate::models::{Role, Turn};

/// One conversation thread.
#[derive(Debug)]
pub struct Session {
    turns: VecDeque<Turn>,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

impl Session {
    fn new() -> Self {
        let now = Utc::now();
        Self {
            turns: VecDeque::new(),
            created_at: now,
            last_active_at: now,
        }
    }

    fn push(&mut self, role: Role, text: String, max_turns: usize) {
        self.turns.push_back(Turn {
            role,
            text,
            timestamp: Utc::now(),
        });
        while self.turns.len() > max_turns {
            self.turns.pop_front();
        }
        self.last_active_at = Utc::now();
    }
}

/// Keyed store of per-session message history with bounded retention.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Mutex<Session>>>>,
    max_turns: usize,
}

impl SessionStore {
    pub fn new(max_turns: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_turns,
        }
    }

    fn entry(&self, session_id: &str) -> Arc<Mutex<Session>> {
        if let Some(session) = self.sessions.read().unwrap().get(session_id) {
            return session.clone();
        }
        self.sessions
            .write()
            .unwrap()
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Session::new())))
            .clone()
    }

    /// Append one turn, creating the session if needed.
    pub fn append(&self, session_id: &str, role: Role, text: &str) {
        let session = self.entry(session_id);
        let mut session = session.lock().unwrap();
        session.push(role, text.to_string(), self.max_turns);
    }

    /// Append a question/answer pair under one lock, so a concurrent
    /// request on the same session can never interleave between them.
    pub fn append_exchange(&self, session_id: &str, question: &str, answer: &str) {
        let session = self.entry(session_id);
        let mut session = session.lock().unwrap();
        session.push(Role::User, question.to_string(), self.max_turns);
        session.push(Role::Assistant, answer.to_string(), self.max_turns);
    }

    /// The most recent `max_turns` turns, in chronological order. Always a
    /// suffix of the full history. Unknown sessions yield an empty vec.
    pub fn history(&self, session_id: &str, max_turns: usize) -> Vec<Turn> {
        let maybe = self.sessions.read().unwrap().get(session_id).cloned();
        match maybe {
            Some(session) => {
                let session = session.lock().unwrap();
                let skip = session.turns.len().saturating_sub(max_turns);
                session.turns.iter().skip(skip).cloned().collect()
            }
            None => Vec::new(),
        }
    }

    /// Drop one session's history entirely. Returns whether it existed.
    pub fn clear(&self, session_id: &str) -> bool {
        self.sessions.write().unwrap().remove(session_id).is_some()
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_implicit_create_on_append() {
        let store = SessionStore::new(10);
        assert_eq!(store.len(), 0);
        store.append("s1", Role::User, "oi");
        assert_eq!(store.len(), 1);
        assert_eq!(store.history("s1", 10).len(), 1);
    }

    #[test]
    fn test_history_is_chronological_suffix() {
        let store = SessionStore::new(10);
        for i in 0..6 {
            store.append("s1", Role::User, &format!("m{}", i));
        }
        let recent = store.history("s1", 3);
        let texts: Vec<&str> = recent.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["m3", "m4", "m5"]);
    }

    #[test]
    fn test_history_never_exceeds_requested() {
        let store = SessionStore::new(50);
        for i in 0..20 {
            store.append("s1", Role::User, &format!("m{}", i));
        }
        assert_eq!(store.history("s1", 5).len(), 5);
        assert_eq!(store.history("s1", 100).len(), 20);
    }

    #[test]
    fn test_fifo_eviction_over_capacity() {
        let store = SessionStore::new(4);
        for i in 0..7 {
            store.append("s1", Role::User, &format!("m{}", i));
        }
        let turns = store.history("s1", 10);
        let texts: Vec<&str> = turns.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["m3", "m4", "m5", "m6"]);
    }

    #[test]
    fn test_exchange_appends_both_in_order() {
        let store = SessionStore::new(10);
        store.append_exchange("s1", "pergunta", "resposta");
        let turns = store.history("s1", 10);
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[0].text, "pergunta");
        assert_eq!(turns[1].role, Role::Assistant);
        assert_eq!(turns[1].text, "resposta");
    }

    #[test]
    fn test_unknown_session_empty_history() {
        let store = SessionStore::new(10);
        assert!(store.history("nope", 10).is_empty());
    }

    #[test]
    fn test_clear_removes_session() {
        let store = SessionStore::new(10);
        store.append("s1", Role::User, "oi");
        assert!(store.clear("s1"));
        assert!(!store.clear("s1"));
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_concurrent_appends_lose_nothing() {
        let store = Arc::new(SessionStore::new(1000));
        let mut handles = Vec::new();

        for t in 0..8 {
            let store = store.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..50 {
                    store.append("shared", Role::User, &format!("t{}-m{}", t, i));
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(store.history("shared", 1000).len(), 8 * 50);
    }

    #[test]
    fn test_sessions_are_independent() {
        let store = SessionStore::new(10);
        store.append("a", Role::User, "1");
        store.append("b", Role::User, "2");
        assert_eq!(store.history("a", 10).len(), 1);
        assert_eq!(store.history("b", 10).len(), 1);
        assert_eq!(store.len(), 2);
    }
}
