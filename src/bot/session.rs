use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::calculator::CalculatorState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastTarget {
    Users,
    Groups,
}

/// What the next plain text message from a chat means.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ConversationState {
    #[default]
    Idle,
    AwaitingToken {
        /// Replacing an existing token rather than registering the first one.
        updating: bool,
    },
    Calculator(CalculatorState),
    AwaitingBroadcast(BroadcastTarget),
}

#[derive(Debug)]
struct SessionEntry {
    state: ConversationState,
    touched: Instant,
}

/// Per-chat conversation state with an idle timeout.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<DashMap<i64, SessionEntry>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Current state; an expired session reads as `Idle` and is dropped.
    pub fn get(&self, chat_id: i64) -> ConversationState {
        let expired = match self.sessions.get(&chat_id) {
            Some(entry) if entry.touched.elapsed() <= self.ttl => return entry.state,
            Some(_) => true,
            None => false,
        };
        if expired {
            self.sessions
                .remove_if(&chat_id, |_, entry| entry.touched.elapsed() > self.ttl);
        }
        ConversationState::Idle
    }

    pub fn set(&self, chat_id: i64, state: ConversationState) {
        if state == ConversationState::Idle {
            self.clear(chat_id);
            return;
        }
        self.sessions.insert(
            chat_id,
            SessionEntry {
                state,
                touched: Instant::now(),
            },
        );
    }

    pub fn clear(&self, chat_id: i64) {
        self.sessions.remove(&chat_id);
    }

    /// Drops every expired session, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, entry| entry.touched.elapsed() <= self.ttl);
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
