use dashmap::DashSet;
use std::sync::Arc;

/// Allows at most one deadline digest in flight per chat.
#[derive(Clone, Default)]
pub struct DeadlineGuard {
    in_flight: Arc<DashSet<i64>>,
}

/// Held while a digest is being built; releases the chat on drop.
#[derive(Debug)]
pub struct GuardTicket {
    chat_id: i64,
    in_flight: Arc<DashSet<i64>>,
}

impl DeadlineGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` if a digest for `chat_id` is already running.
    pub fn try_acquire(&self, chat_id: i64) -> Option<GuardTicket> {
        if !self.in_flight.insert(chat_id) {
            return None;
        }
        Some(GuardTicket {
            chat_id,
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    pub fn is_busy(&self, chat_id: i64) -> bool {
        self.in_flight.contains(&chat_id)
    }
}

impl Drop for GuardTicket {
    fn drop(&mut self) {
        self.in_flight.remove(&self.chat_id);
    }
}
