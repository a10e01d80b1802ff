//! Messages waiting for transmission, and local id generation.

use std::collections::VecDeque;

use chrono::Utc;

use obrol_shared::constants::LOCAL_ID_PREFIX;
use obrol_shared::Message;

/// FIFO of provisional messages that could not be transmitted yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutboundQueue {
    entries: VecDeque<Message>,
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from the persisted copy, keeping its order.
    pub fn from_persisted(entries: Vec<Message>) -> Self {
        Self {
            entries: entries.into(),
        }
    }

    pub fn push(&mut self, message: Message) {
        self.entries.push_back(message);
    }

    /// Next message to transmit.
    pub fn front(&self) -> Option<&Message> {
        self.entries.front()
    }

    /// Remove the head after it was transmitted.
    pub fn pop_front(&mut self) -> Option<Message> {
        self.entries.pop_front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy for persistence or for the presentation layer.
    pub fn to_vec(&self) -> Vec<Message> {
        self.entries.iter().cloned().collect()
    }
}

/// Generates time-based ids for provisional messages:
/// `local_<unix-millis>_<sequence>`.  The per-session sequence keeps two
/// messages composed in the same millisecond apart.
#[derive(Debug, Default)]
pub struct LocalIds {
    sequence: u64,
}

impl LocalIds {
    pub fn next_id(&mut self) -> String {
        let id = format!(
            "{LOCAL_ID_PREFIX}{}_{}",
            Utc::now().timestamp_millis(),
            self.sequence
        );
        self.sequence += 1;
        id
    }
}
