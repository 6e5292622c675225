//! Bounded, ordered history of displayed chat entries.
//!
//! Insertion order is display order. When the buffer overflows the oldest
//! entries are evicted first; there is no priority and no deduplication.

use std::collections::VecDeque;

use envelope::{ChatPayload, OtherPayload};

pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// Rendered in place of a missing timestamp.
pub const TIMESTAMP_PLACEHOLDER: &str = "??:??";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub user: String,
    pub text: String,
    pub timestamp: Option<String>,
}

impl ChatMessage {
    #[must_use]
    pub fn display_timestamp(&self) -> &str {
        self.timestamp
            .as_deref()
            .filter(|ts| !ts.is_empty())
            .unwrap_or(TIMESTAMP_PLACEHOLDER)
    }
}

impl From<ChatPayload> for ChatMessage {
    fn from(payload: ChatPayload) -> Self {
        Self {
            user: payload.user,
            text: payload.text,
            timestamp: payload.timestamp,
        }
    }
}

impl From<OtherPayload> for ChatMessage {
    fn from(payload: OtherPayload) -> Self {
        Self {
            user: payload.user.unwrap_or_default(),
            text: payload.text.unwrap_or_default(),
            timestamp: payload.timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryEntry {
    Chat(ChatMessage),
    /// Server or client notice; no user, no timestamp.
    System { text: String },
}

impl HistoryEntry {
    #[must_use]
    pub fn system(text: impl Into<String>) -> Self {
        Self::System { text: text.into() }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Chat(msg) => &msg.text,
            Self::System { text } => text,
        }
    }

    #[must_use]
    pub fn is_system(&self) -> bool {
        matches!(self, Self::System { .. })
    }
}

#[derive(Debug, Clone)]
pub struct MessageHistory {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl MessageHistory {
    /// A zero capacity is raised to one so the latest entry is always kept.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append at the tail, then evict from the head until within capacity.
    ///
    /// Returns how many entries were evicted.
    pub fn append(&mut self, entry: HistoryEntry) -> usize {
        self.entries.push_back(entry);
        let mut evicted = 0;
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
            evicted += 1;
        }
        evicted
    }

    pub fn append_system(&mut self, text: impl Into<String>) -> usize {
        self.append(HistoryEntry::system(text))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }
}

impl Default for MessageHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
#[path = "history_test.rs"]
mod tests;
