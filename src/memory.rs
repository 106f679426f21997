//! Sliding-window conversation memory.
//!
//! A fixed-capacity ordered history of dialogue turns. One turn is one
//! user message plus one assistant message, so the window holds
//! `2 * max_turns` messages and evicts the oldest message once full.
//! Single-writer: only the render loop mutates it.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message in the conversation window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// Snapshot of the memory state, for logging and UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryInfo {
    pub current_turns: usize,
    pub max_turns: usize,
    pub total_messages: u64,
    pub messages_in_memory: usize,
    pub memory_full: bool,
    /// Whether the window has started evicting old messages.
    pub oldest_message_forgotten: bool,
}

/// Fixed-capacity sliding window over conversation messages.
#[derive(Debug, Clone)]
pub struct ConversationMemory {
    max_turns: usize,
    history: VecDeque<Message>,
    /// Messages ever added, across evictions and clears.
    total_messages: u64,
}

impl ConversationMemory {
    /// Create a memory retaining at most `max_turns` turns.
    #[must_use]
    pub fn new(max_turns: usize) -> Self {
        Self {
            max_turns,
            history: VecDeque::with_capacity(max_turns * 2),
            total_messages: 0,
        }
    }

    /// Capacity in messages (`2 * max_turns`).
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.max_turns * 2
    }

    /// Append a message, evicting the oldest one once the window is full.
    pub fn add_message(&mut self, role: Role, content: impl Into<String>) {
        if self.history.len() >= self.capacity() {
            let _ = self.history.pop_front();
        }
        self.history.push_back(Message {
            role,
            content: content.into(),
        });
        self.total_messages += 1;
    }

    /// The current window, oldest message first.
    #[must_use]
    pub fn get_context(&self) -> Vec<Message> {
        self.history.iter().cloned().collect()
    }

    /// Number of complete turns currently in the window.
    #[must_use]
    pub fn get_turn_count(&self) -> usize {
        self.history.len() / 2
    }

    /// Empty the window. The `total_messages` counter is preserved until
    /// [`reset_counter`](Self::reset_counter) is called.
    pub fn clear(&mut self) {
        self.history.clear();
    }

    /// Reset the lifetime message counter.
    pub fn reset_counter(&mut self) {
        self.total_messages = 0;
    }

    /// Lifetime message count across evictions and clears.
    #[must_use]
    pub fn total_messages(&self) -> u64 {
        self.total_messages
    }

    /// Current state of the window.
    #[must_use]
    pub fn get_memory_info(&self) -> MemoryInfo {
        let current_turns = self.get_turn_count();
        MemoryInfo {
            current_turns,
            max_turns: self.max_turns,
            total_messages: self.total_messages,
            messages_in_memory: self.history.len(),
            memory_full: current_turns >= self.max_turns,
            oldest_message_forgotten: self.total_messages > self.capacity() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn window_evicts_oldest_fifo() {
        let mut memory = ConversationMemory::new(3);
        for i in 0..7 {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            memory.add_message(role, format!("msg {i}"));
        }
        let context = memory.get_context();
        // max_turns = 3 => 6 messages retained after 7 insertions
        assert_eq!(context.len(), 6);
        // the oldest surviving message is the 2nd inserted
        assert_eq!(context[0].content, "msg 1");
        assert_eq!(context[5].content, "msg 6");
    }

    #[test]
    fn length_never_exceeds_capacity() {
        let mut memory = ConversationMemory::new(2);
        for i in 0..100 {
            memory.add_message(Role::User, format!("{i}"));
            assert!(memory.get_context().len() <= memory.capacity());
        }
    }

    #[test]
    fn turn_count_is_pairwise() {
        let mut memory = ConversationMemory::new(5);
        memory.add_message(Role::User, "hi");
        assert_eq!(memory.get_turn_count(), 0);
        memory.add_message(Role::Assistant, "hello");
        assert_eq!(memory.get_turn_count(), 1);
        memory.add_message(Role::User, "how are you?");
        assert_eq!(memory.get_turn_count(), 1);
    }

    #[test]
    fn clear_preserves_total_counter() {
        let mut memory = ConversationMemory::new(2);
        memory.add_message(Role::User, "a");
        memory.add_message(Role::Assistant, "b");
        memory.clear();
        assert!(memory.get_context().is_empty());
        assert_eq!(memory.total_messages(), 2);
        memory.reset_counter();
        assert_eq!(memory.total_messages(), 0);
    }

    #[test]
    fn memory_info_reports_eviction() {
        let mut memory = ConversationMemory::new(1);
        memory.add_message(Role::User, "a");
        memory.add_message(Role::Assistant, "b");
        assert!(!memory.get_memory_info().oldest_message_forgotten);
        assert!(memory.get_memory_info().memory_full);
        memory.add_message(Role::User, "c");
        let info = memory.get_memory_info();
        assert!(info.oldest_message_forgotten);
        assert_eq!(info.total_messages, 3);
        assert_eq!(info.messages_in_memory, 2);
    }
}
