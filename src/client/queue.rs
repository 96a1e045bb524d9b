//! Per-key FIFO buffers for messages that cannot be sent yet.
//!
//! A send that arrives while a connection is reconnecting, or while an
//! earlier backlog is still draining, is buffered here instead of being
//! written to the transport. Buffered messages leave in strict FIFO order,
//! one per pacing tick.
//!
//! Invariant: a queue exists only while it holds messages. Popping the last
//! message removes the queue from the map entirely.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;

use rustc_hash::FxHashMap;

use crate::identifiers::SocketKey;

// ============================================================================
// OutputQueues
// ============================================================================

/// All per-key output buffers, owned by the client.
#[derive(Debug, Default)]
pub struct OutputQueues {
    queues: FxHashMap<SocketKey, VecDeque<String>>,
}

impl OutputQueues {
    /// Creates an empty queue map.
    #[must_use]
    pub fn new() -> Self {
        Self {
            queues: FxHashMap::default(),
        }
    }

    /// Appends a message to the key's queue, creating the queue if needed.
    pub fn push(&mut self, key: &SocketKey, message: String) {
        if let Some(queue) = self.queues.get_mut(key) {
            queue.push_back(message);
        } else {
            self.queues.insert(key.clone(), VecDeque::from([message]));
        }
    }

    /// Pops the oldest buffered message for the key.
    ///
    /// Removes the queue from the map when this pop empties it.
    pub fn pop(&mut self, key: &SocketKey) -> Option<String> {
        let queue = self.queues.get_mut(key)?;
        let message = queue.pop_front();
        if queue.is_empty() {
            self.queues.remove(key);
        }
        message
    }

    /// Returns `true` if the key has buffered messages.
    #[inline]
    #[must_use]
    pub fn has_backlog(&self, key: &SocketKey) -> bool {
        self.queues.contains_key(key)
    }

    /// Returns the number of messages buffered for the key.
    #[must_use]
    pub fn len(&self, key: &SocketKey) -> usize {
        self.queues.get(key).map_or(0, VecDeque::len)
    }

    /// Drops the key's queue, returning how many messages were discarded.
    pub fn remove(&mut self, key: &SocketKey) -> usize {
        self.queues.remove(key).map_or(0, |queue| queue.len())
    }

    /// Returns `true` if no key has buffered messages.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let mut queues = OutputQueues::new();
        let key = SocketKey::new("a");

        queues.push(&key, "first".into());
        queues.push(&key, "second".into());
        queues.push(&key, "third".into());

        assert_eq!(queues.pop(&key).as_deref(), Some("first"));
        assert_eq!(queues.pop(&key).as_deref(), Some("second"));
        assert_eq!(queues.pop(&key).as_deref(), Some("third"));
        assert_eq!(queues.pop(&key), None);
    }

    #[test]
    fn test_emptied_queue_is_removed() {
        let mut queues = OutputQueues::new();
        let key = SocketKey::new("a");

        queues.push(&key, "only".into());
        assert!(queues.has_backlog(&key));

        queues.pop(&key);
        assert!(!queues.has_backlog(&key));
        assert!(queues.is_empty());
    }

    #[test]
    fn test_push_after_drain_recreates_queue() {
        let mut queues = OutputQueues::new();
        let key = SocketKey::new("a");

        queues.push(&key, "one".into());
        queues.pop(&key);
        queues.push(&key, "two".into());

        assert_eq!(queues.len(&key), 1);
        assert_eq!(queues.pop(&key).as_deref(), Some("two"));
    }

    #[test]
    fn test_remove_reports_discarded_count() {
        let mut queues = OutputQueues::new();
        let key = SocketKey::new("a");

        queues.push(&key, "one".into());
        queues.push(&key, "two".into());

        assert_eq!(queues.remove(&key), 2);
        assert_eq!(queues.remove(&key), 0);
        assert!(!queues.has_backlog(&key));
    }

    #[test]
    fn test_keys_are_independent() {
        let mut queues = OutputQueues::new();
        let a = SocketKey::new("a");
        let b = SocketKey::new("b");

        queues.push(&a, "for a".into());
        queues.push(&b, "for b".into());

        assert_eq!(queues.pop(&b).as_deref(), Some("for b"));
        assert_eq!(queues.len(&a), 1);
    }
}
