//! Desired-state reconciliation for topic subscriptions.
//!
//! The server is the source of truth for which topics actually deliver
//! events; the caller only declares which topics it *wants*. The
//! [`Reconciler`] sits between the two: every [`reconcile`](Reconciler::reconcile)
//! call diffs the new desired set against the bookkeeping from the previous
//! call and emits the minimal subscribe/unsubscribe messages needed to
//! converge, then folds the server's acknowledgements back in as they arrive.
//!
//! Server-side subscriptions do not survive a reconnect, so after the
//! underlying channel is re-established the owner calls
//! [`resubscribe_all`](Reconciler::resubscribe_all) to replay every live
//! subscription.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;
use tracing::{debug, info, trace};

use super::message::ClientMessage;
use super::topic::Topic;

// ============================================================================
// Types
// ============================================================================

/// Callback invoked for every event published on a subscribed topic.
pub type EventCallback = Arc<dyn Fn(&Topic, &Value) + Send + Sync>;

/// Where a topic stands between "requested" and "acknowledged".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionPhase {
    /// Subscribe sent, acknowledgement pending.
    SubscribeInProgress,
    /// Subscribe acknowledged by the server.
    Subscribed,
    /// Unsubscribe sent, acknowledgement pending.
    UnsubscribeInProgress,
}

/// Bookkeeping for one topic.
struct SubscriptionEntry {
    phase: SubscriptionPhase,
    callback: EventCallback,
}

impl fmt::Debug for SubscriptionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionEntry")
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Reconciler
// ============================================================================

/// Tracks desired topic subscriptions and converges them with the server.
///
/// Events for topics in any phase still dispatch to their callback: a topic
/// in `UnsubscribeInProgress` can legitimately receive events that were in
/// flight when the unsubscribe was sent.
#[derive(Debug, Default)]
pub struct Reconciler {
    /// Desired set from the most recent reconcile, with acknowledgement state.
    subscriptions: FxHashMap<Topic, SubscriptionEntry>,
}

impl Reconciler {
    /// Creates a reconciler with no subscriptions.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscriptions: FxHashMap::default(),
        }
    }

    // ========================================================================
    // Reconciliation
    // ========================================================================

    /// Diffs `desired` against the current bookkeeping.
    ///
    /// Returns the messages to send: unsubscribes for topics no longer
    /// desired, then subscribes for new topics in caller order. Topics
    /// already requested or acknowledged produce nothing; their callback is
    /// refreshed in place. A topic re-added while its unsubscribe is still
    /// in flight flips back to `SubscribeInProgress` and re-emits its
    /// subscribe.
    pub fn reconcile(&mut self, desired: Vec<(Topic, EventCallback)>) -> Vec<ClientMessage> {
        let mut messages = Vec::new();

        // Topics dropped from the desired set. Sorted for stable output.
        let wanted: FxHashSet<&Topic> = desired.iter().map(|(topic, _)| topic).collect();
        let mut dropped: Vec<Topic> = self
            .subscriptions
            .keys()
            .filter(|topic| !wanted.contains(*topic))
            .cloned()
            .collect();
        dropped.sort_unstable();

        for topic in dropped {
            self.apply_removal(topic, &mut messages);
        }

        // New and refreshed topics, in caller order.
        for (topic, callback) in desired {
            self.apply_desired(topic, callback, &mut messages);
        }

        messages
    }

    /// Adds or refreshes a single topic.
    ///
    /// The single-topic form of the reconcile insert/update case.
    pub fn subscribe(&mut self, topic: Topic, callback: EventCallback) -> Vec<ClientMessage> {
        let mut messages = Vec::new();
        self.apply_desired(topic, callback, &mut messages);
        messages
    }

    /// Drops a single topic.
    ///
    /// The single-topic form of the reconcile remove case. Unknown topics
    /// produce nothing.
    pub fn unsubscribe(&mut self, topic: &Topic) -> Vec<ClientMessage> {
        let mut messages = Vec::new();
        self.apply_removal(topic.clone(), &mut messages);
        messages
    }

    /// Replays every live subscription after a reconnect.
    ///
    /// `Subscribed` and `SubscribeInProgress` topics re-emit their subscribe
    /// and end uniformly in `SubscribeInProgress`; `UnsubscribeInProgress`
    /// topics are left untouched.
    pub fn resubscribe_all(&mut self) -> Vec<ClientMessage> {
        let mut live: Vec<Topic> = self
            .subscriptions
            .iter()
            .filter(|(_, entry)| entry.phase != SubscriptionPhase::UnsubscribeInProgress)
            .map(|(topic, _)| topic.clone())
            .collect();
        live.sort_unstable();

        let mut messages = Vec::with_capacity(live.len());
        for topic in live {
            if let Some(entry) = self.subscriptions.get_mut(&topic) {
                entry.phase = SubscriptionPhase::SubscribeInProgress;
            }
            info!(topic = %topic, "re-subscribing after reconnect");
            messages.push(ClientMessage::Subscribe { topic });
        }
        messages
    }

    /// Returns the ping that keeps the channel warm.
    #[inline]
    #[must_use]
    pub const fn keep_alive(&self) -> ClientMessage {
        ClientMessage::Ping
    }

    // ========================================================================
    // Acknowledgements and events
    // ========================================================================

    /// Folds in the server's subscribe acknowledgement.
    ///
    /// Flips `SubscribeInProgress → Subscribed`; any other phase (or an
    /// unknown topic) is left unchanged.
    pub fn on_subscribed(&mut self, topic: &Topic) {
        match self.subscriptions.get_mut(topic) {
            Some(entry) if entry.phase == SubscriptionPhase::SubscribeInProgress => {
                entry.phase = SubscriptionPhase::Subscribed;
                debug!(topic = %topic, "subscription acknowledged");
            }
            Some(entry) => {
                debug!(topic = %topic, phase = ?entry.phase, "subscribe ack out of phase, ignoring");
            }
            None => {
                debug!(topic = %topic, "subscribe ack for unknown topic, ignoring");
            }
        }
    }

    /// Folds in the server's unsubscribe acknowledgement.
    ///
    /// Removes the topic regardless of its current phase.
    pub fn on_unsubscribed(&mut self, topic: &Topic) {
        if self.subscriptions.remove(topic).is_some() {
            debug!(topic = %topic, "subscription removed");
        } else {
            debug!(topic = %topic, "unsubscribe ack for unknown topic, ignoring");
        }
    }

    /// Dispatches a published event to the topic's callback.
    ///
    /// Events for topics in any phase dispatch; an unknown topic is dropped
    /// silently (the server raced an event against our unsubscribe).
    pub fn on_event(&self, topic: &Topic, data: &Value) {
        if let Some(entry) = self.subscriptions.get(topic) {
            trace!(topic = %topic, "dispatching event");
            (entry.callback)(topic, data);
        } else {
            trace!(topic = %topic, "event for undesired topic, dropped");
        }
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Returns the topic's current phase, or `None` for unknown topics.
    #[must_use]
    pub fn phase(&self, topic: &Topic) -> Option<SubscriptionPhase> {
        self.subscriptions.get(topic).map(|entry| entry.phase)
    }

    /// Returns the number of tracked topics.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Returns `true` if no topics are tracked.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Iterates over the tracked topics in arbitrary order.
    pub fn topics(&self) -> impl Iterator<Item = &Topic> {
        self.subscriptions.keys()
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Insert/update case: the topic is desired.
    fn apply_desired(
        &mut self,
        topic: Topic,
        callback: EventCallback,
        messages: &mut Vec<ClientMessage>,
    ) {
        if let Some(entry) = self.subscriptions.get_mut(&topic) {
            match entry.phase {
                SubscriptionPhase::SubscribeInProgress | SubscriptionPhase::Subscribed => {
                    // An in-flight or completed subscribe already covers this
                    // topic; only the callback changes.
                    entry.callback = callback;
                }
                SubscriptionPhase::UnsubscribeInProgress => {
                    entry.phase = SubscriptionPhase::SubscribeInProgress;
                    entry.callback = callback;
                    debug!(topic = %topic, "re-subscribing before unsubscribe acknowledged");
                    messages.push(ClientMessage::Subscribe { topic });
                }
            }
        } else {
            self.subscriptions.insert(
                topic.clone(),
                SubscriptionEntry {
                    phase: SubscriptionPhase::SubscribeInProgress,
                    callback,
                },
            );
            debug!(topic = %topic, "subscribing");
            messages.push(ClientMessage::Subscribe { topic });
        }
    }

    /// Remove case: the topic is no longer desired.
    fn apply_removal(&mut self, topic: Topic, messages: &mut Vec<ClientMessage>) {
        let Some(entry) = self.subscriptions.get_mut(&topic) else {
            return;
        };
        if entry.phase == SubscriptionPhase::UnsubscribeInProgress {
            // Already winding down; re-requesting is redundant.
            return;
        }
        entry.phase = SubscriptionPhase::UnsubscribeInProgress;
        debug!(topic = %topic, "unsubscribing");
        messages.push(ClientMessage::Unsubscribe { topic });
    }
}

// ============================================================================
// Tests
// ============================================================================
