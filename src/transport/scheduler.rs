//! Delay scheduling for continuations.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::trace;

use crate::identifiers::ContinuationId;
use crate::protocol::Notification;

// ============================================================================
// DelayScheduler
// ============================================================================

/// Turns delay commands into delayed notifications.
///
/// Each [`schedule`](DelayScheduler::schedule) call spawns a task that sleeps
/// for the requested duration and then injects a [`Notification::Delayed`]
/// into the relay's notification channel. Cancellation is not the scheduler's
/// concern: a continuation invalidated in the meantime fires as a stale id
/// and is ignored by the state machine.
#[derive(Debug, Clone)]
pub struct DelayScheduler {
    /// Where fired delays are delivered.
    notify_tx: mpsc::UnboundedSender<Notification>,
}

impl DelayScheduler {
    /// Creates a scheduler delivering into `notify_tx`.
    #[must_use]
    pub const fn new(notify_tx: mpsc::UnboundedSender<Notification>) -> Self {
        Self { notify_tx }
    }

    /// Fires `Delayed(id)` after `millis` milliseconds.
    pub fn schedule(&self, id: ContinuationId, millis: u64) {
        let notify_tx = self.notify_tx.clone();
        trace!(id = %id, millis, "delay scheduled");

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(millis)).await;
            // The receiver is gone only when the relay has shut down.
            let _ = notify_tx.send(Notification::delayed(id));
        });
    }
}

// ============================================================================
// Tests
// ============================================================================
