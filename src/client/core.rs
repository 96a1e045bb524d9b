//! The connection state machine.
//!
//! [`SocketClient`] is a single-threaded reducer: callers invoke operations,
//! transports feed notifications, and every call returns a list of
//! [`Effect`]s describing what should happen next. The client performs no IO
//! and spawns nothing; it only owns state.
//!
//! # Operations
//!
//! | Operation | Contract |
//! |-----------|----------|
//! | [`open`](SocketClient::open) | `Idle → Connecting`; fails if already active |
//! | [`keep_alive`](SocketClient::keep_alive) | `open` with message delivery suppressed |
//! | [`send`](SocketClient::send) | direct send, or buffered during reconnect/drain |
//! | [`close`](SocketClient::close) | graceful close, immediate for inactive keys |
//! | [`handle`](SocketClient::handle) | folds one transport notification into state |
//!
//! # Reconnection
//!
//! An unexpected close schedules a retry after `10 * 2^attempt` milliseconds,
//! up to [`MAX_RECONNECT_ATTEMPTS`]. Give-up conditions: budget exhausted
//! (reported with the synthetic 4000 code), failure on the very first connect
//! attempt, or unsent bytes reported at close time. While a retry is parked
//! the entry sits in `Idle` with its `backoff_attempt` counting the streak;
//! sends during that window are buffered and drained after the next
//! successful connect, one message per 20 ms tick.

// ============================================================================
// Imports
// ============================================================================

use rustc_hash::FxHashMap;
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::{ContinuationId, SocketKey};
use crate::protocol::{CloseReason, Command, Notification, TIMED_OUT_ON_RECONNECT};

use super::backoff::{DRAIN_PACING_MS, MAX_RECONNECT_ATTEMPTS, backoff_millis};
use super::continuation::{ContinuationPurpose, ContinuationRegistry};
use super::effect::{Effect, SocketEvent};
use super::entry::{ConnectionEntry, Phase};
use super::queue::OutputQueues;

// ============================================================================
// Constants
// ============================================================================

/// Reason text attached to caller-requested close commands.
const CLOSE_REASON_TEXT: &str = "close requested";

/// Endpoint description reported for simulated connections.
const OFFLINE_DESCRIPTION: &str = "simulated";

// ============================================================================
// SocketClient
// ============================================================================

/// Multiplexing connection state machine.
///
/// Owns every per-key [`ConnectionEntry`], the continuation registry and the
/// output queues. One instance shares nothing with any other.
///
/// # Example
///
/// ```
/// use relink::client::SocketClient;
///
/// let mut client = SocketClient::offline();
/// let effects = client.open("feed", "wss://example.com/feed").unwrap();
/// assert_eq!(effects.len(), 1); // synthetic connected event
/// ```
#[derive(Debug, Default)]
pub struct SocketClient {
    /// One entry per active or pending key.
    entries: FxHashMap<SocketKey, ConnectionEntry>,
    /// Outstanding delayed callbacks.
    continuations: ContinuationRegistry,
    /// Per-key send buffers.
    queues: OutputQueues,
    /// Simulated-transport mode: opens succeed immediately, sends echo.
    offline: bool,
}

impl SocketClient {
    /// Creates a client that drives a real transport.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: FxHashMap::default(),
            continuations: ContinuationRegistry::new(),
            queues: OutputQueues::new(),
            offline: false,
        }
    }

    /// Creates a client in simulated-transport mode.
    ///
    /// Opens transition straight to `Connected` and sends on a connected key
    /// are echoed back as received messages. Useful for tests and
    /// environments without a network.
    #[must_use]
    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Self::new()
        }
    }

    /// Returns `true` when running in simulated-transport mode.
    #[inline]
    #[must_use]
    pub const fn is_offline(&self) -> bool {
        self.offline
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Opens a logical connection under `key`.
    ///
    /// Emits an open command and parks the entry in `Connecting` until the
    /// transport reports back. Re-opening a key parked for a backoff retry is
    /// allowed and supersedes the scheduled retry.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyOpen`] if the key is `Connected`
    /// - [`Error::Connecting`] if an open is already in flight
    /// - [`Error::Closing`] if the key is shutting down
    pub fn open(
        &mut self,
        key: impl Into<SocketKey>,
        url: impl Into<String>,
    ) -> Result<Vec<Effect>> {
        self.open_inner(key.into(), url.into(), false)
    }

    /// Opens a control connection whose received messages are swallowed.
    ///
    /// Identical to [`open`](Self::open) except the entry is marked
    /// keep-alive. Marking is sticky across reconnects.
    ///
    /// # Errors
    ///
    /// Same contract as [`open`](Self::open).
    pub fn keep_alive(
        &mut self,
        key: impl Into<SocketKey>,
        url: impl Into<String>,
    ) -> Result<Vec<Effect>> {
        self.open_inner(key.into(), url.into(), true)
    }

    /// Sends a text message on `key`.
    ///
    /// When the key is `Connected` with no backlog the message goes straight
    /// to the transport. With a drain in flight, or while a reconnect is
    /// underway (`backoff_attempt > 0`), the message is buffered in FIFO
    /// order instead.
    ///
    /// # Errors
    ///
    /// [`Error::NotOpen`] if the key is unknown, or not connected with no
    /// reconnect underway. Sending before the first successful open is loud,
    /// never silently buffered.
    pub fn send(
        &mut self,
        key: impl Into<SocketKey>,
        message: impl Into<String>,
    ) -> Result<Vec<Effect>> {
        let key = key.into();
        let message = message.into();

        let Some(entry) = self.entries.get(&key) else {
            return Err(Error::not_open(key));
        };

        if entry.phase.is_connected() {
            if self.queues.has_backlog(&key) {
                // A drain is pacing the backlog; joining it preserves FIFO.
                self.queues.push(&key, message);
                trace!(key = %key, queued = self.queues.len(&key), "send buffered behind drain");
                return Ok(Vec::new());
            }
            if self.offline {
                return Ok(self.echo(key, message));
            }
            return Ok(vec![Effect::Command(Command::Send { key, message })]);
        }

        if entry.backoff_attempt > 0 {
            self.queues.push(&key, message);
            debug!(key = %key, queued = self.queues.len(&key), "send buffered during reconnect");
            return Ok(Vec::new());
        }

        Err(Error::not_open(key))
    }

    /// Closes a logical connection.
    ///
    /// A `Connected` key transitions to `Closing` and waits for the
    /// transport's confirmation. Any other key (including an unknown one) is
    /// treated as already closed: its retry is cancelled, its entry and
    /// buffered messages are dropped, and a synthetic "closed, expected"
    /// event is produced without a notification round-trip.
    pub fn close(&mut self, key: impl Into<SocketKey>) -> Vec<Effect> {
        let key = key.into();

        if let Some(entry) = self.entries.get_mut(&key)
            && entry.phase.is_connected()
            && !self.offline
        {
            entry.phase = Phase::Closing;
            debug!(key = %key, "close requested");
            return vec![Effect::Command(Command::Close {
                key,
                reason: CLOSE_REASON_TEXT.into(),
            })];
        }

        // Inactive (or simulated) keys close immediately.
        self.purge(&key);
        debug!(key = %key, "closed locally");
        vec![Effect::Event(SocketEvent::Closed {
            key,
            reason: CloseReason::Normal,
            detail: String::new(),
            was_clean: true,
            expected: true,
        })]
    }

    // ========================================================================
    // Notifications
    // ========================================================================

    /// Folds one transport notification into the state machine.
    ///
    /// Never fails: out-of-phase notifications surface as
    /// [`SocketEvent::Error`] effects with state left unchanged.
    pub fn handle(&mut self, notification: Notification) -> Vec<Effect> {
        match notification {
            Notification::Connected { key, description } => self.on_connected(key, description),
            Notification::MessageReceived { key, message } => self.on_message(key, message),
            Notification::Closed {
                key,
                code,
                reason,
                was_clean,
                buffered_bytes,
            } => self.on_closed(key, code, reason, was_clean, buffered_bytes),
            Notification::BytesQueued {
                key,
                buffered_amount,
            } => self.on_bytes_queued(key, buffered_amount),
            Notification::Delayed { id } => self.on_delayed(id),
            Notification::Error {
                key,
                code,
                description,
                name,
            } => {
                warn!(key = ?key, code = %code, "transport error");
                vec![Effect::Event(SocketEvent::Error(Error::transport(
                    key,
                    code,
                    description,
                    name,
                )))]
            }
        }
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Returns the key's current phase, or `None` for unknown keys.
    #[must_use]
    pub fn phase(&self, key: &SocketKey) -> Option<Phase> {
        self.entries.get(key).map(|entry| entry.phase)
    }

    /// Returns `true` if the key is `Connected`.
    #[must_use]
    pub fn is_connected(&self, key: &SocketKey) -> bool {
        self.phase(key).is_some_and(Phase::is_connected)
    }

    /// Returns the key's consecutive reconnect attempt count.
    #[must_use]
    pub fn backoff_attempt(&self, key: &SocketKey) -> u32 {
        self.entries
            .get(key)
            .map_or(0, |entry| entry.backoff_attempt)
    }

    /// Returns how many messages are buffered for the key.
    #[must_use]
    pub fn queued_len(&self, key: &SocketKey) -> usize {
        self.queues.len(key)
    }

    /// Returns the transport's last reported buffered byte count for the key.
    #[must_use]
    pub fn buffered_bytes(&self, key: &SocketKey) -> u64 {
        self.entries.get(key).map_or(0, |entry| entry.buffered_bytes)
    }

    /// Returns the number of active or pending connection entries.
    #[inline]
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.entries.len()
    }

    /// Iterates over every key's current phase in arbitrary order.
    pub fn phases(&self) -> impl Iterator<Item = (&SocketKey, Phase)> {
        self.entries.iter().map(|(key, entry)| (key, entry.phase))
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn open_inner(
        &mut self,
        key: SocketKey,
        url: String,
        force_keep_alive: bool,
    ) -> Result<Vec<Effect>> {
        if let Some(entry) = self.entries.get(&key) {
            match entry.phase {
                Phase::Connected => return Err(Error::already_open(key)),
                Phase::Connecting => return Err(Error::connecting(key)),
                Phase::Closing => return Err(Error::closing(key)),
                Phase::Idle => {}
            }
        }

        // A caller-initiated open on a parked entry supersedes its retry.
        if let Some(entry) = self.entries.get_mut(&key)
            && let Some(stale) = entry.pending_continuation.take()
        {
            self.continuations.cancel(stale);
            debug!(key = %key, id = %stale, "superseded scheduled retry");
        }

        let entry = self
            .entries
            .entry(key.clone())
            .or_insert_with(|| ConnectionEntry::new(String::new()));
        entry.url = url.clone();
        if force_keep_alive {
            entry.keep_alive = true;
        }

        if self.offline {
            entry.phase = Phase::Connected;
            entry.backoff_attempt = 0;
            info!(key = %key, "connected (simulated)");
            let mut effects = vec![Effect::Event(SocketEvent::Connected {
                key: key.clone(),
                description: OFFLINE_DESCRIPTION.into(),
            })];
            // A backlog parked by a simulated reconnect starts draining now.
            self.drain_step(&key, &mut effects);
            return Ok(effects);
        }

        entry.phase = Phase::Connecting;
        debug!(key = %key, url = %url, "opening");
        Ok(vec![Effect::Command(Command::Open { key, url })])
    }

    fn on_connected(&mut self, key: SocketKey, description: String) -> Vec<Effect> {
        match self.entries.get_mut(&key) {
            Some(entry) if entry.phase == Phase::Connecting => {
                entry.phase = Phase::Connected;
                entry.backoff_attempt = 0;
                info!(key = %key, description = %description, "connected");

                let mut effects = vec![Effect::Event(SocketEvent::Connected {
                    key: key.clone(),
                    description,
                })];
                // A backlog accumulated during reconnect starts draining now.
                self.drain_step(&key, &mut effects);
                effects
            }
            Some(entry) => {
                warn!(key = %key, phase = %entry.phase, "connected notification out of phase");
                vec![Effect::Event(SocketEvent::Error(Error::unexpected_connected(key)))]
            }
            None => {
                warn!(key = %key, "connected notification for unknown key");
                vec![Effect::Event(SocketEvent::Error(Error::unexpected_connected(key)))]
            }
        }
    }

    fn on_message(&mut self, key: SocketKey, message: String) -> Vec<Effect> {
        match self.entries.get(&key) {
            Some(entry) if entry.phase.is_connected() => {
                if entry.keep_alive {
                    trace!(key = %key, len = message.len(), "keep-alive message swallowed");
                    return Vec::new();
                }
                vec![Effect::Event(SocketEvent::Message { key, message })]
            }
            _ => {
                warn!(key = %key, "message for key that is not connected");
                vec![Effect::Event(SocketEvent::Error(Error::unexpected_message(key)))]
            }
        }
    }

    fn on_closed(
        &mut self,
        key: SocketKey,
        code: u16,
        reason: String,
        was_clean: bool,
        buffered_bytes: u64,
    ) -> Vec<Effect> {
        let Some(entry) = self.entries.get(&key) else {
            // Tail of a close race: the entry was already removed locally.
            debug!(key = %key, code, "closed notification for unknown key, ignoring");
            return Vec::new();
        };

        if entry.phase == Phase::Closing {
            self.purge(&key);
            info!(key = %key, code, "closed");
            return vec![Effect::Event(SocketEvent::Closed {
                key,
                reason: CloseReason::from_code(code),
                detail: reason,
                was_clean,
                expected: true,
            })];
        }

        self.on_unexpected_close(key, code, reason, was_clean, buffered_bytes)
    }

    /// Runs the reconnect decision for a close the caller did not request.
    fn on_unexpected_close(
        &mut self,
        key: SocketKey,
        code: u16,
        reason: String,
        was_clean: bool,
        buffered_bytes: u64,
    ) -> Vec<Effect> {
        let Some(entry) = self.entries.get_mut(&key) else {
            return Vec::new();
        };

        let attempt = entry.backoff_attempt + 1;
        // Phase is still Connecting only when no connect ever succeeded:
        // a retry failure arrives with attempt >= 2.
        let never_connected = attempt == 1 && entry.phase == Phase::Connecting;
        let exhausted = attempt > MAX_RECONNECT_ATTEMPTS;
        let data_loss = buffered_bytes > 0;

        if exhausted || never_connected || data_loss {
            let final_code = if exhausted { TIMED_OUT_ON_RECONNECT } else { code };
            warn!(
                key = %key,
                attempt,
                code = final_code,
                never_connected,
                data_loss,
                "giving up on reconnect"
            );
            self.purge(&key);
            return vec![Effect::Event(SocketEvent::Closed {
                key,
                reason: CloseReason::from_code(final_code),
                detail: reason,
                was_clean,
                expected: false,
            })];
        }

        entry.backoff_attempt = attempt;
        // The socket is gone; park the entry until the retry fires.
        entry.phase = Phase::Idle;

        let millis = backoff_millis(attempt);
        warn!(key = %key, attempt, millis, code, "unexpected close, retry scheduled");

        let mut effects = Vec::new();
        self.schedule(&key, ContinuationPurpose::RetryConnection, millis, &mut effects);
        effects
    }

    fn on_bytes_queued(&mut self, key: SocketKey, buffered_amount: u64) -> Vec<Effect> {
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.buffered_bytes = buffered_amount;
            trace!(key = %key, buffered_amount, "bytes queued");
        } else {
            debug!(key = %key, buffered_amount, "bytes-queued for unknown key, ignoring");
        }
        Vec::new()
    }

    fn on_delayed(&mut self, id: ContinuationId) -> Vec<Effect> {
        let Some(continuation) = self.continuations.take(id) else {
            debug!(id = %id, "stale continuation fired, ignoring");
            return Vec::new();
        };
        let key = continuation.key;

        if let Some(entry) = self.entries.get_mut(&key)
            && entry.pending_continuation == Some(id)
        {
            entry.pending_continuation = None;
        }

        match continuation.purpose {
            ContinuationPurpose::RetryConnection => self.fire_retry(key),
            ContinuationPurpose::DrainQueue => {
                let mut effects = Vec::new();
                if self.is_connected(&key) {
                    self.drain_step(&key, &mut effects);
                } else {
                    // Connection dropped mid-drain; the backlog waits for the
                    // next successful connect.
                    debug!(key = %key, "drain fired while not connected, backlog retained");
                }
                effects
            }
        }
    }

    fn fire_retry(&mut self, key: SocketKey) -> Vec<Effect> {
        let Some(entry) = self.entries.get(&key) else {
            debug!(key = %key, "retry fired for removed key, ignoring");
            return Vec::new();
        };
        if entry.phase != Phase::Idle {
            debug!(key = %key, phase = %entry.phase, "retry fired out of phase, ignoring");
            return Vec::new();
        }

        if entry.url.is_empty() {
            // Defensive: an entry always records its URL on open.
            warn!(key = %key, "no url recorded for reconnect, giving up");
            self.purge(&key);
            return vec![Effect::Event(SocketEvent::Closed {
                key,
                reason: CloseReason::Abnormal,
                detail: "no url recorded for reconnect".into(),
                was_clean: false,
                expected: false,
            })];
        }

        let url = entry.url.clone();
        info!(key = %key, attempt = entry.backoff_attempt, "reconnecting");
        match self.open_inner(key.clone(), url, false) {
            Ok(effects) => effects,
            Err(error) => {
                // Unreachable: the entry was just observed Idle.
                warn!(key = %key, %error, "reconnect open rejected");
                vec![Effect::Event(SocketEvent::Error(error))]
            }
        }
    }

    /// Pops one buffered message and paces the rest.
    ///
    /// Simulated mode echoes the drained message instead of emitting a send
    /// command, matching what a direct send would have done.
    fn drain_step(&mut self, key: &SocketKey, effects: &mut Vec<Effect>) {
        let Some(message) = self.queues.pop(key) else {
            return;
        };

        if self.offline {
            effects.extend(self.echo(key.clone(), message));
        } else {
            effects.push(Effect::Command(Command::Send {
                key: key.clone(),
                message,
            }));
        }

        if self.queues.has_backlog(key) {
            self.schedule(key, ContinuationPurpose::DrainQueue, DRAIN_PACING_MS, effects);
        }
    }

    /// Allocates a continuation for `key`, invalidating its previous one, and
    /// emits the matching delay command.
    fn schedule(
        &mut self,
        key: &SocketKey,
        purpose: ContinuationPurpose,
        millis: u64,
        effects: &mut Vec<Effect>,
    ) {
        let id = self.continuations.allocate(key.clone(), purpose);
        if let Some(entry) = self.entries.get_mut(key)
            && let Some(stale) = entry.pending_continuation.replace(id)
        {
            self.continuations.cancel(stale);
        }
        debug!(key = %key, id = %id, millis, ?purpose, "continuation scheduled");
        effects.push(Effect::Command(Command::Delay { id, millis }));
    }

    /// Simulated loopback: a sent message comes straight back, unless the
    /// entry swallows traffic.
    fn echo(&self, key: SocketKey, message: String) -> Vec<Effect> {
        let swallowed = self
            .entries
            .get(&key)
            .is_some_and(|entry| entry.keep_alive);
        if swallowed {
            trace!(key = %key, "simulated send swallowed by keep-alive");
            return Vec::new();
        }
        vec![Effect::Event(SocketEvent::Message { key, message })]
    }

    /// Removes every trace of a key: entry, pending continuation, backlog.
    fn purge(&mut self, key: &SocketKey) {
        if let Some(entry) = self.entries.remove(key)
            && let Some(id) = entry.pending_continuation
        {
            self.continuations.cancel(id);
        }
        let dropped = self.queues.remove(key);
        if dropped > 0 {
            debug!(key = %key, dropped, "discarded buffered messages");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
