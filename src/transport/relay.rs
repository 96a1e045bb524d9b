//! Relay runtime: sockets, timers and the event loop.
//!
//! The [`Relay`] pairs the sans-IO [`SocketClient`] with real tokio
//! WebSockets. A single spawned task owns all mutable state; callers talk to
//! it through cloneable [`Relay`] handles and receive [`SocketEvent`]s on a
//! bounded channel.
//!
//! # Event Loop
//!
//! The loop multiplexes four sources:
//!
//! - caller commands (open/send/close/subscribe/…)
//! - notifications from read pumps and the delay scheduler
//! - completed dial attempts
//! - the periodic keep-alive tick for the control connection
//!
//! Each input is folded into the state machine; the resulting effects are
//! applied immediately: open commands spawn dial tasks, send/close commands
//! write to the matching socket, delay commands arm the scheduler, and
//! events are forwarded to the caller. Messages arriving on the control
//! connection are consumed by the subscription layer instead of being
//! forwarded.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::client::{Effect, Phase, SocketClient, SocketEvent};
use crate::error::{Error, Result};
use crate::identifiers::SocketKey;
use crate::protocol::{Command, Notification};
use crate::pubsub::{ClientMessage, EventCallback, Reconciler, ServerMessage, Topic};

use super::scheduler::DelayScheduler;

// ============================================================================
// Constants
// ============================================================================

/// Default interval between keep-alive pings on the control connection.
const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(30);

/// Default capacity of the caller-facing event channel.
const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Description reported for freshly established connections.
const CONNECTED_DESCRIPTION: &str = "websocket";

// ============================================================================
// Types
// ============================================================================

/// Write half of an established socket.
type WsWriter = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Read half of an established socket.
type WsReader = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Phase snapshot shared between the loop and relay handles.
type StatusMap = Arc<RwLock<FxHashMap<SocketKey, Phase>>>;

// ============================================================================
// RelayCommand
// ============================================================================

/// Internal commands for the event loop.
enum RelayCommand {
    /// Open a logical connection.
    Open {
        key: SocketKey,
        url: String,
        reply: oneshot::Sender<Result<()>>,
    },
    /// Open a keep-alive connection.
    KeepAlive {
        key: SocketKey,
        url: String,
        reply: oneshot::Sender<Result<()>>,
    },
    /// Send a text message.
    Send {
        key: SocketKey,
        message: String,
        reply: oneshot::Sender<Result<()>>,
    },
    /// Close a logical connection.
    Close {
        key: SocketKey,
        reply: oneshot::Sender<Result<()>>,
    },
    /// Add or refresh one topic subscription.
    Subscribe {
        topic: Topic,
        callback: EventCallback,
        reply: oneshot::Sender<Result<()>>,
    },
    /// Drop one topic subscription.
    Unsubscribe {
        topic: Topic,
        reply: oneshot::Sender<Result<()>>,
    },
    /// Replace the desired subscription set.
    Reconcile {
        desired: Vec<(Topic, EventCallback)>,
        reply: oneshot::Sender<Result<()>>,
    },
    /// Terminate the event loop.
    Shutdown,
}

// ============================================================================
// DialOutcome
// ============================================================================

/// Result of a spawned connect attempt.
///
/// `token` identifies the dial that produced the outcome; the loop folds an
/// outcome only while its token is still the key's newest, so a dial that
/// raced with a close or a reopen cannot claim the key.
enum DialOutcome {
    /// The handshake succeeded.
    Established {
        key: SocketKey,
        token: u64,
        stream: Box<WebSocketStream<MaybeTlsStream<TcpStream>>>,
    },
    /// The handshake failed.
    Failed {
        key: SocketKey,
        token: u64,
        error: WsError,
    },
}

// ============================================================================
// RelayBuilder
// ============================================================================

/// Builder for configuring a [`Relay`].
///
/// Use [`Relay::builder()`] to create one.
///
/// # Example
///
/// ```no_run
/// use relink::Relay;
///
/// # async fn example() -> relink::Result<()> {
/// let (relay, mut events) = Relay::builder()
///     .url("wss://example.com/pubsub")
///     .spawn()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RelayBuilder {
    /// Control endpoint for the subscription layer.
    url: Option<String>,
    /// Interval between keep-alive pings.
    ping_interval: Duration,
    /// Capacity of the caller-facing event channel.
    event_capacity: usize,
    /// Run against a simulated transport.
    offline: bool,
}

impl Default for RelayBuilder {
    fn default() -> Self {
        Self {
            url: None,
            ping_interval: DEFAULT_PING_INTERVAL,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            offline: false,
        }
    }
}

impl RelayBuilder {
    /// Creates a builder with default configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the control endpoint the subscription layer rides on.
    ///
    /// # Arguments
    ///
    /// * `url` - a `ws://` or `wss://` URL
    #[inline]
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets the interval between keep-alive pings on the control connection.
    #[inline]
    #[must_use]
    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Sets the capacity of the caller-facing event channel.
    ///
    /// The loop applies backpressure when the channel is full, so the
    /// receiver should be drained promptly.
    #[inline]
    #[must_use]
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Runs against a simulated transport instead of real sockets.
    ///
    /// Opens succeed immediately and sends loop back as received messages.
    #[inline]
    #[must_use]
    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    /// Validates the configuration and spawns the event loop.
    ///
    /// Returns the caller handle and the event stream. The control
    /// connection is opened immediately.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if no URL was set
    /// - [`Error::InvalidUrl`] if the URL does not parse or is not `ws`/`wss`
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn spawn(self) -> Result<(Relay, mpsc::Receiver<SocketEvent>)> {
        let url = self
            .url
            .ok_or_else(|| Error::config("control url is required"))?;
        validate_endpoint(&url)?;

        let control_key = SocketKey::new(url.as_str());
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let (dial_tx, dial_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(self.event_capacity.max(1));
        let status: StatusMap = Arc::new(RwLock::new(FxHashMap::default()));

        let client = if self.offline {
            SocketClient::offline()
        } else {
            SocketClient::new()
        };

        let runtime = RelayRuntime {
            client,
            reconciler: Reconciler::new(),
            control_key: control_key.clone(),
            control_url: url,
            writers: FxHashMap::default(),
            dial_seq: 0,
            pending_dials: FxHashMap::default(),
            scheduler: DelayScheduler::new(notify_tx.clone()),
            notify_tx,
            dial_tx,
            event_tx,
            status: Arc::clone(&status),
        };
        tokio::spawn(runtime.run(command_rx, notify_rx, dial_rx, self.ping_interval));

        let relay = Relay {
            command_tx,
            status,
            control_key,
        };
        Ok((relay, event_rx))
    }
}

/// Checks that `url` parses and uses a WebSocket scheme.
fn validate_endpoint(url: &str) -> Result<()> {
    let parsed = Url::parse(url).map_err(|error| Error::invalid_url(url, error.to_string()))?;
    match parsed.scheme() {
        "ws" | "wss" => Ok(()),
        scheme => Err(Error::invalid_url(
            url,
            format!("unsupported scheme `{scheme}`, expected ws or wss"),
        )),
    }
}

// ============================================================================
// Relay
// ============================================================================

/// Caller handle to the relay event loop.
///
/// Cheap to clone; all operations are forwarded to the loop task and answer
/// through oneshot replies. Contract violations (opening a connected key,
/// sending on an unknown one) come back as the corresponding [`Error`].
#[derive(Clone, Debug)]
pub struct Relay {
    /// Channel into the event loop.
    command_tx: mpsc::UnboundedSender<RelayCommand>,
    /// Phase snapshot maintained by the loop.
    status: StatusMap,
    /// Key of the control connection.
    control_key: SocketKey,
}

impl Relay {
    /// Creates a builder with default configuration.
    #[must_use]
    pub fn builder() -> RelayBuilder {
        RelayBuilder::new()
    }

    /// Opens a logical connection under `key`.
    ///
    /// # Errors
    ///
    /// Contract violations per the state machine, or
    /// [`Error::ChannelClosed`] if the loop has terminated.
    pub async fn open(&self, key: impl Into<SocketKey>, url: impl Into<String>) -> Result<()> {
        let key = key.into();
        let url = url.into();
        self.request(|reply| RelayCommand::Open { key, url, reply })
            .await
    }

    /// Opens a connection whose received messages are swallowed.
    ///
    /// # Errors
    ///
    /// Same contract as [`open`](Self::open).
    pub async fn keep_alive(
        &self,
        key: impl Into<SocketKey>,
        url: impl Into<String>,
    ) -> Result<()> {
        let key = key.into();
        let url = url.into();
        self.request(|reply| RelayCommand::KeepAlive { key, url, reply })
            .await
    }

    /// Sends a text message on `key`.
    ///
    /// Buffered transparently while a reconnect is underway.
    ///
    /// # Errors
    ///
    /// [`Error::NotOpen`] for unknown or never-opened keys, or
    /// [`Error::ChannelClosed`] if the loop has terminated.
    pub async fn send(&self, key: impl Into<SocketKey>, message: impl Into<String>) -> Result<()> {
        let key = key.into();
        let message = message.into();
        self.request(|reply| RelayCommand::Send { key, message, reply })
            .await
    }

    /// Closes a logical connection.
    ///
    /// Closing an unknown or inactive key succeeds and surfaces a synthetic
    /// closed event.
    ///
    /// # Errors
    ///
    /// [`Error::ChannelClosed`] if the loop has terminated.
    pub async fn close(&self, key: impl Into<SocketKey>) -> Result<()> {
        let key = key.into();
        self.request(|reply| RelayCommand::Close { key, reply })
            .await
    }

    /// Adds or refreshes a topic subscription.
    ///
    /// The callback runs on the relay task for every event published on the
    /// topic, so it must not block.
    ///
    /// # Errors
    ///
    /// [`Error::ChannelClosed`] if the loop has terminated.
    pub async fn subscribe(&self, topic: impl Into<Topic>, callback: EventCallback) -> Result<()> {
        let topic = topic.into();
        self.request(|reply| RelayCommand::Subscribe {
            topic,
            callback,
            reply,
        })
        .await
    }

    /// Drops a topic subscription.
    ///
    /// # Errors
    ///
    /// [`Error::ChannelClosed`] if the loop has terminated.
    pub async fn unsubscribe(&self, topic: impl Into<Topic>) -> Result<()> {
        let topic = topic.into();
        self.request(|reply| RelayCommand::Unsubscribe { topic, reply })
            .await
    }

    /// Replaces the entire desired subscription set.
    ///
    /// # Errors
    ///
    /// [`Error::ChannelClosed`] if the loop has terminated.
    pub async fn reconcile(&self, desired: Vec<(Topic, EventCallback)>) -> Result<()> {
        self.request(|reply| RelayCommand::Reconcile { desired, reply })
            .await
    }

    /// Shuts the event loop down.
    ///
    /// Idempotent; pending sockets are closed.
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(RelayCommand::Shutdown);
    }

    /// Returns the key's current phase, or `None` for unknown keys.
    #[must_use]
    pub fn phase(&self, key: &SocketKey) -> Option<Phase> {
        self.status.read().get(key).copied()
    }

    /// Returns `true` if the key is currently connected.
    #[must_use]
    pub fn is_connected(&self, key: &SocketKey) -> bool {
        self.phase(key).is_some_and(Phase::is_connected)
    }

    /// Returns the number of active or pending connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.status.read().len()
    }

    /// Returns the key of the control connection.
    #[inline]
    #[must_use]
    pub const fn control_key(&self) -> &SocketKey {
        &self.control_key
    }

    /// Returns `true` if the control connection is up.
    #[must_use]
    pub fn is_control_connected(&self) -> bool {
        self.is_connected(&self.control_key)
    }

    /// Sends a command and awaits its oneshot reply.
    async fn request(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<()>>) -> RelayCommand,
    ) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(build(reply_tx))
            .map_err(|_| Error::ChannelClosed)?;
        reply_rx.await.map_err(|_| Error::ChannelClosed)?
    }
}

// ============================================================================
// RelayRuntime
// ============================================================================

/// State owned by the event loop task.
struct RelayRuntime {
    /// The connection state machine.
    client: SocketClient,
    /// Subscription bookkeeping for the control connection.
    reconciler: Reconciler,
    /// Key of the control connection.
    control_key: SocketKey,
    /// Endpoint of the control connection.
    control_url: String,
    /// Write halves of established sockets.
    writers: FxHashMap<SocketKey, WsWriter>,
    /// Source of dial tokens; never reused, so stale outcomes cannot collide.
    dial_seq: u64,
    /// Newest outstanding dial token per key.
    pending_dials: FxHashMap<SocketKey, u64>,
    /// Delay-command executor.
    scheduler: DelayScheduler,
    /// Cloned into read pumps.
    notify_tx: mpsc::UnboundedSender<Notification>,
    /// Cloned into dial tasks.
    dial_tx: mpsc::UnboundedSender<DialOutcome>,
    /// Caller-facing event stream.
    event_tx: mpsc::Sender<SocketEvent>,
    /// Phase snapshot shared with relay handles.
    status: StatusMap,
}

impl RelayRuntime {
    /// Runs the event loop to completion.
    async fn run(
        mut self,
        mut command_rx: mpsc::UnboundedReceiver<RelayCommand>,
        mut notify_rx: mpsc::UnboundedReceiver<Notification>,
        mut dial_rx: mpsc::UnboundedReceiver<DialOutcome>,
        ping_interval: Duration,
    ) {
        // The control connection comes up first; subscriptions declared
        // before it connects are replayed once it does.
        match self.client.open(self.control_key.clone(), self.control_url.clone()) {
            Ok(effects) => self.sync_and_apply(effects).await,
            Err(error) => warn!(%error, "control open rejected"),
        }

        let mut ping = tokio::time::interval(ping_interval);
        ping.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                command = command_rx.recv() => {
                    match command {
                        Some(command) => {
                            if !self.handle_command(command).await {
                                break;
                            }
                        }
                        None => break,
                    }
                }

                Some(notification) = notify_rx.recv() => {
                    self.handle_notification(notification).await;
                }

                Some(outcome) = dial_rx.recv() => {
                    self.handle_dial(outcome).await;
                }

                _ = ping.tick() => {
                    self.ping_control().await;
                }
            }
        }

        self.close_all().await;
        debug!("relay event loop terminated");
    }

    /// Handles one caller command. Returns `false` on shutdown.
    async fn handle_command(&mut self, command: RelayCommand) -> bool {
        match command {
            RelayCommand::Open { key, url, reply } => {
                let outcome = self.client.open(key, url);
                self.complete(outcome, reply).await;
            }
            RelayCommand::KeepAlive { key, url, reply } => {
                let outcome = self.client.keep_alive(key, url);
                self.complete(outcome, reply).await;
            }
            RelayCommand::Send { key, message, reply } => {
                let outcome = self.client.send(key, message);
                self.complete(outcome, reply).await;
            }
            RelayCommand::Close { key, reply } => {
                let effects = self.client.close(key);
                let _ = reply.send(Ok(()));
                self.sync_and_apply(effects).await;
            }
            RelayCommand::Subscribe {
                topic,
                callback,
                reply,
            } => {
                let messages = self.reconciler.subscribe(topic, callback);
                let _ = reply.send(Ok(()));
                self.send_control_batch(messages).await;
            }
            RelayCommand::Unsubscribe { topic, reply } => {
                let messages = self.reconciler.unsubscribe(&topic);
                let _ = reply.send(Ok(()));
                self.send_control_batch(messages).await;
            }
            RelayCommand::Reconcile { desired, reply } => {
                let messages = self.reconciler.reconcile(desired);
                let _ = reply.send(Ok(()));
                self.send_control_batch(messages).await;
            }
            RelayCommand::Shutdown => {
                info!("relay shutting down");
                return false;
            }
        }
        true
    }

    /// Folds one transport notification into the state machine.
    async fn handle_notification(&mut self, notification: Notification) {
        // A closed socket's pump has ended; drop our write half with it.
        if let Notification::Closed { key, .. } = &notification
            && self.writers.remove(key).is_some()
        {
            trace!(key = %key, "writer dropped on close");
        }

        let effects = self.client.handle(notification);
        self.sync_and_apply(effects).await;
    }

    /// Handles a completed dial attempt.
    ///
    /// Only the newest dial for a key still in `Connecting` may claim its
    /// outcome. A dial that raced with a close (the key is gone) or a reopen
    /// (a newer dial owns the key) is discarded without folding anything, and
    /// a stale established socket is shut.
    async fn handle_dial(&mut self, outcome: DialOutcome) {
        let (key, token) = match &outcome {
            DialOutcome::Established { key, token, .. }
            | DialOutcome::Failed { key, token, .. } => (key.clone(), *token),
        };

        let newest = self.pending_dials.get(&key) == Some(&token);
        if newest {
            self.pending_dials.remove(&key);
        }
        if !newest || self.client.phase(&key) != Some(Phase::Connecting) {
            debug!(key = %key, token, "stale dial outcome discarded");
            if let DialOutcome::Established { stream, .. } = outcome {
                tokio::spawn(async move {
                    let mut stream = *stream;
                    let _ = stream.close(None).await;
                });
            }
            return;
        }

        match outcome {
            DialOutcome::Established { key, stream, .. } => {
                let (writer, reader) = (*stream).split();
                self.writers.insert(key.clone(), writer);
                spawn_read_pump(key.clone(), reader, self.notify_tx.clone());

                let effects = self
                    .client
                    .handle(Notification::connected(key, CONNECTED_DESCRIPTION));
                self.sync_and_apply(effects).await;
            }
            DialOutcome::Failed { key, error, .. } => {
                warn!(key = %key, %error, "dial failed");
                let effects = self.client.handle(Notification::error(
                    Some(key.clone()),
                    "connect-failed",
                    error.to_string(),
                    None,
                ));
                self.sync_and_apply(effects).await;

                let effects = self.client.handle(Notification::closed(
                    key,
                    1006,
                    error.to_string(),
                    false,
                    0,
                ));
                self.sync_and_apply(effects).await;
            }
        }
    }

    /// Sends the keep-alive ping on the control connection.
    async fn ping_control(&mut self) {
        if !self.client.is_connected(&self.control_key) {
            return;
        }
        match self.reconciler.keep_alive().encode() {
            Ok(text) => match self.client.send(self.control_key.clone(), text) {
                Ok(effects) => {
                    trace!("control ping");
                    self.sync_and_apply(effects).await;
                }
                Err(error) => debug!(%error, "keep-alive rejected"),
            },
            Err(error) => warn!(%error, "failed to encode ping"),
        }
    }

    /// Publishes the reply, then applies the effects of a successful call.
    async fn complete(&mut self, outcome: Result<Vec<Effect>>, reply: oneshot::Sender<Result<()>>) {
        match outcome {
            Ok(effects) => {
                let _ = reply.send(Ok(()));
                self.sync_and_apply(effects).await;
            }
            Err(error) => {
                let _ = reply.send(Err(error));
            }
        }
    }

    /// Routes a batch of subscription messages through the control key.
    async fn send_control_batch(&mut self, messages: Vec<ClientMessage>) {
        let mut queue = VecDeque::new();
        for message in messages {
            self.queue_control_send(message, &mut queue);
        }
        self.sync_and_apply(Vec::from(queue)).await;
    }

    /// Refreshes the shared status snapshot, then applies effects.
    ///
    /// The snapshot is refreshed before events are forwarded so a caller who
    /// has observed an event sees status at least as new.
    async fn sync_and_apply(&mut self, effects: Vec<Effect>) {
        self.refresh_status();
        self.apply_effects(effects).await;
        self.refresh_status();
    }

    /// Drains a worklist of effects, commands first-in first-out.
    async fn apply_effects(&mut self, effects: Vec<Effect>) {
        let mut queue: VecDeque<Effect> = effects.into();
        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::Command(Command::Open { key, url }) => self.spawn_dial(key, url),
                Effect::Command(Command::Send { key, message }) => {
                    let follow_up = self.write_text(&key, message).await;
                    queue.extend(follow_up);
                }
                Effect::Command(Command::Close { key, reason }) => {
                    self.write_close(&key, reason).await;
                }
                Effect::Command(Command::Delay { id, millis }) => {
                    self.scheduler.schedule(id, millis);
                }
                Effect::Event(event) => self.dispatch_event(event, &mut queue).await,
            }
        }
    }

    /// Spawns a connect attempt for `key` and registers it as the newest.
    fn spawn_dial(&mut self, key: SocketKey, url: String) {
        self.dial_seq += 1;
        let token = self.dial_seq;
        self.pending_dials.insert(key.clone(), token);

        let dial_tx = self.dial_tx.clone();
        tokio::spawn(async move {
            debug!(key = %key, url = %url, token, "dialing");
            match connect_async(url.as_str()).await {
                Ok((stream, response)) => {
                    debug!(key = %key, status = %response.status(), "websocket established");
                    let _ = dial_tx.send(DialOutcome::Established {
                        key,
                        token,
                        stream: Box::new(stream),
                    });
                }
                Err(error) => {
                    let _ = dial_tx.send(DialOutcome::Failed { key, token, error });
                }
            }
        });
    }

    /// Writes a text frame, returning follow-up effects on failure.
    async fn write_text(&mut self, key: &SocketKey, message: String) -> Vec<Effect> {
        let Some(writer) = self.writers.get_mut(key) else {
            warn!(key = %key, "send with no live socket, dropping");
            return Vec::new();
        };
        match writer.send(Message::Text(message.into())).await {
            Ok(()) => Vec::new(),
            Err(error) => {
                // The read pump reports the disconnect; this only informs.
                warn!(key = %key, %error, "socket write failed");
                self.client.handle(Notification::error(
                    Some(key.clone()),
                    "write-failed",
                    error.to_string(),
                    None,
                ))
            }
        }
    }

    /// Starts the close handshake for `key`.
    async fn write_close(&mut self, key: &SocketKey, reason: String) {
        let Some(writer) = self.writers.get_mut(key) else {
            // The pump already reported (or is about to report) the close.
            debug!(key = %key, "close with no live socket");
            return;
        };
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: reason.into(),
        };
        if let Err(error) = writer.send(Message::Close(Some(frame))).await {
            debug!(key = %key, %error, "close frame write failed");
        }
    }

    /// Routes one event: pubsub traffic to the reconciler, the rest to the
    /// caller.
    async fn dispatch_event(&mut self, event: SocketEvent, queue: &mut VecDeque<Effect>) {
        let is_control = event.key() == Some(&self.control_key);

        if is_control && let SocketEvent::Message { message, .. } = &event {
            // Consumed by the subscription layer, never forwarded.
            self.dispatch_pubsub(message).await;
            return;
        }

        if is_control && matches!(event, SocketEvent::Connected { .. }) {
            // Server-side subscriptions did not survive; replay them.
            for message in self.reconciler.resubscribe_all() {
                self.queue_control_send(message, queue);
            }
        }

        self.forward(event).await;
    }

    /// Folds one control-connection payload into the reconciler.
    async fn dispatch_pubsub(&mut self, raw: &str) {
        match ServerMessage::decode(raw) {
            Ok(ServerMessage::Subscribed { topic }) => self.reconciler.on_subscribed(&topic),
            Ok(ServerMessage::Unsubscribed { topic }) => self.reconciler.on_unsubscribed(&topic),
            Ok(ServerMessage::Event { topic, data }) => self.reconciler.on_event(&topic, &data),
            Err(error) => {
                if ClientMessage::decode(raw).is_ok() {
                    // Loopback echo from the simulated transport.
                    trace!("ignoring echoed client message");
                } else {
                    warn!(%error, "undecodable control payload dropped");
                    self.forward(SocketEvent::Error(error)).await;
                }
            }
        }
    }

    /// Encodes a subscription message and hands it to the state machine.
    fn queue_control_send(&mut self, message: ClientMessage, queue: &mut VecDeque<Effect>) {
        match message.encode() {
            Ok(text) => match self.client.send(self.control_key.clone(), text) {
                Ok(effects) => queue.extend(effects),
                // Not connected yet: the connect-time replay covers it.
                Err(error) => debug!(%error, "control send deferred"),
            },
            Err(error) => warn!(%error, "failed to encode control message"),
        }
    }

    /// Forwards an event to the caller, applying backpressure.
    async fn forward(&self, event: SocketEvent) {
        if self.event_tx.send(event).await.is_err() {
            debug!("event receiver dropped, discarding");
        }
    }

    /// Rebuilds the phase snapshot shared with relay handles.
    fn refresh_status(&self) {
        let mut status = self.status.write();
        status.clear();
        status.extend(
            self.client
                .phases()
                .map(|(key, phase)| (key.clone(), phase)),
        );
    }

    /// Closes every live socket on shutdown.
    async fn close_all(&mut self) {
        for (key, mut writer) in self.writers.drain() {
            trace!(key = %key, "closing socket on shutdown");
            let _ = writer.close().await;
        }
        self.refresh_status();
    }
}

// ============================================================================
// Read Pump
// ============================================================================

/// Pumps frames from a socket's read half into the notification channel.
fn spawn_read_pump(
    key: SocketKey,
    mut reader: WsReader,
    notify_tx: mpsc::UnboundedSender<Notification>,
) {
    tokio::spawn(async move {
        while let Some(frame) = reader.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    let _ = notify_tx
                        .send(Notification::message_received(key.clone(), text.to_string()));
                }
                Ok(Message::Close(frame)) => {
                    let (code, reason) = match frame {
                        Some(frame) => (u16::from(frame.code), frame.reason.to_string()),
                        None => (1005, String::new()),
                    };
                    debug!(key = %key, code, "close frame received");
                    let _ = notify_tx.send(Notification::closed(key, code, reason, true, 0));
                    return;
                }
                // Binary, Ping and Pong frames carry nothing for this
                // protocol.
                Ok(_) => {}
                Err(error) => {
                    debug!(key = %key, %error, "socket read failed");
                    let _ = notify_tx.send(Notification::closed(
                        key,
                        1006,
                        error.to_string(),
                        false,
                        0,
                    ));
                    return;
                }
            }
        }
        // Stream ended without a close frame.
        let _ = notify_tx.send(Notification::closed(key, 1006, String::new(), false, 0));
    });
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;

    fn counting() -> (EventCallback, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let callback: EventCallback = Arc::new(move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (callback, count)
    }

    async fn wait_for(count: &AtomicUsize, expected: usize) {
        for _ in 0..100 {
            if count.load(Ordering::SeqCst) == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(count.load(Ordering::SeqCst), expected);
    }

    /// Binds a control endpoint that accepts sockets and discards frames.
    async fn spawn_idle_control() -> anyhow::Result<SocketAddr> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                    while let Some(Ok(_)) = ws.next().await {}
                });
            }
        });
        Ok(addr)
    }

    /// Accepts one socket after `delay`, then records every text frame it
    /// reads. The delay parks the websocket handshake, not the TCP accept.
    fn spawn_collecting_server(
        listener: tokio::net::TcpListener,
        delay: Duration,
    ) -> (tokio::task::JoinHandle<()>, mpsc::UnboundedReceiver<String>) {
        let (seen_tx, seen_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(delay).await;
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            while let Some(Ok(frame)) = ws.next().await {
                if let Message::Text(text) = frame {
                    let _ = seen_tx.send(text.to_string());
                }
            }
        });
        (handle, seen_rx)
    }

    #[test]
    fn test_builder_requires_url() {
        let err = RelayBuilder::new().spawn().unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_builder_rejects_non_websocket_scheme() {
        let err = RelayBuilder::new()
            .url("https://example.com/feed")
            .spawn()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidUrl { .. }));

        let err = RelayBuilder::new().url("not a url").spawn().unwrap_err();
        assert!(matches!(err, Error::InvalidUrl { .. }));
    }

    #[tokio::test]
    async fn test_offline_relay_opens_and_echoes() {
        let (relay, mut events) = Relay::builder()
            .url("wss://example.test/pubsub")
            .offline(true)
            .spawn()
            .unwrap();

        // The control connection comes up simulated.
        let event = events.recv().await.unwrap();
        assert!(matches!(
            event,
            SocketEvent::Connected { ref description, .. } if description == "simulated"
        ));

        relay.open("echo", "wss://example.test/echo").await.unwrap();
        let event = events.recv().await.unwrap();
        assert_eq!(event.key(), Some(&SocketKey::new("echo")));

        // Simulated sends loop straight back.
        relay.send("echo", "hello").await.unwrap();
        let event = events.recv().await.unwrap();
        assert!(matches!(
            event,
            SocketEvent::Message { ref message, .. } if message == "hello"
        ));

        relay.close("echo").await.unwrap();
        let event = events.recv().await.unwrap();
        assert!(matches!(event, SocketEvent::Closed { expected: true, .. }));

        relay.shutdown();
    }

    #[tokio::test]
    async fn test_offline_relay_reports_contract_errors() {
        let (relay, mut events) = Relay::builder()
            .url("wss://example.test/pubsub")
            .offline(true)
            .spawn()
            .unwrap();
        let _ = events.recv().await;

        let err = relay.send("ghost", "hello").await.unwrap_err();
        assert!(matches!(err, Error::NotOpen { .. }));

        relay.shutdown();
    }

    #[tokio::test]
    async fn test_offline_relay_dispatches_pubsub_events() {
        let (relay, mut events) = Relay::builder()
            .url("wss://example.test/pubsub")
            .offline(true)
            .spawn()
            .unwrap();
        let _ = events.recv().await; // control connected

        let (callback, count) = counting();
        relay.subscribe("feed/prices", callback).await.unwrap();

        // Loop an event envelope through the simulated control socket; the
        // echo arrives as if the server had published it.
        let envelope = ServerMessage::Event {
            topic: Topic::from("feed/prices"),
            data: json!({"bid": 42}),
        }
        .encode()
        .unwrap();
        relay.send(relay.control_key().clone(), envelope).await.unwrap();

        wait_for(&count, 1).await;
        relay.shutdown();
    }

    #[tokio::test]
    async fn test_offline_status_snapshot_tracks_phases() {
        let (relay, mut events) = Relay::builder()
            .url("wss://example.test/pubsub")
            .offline(true)
            .spawn()
            .unwrap();
        let _ = events.recv().await;

        assert!(relay.is_control_connected());
        assert_eq!(relay.phase(relay.control_key()), Some(Phase::Connected));
        assert_eq!(relay.phase(&SocketKey::new("ghost")), None);
        assert_eq!(relay.connection_count(), 1);

        relay.shutdown();
    }

    #[tokio::test]
    async fn test_relay_against_local_server() -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        // Minimal pubsub server: ack the first subscribe, publish one event,
        // then idle until the client hangs up.
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

            let subscribe = loop {
                let frame = ws.next().await.unwrap().unwrap();
                if let Message::Text(text) = frame {
                    let message = ClientMessage::decode(&text).unwrap();
                    if let Some(topic) = message.topic() {
                        break topic.clone();
                    }
                    // A ping beat the subscribe here; keep reading.
                }
            };

            let ack = ServerMessage::Subscribed {
                topic: subscribe.clone(),
            };
            ws.send(Message::Text(ack.encode().unwrap().into()))
                .await
                .unwrap();

            let event = ServerMessage::Event {
                topic: subscribe,
                data: json!({"n": 1}),
            };
            ws.send(Message::Text(event.encode().unwrap().into()))
                .await
                .unwrap();

            while let Some(frame) = ws.next().await {
                if frame.is_err() {
                    break;
                }
            }
        });

        let (relay, mut events) = Relay::builder().url(format!("ws://{addr}")).spawn()?;

        // Declared before the control connection is up; replayed on connect.
        let (callback, count) = counting();
        relay.subscribe("feed/prices", callback).await?;

        let event = events.recv().await.expect("connected event");
        assert!(matches!(event, SocketEvent::Connected { .. }));

        wait_for(&count, 1).await;

        relay.shutdown();
        server.await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_reopened_key_ignores_stale_dial() -> anyhow::Result<()> {
        let control_addr = spawn_idle_control().await?;

        let slow_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let slow_addr = slow_listener.local_addr()?;
        let (_slow_server, mut slow_seen) =
            spawn_collecting_server(slow_listener, Duration::from_millis(600));

        let fast_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let fast_addr = fast_listener.local_addr()?;
        let (_fast_server, mut fast_seen) =
            spawn_collecting_server(fast_listener, Duration::ZERO);

        let (relay, mut events) = Relay::builder()
            .url(format!("ws://{control_addr}"))
            .spawn()?;
        let event = events.recv().await.expect("control connected");
        assert!(matches!(event, SocketEvent::Connected { .. }));

        // Close the key while its first dial is parked in the handshake,
        // then rebind it to the second endpoint.
        relay.open("k", format!("ws://{slow_addr}")).await?;
        relay.close("k").await?;
        let event = events.recv().await.expect("local close");
        assert!(matches!(event, SocketEvent::Closed { expected: true, .. }));

        relay.open("k", format!("ws://{fast_addr}")).await?;
        let event = events.recv().await.expect("rebound");
        assert!(matches!(event, SocketEvent::Connected { .. }));
        assert_eq!(event.key(), Some(&SocketKey::new("k")));

        // The first handshake finishes here; its outcome must fold nothing.
        tokio::time::sleep(Duration::from_millis(800)).await;
        assert!(events.try_recv().is_err());

        // Writes reach the endpoint the key was rebound to.
        relay.send("k", "ping").await?;
        let seen = tokio::time::timeout(Duration::from_secs(2), fast_seen.recv()).await?;
        assert_eq!(seen.as_deref(), Some("ping"));
        assert!(slow_seen.try_recv().is_err());

        relay.shutdown();
        Ok(())
    }

    #[tokio::test]
    async fn test_closed_key_discards_late_dial() -> anyhow::Result<()> {
        let control_addr = spawn_idle_control().await?;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (server, _seen) = spawn_collecting_server(listener, Duration::from_millis(300));

        let (relay, mut events) = Relay::builder()
            .url(format!("ws://{control_addr}"))
            .spawn()?;
        let event = events.recv().await.expect("control connected");
        assert!(matches!(event, SocketEvent::Connected { .. }));

        // The key is gone before its handshake completes.
        relay.open("k", format!("ws://{addr}")).await?;
        relay.close("k").await?;
        let event = events.recv().await.expect("local close");
        assert!(matches!(event, SocketEvent::Closed { expected: true, .. }));

        // The late socket is shut without surfacing anything: the server
        // sees the close handshake and its read loop ends.
        tokio::time::timeout(Duration::from_secs(2), server).await??;
        assert!(events.try_recv().is_err());
        assert_eq!(relay.phase(&SocketKey::new("k")), None);

        relay.shutdown();
        Ok(())
    }
}
