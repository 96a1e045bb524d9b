//! Relink - Resilient duplex messaging over WebSockets.
//!
//! This library keeps a set of named WebSocket connections alive through
//! disconnects, buffering and replaying traffic so callers never deal with
//! reconnect logic themselves.
//!
//! # Architecture
//!
//! The crate is split into a pure core and a thin runtime:
//!
//! - **Core ([`SocketClient`])**: a sans-IO state machine. Every call and
//!   every transport notification folds into it and yields [`Effect`]s
//!   describing what to do next. No sockets, no timers, no tasks.
//! - **Runtime ([`Relay`])**: a single tokio task that owns the core,
//!   executes its effects against real sockets and timers, and streams
//!   [`SocketEvent`]s back to the caller.
//!
//! Key design principles:
//!
//! - Dropped connections reconnect with exponential backoff, capped at ten
//!   attempts
//! - Sends during a reconnect are queued per key and drained in order
//! - Topic subscriptions are declarative and survive reconnects
//! - Everything observable is an event (no polling)
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use relink::{Relay, Result, SocketEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Spawn the relay; the control connection dials immediately.
//!     let (relay, mut events) = Relay::builder()
//!         .url("wss://example.com/pubsub")
//!         .spawn()?;
//!
//!     // Topic callbacks fire for every matching published event.
//!     relay
//!         .subscribe(
//!             "ticker/prices",
//!             Arc::new(|topic, data| println!("{topic}: {data}")),
//!         )
//!         .await?;
//!
//!     // Additional duplex connections ride the same event loop.
//!     relay.open("feed", "wss://example.com/feed").await?;
//!
//!     while let Some(event) = events.recv().await {
//!         match event {
//!             SocketEvent::Connected { key, .. } if key.as_str() == "feed" => {
//!                 relay.send("feed", "hello").await?;
//!             }
//!             SocketEvent::Message { key, message } => {
//!                 println!("{key}: {message}");
//!             }
//!             _ => {}
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Sans-IO connection state machine |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe key and id wrappers |
//! | [`protocol`] | Transport command and notification types |
//! | [`pubsub`] | Topic subscriptions and their wire format |
//! | [`transport`] | Tokio runtime binding the core to real sockets |
//!
//! # Features
//!
//! - **Resilient**: exponential backoff, bounded retry budget, loud give-up
//! - **Ordered**: per-key FIFO buffering across reconnects
//! - **Declarative**: subscriptions reconcile against a desired set
//! - **Testable**: offline mode simulates the transport end to end

// ============================================================================
// Modules
// ============================================================================

/// Sans-IO connection state machine.
///
/// [`SocketClient`] holds all connection state; its methods return
/// [`Effect`]s for the runtime to execute.
pub mod client;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for connections and timers.
///
/// Newtype wrappers prevent mixing incompatible ids at compile time.
pub mod identifiers;

/// Transport command and notification types.
///
/// The wire contract between the state machine and a transport.
pub mod protocol;

/// Topic subscriptions and their wire format.
///
/// Tracks desired topics and reconciles them against the server.
pub mod pubsub;

/// Tokio runtime binding the core to real sockets.
///
/// Use [`Relay::builder()`] to spawn a configured event loop.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Core state machine types
pub use client::{Effect, Phase, SocketClient, SocketEvent};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ContinuationId, SocketKey};

// Protocol types
pub use protocol::{CloseReason, Command, Notification, TIMED_OUT_ON_RECONNECT};

// Pubsub types
pub use pubsub::{
    ClientMessage, EventCallback, Reconciler, ServerMessage, SubscriptionPhase, Topic,
};

// Runtime types
pub use transport::{Relay, RelayBuilder};
