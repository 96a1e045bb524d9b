//! Effects returned by the client reducer.
//!
//! Every operation and notification handler returns a list of effects instead
//! of performing IO. An [`Effect::Command`] asks the transport to act; an
//! [`Effect::Event`] is delivered to the caller. This split keeps the whole
//! state machine testable without a live connection: feed inputs, assert on
//! the returned effects.

// ============================================================================
// Imports
// ============================================================================

use crate::error::Error;
use crate::identifiers::SocketKey;
use crate::protocol::{CloseReason, Command};

// ============================================================================
// SocketEvent
// ============================================================================

/// Caller-visible outcome produced by the client.
#[derive(Debug)]
pub enum SocketEvent {
    /// A connection reached `Connected`.
    Connected {
        /// Key of the connection.
        key: SocketKey,
        /// Transport-provided endpoint description.
        description: String,
    },

    /// A message arrived on a non-keep-alive connection.
    Message {
        /// Key the message arrived on.
        key: SocketKey,
        /// Message payload.
        message: String,
    },

    /// A connection ended and its entry was removed.
    Closed {
        /// Key of the former connection.
        key: SocketKey,
        /// Interpreted close code.
        reason: CloseReason,
        /// Close reason text supplied by the peer, possibly empty.
        detail: String,
        /// Whether the close handshake completed cleanly.
        was_clean: bool,
        /// `true` for caller-requested closes, `false` for unexpected ones
        /// (including reconnect give-up, which carries
        /// [`CloseReason::TimedOutOnReconnect`]).
        expected: bool,
    },

    /// A reported error: protocol confusion, transport report, or decode
    /// failure. Connection state is unchanged by these.
    Error(Error),
}

impl SocketEvent {
    /// Returns the socket key this event concerns, if any.
    #[must_use]
    pub fn key(&self) -> Option<&SocketKey> {
        match self {
            Self::Connected { key, .. } | Self::Message { key, .. } | Self::Closed { key, .. } => {
                Some(key)
            }
            Self::Error(error) => error.key(),
        }
    }
}

// ============================================================================
// Effect
// ============================================================================

/// One unit of work requested by the reducer.
#[derive(Debug)]
pub enum Effect {
    /// Ask the transport (or scheduler) to act.
    Command(Command),
    /// Deliver an event to the caller.
    Event(SocketEvent),
}

impl Effect {
    /// Returns the inner command, if this effect is one.
    #[inline]
    #[must_use]
    pub fn as_command(&self) -> Option<&Command> {
        match self {
            Self::Command(command) => Some(command),
            Self::Event(_) => None,
        }
    }

    /// Returns the inner event, if this effect is one.
    #[inline]
    #[must_use]
    pub fn as_event(&self) -> Option<&SocketEvent> {
        match self {
            Self::Event(event) => Some(event),
            Self::Command(_) => None,
        }
    }

    /// Returns `true` if this effect is a transport command.
    #[inline]
    #[must_use]
    pub fn is_command(&self) -> bool {
        matches!(self, Self::Command(_))
    }

    /// Returns `true` if this effect is a caller event.
    #[inline]
    #[must_use]
    pub fn is_event(&self) -> bool {
        matches!(self, Self::Event(_))
    }
}

impl From<Command> for Effect {
    #[inline]
    fn from(command: Command) -> Self {
        Self::Command(command)
    }
}

impl From<SocketEvent> for Effect {
    #[inline]
    fn from(event: SocketEvent) -> Self {
        Self::Event(event)
    }
}

// ============================================================================
// Tests
// ============================================================================
