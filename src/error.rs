//! Error types for the channel client.
//!
//! This module defines all error values used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use relink::{Relay, Result};
//!
//! async fn example(relay: &Relay) -> Result<()> {
//!     relay.open("feed", "wss://example.com/feed").await?;
//!     relay.send("feed", "hello").await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants | Meaning |
//! |----------|----------|---------|
//! | Contract violation | [`Error::AlreadyOpen`], [`Error::Connecting`], [`Error::Closing`], [`Error::NotOpen`] | operation misused; returned synchronously, never retried |
//! | Protocol confusion | [`Error::UnexpectedConnected`], [`Error::UnexpectedMessage`] | notification arrived in a phase that does not expect it; state unchanged |
//! | Transport report | [`Error::Transport`] | low-level transport error; informational, forwarded to the caller |
//! | Decoding | [`Error::Decode`], [`Error::Json`] | envelope could not be interpreted and was dropped |
//! | Runtime | [`Error::Config`], [`Error::InvalidUrl`], [`Error::ChannelClosed`], [`Error::WebSocket`] | relay setup and IO failures |
//!
//! Nothing in this crate aborts on error; every failure is a returned or
//! reported value. Exhausting the reconnect budget is not an [`Error`] at all:
//! it surfaces as a closed event carrying the synthetic 4000 close code.

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::SocketKey;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant carries the offending key or context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Contract Violations
    // ========================================================================
    /// Open was called on a key that is already connected.
    ///
    /// Returned synchronously from `open`/`keep_alive`; the entry is left
    /// untouched.
    #[error("Socket already open: {key}")]
    AlreadyOpen {
        /// Key of the connected socket.
        key: SocketKey,
    },

    /// Open was called on a key with a connect attempt still in flight.
    #[error("Socket still connecting: {key}")]
    Connecting {
        /// Key of the connecting socket.
        key: SocketKey,
    },

    /// Open was called on a key that is shutting down.
    #[error("Socket closing: {key}")]
    Closing {
        /// Key of the closing socket.
        key: SocketKey,
    },

    /// Send was called on a key that is not open and not reconnecting.
    ///
    /// Sending before the first successful open is a contract violation, not
    /// a queueing request; only sends during an active reconnect are buffered.
    #[error("Socket not open: {key}")]
    NotOpen {
        /// Key the send was addressed to.
        key: SocketKey,
    },

    // ========================================================================
    // Protocol Confusion
    // ========================================================================
    /// A connected notification arrived for a key that was not connecting.
    ///
    /// Reported to the caller; connection state is left unchanged.
    #[error("Unexpected connected notification for key: {key}")]
    UnexpectedConnected {
        /// Key named by the stray notification.
        key: SocketKey,
    },

    /// A message arrived for a key that is not connected.
    #[error("Unexpected message for key: {key}")]
    UnexpectedMessage {
        /// Key named by the stray message.
        key: SocketKey,
    },

    // ========================================================================
    // Transport Reports
    // ========================================================================
    /// Low-level error reported by the transport.
    ///
    /// Always forwarded to the caller; never changes connection phase.
    #[error("Transport error: {description} (code {code})")]
    Transport {
        /// Key the error relates to, when the transport knows it.
        key: Option<SocketKey>,
        /// Transport-specific error code.
        code: String,
        /// Human-readable description.
        description: String,
        /// Transport-specific error name, when available.
        name: Option<String>,
    },

    // ========================================================================
    // Decoding Errors
    // ========================================================================
    /// An envelope was structurally valid but semantically uninterpretable.
    ///
    /// Unknown message type, topic with fewer than two segments, and similar.
    /// The envelope is dropped.
    #[error("Decode error: {message}")]
    Decode {
        /// Description of what failed to decode.
        message: String,
    },

    /// JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ========================================================================
    // Runtime Errors
    // ========================================================================
    /// Relay configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Endpoint URL failed validation.
    ///
    /// Only `ws` and `wss` schemes are accepted.
    #[error("Invalid URL {url}: {message}")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
        /// Why it was rejected.
        message: String,
    },

    /// The relay event loop has terminated.
    #[error("Relay channel closed")]
    ChannelClosed,

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates an already-open contract violation.
    #[inline]
    pub fn already_open(key: impl Into<SocketKey>) -> Self {
        Self::AlreadyOpen { key: key.into() }
    }

    /// Creates a still-connecting contract violation.
    #[inline]
    pub fn connecting(key: impl Into<SocketKey>) -> Self {
        Self::Connecting { key: key.into() }
    }

    /// Creates a closing contract violation.
    #[inline]
    pub fn closing(key: impl Into<SocketKey>) -> Self {
        Self::Closing { key: key.into() }
    }

    /// Creates a not-open contract violation.
    #[inline]
    pub fn not_open(key: impl Into<SocketKey>) -> Self {
        Self::NotOpen { key: key.into() }
    }

    /// Creates an unexpected-connected confusion report.
    #[inline]
    pub fn unexpected_connected(key: impl Into<SocketKey>) -> Self {
        Self::UnexpectedConnected { key: key.into() }
    }

    /// Creates an unexpected-message confusion report.
    #[inline]
    pub fn unexpected_message(key: impl Into<SocketKey>) -> Self {
        Self::UnexpectedMessage { key: key.into() }
    }

    /// Creates a transport error report.
    #[inline]
    pub fn transport(
        key: Option<SocketKey>,
        code: impl Into<String>,
        description: impl Into<String>,
        name: Option<String>,
    ) -> Self {
        Self::Transport {
            key,
            code: code.into(),
            description: description.into(),
            name,
        }
    }

    /// Creates a decode error.
    #[inline]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid URL error.
    #[inline]
    pub fn invalid_url(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a contract violation.
    ///
    /// Contract violations are programmer errors and must not be retried.
    #[inline]
    #[must_use]
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::AlreadyOpen { .. }
                | Self::Connecting { .. }
                | Self::Closing { .. }
                | Self::NotOpen { .. }
        )
    }

    /// Returns `true` if this is a protocol-confusion report.
    ///
    /// Confusion reports leave connection state unchanged and are never fatal.
    #[inline]
    #[must_use]
    pub fn is_protocol_confusion(&self) -> bool {
        matches!(
            self,
            Self::UnexpectedConnected { .. } | Self::UnexpectedMessage { .. }
        )
    }

    /// Returns `true` if this is a decoding failure.
    #[inline]
    #[must_use]
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. } | Self::Json(_))
    }

    /// Returns the socket key this error relates to, when there is one.
    #[inline]
    #[must_use]
    pub fn key(&self) -> Option<&SocketKey> {
        match self {
            Self::AlreadyOpen { key }
            | Self::Connecting { key }
            | Self::Closing { key }
            | Self::NotOpen { key }
            | Self::UnexpectedConnected { key }
            | Self::UnexpectedMessage { key } => Some(key),
            Self::Transport { key, .. } => key.as_ref(),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
