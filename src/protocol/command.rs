//! Commands issued by the client core to the transport.
//!
//! Commands are the outbound half of the port protocol: the core never
//! touches a socket itself, it emits these envelopes and a transport executes
//! them.
//!
//! | Command | Effect |
//! |---------|--------|
//! | `open` | establish a channel for a key |
//! | `send` | write a text message on a key's channel |
//! | `close` | close a key's channel gracefully |
//! | `delay` | schedule a `delayed` notification after some milliseconds |
//!
//! Wire form is JSON with a `method` discriminant and `params` payload:
//! `{"method":"open","params":{"key":"...","url":"..."}}`.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::identifiers::{ContinuationId, SocketKey};

// ============================================================================
// Command
// ============================================================================

/// A transport-facing command envelope.
///
/// # Example
///
/// ```
/// use relink::protocol::Command;
///
/// let cmd = Command::open("feed", "wss://example.com/feed");
/// let json = cmd.encode().unwrap();
/// assert!(json.contains(r#""method":"open""#));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "lowercase")]
pub enum Command {
    /// Establish a channel.
    Open {
        /// Key the channel will be addressed by.
        key: SocketKey,
        /// Endpoint URL to connect to.
        url: String,
    },

    /// Write a text message.
    Send {
        /// Key of the target channel.
        key: SocketKey,
        /// Payload to write.
        message: String,
    },

    /// Close a channel gracefully.
    Close {
        /// Key of the channel to close.
        key: SocketKey,
        /// Human-readable close reason.
        reason: String,
    },

    /// Schedule a one-shot callback.
    Delay {
        /// Correlation id echoed back in the `delayed` notification.
        id: ContinuationId,
        /// Delay duration in milliseconds.
        millis: u64,
    },
}

impl Command {
    /// Creates an open command.
    #[inline]
    pub fn open(key: impl Into<SocketKey>, url: impl Into<String>) -> Self {
        Self::Open {
            key: key.into(),
            url: url.into(),
        }
    }

    /// Creates a send command.
    #[inline]
    pub fn send(key: impl Into<SocketKey>, message: impl Into<String>) -> Self {
        Self::Send {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates a close command.
    #[inline]
    pub fn close(key: impl Into<SocketKey>, reason: impl Into<String>) -> Self {
        Self::Close {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Creates a delay command.
    #[inline]
    #[must_use]
    pub const fn delay(id: ContinuationId, millis: u64) -> Self {
        Self::Delay { id, millis }
    }

    /// Returns the wire method name.
    #[inline]
    #[must_use]
    pub const fn method(&self) -> &'static str {
        match self {
            Self::Open { .. } => "open",
            Self::Send { .. } => "send",
            Self::Close { .. } => "close",
            Self::Delay { .. } => "delay",
        }
    }

    /// Returns the socket key this command addresses, if any.
    ///
    /// `delay` commands are keyed by continuation id, not socket.
    #[inline]
    #[must_use]
    pub fn key(&self) -> Option<&SocketKey> {
        match self {
            Self::Open { key, .. } | Self::Send { key, .. } | Self::Close { key, .. } => Some(key),
            Self::Delay { .. } => None,
        }
    }

    /// Serializes the command to its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Json`] if serialization fails.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a command from its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Json`] on malformed JSON or an unknown method.
    pub fn decode(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_wire_shape() {
        let cmd = Command::open("a", "wss://x");
        let json = serde_json::to_value(&cmd).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "method": "open",
                "params": { "key": "a", "url": "wss://x" }
            })
        );
    }

    #[test]
    fn test_send_wire_shape() {
        let cmd = Command::send("a", "hello");
        let json = serde_json::to_value(&cmd).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "method": "send",
                "params": { "key": "a", "message": "hello" }
            })
        );
    }

    #[test]
    fn test_close_wire_shape() {
        let cmd = Command::close("a", "close requested");
        let json = serde_json::to_value(&cmd).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "method": "close",
                "params": { "key": "a", "reason": "close requested" }
            })
        );
    }

    #[test]
    fn test_delay_wire_shape() {
        let cmd = Command::delay(ContinuationId::new(7), 20);
        let json = serde_json::to_value(&cmd).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "method": "delay",
                "params": { "id": 7, "millis": 20 }
            })
        );
    }

    #[test]
    fn test_decode_round_trip() {
        let cmd = Command::send("feed", "payload");
        let back = Command::decode(&cmd.encode().expect("encode")).expect("decode");
        assert_eq!(back, cmd);
    }

    #[test]
    fn test_decode_unknown_method_fails() {
        let result = Command::decode(r#"{"method":"poke","params":{"key":"a"}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_method_and_key_accessors() {
        assert_eq!(Command::open("a", "wss://x").method(), "open");
        assert_eq!(
            Command::send("a", "m").key().map(SocketKey::as_str),
            Some("a")
        );
        assert!(Command::delay(ContinuationId::new(1), 10).key().is_none());
    }
}
