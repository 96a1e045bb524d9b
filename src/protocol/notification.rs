//! Notifications delivered by the transport into the client core.
//!
//! Notifications are the inbound half of the port protocol. The transport
//! reports connection lifecycle, received messages, and fired delays; the core
//! folds each notification into its state and returns effects.
//!
//! | Notification | Meaning |
//! |--------------|---------|
//! | `connected` | a channel finished opening |
//! | `messageReceived` | a text message arrived |
//! | `closed` | a channel closed (cleanly or not) |
//! | `bytesQueued` | transport-side buffered byte count changed |
//! | `delayed` | a scheduled delay fired |
//! | `error` | low-level transport error |
//!
//! Wire form mirrors [`Command`](crate::protocol::Command): a `method`
//! discriminant with a `params` payload.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::identifiers::{ContinuationId, SocketKey};

// ============================================================================
// Notification
// ============================================================================

/// A transport-to-core notification envelope.
///
/// # Example
///
/// ```
/// use relink::protocol::Notification;
///
/// let json = r#"{"method":"closed","params":{"key":"a","code":1006,
///     "reason":"","wasClean":false,"bufferedBytes":0}}"#;
/// let note = Notification::decode(json).unwrap();
/// assert!(matches!(note, Notification::Closed { code: 1006, .. }));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "camelCase")]
pub enum Notification {
    /// A channel finished opening.
    Connected {
        /// Key of the now-open channel.
        key: SocketKey,
        /// Transport-provided description of the endpoint.
        description: String,
    },

    /// A text message arrived.
    MessageReceived {
        /// Key the message arrived on.
        key: SocketKey,
        /// Message payload.
        message: String,
    },

    /// A channel closed.
    Closed {
        /// Key of the closed channel.
        key: SocketKey,
        /// Numeric close code.
        code: u16,
        /// Close reason text supplied by the peer, possibly empty.
        reason: String,
        /// Whether the close handshake completed cleanly.
        #[serde(rename = "wasClean")]
        was_clean: bool,
        /// Bytes still buffered and unsent at close time.
        #[serde(rename = "bufferedBytes")]
        buffered_bytes: u64,
    },

    /// Transport-side buffered byte count changed.
    BytesQueued {
        /// Key the report relates to.
        key: SocketKey,
        /// Bytes currently buffered by the transport.
        #[serde(rename = "bufferedAmount")]
        buffered_amount: u64,
    },

    /// A scheduled delay fired.
    Delayed {
        /// Correlation id from the originating `delay` command.
        id: ContinuationId,
    },

    /// Low-level transport error.
    Error {
        /// Key the error relates to, when the transport knows it.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<SocketKey>,
        /// Transport-specific error code.
        code: String,
        /// Human-readable description.
        description: String,
        /// Transport-specific error name, when available.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

impl Notification {
    /// Creates a connected notification.
    #[inline]
    pub fn connected(key: impl Into<SocketKey>, description: impl Into<String>) -> Self {
        Self::Connected {
            key: key.into(),
            description: description.into(),
        }
    }

    /// Creates a message-received notification.
    #[inline]
    pub fn message_received(key: impl Into<SocketKey>, message: impl Into<String>) -> Self {
        Self::MessageReceived {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates a closed notification.
    #[inline]
    pub fn closed(
        key: impl Into<SocketKey>,
        code: u16,
        reason: impl Into<String>,
        was_clean: bool,
        buffered_bytes: u64,
    ) -> Self {
        Self::Closed {
            key: key.into(),
            code,
            reason: reason.into(),
            was_clean,
            buffered_bytes,
        }
    }

    /// Creates a bytes-queued notification.
    #[inline]
    pub fn bytes_queued(key: impl Into<SocketKey>, buffered_amount: u64) -> Self {
        Self::BytesQueued {
            key: key.into(),
            buffered_amount,
        }
    }

    /// Creates a delayed notification.
    #[inline]
    #[must_use]
    pub const fn delayed(id: ContinuationId) -> Self {
        Self::Delayed { id }
    }

    /// Creates an error notification.
    #[inline]
    pub fn error(
        key: Option<SocketKey>,
        code: impl Into<String>,
        description: impl Into<String>,
        name: Option<String>,
    ) -> Self {
        Self::Error {
            key,
            code: code.into(),
            description: description.into(),
            name,
        }
    }

    /// Returns the wire method name.
    #[inline]
    #[must_use]
    pub const fn method(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::MessageReceived { .. } => "messageReceived",
            Self::Closed { .. } => "closed",
            Self::BytesQueued { .. } => "bytesQueued",
            Self::Delayed { .. } => "delayed",
            Self::Error { .. } => "error",
        }
    }

    /// Returns the socket key this notification names, if any.
    #[inline]
    #[must_use]
    pub fn key(&self) -> Option<&SocketKey> {
        match self {
            Self::Connected { key, .. }
            | Self::MessageReceived { key, .. }
            | Self::Closed { key, .. }
            | Self::BytesQueued { key, .. } => Some(key),
            Self::Error { key, .. } => key.as_ref(),
            Self::Delayed { .. } => None,
        }
    }

    /// Serializes the notification to its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Json`] if serialization fails.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a notification from its JSON wire form.
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
    fn test_connected_wire_shape() {
        let note = Notification::connected("a", "wss://x");
        let json = serde_json::to_value(&note).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "method": "connected",
                "params": { "key": "a", "description": "wss://x" }
            })
        );
    }

    #[test]
    fn test_message_received_tag_is_camel_case() {
        let note = Notification::message_received("a", "hi");
        let json = note.encode().expect("encode");
        assert!(json.contains(r#""method":"messageReceived""#));
    }

    #[test]
    fn test_closed_wire_shape() {
        let note = Notification::closed("a", 1000, "bye", true, 0);
        let json = serde_json::to_value(&note).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "method": "closed",
                "params": {
                    "key": "a",
                    "code": 1000,
                    "reason": "bye",
                    "wasClean": true,
                    "bufferedBytes": 0
                }
            })
        );
    }

    #[test]
    fn test_bytes_queued_wire_shape() {
        let note = Notification::bytes_queued("a", 512);
        let json = serde_json::to_value(&note).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "method": "bytesQueued",
                "params": { "key": "a", "bufferedAmount": 512 }
            })
        );
    }

    #[test]
    fn test_error_omits_absent_optionals() {
        let note = Notification::error(None, "ECONNRESET", "reset", None);
        let json = serde_json::to_value(&note).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "method": "error",
                "params": { "code": "ECONNRESET", "description": "reset" }
            })
        );
    }

    #[test]
    fn test_decode_round_trip() {
        let note = Notification::delayed(ContinuationId::new(9));
        let back = Notification::decode(&note.encode().expect("encode")).expect("decode");
        assert_eq!(back, note);
    }

    #[test]
    fn test_decode_unknown_method_fails() {
        let result = Notification::decode(r#"{"method":"exploded","params":{}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_key_accessor() {
        let note = Notification::closed("a", 1006, "", false, 0);
        assert_eq!(note.key().map(SocketKey::as_str), Some("a"));
        assert!(Notification::delayed(ContinuationId::new(1)).key().is_none());
    }
}
