//! Wire envelopes for the publish/subscribe protocol.
//!
//! Both directions use a flat JSON object discriminated by a `type` field:
//!
//! | Direction | Envelope |
//! |-----------|----------|
//! | client → server | `{"type":"subscribe","topic":[...]}` |
//! | client → server | `{"type":"unsubscribe","topic":[...]}` |
//! | client → server | `{"type":"ping"}` |
//! | server → client | `{"type":"subscribed","topic":[...]}` |
//! | server → client | `{"type":"unsubscribed","topic":[...]}` |
//! | server → client | `{"type":"event","topic":[...],"data":...}` |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

use super::topic::Topic;

// ============================================================================
// ClientMessage
// ============================================================================

/// A message the client sends to the publish/subscribe server.
///
/// # Example
///
/// ```
/// use relink::pubsub::{ClientMessage, Topic};
///
/// let message = ClientMessage::Subscribe {
///     topic: Topic::from("feed/prices"),
/// };
/// assert_eq!(
///     message.encode().unwrap(),
///     r#"{"type":"subscribe","topic":["feed","prices"]}"#
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Asks the server to start delivering events for a topic.
    Subscribe {
        /// The topic to subscribe to.
        topic: Topic,
    },

    /// Asks the server to stop delivering events for a topic.
    Unsubscribe {
        /// The topic to drop.
        topic: Topic,
    },

    /// Keeps the channel warm across idle periods.
    Ping,
}

impl ClientMessage {
    /// Returns the message's topic, if it carries one.
    #[inline]
    #[must_use]
    pub const fn topic(&self) -> Option<&Topic> {
        match self {
            Self::Subscribe { topic } | Self::Unsubscribe { topic } => Some(topic),
            Self::Ping => None,
        }
    }

    /// Serializes the message to its wire form.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a message from its wire form.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed JSON or an unknown `type`.
    pub fn decode(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

// ============================================================================
// ServerMessage
// ============================================================================

/// A message the publish/subscribe server sends back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Acknowledges a subscribe request.
    Subscribed {
        /// The acknowledged topic.
        topic: Topic,
    },

    /// Acknowledges an unsubscribe request.
    Unsubscribed {
        /// The dropped topic.
        topic: Topic,
    },

    /// An event published on a subscribed topic.
    Event {
        /// The topic the event was published on.
        topic: Topic,
        /// Arbitrary event payload.
        data: Value,
    },
}

impl ServerMessage {
    /// Returns the message's topic.
    #[inline]
    #[must_use]
    pub const fn topic(&self) -> &Topic {
        match self {
            Self::Subscribed { topic } | Self::Unsubscribed { topic } | Self::Event { topic, .. } => {
                topic
            }
        }
    }

    /// Serializes the message to its wire form.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a message from its wire form.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed JSON or an unknown `type`.
    pub fn decode(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_subscribe_wire_format() {
        let message = ClientMessage::Subscribe {
            topic: Topic::from("db/users"),
        };
        let value: Value = serde_json::from_str(&message.encode().unwrap()).unwrap();
        assert_eq!(value, json!({"type": "subscribe", "topic": ["db", "users"]}));
    }

    #[test]
    fn test_ping_wire_format() {
        assert_eq!(ClientMessage::Ping.encode().unwrap(), r#"{"type":"ping"}"#);
    }

    #[test]
    fn test_decode_unsubscribe() {
        let message =
            ClientMessage::decode(r#"{"type":"unsubscribe","topic":["feed","prices"]}"#).unwrap();
        assert_eq!(
            message,
            ClientMessage::Unsubscribe {
                topic: Topic::from("feed/prices"),
            }
        );
    }

    #[test]
    fn test_decode_event_with_payload() {
        let raw = r#"{"type":"event","topic":["feed","prices"],"data":{"bid":42.5}}"#;
        let message = ServerMessage::decode(raw).unwrap();

        let ServerMessage::Event { topic, data } = message else {
            panic!("expected event envelope");
        };
        assert_eq!(topic, Topic::from("feed/prices"));
        assert_eq!(data, json!({"bid": 42.5}));
    }

    #[test]
    fn test_decode_rejects_unknown_type() {
        let err = ServerMessage::decode(r#"{"type":"mystery","topic":[]}"#).unwrap_err();
        assert!(err.is_decode());
    }

    #[test]
    fn test_decode_rejects_malformed_json() {
        assert!(ClientMessage::decode("{not json").is_err());
    }

    #[test]
    fn test_server_message_topic_accessor() {
        let message = ServerMessage::Subscribed {
            topic: Topic::from("db/users"),
        };
        assert_eq!(message.topic(), &Topic::from("db/users"));
    }
}
