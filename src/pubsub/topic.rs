//! Topic paths for the publish/subscribe layer.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// Topic
// ============================================================================

/// Ordered path segments identifying a publish/subscribe channel.
///
/// Topics travel on the wire as JSON arrays (`["db", "users", "42"]`) and
/// display as slash-joined paths (`db/users/42`). The first two segments are
/// interpreted as `(namespace, name)` when routing an event to a typed
/// handler.
///
/// # Example
///
/// ```
/// use relink::pubsub::Topic;
///
/// let topic = Topic::from("db/users/42");
/// assert_eq!(topic.route().unwrap(), ("db", "users"));
/// assert_eq!(topic.to_string(), "db/users/42");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(Vec<String>);

impl Topic {
    /// Creates a topic from its segments.
    pub fn new<S: Into<String>>(segments: impl IntoIterator<Item = S>) -> Self {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Returns the topic's segments in order.
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Returns the number of segments.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the topic has no segments.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Splits the topic into its `(namespace, name)` routing pair.
    ///
    /// # Errors
    ///
    /// [`Error::Decode`] if the topic has fewer than two segments.
    pub fn route(&self) -> Result<(&str, &str)> {
        match self.0.as_slice() {
            [namespace, name, ..] => Ok((namespace.as_str(), name.as_str())),
            _ => Err(Error::decode(format!(
                "topic `{self}` has {} segment(s), routing needs namespace and name",
                self.0.len()
            ))),
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

impl From<&str> for Topic {
    /// Parses a slash-joined path into segments.
    fn from(path: &str) -> Self {
        Self(path.split('/').map(str::to_string).collect())
    }
}

impl From<Vec<String>> for Topic {
    fn from(segments: Vec<String>) -> Self {
        Self(segments)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_joins_segments() {
        let topic = Topic::new(["db", "users", "42"]);
        assert_eq!(topic.to_string(), "db/users/42");
    }

    #[test]
    fn test_from_path_splits_segments() {
        let topic = Topic::from("feed/prices");
        assert_eq!(topic.segments(), ["feed", "prices"]);
    }

    #[test]
    fn test_route_returns_namespace_and_name() {
        let topic = Topic::new(["feed", "prices", "BTC-USD"]);
        assert_eq!(topic.route().unwrap(), ("feed", "prices"));
    }

    #[test]
    fn test_route_rejects_short_topics() {
        let err = Topic::new(["lonely"]).route().unwrap_err();
        assert!(err.is_decode());
    }

    #[test]
    fn test_serializes_as_array() {
        let topic = Topic::new(["db", "users"]);
        let json = serde_json::to_value(&topic).unwrap();
        assert_eq!(json, serde_json::json!(["db", "users"]));

        let back: Topic = serde_json::from_value(json).unwrap();
        assert_eq!(back, topic);
    }
}
