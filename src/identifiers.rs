//! Identifier newtypes used across the crate.
//!
//! Two identifiers flow through the client:
//!
//! | Type | Backing | Purpose |
//! |------|---------|---------|
//! | [`SocketKey`] | `String` | caller-chosen name of one logical connection |
//! | [`ContinuationId`] | `u64` | correlation handle for a scheduled callback |
//!
//! Both serialize transparently (a key as a JSON string, an id as a JSON
//! number) so they can appear directly in wire envelopes.

// ============================================================================
// Imports
// ============================================================================

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// SocketKey
// ============================================================================

/// Caller-chosen string identifying one logical connection.
///
/// Keys are opaque to the client; by convention callers often use the
/// connection URL itself. Two operations on the same key always address the
/// same connection entry.
///
/// # Example
///
/// ```
/// use relink::SocketKey;
///
/// let key = SocketKey::new("wss://example.com/events");
/// assert_eq!(key.as_str(), "wss://example.com/events");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SocketKey(String);

impl SocketKey {
    /// Creates a key from anything string-like.
    #[inline]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the key, returning the underlying string.
    #[inline]
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SocketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SocketKey {
    #[inline]
    fn from(key: &str) -> Self {
        Self(key.to_owned())
    }
}

impl From<String> for SocketKey {
    #[inline]
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl AsRef<str> for SocketKey {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// Allows map lookups by `&str` without allocating a key.
impl Borrow<str> for SocketKey {
    #[inline]
    fn borrow(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// ContinuationId
// ============================================================================

/// Correlation handle for a pending delayed callback.
///
/// Minted from a monotonically increasing counter owned by the client; an id
/// is never reused within one client instance. A fired or cancelled id becomes
/// stale, and stale ids are ignored when they surface later.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct ContinuationId(u64);

impl ContinuationId {
    /// Creates an id from a raw counter value.
    #[inline]
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw counter value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContinuationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_key_round_trips_str() {
        let key = SocketKey::new("wss://example.com/socket");
        assert_eq!(key.as_str(), "wss://example.com/socket");
        assert_eq!(key.to_string(), "wss://example.com/socket");
        assert_eq!(key.clone().into_string(), "wss://example.com/socket");
    }

    #[test]
    fn test_socket_key_from_conversions() {
        let a = SocketKey::from("k");
        let b = SocketKey::from(String::from("k"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_socket_key_serializes_transparently() {
        let key = SocketKey::new("a");
        let json = serde_json::to_string(&key).expect("serialize");
        assert_eq!(json, r#""a""#);

        let back: SocketKey = serde_json::from_str(r#""a""#).expect("deserialize");
        assert_eq!(back, key);
    }

    #[test]
    fn test_continuation_id_ordering_follows_counter() {
        let first = ContinuationId::new(1);
        let second = ContinuationId::new(2);
        assert!(first < second);
        assert_eq!(second.as_u64(), 2);
    }

    #[test]
    fn test_continuation_id_serializes_as_number() {
        let id = ContinuationId::new(42);
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, "42");

        let back: ContinuationId = serde_json::from_str("42").expect("deserialize");
        assert_eq!(back, id);
    }
}
