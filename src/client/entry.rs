//! Per-key connection state.
//!
//! One [`ConnectionEntry`] exists per active or pending key. Entries are
//! created on `open`/`keep_alive` and removed on final close (normal or
//! after give-up), together with the key's queue and pending continuation.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use crate::identifiers::ContinuationId;

// ============================================================================
// Phase
// ============================================================================

/// Lifecycle phase of one logical connection.
///
/// ```text
/// Idle ──open──► Connecting ──connected──► Connected ──close──► Closing
///   ▲                                          │
///   └────────── retry scheduled ◄──────────────┘  (unexpected close)
/// ```
///
/// An unknown key is implicitly `Idle`. `Closing` ends with entry removal
/// when the close confirmation arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// No connection activity; also the parking state during a backoff wait.
    Idle,
    /// Open issued, waiting for the transport to report `connected`.
    Connecting,
    /// Channel is up; sends go straight to the transport.
    Connected,
    /// Close issued, waiting for the transport to confirm.
    Closing,
}

impl Phase {
    /// Returns `true` when the channel is usable for direct sends.
    #[inline]
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Connecting => f.write_str("connecting"),
            Self::Connected => f.write_str("connected"),
            Self::Closing => f.write_str("closing"),
        }
    }
}

// ============================================================================
// ConnectionEntry
// ============================================================================

/// Mutable record tracking one logical connection.
#[derive(Debug, Clone)]
pub struct ConnectionEntry {
    /// Current lifecycle phase.
    pub phase: Phase,
    /// Endpoint URL, retained across reconnects.
    pub url: String,
    /// Consecutive unexpected-close retry count; reset on every successful
    /// connect.
    pub backoff_attempt: u32,
    /// The key's outstanding scheduled callback, at most one.
    pub pending_continuation: Option<ContinuationId>,
    /// Suppress delivery of received messages (control-traffic connections).
    pub keep_alive: bool,
    /// Last transport-reported buffered byte count.
    pub buffered_bytes: u64,
}

impl ConnectionEntry {
    /// Creates an idle entry for the given endpoint.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            phase: Phase::Idle,
            url: url.into(),
            backoff_attempt: 0,
            pending_continuation: None,
            keep_alive: false,
            buffered_bytes: 0,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
