//! Close-code vocabulary for channel shutdown.
//!
//! Standard WebSocket close codes (RFC 6455 section 7.4) map to named
//! reasons; one synthetic code is reserved by this crate:
//!
//! | Code | Reason |
//! |------|--------|
//! | 1000 | [`CloseReason::Normal`] |
//! | 1001 | [`CloseReason::GoingAway`] |
//! | 1002 | [`CloseReason::ProtocolError`] |
//! | 1003 | [`CloseReason::UnsupportedData`] |
//! | 1005 | [`CloseReason::NoStatusRecvd`] |
//! | 1006 | [`CloseReason::Abnormal`] |
//! | 1007 | [`CloseReason::InvalidFramePayloadData`] |
//! | 1008 | [`CloseReason::PolicyViolation`] |
//! | 1009 | [`CloseReason::MessageTooBig`] |
//! | 1010 | [`CloseReason::MissingExtension`] |
//! | 1011 | [`CloseReason::InternalError`] |
//! | 1012 | [`CloseReason::ServiceRestart`] |
//! | 1013 | [`CloseReason::TryAgainLater`] |
//! | 1014 | [`CloseReason::BadGateway`] |
//! | 1015 | [`CloseReason::TlsHandshake`] |
//! | 4000 | [`CloseReason::TimedOutOnReconnect`] (synthetic) |
//!
//! Every other numeric value maps to [`CloseReason::Unknown`]. Code 1004 is
//! reserved by the RFC and intentionally has no name here.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

// ============================================================================
// Constants
// ============================================================================

/// Synthetic close code reported when the reconnect budget is exhausted.
///
/// Callers distinguish a timed-out reconnect from a genuine remote close
/// purely by this code.
pub const TIMED_OUT_ON_RECONNECT: u16 = 4000;

// ============================================================================
// CloseReason
// ============================================================================

/// Named interpretation of a numeric close code.
///
/// # Example
///
/// ```
/// use relink::CloseReason;
///
/// assert_eq!(CloseReason::from_code(1000), CloseReason::Normal);
/// assert_eq!(CloseReason::from_code(4000), CloseReason::TimedOutOnReconnect);
/// assert_eq!(CloseReason::from_code(3333), CloseReason::Unknown(3333));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseReason {
    /// 1000: purpose fulfilled, clean shutdown.
    Normal,
    /// 1001: endpoint going away (navigation, server shutdown).
    GoingAway,
    /// 1002: protocol error detected by the peer.
    ProtocolError,
    /// 1003: data type the endpoint cannot accept.
    UnsupportedData,
    /// 1005: no status code was present in the close frame.
    NoStatusRecvd,
    /// 1006: connection dropped without a close frame.
    Abnormal,
    /// 1007: frame payload inconsistent with its declared type.
    InvalidFramePayloadData,
    /// 1008: message violated endpoint policy.
    PolicyViolation,
    /// 1009: message too big to process.
    MessageTooBig,
    /// 1010: client expected an extension the server did not negotiate.
    MissingExtension,
    /// 1011: server hit an unexpected condition.
    InternalError,
    /// 1012: server restarting.
    ServiceRestart,
    /// 1013: temporary server condition, try again later.
    TryAgainLater,
    /// 1014: invalid response from an upstream gateway.
    BadGateway,
    /// 1015: TLS handshake failure.
    TlsHandshake,
    /// 4000: reconnect budget exhausted; synthesized locally, never sent by a
    /// peer.
    TimedOutOnReconnect,
    /// Any code without a named mapping, including reserved 1004.
    Unknown(u16),
}

impl CloseReason {
    /// Maps a numeric close code to its named reason.
    #[must_use]
    pub const fn from_code(code: u16) -> Self {
        match code {
            1000 => Self::Normal,
            1001 => Self::GoingAway,
            1002 => Self::ProtocolError,
            1003 => Self::UnsupportedData,
            1005 => Self::NoStatusRecvd,
            1006 => Self::Abnormal,
            1007 => Self::InvalidFramePayloadData,
            1008 => Self::PolicyViolation,
            1009 => Self::MessageTooBig,
            1010 => Self::MissingExtension,
            1011 => Self::InternalError,
            1012 => Self::ServiceRestart,
            1013 => Self::TryAgainLater,
            1014 => Self::BadGateway,
            1015 => Self::TlsHandshake,
            TIMED_OUT_ON_RECONNECT => Self::TimedOutOnReconnect,
            other => Self::Unknown(other),
        }
    }

    /// Returns the numeric close code for this reason.
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::Normal => 1000,
            Self::GoingAway => 1001,
            Self::ProtocolError => 1002,
            Self::UnsupportedData => 1003,
            Self::NoStatusRecvd => 1005,
            Self::Abnormal => 1006,
            Self::InvalidFramePayloadData => 1007,
            Self::PolicyViolation => 1008,
            Self::MessageTooBig => 1009,
            Self::MissingExtension => 1010,
            Self::InternalError => 1011,
            Self::ServiceRestart => 1012,
            Self::TryAgainLater => 1013,
            Self::BadGateway => 1014,
            Self::TlsHandshake => 1015,
            Self::TimedOutOnReconnect => TIMED_OUT_ON_RECONNECT,
            Self::Unknown(code) => code,
        }
    }

    /// Returns `true` for a clean, caller-intended closure.
    #[inline]
    #[must_use]
    pub const fn is_normal(self) -> bool {
        matches!(self, Self::Normal)
    }

    /// Returns `true` when the closure was synthesized by the reconnect
    /// give-up path.
    #[inline]
    #[must_use]
    pub const fn is_timed_out_on_reconnect(self) -> bool {
        matches!(self, Self::TimedOutOnReconnect)
    }
}

impl From<u16> for CloseReason {
    #[inline]
    fn from(code: u16) -> Self {
        Self::from_code(code)
    }
}

impl From<CloseReason> for u16 {
    #[inline]
    fn from(reason: CloseReason) -> Self {
        reason.code()
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => f.write_str("normal closure"),
            Self::GoingAway => f.write_str("going away"),
            Self::ProtocolError => f.write_str("protocol error"),
            Self::UnsupportedData => f.write_str("unsupported data"),
            Self::NoStatusRecvd => f.write_str("no status received"),
            Self::Abnormal => f.write_str("abnormal closure"),
            Self::InvalidFramePayloadData => f.write_str("invalid frame payload data"),
            Self::PolicyViolation => f.write_str("policy violation"),
            Self::MessageTooBig => f.write_str("message too big"),
            Self::MissingExtension => f.write_str("missing extension"),
            Self::InternalError => f.write_str("internal error"),
            Self::ServiceRestart => f.write_str("service restart"),
            Self::TryAgainLater => f.write_str("try again later"),
            Self::BadGateway => f.write_str("bad gateway"),
            Self::TlsHandshake => f.write_str("TLS handshake failure"),
            Self::TimedOutOnReconnect => f.write_str("timed out on reconnect"),
            Self::Unknown(code) => write!(f, "unknown closure ({code})"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_codes_round_trip() {
        let named = [
            CloseReason::Normal,
            CloseReason::GoingAway,
            CloseReason::ProtocolError,
            CloseReason::UnsupportedData,
            CloseReason::NoStatusRecvd,
            CloseReason::Abnormal,
            CloseReason::InvalidFramePayloadData,
            CloseReason::PolicyViolation,
            CloseReason::MessageTooBig,
            CloseReason::MissingExtension,
            CloseReason::InternalError,
            CloseReason::ServiceRestart,
            CloseReason::TryAgainLater,
            CloseReason::BadGateway,
            CloseReason::TlsHandshake,
            CloseReason::TimedOutOnReconnect,
        ];
        for reason in named {
            assert_eq!(CloseReason::from_code(reason.code()), reason);
        }
    }

    #[test]
    fn test_reserved_1004_is_unknown() {
        assert_eq!(CloseReason::from_code(1004), CloseReason::Unknown(1004));
        assert_eq!(CloseReason::Unknown(1004).code(), 1004);
    }

    #[test]
    fn test_synthetic_timeout_code() {
        assert_eq!(
            CloseReason::from_code(TIMED_OUT_ON_RECONNECT),
            CloseReason::TimedOutOnReconnect
        );
        assert!(CloseReason::TimedOutOnReconnect.is_timed_out_on_reconnect());
        assert!(!CloseReason::Normal.is_timed_out_on_reconnect());
    }

    #[test]
    fn test_is_normal() {
        assert!(CloseReason::Normal.is_normal());
        assert!(!CloseReason::Abnormal.is_normal());
    }

    #[test]
    fn test_display() {
        assert_eq!(CloseReason::Normal.to_string(), "normal closure");
        assert_eq!(CloseReason::Unknown(2999).to_string(), "unknown closure (2999)");
    }
}
