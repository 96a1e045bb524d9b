//! Port message codec.
//!
//! This module defines the envelope protocol spoken between the client core
//! and whatever transport drives it. The core emits [`Command`] values and
//! consumes [`Notification`] values; both serialize to small JSON envelopes
//! with a `method` discriminant and a `params` payload.
//!
//! # Protocol Overview
//!
//! | Message | Direction | Purpose |
//! |---------|-----------|---------|
//! | `Command` | core → transport | open/send/close a channel, schedule a delay |
//! | `Notification` | transport → core | lifecycle, messages, fired delays, errors |
//!
//! Close codes reported by `closed` notifications are interpreted through
//! [`CloseReason`], which names the standard 1000–1015 range and the synthetic
//! 4000 reconnect-timeout code.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `close_code` | Close-code vocabulary |
//! | `command` | Core-to-transport commands |
//! | `notification` | Transport-to-core notifications |

// ============================================================================
// Submodules
// ============================================================================

/// Close-code vocabulary.
pub mod close_code;

/// Core-to-transport command envelopes.
pub mod command;

/// Transport-to-core notification envelopes.
pub mod notification;

// ============================================================================
// Re-exports
// ============================================================================

pub use close_code::{CloseReason, TIMED_OUT_ON_RECONNECT};
pub use command::Command;
pub use notification::Notification;
