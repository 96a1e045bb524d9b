//! Connection lifecycle management.
//!
//! The heart of the crate: a sans-IO state machine that multiplexes any
//! number of logical connections, reconnects with exponential backoff, and
//! buffers outbound messages across the gap.
//!
//! # Architecture
//!
//! ```text
//!           open / send / close                commands (open/send/close/delay)
//! ┌────────┐ ─────────────────► ┌──────────────┐ ─────────────────► ┌───────────┐
//! │ caller │                    │ SocketClient │                    │ transport │
//! └────────┘ ◄───────────────── └──────────────┘ ◄───────────────── └───────────┘
//!           events (SocketEvent)              notifications
//! ```
//!
//! Every operation and notification returns the full list of [`Effect`]s it
//! produced. The caller decides how commands reach a transport; the runtime
//! in [`crate::transport`] is one such caller.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`core`] | the [`SocketClient`] reducer |
//! | [`backoff`] | reconnect pacing schedule and limits |
//! | [`continuation`] | delayed-callback bookkeeping |
//! | [`effect`] | reducer output types |
//! | [`entry`] | per-key connection state |
//! | [`queue`] | per-key FIFO send buffers |

// ============================================================================
// Submodules
// ============================================================================

pub mod backoff;
pub mod continuation;
pub mod core;
pub mod effect;
pub mod entry;
pub mod queue;

// ============================================================================
// Re-exports
// ============================================================================

pub use self::core::SocketClient;
pub use backoff::{BACKOFF_BASE_MS, DRAIN_PACING_MS, MAX_RECONNECT_ATTEMPTS, backoff_millis};
pub use continuation::{Continuation, ContinuationPurpose, ContinuationRegistry};
pub use effect::{Effect, SocketEvent};
pub use entry::{ConnectionEntry, Phase};
pub use queue::OutputQueues;
