//! Publish/subscribe layer on top of a relayed connection.
//!
//! Topics are ordered segment paths; subscriptions are declared as a desired
//! set and converged against the server by the [`Reconciler`]. The layer is
//! transport-agnostic: it only produces [`ClientMessage`]s for the caller to
//! send and consumes [`ServerMessage`]s the caller has decoded.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`topic`] | topic paths and `(namespace, name)` routing |
//! | [`message`] | wire envelopes in both directions |
//! | [`reconciler`] | desired-state subscription bookkeeping |

// ============================================================================
// Submodules
// ============================================================================

pub mod message;
pub mod reconciler;
pub mod topic;

// ============================================================================
// Re-exports
// ============================================================================

pub use message::{ClientMessage, ServerMessage};
pub use reconciler::{EventCallback, Reconciler, SubscriptionPhase};
pub use topic::Topic;
