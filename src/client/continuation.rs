//! Registry of pending delayed callbacks.
//!
//! Every `delay` command carries a [`ContinuationId`] minted here. When the
//! matching `delayed` notification arrives, the id is consumed and dispatch
//! follows the stored [`ContinuationPurpose`]. Ids are minted from a plain
//! incrementing counter; the registry lives inside the single-threaded client
//! so no atomics are involved.
//!
//! A fired or cancelled id is removed immediately, which makes stale
//! notifications (for example a reconnect timer that fires after its key was
//! closed) harmless no-ops.

// ============================================================================
// Imports
// ============================================================================

use rustc_hash::FxHashMap;

use crate::identifiers::{ContinuationId, SocketKey};

// ============================================================================
// Types
// ============================================================================

/// Why a delayed callback was scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContinuationPurpose {
    /// Re-open the key's connection after a backoff delay.
    RetryConnection,
    /// Send the next buffered message after the pacing delay.
    DrainQueue,
}

/// A pending delayed callback: the key it belongs to and what to do when it
/// fires.
#[derive(Debug, Clone)]
pub struct Continuation {
    /// Key the callback acts on.
    pub key: SocketKey,
    /// Dispatch target when the callback fires.
    pub purpose: ContinuationPurpose,
}

// ============================================================================
// ContinuationRegistry
// ============================================================================

/// Allocates and resolves continuation ids.
///
/// The owning client maintains the at-most-one-per-key invariant by
/// cancelling a key's previous id before allocating a new one.
#[derive(Debug)]
pub struct ContinuationRegistry {
    /// Next raw id to mint. Starts at 1 so id 0 never appears on the wire.
    next_id: u64,
    /// Outstanding continuations by id.
    pending: FxHashMap<ContinuationId, Continuation>,
}

impl Default for ContinuationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ContinuationRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: 1,
            pending: FxHashMap::default(),
        }
    }

    /// Mints a fresh id and records the continuation under it.
    pub fn allocate(&mut self, key: SocketKey, purpose: ContinuationPurpose) -> ContinuationId {
        let id = ContinuationId::new(self.next_id);
        self.next_id += 1;
        self.pending.insert(id, Continuation { key, purpose });
        id
    }

    /// Consumes a fired id, returning its continuation.
    ///
    /// Returns `None` for stale ids (already fired or cancelled).
    pub fn take(&mut self, id: ContinuationId) -> Option<Continuation> {
        self.pending.remove(&id)
    }

    /// Cancels a pending id. Returns `true` if it was still outstanding.
    pub fn cancel(&mut self, id: ContinuationId) -> bool {
        self.pending.remove(&id).is_some()
    }

    /// Looks up a pending id without consuming it.
    #[must_use]
    pub fn get(&self, id: ContinuationId) -> Option<&Continuation> {
        self.pending.get(&id)
    }

    /// Returns the number of outstanding continuations.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns `true` if nothing is outstanding.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
