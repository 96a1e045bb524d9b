//! Reconnect backoff schedule and pacing constants.
//!
//! Unexpected closes trigger reconnect attempts with exponentially growing
//! delays: attempt `n` waits `10 * 2^n` milliseconds, so attempt 1 retries
//! after 20 ms and attempt 10 (the last one) after 10 240 ms. The budget is
//! capped by [`MAX_RECONNECT_ATTEMPTS`]; exceeding it reports a closure with
//! the synthetic 4000 code instead of scheduling again.

// ============================================================================
// Constants
// ============================================================================

/// Maximum number of consecutive reconnect attempts before giving up.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 10;

/// Base delay multiplier for the backoff schedule, in milliseconds.
pub const BACKOFF_BASE_MS: u64 = 10;

/// Pacing delay between two drained queue messages, in milliseconds.
///
/// Deliberately slower than wire speed: a freshly reopened connection gets
/// one buffered message per tick, in strict FIFO order.
pub const DRAIN_PACING_MS: u64 = 20;

// ============================================================================
// Schedule
// ============================================================================

/// Returns the reconnect delay for the given attempt number.
///
/// `attempt` is 1-based when scheduling (the first retry is attempt 1) and is
/// never taken past [`MAX_RECONNECT_ATTEMPTS`], where give-up applies instead.
///
/// # Example
///
/// ```
/// use relink::client::backoff_millis;
///
/// assert_eq!(backoff_millis(1), 20);
/// assert_eq!(backoff_millis(10), 10_240);
/// ```
#[inline]
#[must_use]
pub const fn backoff_millis(attempt: u32) -> u64 {
    BACKOFF_BASE_MS * (1u64 << attempt)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_first_retry_is_twenty_millis() {
        assert_eq!(backoff_millis(1), 20);
    }

    #[test]
    fn test_last_retry_is_about_ten_seconds() {
        assert_eq!(backoff_millis(MAX_RECONNECT_ATTEMPTS), 10_240);
    }

    proptest! {
        #[test]
        fn prop_schedule_doubles_per_attempt(attempt in 0u32..=MAX_RECONNECT_ATTEMPTS) {
            prop_assert_eq!(backoff_millis(attempt), 10 * 2u64.pow(attempt));
        }

        #[test]
        fn prop_schedule_is_strictly_increasing(attempt in 1u32..=MAX_RECONNECT_ATTEMPTS) {
            prop_assert!(backoff_millis(attempt) > backoff_millis(attempt - 1));
        }
    }
}
