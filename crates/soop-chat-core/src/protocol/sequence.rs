//! Sequence counter for accepted chat events.
//!
//! # What is a sequence index? (for beginners)
//!
//! Every event accepted by the [`crate::retention::EventStore`] is stamped
//! with a monotonically increasing integer.  Hosts use it as a stable key when
//! rendering (two chat lines with identical text are still distinct events)
//! and to tell which events arrived after a snapshot was taken.
//!
//! # Wraparound
//!
//! Indices are kept inside the range a JavaScript host can represent exactly
//! (`2^53 - 1`, "safe integer").  After handing out [`MAX_SAFE_INDEX`] the
//! counter restarts at 0 instead of growing past it.

use std::sync::atomic::{AtomicU64, Ordering};

/// Largest index handed out before the counter wraps to 0 (`2^53 - 1`).
pub const MAX_SAFE_INDEX: u64 = (1 << 53) - 1;

/// A monotonically increasing counter that wraps after [`MAX_SAFE_INDEX`].
///
/// # Examples
///
/// ```rust
/// use soop_chat_core::protocol::SequenceCounter;
///
/// let counter = SequenceCounter::new();
/// assert_eq!(counter.next(), 0);
/// assert_eq!(counter.next(), 1);
/// ```
#[derive(Debug)]
pub struct SequenceCounter {
    inner: AtomicU64,
}

impl SequenceCounter {
    /// Creates a new counter starting at 0.
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Creates a counter whose next index is `start` (clamped into range).
    pub fn starting_at(start: u64) -> Self {
        Self {
            inner: AtomicU64::new(if start > MAX_SAFE_INDEX { 0 } else { start }),
        }
    }

    /// Returns the next index and advances the counter.
    ///
    /// `Ordering::Relaxed` is sufficient: the index orders events, it does not
    /// publish any other memory.
    pub fn next(&self) -> u64 {
        // The closure never returns `None`, so `fetch_update` cannot fail;
        // both arms carry the previous value.
        match self
            .inner
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                Some(if current >= MAX_SAFE_INDEX { 0 } else { current + 1 })
            }) {
            Ok(previous) | Err(previous) => previous,
        }
    }

    /// Returns the index the next call to [`next`](Self::next) will hand out.
    pub fn current(&self) -> u64 {
        self.inner.load(Ordering::Relaxed)
    }
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_counter_starts_at_zero() {
        let counter = SequenceCounter::new();
        assert_eq!(counter.next(), 0);
    }

    #[test]
    fn test_sequence_counter_increments_monotonically() {
        // Arrange
        let counter = SequenceCounter::new();

        // Act
        let values: Vec<u64> = (0..100).map(|_| counter.next()).collect();

        // Assert
        for window in values.windows(2) {
            assert!(window[1] > window[0], "values must be strictly increasing");
        }
    }

    #[test]
    fn test_sequence_counter_wraps_after_max_safe_index() {
        // Arrange – one step before the ceiling
        let counter = SequenceCounter::starting_at(MAX_SAFE_INDEX - 1);

        // Act
        let below = counter.next();
        let ceiling = counter.next();
        let wrapped = counter.next();

        // Assert
        assert_eq!(below, MAX_SAFE_INDEX - 1);
        assert_eq!(ceiling, MAX_SAFE_INDEX);
        assert_eq!(wrapped, 0, "counter must wrap to 0 after the safe-integer ceiling");
    }

    #[test]
    fn test_starting_past_ceiling_is_clamped_to_zero() {
        let counter = SequenceCounter::starting_at(u64::MAX);
        assert_eq!(counter.next(), 0);
    }

    #[test]
    fn test_current_does_not_increment() {
        let counter = SequenceCounter::new();
        counter.next();
        assert_eq!(counter.current(), 1);
        assert_eq!(counter.next(), 1);
    }
}
