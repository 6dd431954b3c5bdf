//! Thread-safe allocator for per-session command ids.
//!
//! Every request frame carries a command id that is unique within its
//! session. The receive loop uses the id to match a Reply to the pending
//! command that caused it, so replies may arrive in any order, and a reply
//! that arrives after its command timed out can be recognized and discarded.
//!
//! The allocator uses an `AtomicU64`, so the submit path and any compound
//! input task can both allocate ids without a lock.

use std::sync::atomic::{AtomicU64, Ordering};

/// A thread-safe, monotonically increasing allocator for command ids.
///
/// Ids start at 0 and increment by 1 with each call to [`next`]. The counter
/// wraps around at `u64::MAX` back to 0 without panicking; a session would
/// need to stay connected through 2^64 commands for two ids to collide.
///
/// # Examples
///
/// ```rust
/// use codriver_core::protocol::CommandIdAllocator;
///
/// let ids = CommandIdAllocator::new();
/// assert_eq!(ids.next(), 0);
/// assert_eq!(ids.next(), 1);
/// ```
///
/// [`next`]: CommandIdAllocator::next
#[derive(Debug, Default)]
pub struct CommandIdAllocator {
    inner: AtomicU64,
}

impl CommandIdAllocator {
    /// Creates a new allocator starting at 0.
    pub fn new() -> Self {
        Self {
            inner: AtomicU64::new(0),
        }
    }

    /// Returns the next command id and atomically increments the counter.
    ///
    /// `Ordering::Relaxed` is sufficient: the id is only a correlation key,
    /// not a memory-synchronization point.
    pub fn next(&self) -> u64 {
        self.inner.fetch_add(1, Ordering::Relaxed)
    }

    /// Returns the current value without incrementing, for diagnostics.
    pub fn current(&self) -> u64 {
        self.inner.load(Ordering::Relaxed)
    }
}
