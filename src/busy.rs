//! Busy Tracker: a single atomic counter.
//!
//! Incremented on entry to the dispatcher (only when caching is
//! enabled) and on every Empty->(Copying->Dirty) transition. Decremented
//! on dispatcher exit and on every Writing->Empty transition. The
//! counter is never read for decisions other than "became zero just
//! now"; it is not a load indicator.

#[cfg(not(loom))]
use core::sync::atomic::{AtomicI64, Ordering};
#[cfg(loom)]
use loom::sync::atomic::{AtomicI64, Ordering};

/// Signed so a debug-build invariant check can assert non-negativity
/// explicitly instead of silently wrapping.
#[derive(Debug)]
pub struct BusyTracker {
    count: AtomicI64,
}

impl Default for BusyTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether a decrement observed the counter crossing down to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossedToZero(pub bool);

impl BusyTracker {
    #[cfg(not(loom))]
    pub const fn new() -> Self {
        Self {
            count: AtomicI64::new(0),
        }
    }

    #[cfg(loom)]
    pub fn new() -> Self {
        Self {
            count: AtomicI64::new(0),
        }
    }

    pub fn increment(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    /// Decrement, returning whether this decrement is the one that took
    /// the counter from 1 to 0. Only one concurrent decrementer can ever
    /// observe this for a given zero-crossing, which is what lets the
    /// flush coordinator treat it as a single synchronization point.
    pub fn decrement(&self) -> CrossedToZero {
        let previous = self.count.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "busy_count underflow");
        CrossedToZero(previous == 1)
    }

    /// Current value, for the `state` admin key's snapshot. Never read
    /// to make a decision — display/diagnostics only.
    pub fn load(&self) -> i64 {
        self.count.load(Ordering::Acquire)
    }

    #[cfg(test)]
    pub fn get(&self) -> i64 {
        self.load()
    }
}
