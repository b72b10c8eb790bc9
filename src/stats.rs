//! Statistics counters, read back through the `statistics` admin key.
//!
//! A flat counters struct where every field is an atomic updated in
//! place rather than a plain integer rebuilt under a lock.

use alloc::format;
use alloc::string::String;
use core::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Stats {
    pub reads: AtomicU64,
    pub writes: AtomicU64,
    pub flushes: AtomicU64,
    pub fua_requests: AtomicU64,
    pub discards: AtomicU64,
    /// Writes that failed because the device was stopped.
    pub write_failure: AtomicU64,
    /// Cache flush writes skipped because the device was stopped.
    pub flush_failure: AtomicU64,
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
    pub torn_selected: AtomicU64,
}

impl Stats {
    pub const fn new() -> Self {
        Self {
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
            fua_requests: AtomicU64::new(0),
            discards: AtomicU64::new(0),
            write_failure: AtomicU64::new(0),
            flush_failure: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            torn_selected: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            fua_requests: self.fua_requests.load(Ordering::Relaxed),
            discards: self.discards.load(Ordering::Relaxed),
            write_failure: self.write_failure.load(Ordering::Relaxed),
            flush_failure: self.flush_failure.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            torn_selected: self.torn_selected.load(Ordering::Relaxed),
        }
    }

    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// A point-in-time copy of `Stats`, returned by the `statistics` admin
/// operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub reads: u64,
    pub writes: u64,
    pub flushes: u64,
    pub fua_requests: u64,
    pub discards: u64,
    pub write_failure: u64,
    pub flush_failure: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub torn_selected: u64,
}

impl StatsSnapshot {
    /// Render as the multi-line text the `statistics` admin key returns.
    pub fn render(&self) -> String {
        format!(
            "reads {}\nwrites {}\nflushes {}\nfua {}\ndiscards {}\nwrite_failure {}\nflush_failure {}\ncache_hits {}\ncache_misses {}\ntorn_selected {}\n",
            self.reads,
            self.writes,
            self.flushes,
            self.fua_requests,
            self.discards,
            self.write_failure,
            self.flush_failure,
            self.cache_hits,
            self.cache_misses,
            self.torn_selected,
        )
    }
}
