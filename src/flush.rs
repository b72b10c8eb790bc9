//! Flush Coordinator: serializes barrier requests and gates non-barrier
//! traffic during a flush.
//!
//! `flushing` is a plain `AtomicBool` rather than a field behind
//! `queues`'s lock: the cooperative check a Copying→Dirty transition
//! performs (`dispatcher::cooperative_flush_check`) must be able to read
//! it without taking `flush_lock`.
//!
//! Every access to `flushing` uses `SeqCst`, not an Acquire/Release pair.
//! The cooperative reader and a concurrent sweep's per-slot lock check
//! are two independent synchronization objects (this flag, that slot's
//! own mutex) — Acquire/Release only orders accesses to the same
//! location plus whatever happens-before it carries, it does not rule
//! out the classic store-then-load reordering between two unrelated
//! objects (the Dekker's-algorithm hazard). `SeqCst` puts every access
//! to `flushing` into one global total order, which is what actually
//! guarantees the reader and the sweep can't both observe a stale value
//! and both skip the same dirty slot.

use alloc::boxed::Box;
use alloc::collections::VecDeque;
#[cfg(not(loom))]
use core::sync::atomic::{AtomicBool, Ordering};
#[cfg(loom)]
use loom::sync::atomic::{AtomicBool, Ordering};

use crate::device::Completion;
use crate::request::Request;
use crate::sync::IrqSafeMutex;

type PendingItem = (Request, Box<dyn Completion>);

#[derive(Default)]
struct Queues {
    pending_flushes: VecDeque<PendingItem>,
    flush_gated: VecDeque<PendingItem>,
}

pub struct FlushCoordinator {
    flushing: AtomicBool,
    queues: IrqSafeMutex<Queues>,
}

impl FlushCoordinator {
    pub fn new() -> Self {
        Self {
            flushing: AtomicBool::new(false),
            queues: IrqSafeMutex::new(Queues::default()),
        }
    }

    /// Cooperative read used outside `flush_lock` — `SeqCst` so this
    /// can't race a concurrent sweep's own slot-lock check into both
    /// sides missing the same write-back (see the module doc comment).
    pub fn is_flushing(&self) -> bool {
        self.flushing.load(Ordering::SeqCst)
    }

    /// A FLUSH arrived: enqueue it onto `pending_flushes`. Returns
    /// whether this is the first flush (`flushing` was false), in which
    /// case the caller must sweep every slot for write-back.
    pub fn on_arrival(&self, request: Request, completion: Box<dyn Completion>) -> bool {
        let mut queues = self.queues.lock();
        let first = !self.flushing.load(Ordering::SeqCst);
        queues.pending_flushes.push_back((request, completion));
        if first {
            self.flushing.store(true, Ordering::SeqCst);
        }
        first
    }

    /// A non-FLUSH request arrived while `flushing` is true: park it.
    pub fn gate(&self, request: Request, completion: Box<dyn Completion>) {
        self.queues.lock().flush_gated.push_back((request, completion));
    }

    /// Called whenever `busy_count` crosses down to zero. If a flush was
    /// in progress, clears `flushing` and returns the drained
    /// `pending_flushes`/`flush_gated` lists for the worker context to
    /// process; otherwise this zero-crossing had nothing to do with a
    /// flush and `None` is returned.
    pub fn try_complete(&self) -> Option<(VecDeque<PendingItem>, VecDeque<PendingItem>)> {
        let mut queues = self.queues.lock();
        if !self.flushing.load(Ordering::SeqCst) {
            return None;
        }
        self.flushing.store(false, Ordering::SeqCst);
        let completed = core::mem::take(&mut queues.pending_flushes);
        let gated = core::mem::take(&mut queues.flush_gated);
        Some((completed, gated))
    }
}

impl Default for FlushCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
