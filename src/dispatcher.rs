//! Request Dispatcher: top-level routing of an incoming request through
//! the accounting, stopped-device, flush, and slot-lookup checks, down
//! to a final forward-or-consume decision.
//!
//! `dispatch` is a free function rather than a `Dory` method so the
//! slot-state-machine and flush-completion plumbing it needs
//! (`service_slot`, `writeback_slot`, `cooperative_flush_check`,
//! `resolve_flush_completion`) stay grouped in this module instead of
//! spreading across `lib.rs`.

use alloc::boxed::Box;
use alloc::collections::VecDeque;

use crate::busy::CrossedToZero;
use crate::device::Completion;
use crate::request::{is_full_block, Request, StatusCode};
use crate::slot::{CacheSlot, Decision, Waiter};
use crate::stats::Stats;
use crate::Dory;

/// What `dispatch` decided for one request.
pub enum DispatchOutcome {
    /// The caller must submit this request, unchanged, to the backing
    /// device and then deliver `completion` itself.
    Forwarded(Request, Box<dyn Completion>),
    /// The dispatcher has taken responsibility for `completion`, now or
    /// later. Carries any waiters this call unblocked on other slots,
    /// which the caller must drain iteratively rather than recursing
    /// back into the completion/submit path.
    Consumed(VecDeque<Waiter>),
}

enum SlotOutcome {
    Forwarded(Request, Box<dyn Completion>),
    Consumed,
}

/// Route one request: accounting, stopped-device check, flush handling,
/// slot lookup, and the final forward/consume decision.
pub fn dispatch(device: &Dory, request: Request, completion: Box<dyn Completion>) -> DispatchOutcome {
    // Step 1: accounting. Sector remapping is the identity here — this
    // crate has no partition table.
    bump_request_counters(device.stats(), &request);

    // Step 2: stopped devices fail writes immediately. A FLUSH has
    // `length_bytes == 0` and is not itself a "write" for this check —
    // it follows the flush path below, which fails it there instead if
    // warranted.
    if request.is_write() && !request.is_flush() && device.mode().is_stopped() {
        Stats::bump(&device.stats().write_failure);
        let status = StatusCode(device.mode().io_error_code());
        completion.complete(request, status);
        return DispatchOutcome::Consumed(VecDeque::new());
    }

    // Step 3: caching disabled.
    if !device.config().caching_enabled() {
        return DispatchOutcome::Forwarded(request, completion);
    }

    // Step 4.
    device.busy().increment();

    let mut ready: VecDeque<Waiter> = VecDeque::new();

    // Step 5.
    if request.is_flush() {
        Stats::bump(&device.stats().flushes);
        let first = device.flush().on_arrival(request, completion);
        if first {
            for slot in device.array().iter() {
                let (waiters, crossed) = writeback_slot(device, slot);
                ready.extend(waiters);
                if crossed.0 {
                    resolve_flush_completion(device);
                }
            }
        }
        let crossed = device.busy().decrement();
        if crossed.0 {
            resolve_flush_completion(device);
        }
        return DispatchOutcome::Consumed(ready);
    }

    if device.flush().is_flushing() {
        device.flush().gate(request, completion);
        let crossed = device.busy().decrement();
        if crossed.0 {
            resolve_flush_completion(device);
        }
        return DispatchOutcome::Consumed(ready);
    }

    // Step 6.
    let block_number = device.config().block_number_of(request.sector());
    let slot = device.array().slot_for(block_number);
    let slot_outcome = service_slot(device, slot, block_number, request, completion, &mut ready);

    // Step 7.
    let crossed = device.busy().decrement();
    if crossed.0 {
        resolve_flush_completion(device);
    }

    // Step 8.
    match slot_outcome {
        SlotOutcome::Forwarded(request, completion) => DispatchOutcome::Forwarded(request, completion),
        SlotOutcome::Consumed => DispatchOutcome::Consumed(ready),
    }
}

fn bump_request_counters(stats: &Stats, request: &Request) {
    if request.is_flush() {
        return;
    }
    if request.is_write() {
        Stats::bump(&stats.writes);
    } else {
        Stats::bump(&stats.reads);
    }
    if request.is_fua() {
        Stats::bump(&stats.fua_requests);
    }
    if request.is_discard() {
        Stats::bump(&stats.discards);
    }
}

/// Drive the slot state machine for a lookup hit or miss at
/// `slot_for(block_number)`. The resident-block/state read and the
/// action it warrants are decided by `CacheSlot::lookup` under a single
/// lock acquisition (spec step 6: "acquire slot lock; invoke slot state
/// machine; release slot lock", not a snapshot followed by a
/// separately-locked act) — everything below just reacts to whichever
/// `Decision` came back.
fn service_slot(
    device: &Dory,
    slot: &CacheSlot,
    block_number: u64,
    request: Request,
    completion: Box<dyn Completion>,
    ready: &mut VecDeque<Waiter>,
) -> SlotOutcome {
    let block_size = device.config().block_size();
    let full_block = is_full_block(&request, block_size);
    let fua = request.is_fua();
    let discard = request.is_discard();
    let want_cache =
        request.is_write() && full_block && !fua && !discard && device.torn().should_cache(block_number);

    match slot.lookup(block_number, full_block, fua, discard, want_cache, request, completion) {
        Decision::Miss(request, completion) => {
            // Invariant 1: a slot cached for block B ignores traffic to
            // B' != B (or an Empty slot not selected for caching).
            Stats::bump(&device.stats().cache_misses);
            SlotOutcome::Forwarded(request, completion)
        }
        Decision::Parked { flush_needed } => {
            Stats::bump(&device.stats().cache_hits);
            if flush_needed {
                let (waiters, crossed) = writeback_slot(device, slot);
                ready.extend(waiters);
                if crossed.0 {
                    resolve_flush_completion(device);
                }
            }
            SlotOutcome::Consumed
        }
        Decision::DroppedWithoutFlush(request, completion, waiters) => {
            Stats::bump(&device.stats().cache_hits);
            ready.extend(waiters);
            let crossed = device.busy().decrement();
            if crossed.0 {
                resolve_flush_completion(device);
            }
            SlotOutcome::Forwarded(request, completion)
        }
        Decision::BeginServiceHit(request, completion) => {
            Stats::bump(&device.stats().cache_hits);
            let (serviced, waiters) = slot.finish_service_hit(request, block_size);
            ready.extend(waiters);
            let (coop_waiters, coop_crossed) = cooperative_flush_check(device, slot);
            ready.extend(coop_waiters);
            completion.complete(serviced, StatusCode::SUCCESS);
            if coop_crossed.0 {
                resolve_flush_completion(device);
            }
            SlotOutcome::Consumed
        }
        Decision::BeginCache(request, completion) => {
            device.busy().increment();
            Stats::bump(&device.stats().torn_selected);
            let waiters = slot.finish_cache(request.payload());
            ready.extend(waiters);
            let (coop_waiters, coop_crossed) = cooperative_flush_check(device, slot);
            ready.extend(coop_waiters);
            completion.complete(request, StatusCode::SUCCESS);
            if coop_crossed.0 {
                resolve_flush_completion(device);
            }
            SlotOutcome::Consumed
        }
    }
}

/// When a Copying->Dirty transition completes while a flush is in
/// progress, the slot is immediately transitioned Dirty->Writing rather
/// than left to wait for the next flush sweep. Implemented here, right
/// after `service_slot` drives a slot through Copying->Dirty, rather
/// than inside `slot.rs` itself — a concurrent flush sweep may also
/// observe the slot `Dirty` and attempt the same write-back, but
/// `CacheSlot::begin_writeback`'s check-then-set under the slot lock
/// makes a second attempt a no-op, so this avoids slot.rs needing a
/// back-reference to the flush coordinator.
fn cooperative_flush_check(device: &Dory, slot: &CacheSlot) -> (VecDeque<Waiter>, CrossedToZero) {
    if device.flush().is_flushing() {
        writeback_slot(device, slot)
    } else {
        (VecDeque::new(), CrossedToZero(false))
    }
}

/// Write a slot back (or, if `stopped`, fail it) and decrement
/// `busy_count` for the slot's own contribution. Returns `(waiters,
/// crossed_to_zero)`; a no-op (`slot` was not `Dirty`) returns an empty
/// waiter list and `false`.
pub(crate) fn writeback_slot(device: &Dory, slot: &CacheSlot) -> (VecDeque<Waiter>, CrossedToZero) {
    let Some(write_request) = slot.begin_writeback() else {
        return (VecDeque::new(), CrossedToZero(false));
    };
    if device.mode().is_stopped() {
        Stats::bump(&device.stats().write_failure);
    } else {
        let sector = device.config().block_to_sector(write_request.block_number());
        if device.backing().write(sector, write_request.buffer()).is_err() {
            Stats::bump(&device.stats().write_failure);
        }
    }
    let waiters = slot.finish_writeback(write_request);
    let crossed = device.busy().decrement();
    (waiters, crossed)
}

/// A decrement just crossed `busy_count` to zero: ask the flush
/// coordinator whether a flush was waiting on it, and if so hand its
/// drained lists to the worker context.
pub(crate) fn resolve_flush_completion(device: &Dory) {
    if let Some((completed, gated)) = device.flush().try_complete() {
        device.worker().schedule(device, completed, gated);
    }
}
