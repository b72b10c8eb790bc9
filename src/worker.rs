//! Worker context: a single-consumer task draining the completed-flush
//! and gated-work queues, both held behind one `work_lock`.
//!
//! The scheduling primitive that would run this on its own thread (a
//! kernel workqueue, an executor task) is out of scope here — this
//! crate supplies the coalescing/single-consumer *protocol* and drains
//! synchronously on the thread that triggers it. A caller embedding this
//! crate in a real scheduler can trivially move the `drain` call onto
//! its own workqueue without touching the protocol.

use alloc::boxed::Box;
use alloc::collections::VecDeque;
use core::sync::atomic::{AtomicBool, Ordering};

use crate::device::Completion;
use crate::dispatcher::{self, DispatchOutcome};
use crate::request::{Request, StatusCode};
use crate::stats::Stats;
use crate::sync::IrqSafeMutex;
use crate::Dory;

type PendingItem = (Request, Box<dyn Completion>);

/// Both deferred queues behind one `work_lock` — a completed flush and a
/// gated request are never enqueued/dequeued independently of each
/// other, so they share a single critical section rather than two.
#[derive(Default)]
struct Queues {
    completed_flushes: VecDeque<PendingItem>,
    work: VecDeque<PendingItem>,
}

enum Item {
    Flush(PendingItem),
    Work(PendingItem),
}

pub struct Worker {
    /// Guards against two drains running concurrently; a `schedule`
    /// call that finds this already `true` trusts the in-progress drain
    /// to pick up the items it just pushed, so new items join the
    /// existing run instead of spawning a second one.
    running: AtomicBool,
    queues: IrqSafeMutex<Queues>,
}

impl Worker {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            queues: IrqSafeMutex::new(Queues::default()),
        }
    }

    /// Hand a flush's drained `pending_flushes`/`flush_gated` lists to
    /// the worker context and drain them.
    pub fn schedule(&self, device: &Dory, completed_flushes: VecDeque<PendingItem>, gated: VecDeque<PendingItem>) {
        {
            let mut queues = self.queues.lock();
            queues.completed_flushes.extend(completed_flushes);
            queues.work.extend(gated);
        }
        self.drain(device);
    }

    fn drain(&self, device: &Dory) {
        if self.running.swap(true, Ordering::AcqRel) {
            return;
        }
        loop {
            loop {
                let next = {
                    let mut queues = self.queues.lock();
                    queues
                        .completed_flushes
                        .pop_front()
                        .map(Item::Flush)
                        .or_else(|| queues.work.pop_front().map(Item::Work))
                };
                match next {
                    Some(Item::Flush((request, completion))) => complete_pending_flush(device, request, completion),
                    Some(Item::Work((request, completion))) => resume_gated(device, request, completion),
                    None => break,
                }
            }
            self.running.store(false, Ordering::Release);
            // A concurrent `schedule` may have pushed new items and seen
            // `running == true` just before the store above, trusting this
            // drain to pick them up. Reclaim the flag and keep draining if
            // the queues are non-empty again; otherwise this drain is done.
            let more_work = {
                let queues = self.queues.lock();
                !queues.completed_flushes.is_empty() || !queues.work.is_empty()
            };
            if !more_work || self.running.swap(true, Ordering::AcqRel) {
                break;
            }
        }
    }
}

impl Default for Worker {
    fn default() -> Self {
        Self::new()
    }
}

/// Forward each pending flush to the backing device, or, if `stopped`
/// with a prior write failure recorded, complete the flush with the
/// configured error code instead.
fn complete_pending_flush(device: &Dory, request: Request, completion: Box<dyn Completion>) {
    let lost_data = device.mode().is_stopped() && device.stats().write_failure.load(Ordering::Relaxed) > 0;
    let status = if lost_data {
        Stats::bump(&device.stats().flush_failure);
        StatusCode(device.mode().io_error_code())
    } else {
        match device.backing().flush() {
            Ok(()) => StatusCode::SUCCESS,
            Err(_) => StatusCode(device.mode().io_error_code()),
        }
    };
    completion.complete(request, status);
}

/// A request that was gated behind a flush: reinvoke the dispatcher now
/// that the flush has cleared. If it comes back `Forwarded`, there is no
/// external caller left holding this request (it was parked internally),
/// so the worker must perform the backing I/O itself.
fn resume_gated(device: &Dory, request: Request, completion: Box<dyn Completion>) {
    match dispatcher::dispatch(device, request, completion) {
        DispatchOutcome::Forwarded(mut request, completion) => {
            let status = device.forward_to_backing(&mut request);
            completion.complete(request, status);
        }
        DispatchOutcome::Consumed(ready) => device.drain_ready(ready),
    }
}
