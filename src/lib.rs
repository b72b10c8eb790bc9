//! `dory`: a fault-injecting block-device shim with a volatile
//! write-back cache. The cache exists only to be lost — this crate
//! exists to make *how* it is lost reproducible, so filesystems and
//! storage engines can be exercised against realistic partial-failure
//! scenarios (whole-block data loss and torn sub-block writes).
//!
//! This module ties the engine's components together into one `Dory`
//! device type. There is no hardware to probe: a `Dory` is constructed
//! directly around a caller-supplied [`BackingDevice`].
//!
//! `no_std + alloc`; `std` is available under `cfg(test)` so the
//! concurrency properties of the busy counter and slot locks can be
//! exercised with real OS threads.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

mod admin;
mod array;
mod busy;
mod config;
mod device;
mod dispatcher;
mod error;
mod flush;
pub mod registry;
mod request;
mod slot;
mod stats;
mod sync;
mod worker;

pub use config::Config;
pub use device::{BackingDevice, Completion};
pub use error::{ConfigInvalidReason, DoryError, DoryResult};
pub use request::{Direction, Outcome, Request, RequestFlags, StatusCode};
pub use stats::StatsSnapshot;

use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::sync::Arc;

use array::CacheArray;
use busy::BusyTracker;
use config::{RuntimeMode, TornParams};
use dispatcher::DispatchOutcome;
use flush::FlushCoordinator;
use slot::Waiter;
use stats::Stats;
use worker::Worker;

/// The fault-injecting block-device shim: one instance per simulated
/// device, owning a `CacheArray`, a `FlushCoordinator`, a `BusyTracker`,
/// and the admin-visible runtime mode and statistics.
pub struct Dory {
    config: Config,
    backing: Arc<dyn BackingDevice>,
    mode: RuntimeMode,
    torn: TornParams,
    array: CacheArray,
    flush: FlushCoordinator,
    busy: BusyTracker,
    worker: Worker,
    stats: Stats,
}

impl Dory {
    /// Construction parameters (ordered, all required): instance name
    /// (<=11 chars); backing device path; block size (512 or 4096);
    /// cache slot count (<= 65516). Invalid values yield a configuration
    /// error with a human-readable message.
    ///
    /// The "backing device path" is represented here by the
    /// `BackingDevice` trait object directly — resolving a path string
    /// to a device handle is the upstream framework's job, out of scope
    /// for this crate.
    pub fn new(
        name: &str,
        backing: Arc<dyn BackingDevice>,
        block_size: u32,
        slot_count: u32,
    ) -> DoryResult<Self> {
        let config = Config::new(name, block_size, slot_count)?;
        let array = CacheArray::new(config.slot_count(), config.block_size());
        log::info!(
            "{name}: constructed ({} block, {} slots)",
            config.block_size(),
            config.slot_count()
        );
        Ok(Self {
            config,
            backing,
            mode: RuntimeMode::new(),
            torn: TornParams::new(),
            array,
            flush: FlushCoordinator::new(),
            busy: BusyTracker::new(),
            worker: Worker::new(),
            stats: Stats::new(),
        })
    }

    /// Build a device and register it under the process-wide admin root
    /// (deregistration on destruction implies registration on
    /// construction). Returns an `Arc<Dory>` since the registry holds a
    /// shared handle alongside the caller's own.
    pub fn new_registered(
        name: &str,
        backing: Arc<dyn BackingDevice>,
        block_size: u32,
        slot_count: u32,
    ) -> DoryResult<Arc<Self>> {
        let device = Arc::new(Self::new(name, backing, block_size, slot_count)?);
        registry::register(device.clone());
        Ok(device)
    }

    /// Deregister this device from the admin root on destruction. The
    /// caller still holds its own `Arc`; this only drops the registry's
    /// reference, which is what let an admin surface enumerate/reach the
    /// device while it was live.
    pub fn teardown(&self) {
        registry::deregister(self.config().name());
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn backing(&self) -> &dyn BackingDevice {
        self.backing.as_ref()
    }

    pub(crate) fn mode(&self) -> &RuntimeMode {
        &self.mode
    }

    pub(crate) fn torn(&self) -> &TornParams {
        &self.torn
    }

    pub(crate) fn array(&self) -> &CacheArray {
        &self.array
    }

    pub(crate) fn flush(&self) -> &FlushCoordinator {
        &self.flush
    }

    pub(crate) fn busy(&self) -> &BusyTracker {
        &self.busy
    }

    pub(crate) fn worker(&self) -> &Worker {
        &self.worker
    }

    pub(crate) fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Submit one request. Always drives it to completion before
    /// returning (or, if it needed to wait behind a barrier, hands it off
    /// internally to finish later) and always invokes `completion`
    /// exactly once — this crate owns the `BackingDevice` handle end to
    /// end, so there is no raw I/O left for the caller to perform
    /// afterward in either case. The returned `Outcome` is purely
    /// informational: whether the request engaged the caching engine or
    /// bypassed it.
    pub fn submit(&self, request: Request, completion: Box<dyn Completion>) -> Outcome {
        match dispatcher::dispatch(self, request, completion) {
            DispatchOutcome::Forwarded(mut request, completion) => {
                let status = self.forward_to_backing(&mut request);
                completion.complete(request, status);
                Outcome::BypassedCache
            }
            DispatchOutcome::Consumed(ready) => {
                self.drain_ready(ready);
                Outcome::Cached
            }
        }
    }

    /// Carry a request that bypassed the cache to the backing device and
    /// compute its completion status. Used both by `submit` for the
    /// caller's own request and by the worker context
    /// (`worker::resume_gated`) for requests that were gated behind a
    /// flush and have no external caller left on the stack to do this.
    pub(crate) fn forward_to_backing(&self, request: &mut Request) -> StatusCode {
        if request.is_flush() {
            return match self.backing.flush() {
                Ok(()) => StatusCode::SUCCESS,
                Err(_) => StatusCode(self.mode.io_error_code()),
            };
        }
        let sector = request.sector();
        let result = if request.is_discard() {
            self.backing.discard(sector, request.length_bytes())
        } else if request.is_write() {
            self.backing.write(sector, request.payload())
        } else {
            let mut buf = core::mem::take(request.payload_mut());
            buf.resize(request.length_bytes() as usize, 0);
            let result = self.backing.read(sector, &mut buf);
            *request.payload_mut() = buf;
            result
        };
        match result {
            Ok(()) => StatusCode::SUCCESS,
            Err(_) => StatusCode(self.mode.io_error_code()),
        }
    }

    /// Process any ready waiters iteratively, reinvoking the dispatcher
    /// on each, to avoid deep recursion in the completion/submit path.
    /// Implemented as a work queue rather than recursive calls — this is
    /// an architectural requirement, not an optimization, since a chain
    /// of woken waiters could otherwise recurse arbitrarily deep.
    pub(crate) fn drain_ready(&self, mut ready: VecDeque<Waiter>) {
        while let Some(Waiter { request, completion }) = ready.pop_front() {
            match dispatcher::dispatch(self, request, completion) {
                DispatchOutcome::Forwarded(mut request, completion) => {
                    let status = self.forward_to_backing(&mut request);
                    completion.complete(request, status);
                }
                DispatchOutcome::Consumed(more_ready) => ready.extend(more_ready),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::sync::Arc;
    use alloc::vec;
    use alloc::vec::Vec;
    use core::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Mutex;

    /// In-memory backing device for tests, grounded on
    /// `kernel/src/storage/ramdisk.rs`'s in-memory `BlockDevice` impl.
    pub struct MemoryBackingDevice {
        data: Mutex<Vec<u8>>,
        flush_calls: AtomicI32,
    }

    impl MemoryBackingDevice {
        pub fn new(num_sectors: u64) -> Self {
            Self {
                data: Mutex::new(vec![0u8; (num_sectors * 512) as usize]),
                flush_calls: AtomicI32::new(0),
            }
        }

        pub fn with_pattern(num_sectors: u64, byte: u8) -> Self {
            let dev = Self::new(num_sectors);
            dev.data.lock().unwrap().iter_mut().for_each(|b| *b = byte);
            dev
        }

        pub fn snapshot(&self, sector: u64, len: usize) -> Vec<u8> {
            let data = self.data.lock().unwrap();
            let start = (sector * 512) as usize;
            data[start..start + len].to_vec()
        }
    }

    impl BackingDevice for MemoryBackingDevice {
        fn num_sectors(&self) -> u64 {
            (self.data.lock().unwrap().len() / 512) as u64
        }

        fn read(&self, sector: u64, buf: &mut [u8]) -> DoryResult<()> {
            let data = self.data.lock().unwrap();
            let start = (sector * 512) as usize;
            buf.copy_from_slice(&data[start..start + buf.len()]);
            Ok(())
        }

        fn write(&self, sector: u64, payload: &[u8]) -> DoryResult<()> {
            let mut data = self.data.lock().unwrap();
            let start = (sector * 512) as usize;
            data[start..start + payload.len()].copy_from_slice(payload);
            Ok(())
        }

        fn discard(&self, _sector: u64, _length_bytes: u32) -> DoryResult<()> {
            Ok(())
        }

        fn flush(&self) -> DoryResult<()> {
            self.flush_calls.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }

    struct RecordingCompletion {
        slot: Arc<Mutex<Option<StatusCode>>>,
    }

    impl Completion for RecordingCompletion {
        fn complete(self: Box<Self>, _request: Request, status: StatusCode) {
            *self.slot.lock().unwrap() = Some(status);
        }
    }

    fn recorder() -> (Box<dyn Completion>, Arc<Mutex<Option<StatusCode>>>) {
        let slot = Arc::new(Mutex::new(None));
        (Box::new(RecordingCompletion { slot: slot.clone() }), slot)
    }

    #[test]
    fn rejects_invalid_construction_with_human_readable_message() {
        let backing = Arc::new(MemoryBackingDevice::new(32));
        let err = Dory::new("too-long-name-here", backing, 4096, 4).unwrap_err();
        assert!(err.to_string().contains("11 characters"));
    }

    #[test]
    fn full_block_write_then_read_round_trips_through_the_cache() {
        let backing = Arc::new(MemoryBackingDevice::new(32));
        let dory = Dory::new("rt", backing, 4096, 4).unwrap();

        let (completion, status) = recorder();
        let write = Request::new(Direction::Write, 0, vec![0x41u8; 4096], RequestFlags::empty());
        assert_eq!(dory.submit(write, completion), Outcome::Cached);
        assert_eq!(*status.lock().unwrap(), Some(StatusCode::SUCCESS));

        let (completion, status) = recorder();
        let read = Request::new(Direction::Read, 0, vec![0u8; 4096], RequestFlags::empty());
        assert_eq!(dory.submit(read, completion), Outcome::Cached);
        assert_eq!(*status.lock().unwrap(), Some(StatusCode::SUCCESS));
    }

    #[test]
    fn new_registered_is_reachable_by_name_until_torn_down() {
        let backing = Arc::new(MemoryBackingDevice::new(32));
        let dory = Dory::new_registered("reg1", backing, 4096, 4).unwrap();
        assert!(registry::lookup("reg1").is_some());
        dory.teardown();
        assert!(registry::lookup("reg1").is_none());
    }

    #[test]
    fn caching_disabled_forwards_every_request() {
        let backing = Arc::new(MemoryBackingDevice::new(32));
        let dory = Dory::new("nocache", backing, 4096, 0).unwrap();
        let (completion, status) = recorder();
        let write = Request::new(Direction::Write, 0, vec![1u8; 4096], RequestFlags::empty());
        assert_eq!(dory.submit(write, completion), Outcome::BypassedCache);
        assert_eq!(*status.lock().unwrap(), Some(StatusCode::SUCCESS));
    }

    #[test]
    fn stop_fails_subsequent_writes_with_configured_error_code() {
        let backing = Arc::new(MemoryBackingDevice::new(32));
        let dory = Dory::new("stoptest", backing, 4096, 4).unwrap();
        dory.admin_stop();

        let (completion, status) = recorder();
        let write = Request::new(Direction::Write, 0, vec![1u8; 4096], RequestFlags::empty());
        assert_eq!(dory.submit(write, completion), Outcome::Cached);
        assert_eq!(*status.lock().unwrap(), Some(StatusCode(dory.mode().io_error_code())));
    }

    #[test]
    fn reads_still_succeed_once_stopped() {
        let backing = Arc::new(MemoryBackingDevice::with_pattern(32, 0x99));
        let dory = Dory::new("stopread", backing, 4096, 4).unwrap();
        dory.admin_stop();

        let (completion, status) = recorder();
        let read = Request::new(Direction::Read, 0, vec![0u8; 4096], RequestFlags::empty());
        assert_eq!(dory.submit(read, completion), Outcome::Cached);
        assert_eq!(*status.lock().unwrap(), Some(StatusCode::SUCCESS));
    }
}
