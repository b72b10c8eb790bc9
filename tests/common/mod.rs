//! Shared test doubles for the end-to-end scenarios: a plain in-memory
//! backing device and a gated variant that can block a write mid-call
//! to make concurrent orderings observable.

use std::sync::{mpsc, Arc, Condvar, Mutex};

use dory::{BackingDevice, Completion, DoryResult, Request, StatusCode};

/// Captures `log` output under `cargo test -- --nocapture`; harmless (and
/// a no-op) if a previous test in the binary already installed it.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A plain in-memory backing device: a `Vec<u8>` behind a mutex.
pub struct MemoryBackingDevice {
    data: Mutex<Vec<u8>>,
}

impl MemoryBackingDevice {
    pub fn new(num_sectors: u64) -> Self {
        Self {
            data: Mutex::new(vec![0u8; (num_sectors * 512) as usize]),
        }
    }

    /// A backing device pre-filled with `byte`, standing in for "whatever
    /// was on disk before" in scenarios that check the cache was lost.
    pub fn with_pattern(num_sectors: u64, byte: u8) -> Self {
        let dev = Self::new(num_sectors);
        dev.data.lock().unwrap().iter_mut().for_each(|b| *b = byte);
        dev
    }

    pub fn read_range(&self, sector: u64, len: usize) -> Vec<u8> {
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
        Ok(())
    }
}

/// Wraps a `MemoryBackingDevice`, recording the order `write` calls reach
/// it and optionally blocking the calling thread on `gate_sector` until
/// released — used by the flush-in-flight ordering scenario, which needs
/// to observe that a write arriving while a FLUSH is in progress does
/// not reach backing storage until the FLUSH has completed.
pub struct GatedBackingDevice {
    inner: MemoryBackingDevice,
    gate_sector: u64,
    released: Mutex<bool>,
    cvar: Condvar,
    started: Mutex<Option<mpsc::Sender<()>>>,
    pub write_order: Mutex<Vec<u64>>,
}

impl GatedBackingDevice {
    pub fn new(num_sectors: u64, gate_sector: u64) -> (Arc<Self>, mpsc::Receiver<()>) {
        let (tx, rx) = mpsc::channel();
        let dev = Arc::new(Self {
            inner: MemoryBackingDevice::new(num_sectors),
            gate_sector,
            released: Mutex::new(false),
            cvar: Condvar::new(),
            started: Mutex::new(Some(tx)),
            write_order: Mutex::new(Vec::new()),
        });
        (dev, rx)
    }

    /// Release a thread blocked on `gate_sector`'s write call.
    pub fn release(&self) {
        *self.released.lock().unwrap() = true;
        self.cvar.notify_all();
    }
}

impl BackingDevice for GatedBackingDevice {
    fn num_sectors(&self) -> u64 {
        self.inner.num_sectors()
    }

    fn read(&self, sector: u64, buf: &mut [u8]) -> DoryResult<()> {
        self.inner.read(sector, buf)
    }

    fn write(&self, sector: u64, payload: &[u8]) -> DoryResult<()> {
        self.write_order.lock().unwrap().push(sector);
        if sector == self.gate_sector {
            if let Some(tx) = self.started.lock().unwrap().take() {
                let _ = tx.send(());
            }
            let mut released = self.released.lock().unwrap();
            while !*released {
                released = self.cvar.wait(released).unwrap();
            }
        }
        self.inner.write(sector, payload)
    }

    fn discard(&self, sector: u64, length_bytes: u32) -> DoryResult<()> {
        self.inner.discard(sector, length_bytes)
    }

    fn flush(&self) -> DoryResult<()> {
        self.inner.flush()
    }
}

/// A completion handle that stashes its status (and, optionally, the
/// request's payload on a read) behind a shared slot for the test to
/// inspect after the call returns.
pub struct RecordingCompletion {
    slot: Arc<Mutex<Option<(StatusCode, Vec<u8>)>>>,
}

impl Completion for RecordingCompletion {
    fn complete(self: Box<Self>, request: Request, status: StatusCode) {
        *self.slot.lock().unwrap() = Some((status, request.payload().to_vec()));
    }
}

pub fn recorder() -> (Box<dyn Completion>, Arc<Mutex<Option<(StatusCode, Vec<u8>)>>>) {
    let slot = Arc::new(Mutex::new(None));
    (Box::new(RecordingCompletion { slot: slot.clone() }), slot)
}
