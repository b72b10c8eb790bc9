//! Request shape: direction, flags, and the submission outcome.

use alloc::vec::Vec;
use bitflags::bitflags;

bitflags! {
    /// Per-request flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RequestFlags: u8 {
        /// A zero-length barrier request demanding durability of prior writes.
        const FLUSH = 0b001;
        /// Force unit access: the new data must reach backing storage immediately.
        const FUA = 0b010;
        /// The backing device may mark this range as unused.
        const DISCARD = 0b100;
    }
}

/// I/O direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

/// A single block I/O request.
///
/// `sector` is in 512-byte sector units regardless of the device's
/// configured block size. A FLUSH request
/// (`flags.contains(RequestFlags::FLUSH)`) has `length_bytes == 0` and
/// carries no payload.
#[derive(Debug, Clone)]
pub struct Request {
    direction: Direction,
    sector: u64,
    length_bytes: u32,
    payload: Vec<u8>,
    flags: RequestFlags,
}

impl Request {
    pub fn new(direction: Direction, sector: u64, payload: Vec<u8>, flags: RequestFlags) -> Self {
        let length_bytes = payload.len() as u32;
        Self {
            direction,
            sector,
            length_bytes,
            payload,
            flags,
        }
    }

    /// Construct a zero-length FLUSH barrier.
    pub fn flush() -> Self {
        Self {
            direction: Direction::Write,
            sector: 0,
            length_bytes: 0,
            payload: Vec::new(),
            flags: RequestFlags::FLUSH,
        }
    }

    pub fn with_flags(mut self, flags: RequestFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn sector(&self) -> u64 {
        self.sector
    }

    pub fn length_bytes(&self) -> u32 {
        self.length_bytes
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut Vec<u8> {
        &mut self.payload
    }

    pub fn flags(&self) -> RequestFlags {
        self.flags
    }

    pub fn is_flush(&self) -> bool {
        self.flags.contains(RequestFlags::FLUSH)
    }

    pub fn is_fua(&self) -> bool {
        self.flags.contains(RequestFlags::FUA)
    }

    pub fn is_discard(&self) -> bool {
        self.flags.contains(RequestFlags::DISCARD)
    }

    pub fn is_write(&self) -> bool {
        matches!(self.direction, Direction::Write)
    }
}

/// Whether a full block, given the device's block size, is covered by
/// this request starting at `block_sector_offset` (the sector at which
/// the owning block begins).
pub fn is_full_block(request: &Request, block_size: u32) -> bool {
    request.length_bytes() == block_size
}

/// Outcome of `Dory::submit`, reported for diagnostics after the fact.
///
/// `submit` always drives the request to completion itself — it owns the
/// backing device handle and invokes the caller's `Completion` exactly
/// once, whichever variant is returned. The variant only tells the caller
/// *how* the request was handled, not who is responsible for finishing it:
/// there is nothing left for the caller to do in either case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The request bypassed the caching engine entirely (caching
    /// disabled, a miss against a differently-resident slot, or a
    /// full-block FUA/discard hit that drops the cached copy) and was
    /// carried straight to the backing device.
    BypassedCache,
    /// The request was handled by the caching engine: serviced against a
    /// cached slot, queued as a barrier, or gated behind one.
    Cached,
}

/// Status code delivered to a request's completion callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusCode(pub i32);

impl StatusCode {
    pub const SUCCESS: StatusCode = StatusCode(0);
}
