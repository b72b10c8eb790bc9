//! The two external seams this crate treats as out-of-scope
//! collaborators: the backing block device (a sink) and the upstream
//! completion interface (a producer). Both are traits so the engine
//! stays agnostic of what sits on either side — a real driver, a
//! ramdisk, or (in tests) an in-memory double.

use alloc::boxed::Box;

use crate::error::DoryResult;
use crate::request::{Request, StatusCode};

/// The backing block device: a sink that accepts block-aligned writes
/// and may itself fail.
///
/// Shaped around a sector-range request instead of fixed-size
/// `read_blocks`/`write_blocks` calls, matching the shape this crate's
/// dispatcher already works in.
pub trait BackingDevice: Send + Sync {
    /// Total addressable sectors (512-byte units).
    fn num_sectors(&self) -> u64;

    /// Read `buf.len()` bytes starting at `sector`.
    fn read(&self, sector: u64, buf: &mut [u8]) -> DoryResult<()>;

    /// Write `data` starting at `sector`.
    fn write(&self, sector: u64, data: &[u8]) -> DoryResult<()>;

    /// Discard (mark unused) the byte range starting at `sector`.
    /// A no-op backing device may ignore this.
    fn discard(&self, sector: u64, length_bytes: u32) -> DoryResult<()>;

    /// Durability barrier: all previously-acknowledged writes must be
    /// stable before this returns.
    fn flush(&self) -> DoryResult<()>;
}

/// The upstream completion interface: the core invokes the submitter's
/// completion with a status code.
///
/// A request and its completion handle travel together as `(Request,
/// Box<dyn Completion>)`; the dispatcher and worker context invoke
/// `complete` exactly once per accepted request.
pub trait Completion: Send {
    fn complete(self: Box<Self>, request: Request, status: StatusCode);
}
