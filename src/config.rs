//! Immutable construction configuration and mutable runtime mode.

use alloc::string::String;
use core::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use crate::error::{ConfigInvalidReason, DoryError, DoryResult};

/// The EIO-equivalent error code returned to callers once the device is
/// `stopped`.
pub const DEFAULT_IO_ERROR_CODE: i32 = -5; // -EIO

pub const MAX_NAME_LEN: usize = 11;
pub const MAX_SLOT_COUNT: u32 = 65516;
pub const MIN_MODULUS: u32 = 8;
pub const MAX_MODULUS: u32 = 32;
pub const DEFAULT_MASK: u32 = 0xFFFF_FFFF;
pub const DEFAULT_MODULUS: u32 = 8;

/// Immutable, validated-at-construction device configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    name: String,
    block_size: u32,
    slot_count: u16,
    sector_shift: u32,
}

impl Config {
    /// Validate and build a `Config`.
    ///
    /// Bounds-first-then-construct: every rejection is checked before
    /// any field is populated.
    pub fn new(name: &str, block_size: u32, slot_count: u32) -> DoryResult<Self> {
        if name.len() > MAX_NAME_LEN {
            return Err(DoryError::ConfigInvalid(ConfigInvalidReason::NameTooLong));
        }
        let sector_shift = match block_size {
            512 => 0,
            4096 => 3,
            _ => {
                return Err(DoryError::ConfigInvalid(ConfigInvalidReason::BadBlockSize));
            }
        };
        if slot_count > MAX_SLOT_COUNT {
            return Err(DoryError::ConfigInvalid(ConfigInvalidReason::TooManySlots));
        }
        Ok(Self {
            name: String::from(name),
            block_size,
            slot_count: slot_count as u16,
            sector_shift,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    pub fn slot_count(&self) -> u16 {
        self.slot_count
    }

    /// Bits separating a 512-byte sector from this device's block size:
    /// 0 for 512-byte blocks, 3 for 4096-byte blocks.
    pub fn sector_shift(&self) -> u32 {
        self.sector_shift
    }

    pub fn caching_enabled(&self) -> bool {
        self.slot_count != 0
    }

    /// `block_number = sector >> sector_shift`.
    pub fn block_number_of(&self, sector: u64) -> u64 {
        sector >> self.sector_shift
    }

    /// Inverse of `block_number_of`: the first sector of `block_number`.
    pub fn block_to_sector(&self, block_number: u64) -> u64 {
        block_number << self.sector_shift
    }
}

/// Torn-write injection selection parameters.
///
/// Kept separate from the device-wide `RuntimeMode` because these two
/// fields are independently validated and independently read/written by
/// the admin surface, unlike `stopped`/`io_error_code` which only ever
/// change together via `stop()`/`set_return_code()`.
#[derive(Debug)]
pub struct TornParams {
    mask: AtomicI32,
    modulus: AtomicI32,
}

impl TornParams {
    pub fn new() -> Self {
        Self {
            mask: AtomicI32::new(DEFAULT_MASK as i32),
            modulus: AtomicI32::new(DEFAULT_MODULUS as i32),
        }
    }

    pub fn mask(&self) -> u32 {
        self.mask.load(Ordering::Relaxed) as u32
    }

    pub fn modulus(&self) -> u32 {
        self.modulus.load(Ordering::Relaxed) as u32
    }

    /// `set_torn_mask` must reject a zero mask.
    pub fn set_mask(&self, mask: u32) -> DoryResult<()> {
        if mask == 0 {
            return Err(DoryError::ConfigInvalid(ConfigInvalidReason::ZeroMask));
        }
        self.mask.store(mask as i32, Ordering::Relaxed);
        Ok(())
    }

    /// `set_torn_modulus` must reject values outside `[8, 32]`.
    pub fn set_modulus(&self, modulus: u32) -> DoryResult<()> {
        if !(MIN_MODULUS..=MAX_MODULUS).contains(&modulus) {
            return Err(DoryError::ConfigInvalid(
                ConfigInvalidReason::ModulusOutOfRange,
            ));
        }
        self.modulus.store(modulus as i32, Ordering::Relaxed);
        Ok(())
    }

    /// Cache the block iff `mask & (1 << (block_number mod modulus)) != 0`.
    pub fn should_cache(&self, block_number: u64) -> bool {
        let modulus = self.modulus() as u64;
        let bit = (block_number % modulus) as u32;
        (self.mask() & (1 << bit)) != 0
    }
}

impl Default for TornParams {
    fn default() -> Self {
        Self::new()
    }
}

/// Mutable runtime mode: `stopped`, `io_error_code`.
#[derive(Debug)]
pub struct RuntimeMode {
    stopped: AtomicBool,
    io_error_code: AtomicI32,
    /// Read/write counters as observed at the moment `stop()` was
    /// called.
    stop_read_count: AtomicI32,
    stop_write_count: AtomicI32,
}

impl RuntimeMode {
    pub fn new() -> Self {
        Self {
            stopped: AtomicBool::new(false),
            io_error_code: AtomicI32::new(DEFAULT_IO_ERROR_CODE),
            stop_read_count: AtomicI32::new(0),
            stop_write_count: AtomicI32::new(0),
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    pub fn io_error_code(&self) -> i32 {
        self.io_error_code.load(Ordering::Relaxed)
    }

    /// `set_return_code`: `0` selects success (used to unstick a test),
    /// any nonzero selects the EIO-equivalent code.
    pub fn set_return_code(&self, wants_error: bool) {
        self.io_error_code.store(
            if wants_error {
                DEFAULT_IO_ERROR_CODE
            } else {
                0
            },
            Ordering::Relaxed,
        );
    }

    pub fn stop(&self, read_count: i32, write_count: i32) {
        self.stop_read_count.store(read_count, Ordering::Relaxed);
        self.stop_write_count.store(write_count, Ordering::Relaxed);
        self.stopped.store(true, Ordering::Release);
    }

    pub fn stop_counts(&self) -> (i32, i32) {
        (
            self.stop_read_count.load(Ordering::Relaxed),
            self.stop_write_count.load(Ordering::Relaxed),
        )
    }
}

impl Default for RuntimeMode {
    fn default() -> Self {
        Self::new()
    }
}
