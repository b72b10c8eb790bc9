//! Error taxonomy for construction and runtime failures.

use core::fmt;

/// Errors this crate can surface.
///
/// Construction errors (`ConfigInvalid`, `Allocation`) abort device
/// creation; `IoFailed` only ever reaches a caller through a request
/// completion status, never as a propagated error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoryError {
    /// A construction parameter failed validation.
    ConfigInvalid(ConfigInvalidReason),
    /// Slot buffer or bookkeeping allocation failed at construction.
    Allocation,
    /// A request failed after the device entered the stopped mode, or a
    /// flush observed a prior write failure.
    IoFailed,
}

/// Why a `Config` was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigInvalidReason {
    /// Instance name longer than 11 characters.
    NameTooLong,
    /// Block size was not 512 or 4096.
    BadBlockSize,
    /// Slot count exceeded 65516.
    TooManySlots,
    /// Torn mask was zero.
    ZeroMask,
    /// Torn modulus was outside `[8, 32]`.
    ModulusOutOfRange,
    /// An admin write named an unknown key, or a key's value didn't
    /// parse (e.g. `returnEIO` given something other than `0`/`1`).
    BadAdminValue,
}

pub type DoryResult<T> = Result<T, DoryError>;

impl fmt::Display for DoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DoryError::ConfigInvalid(reason) => write!(f, "invalid configuration: {reason}"),
            DoryError::Allocation => write!(f, "allocation failed"),
            DoryError::IoFailed => write!(f, "I/O failed"),
        }
    }
}

impl fmt::Display for ConfigInvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ConfigInvalidReason::NameTooLong => "instance name exceeds 11 characters",
            ConfigInvalidReason::BadBlockSize => "block size must be 512 or 4096",
            ConfigInvalidReason::TooManySlots => "slot count must not exceed 65516",
            ConfigInvalidReason::ZeroMask => "torn mask must be nonzero",
            ConfigInvalidReason::ModulusOutOfRange => "torn modulus must be in [8, 32]",
            ConfigInvalidReason::BadAdminValue => "unknown admin key or unparseable value",
        };
        f.write_str(msg)
    }
}

#[cfg(test)]
impl std::error::Error for DoryError {}
