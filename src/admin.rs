//! Admin surface: the string-keyed operations an external
//! administrative/introspection channel invokes on the core. That
//! channel itself (however it's wired to callers — ioctl, sysfs, a
//! debug console) is out of scope; this module is only the handlers it
//! calls into.
//!
//! Status and listing output is built here as owned `String`s rather
//! than written straight to a console, so the channel wiring stays free
//! to render it however it likes.

use alloc::format;
use alloc::string::String;
use log::{info, warn};

use crate::error::{ConfigInvalidReason, DoryError, DoryResult};
use crate::Dory;

/// Maximum `cache` listing lines before truncation: one line per
/// non-Empty slot, truncated with a `...\n` marker past this count.
pub const MAX_CACHE_LISTING_LINES: usize = 256;

impl Dory {
    /// `stop` admin key (write-only): any value stops the device.
    /// Records the read/write counts observed at the moment of the
    /// call.
    pub fn admin_stop(&self) {
        let stats = self.stats().snapshot();
        self.mode().stop(stats.reads as i32, stats.writes as i32);
        info!("{}: stopped (reads={} writes={})", self.config().name(), stats.reads, stats.writes);
    }

    /// `returnEIO` admin key: `0` selects success (used to unstick a
    /// test), any other value selects the EIO-equivalent code.
    pub fn admin_set_return_code(&self, value: &str) -> DoryResult<()> {
        match value.trim() {
            "0" => {
                self.mode().set_return_code(false);
                Ok(())
            }
            "1" => {
                self.mode().set_return_code(true);
                Ok(())
            }
            _ => {
                warn!("{}: rejected returnEIO value {value:?}", self.config().name());
                Err(DoryError::ConfigInvalid(ConfigInvalidReason::BadAdminValue))
            }
        }
    }

    /// `torn_mask` admin key (r/w): decimal `u32`, must be nonzero.
    pub fn admin_set_torn_mask(&self, value: &str) -> DoryResult<()> {
        let mask: u32 = value
            .trim()
            .parse()
            .map_err(|_| DoryError::ConfigInvalid(ConfigInvalidReason::BadAdminValue))?;
        self.torn().set_mask(mask)
    }

    pub fn admin_torn_mask(&self) -> u32 {
        self.torn().mask()
    }

    /// `torn_modulus` admin key (r/w): decimal `u32` in `[8, 32]`.
    pub fn admin_set_torn_modulus(&self, value: &str) -> DoryResult<()> {
        let modulus: u32 = value
            .trim()
            .parse()
            .map_err(|_| DoryError::ConfigInvalid(ConfigInvalidReason::BadAdminValue))?;
        self.torn().set_modulus(modulus)
    }

    pub fn admin_torn_modulus(&self) -> u32 {
        self.torn().modulus()
    }

    /// `mode` admin key (read-only): `"stop\n"` or `"running\n"`.
    pub fn admin_mode(&self) -> &'static str {
        if self.mode().is_stopped() {
            "stop\n"
        } else {
            "running\n"
        }
    }

    /// `state` admin key (read-only): enumerated device counters as
    /// multi-line text.
    pub fn admin_state(&self) -> String {
        let (stop_read_count, stop_write_count) = self.mode().stop_counts();
        format!(
            "name {}\nblock_size {}\nslot_count {}\nbusy_count {}\nflushing {}\nstopped {}\nstop_read_count {}\nstop_write_count {}\n",
            self.config().name(),
            self.config().block_size(),
            self.config().slot_count(),
            self.busy().load(),
            self.flush().is_flushing(),
            self.mode().is_stopped(),
            stop_read_count,
            stop_write_count,
        )
    }

    /// `statistics` admin key (read-only): counter snapshot.
    pub fn admin_statistics(&self) -> String {
        self.stats().snapshot().render()
    }

    /// `cache` admin key (read-only): `<index> <STATE> <waiters>
    /// <sector>` per non-Empty slot.
    pub fn admin_cache(&self) -> String {
        self.array()
            .render_cache_listing(MAX_CACHE_LISTING_LINES, self.config().sector_shift())
    }

    /// The config-dump status line: `<name> <device> <block-size>
    /// <slot-count>`.
    pub fn admin_status_line(&self, device_path: &str) -> String {
        format!(
            "{} {} {} {}",
            self.config().name(),
            device_path,
            self.config().block_size(),
            self.config().slot_count()
        )
    }

    /// Apply an admin write by key name, as the string-based k/v channel
    /// would dispatch it.
    pub fn admin_write(&self, key: &str, value: &str) -> DoryResult<()> {
        match key {
            "stop" => {
                self.admin_stop();
                Ok(())
            }
            "returnEIO" => self.admin_set_return_code(value),
            "torn_mask" => self.admin_set_torn_mask(value),
            "torn_modulus" => self.admin_set_torn_modulus(value),
            _ => Err(DoryError::ConfigInvalid(ConfigInvalidReason::BadAdminValue)),
        }
    }

    /// Read an admin key by name, as the string-based k/v channel would
    /// dispatch it.
    pub fn admin_read(&self, key: &str) -> Option<String> {
        match key {
            "mode" => Some(String::from(self.admin_mode())),
            "state" => Some(self.admin_state()),
            "statistics" => Some(self.admin_statistics()),
            "cache" => Some(self.admin_cache()),
            "torn_mask" => Some(format!("{}\n", self.admin_torn_mask())),
            "torn_modulus" => Some(format!("{}\n", self.admin_torn_modulus())),
            _ => None,
        }
    }
}
