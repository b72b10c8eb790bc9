//! Interrupt-safe locking primitive.
//!
//! Every lock reachable from a completion callback must be safe to
//! acquire from a completion/interrupt context, i.e. noninterruptible.
//! `IrqSafeMutex` wraps a `spin::Mutex` and brackets the critical section
//! with the `critical-section` crate's `acquire`/`release` pair: disable
//! interrupts, lock, restore on drop. The embedding kernel (module
//! registration with a real interrupt controller is out of scope here)
//! supplies the actual interrupt-disable implementation via
//! `critical_section::set_impl!`; hosted test builds link the
//! `critical-section/std` implementation, backed by a process-wide
//! re-entrant mutex.

use core::ops::{Deref, DerefMut};
use spin::{Mutex, MutexGuard};

pub struct IrqSafeMutex<T> {
    inner: Mutex<T>,
}

pub struct IrqSafeGuard<'a, T> {
    restore_state: critical_section::RestoreState,
    guard: MutexGuard<'a, T>,
}

impl<T> IrqSafeMutex<T> {
    pub const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    /// Acquire the lock with interrupts disabled for the critical
    /// section's lifetime. Safe to call from a completion/interrupt
    /// context — `critical_section::acquire` is explicitly documented
    /// as reentrant-safe for that use.
    pub fn lock(&self) -> IrqSafeGuard<'_, T> {
        // SAFETY: paired with `release` in `IrqSafeGuard::drop`, which
        // always runs exactly once per successful `acquire`.
        let restore_state = unsafe { critical_section::acquire() };
        let guard = self.inner.lock();
        IrqSafeGuard {
            restore_state,
            guard,
        }
    }
}

impl<'a, T> Deref for IrqSafeGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<'a, T> DerefMut for IrqSafeGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<'a, T> Drop for IrqSafeGuard<'a, T> {
    fn drop(&mut self) {
        // SAFETY: `restore_state` came from the matching `acquire` call
        // in `lock`, and this is the only place it is consumed.
        unsafe { critical_section::release(self.restore_state) };
    }
}
