//! # Synchronization Primitives
//!
//! Interrupt-safe critical sections for the Cortex-M4, and a cell for
//! peripherals that several tasks share after bring-up.

use core::cell::RefCell;

use cortex_m::interrupt::{self, Mutex};

/// Execute a closure within a critical section (interrupts disabled).
///
/// All shared kernel state is accessed through this. Keep the closure
/// short; it delays SysTick and every other interrupt.
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce(&interrupt::CriticalSection) -> R,
{
    interrupt::free(f)
}

/// A value installed once at bring-up and then borrowed by tasks inside a
/// critical section.
pub struct Shared<T> {
    inner: Mutex<RefCell<Option<T>>>,
}

impl<T> Shared<T> {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(None)),
        }
    }

    /// Install the value, replacing any previous one.
    pub fn put(&self, value: T) {
        critical_section(|cs| {
            self.inner.borrow(cs).replace(Some(value));
        });
    }

    /// Run `f` on the value. Returns `None` if nothing was installed yet.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        critical_section(|cs| self.inner.borrow(cs).borrow_mut().as_mut().map(f))
    }
}
