//! Scoped mutual exclusion.
//!
//! The critical section lasts exactly as long as the closure passed to [Lock::lock]; it is left
//! on every exit path including early returns and unwinding.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::{
    raw::{CriticalSectionRawMutex, RawMutex},
    Mutex,
};

pub struct Lock<T, M: RawMutex = CriticalSectionRawMutex> {
    inner: Mutex<M, RefCell<T>>,
}

impl<T, M: RawMutex> Lock<T, M> {
    pub const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(value)),
        }
    }

    /// Run `f` with exclusive access to the guarded value.
    ///
    /// Must not be re-entered from inside `f`.
    pub fn lock<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        self.inner.lock(|cell| f(&mut cell.borrow_mut()))
    }
}

