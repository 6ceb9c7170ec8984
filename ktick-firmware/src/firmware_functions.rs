//! Board supplied hooks the core calls when it cannot continue.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::CriticalSectionMutex;

pub type ResetFn = &'static (dyn Fn() + Sync);
pub type FatalFn = &'static (dyn Fn(FatalReason) + Sync);

/// Why the firmware gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FatalReason {
    /// A fixed capacity (registry, runner, buffer pool) was exceeded.
    ResourceExhausted,
    StartupFailed,
    Panic,
}

struct Functions {
    reset: Option<ResetFn>,
    fatal: Option<FatalFn>,
}

const fn default_functions() -> Functions {
    Functions {
        reset: None,
        fatal: None,
    }
}

static FUNCTIONS: CriticalSectionMutex<RefCell<Functions>> =
    CriticalSectionMutex::new(RefCell::new(default_functions()));

pub fn reset() {
    FUNCTIONS.lock(|r| {
        let mut guard = r.borrow_mut();
        if let Some(f) = guard.reset.take() {
            f();
        }
    });
}

/// Report an unrecoverable condition to the board's fatal handler. The handler runs at most once.
pub fn fatal(reason: FatalReason) {
    let handler = FUNCTIONS.lock(|r| r.borrow_mut().fatal.take());
    if let Some(f) = handler {
        f(reason);
    }
}

/// Register a function that will reset the MCU when [reset] is called.
///
/// ```
/// use ktick_firmware::firmware_functions::handle_reset;
/// # pub mod cortex_m { pub mod peripheral {pub mod SCB {pub fn sys_reset() {}}}}
///
/// fn myreset() {
///     cortex_m::peripheral::SCB::sys_reset();
/// }
///
/// handle_reset(Some(&myreset));
/// ```
pub fn handle_reset(value: Option<ResetFn>) {
    FUNCTIONS.lock(|r| {
        let mut guard = r.borrow_mut();
        guard.reset = value;
    });
}

pub fn handle_fatal(value: Option<FatalFn>) {
    FUNCTIONS.lock(|r| {
        let mut guard = r.borrow_mut();
        guard.fatal = value;
    });
}

#[cfg(all(not(test), feature = "reset-on-panic", target_os = "none"))]
mod panic {
    #[panic_handler]
    fn panic(_info: &core::panic::PanicInfo) -> ! {
        super::fatal(super::FatalReason::Panic);
        super::reset();

        loop {}
    }
}

#[cfg(test)]
#[path = "firmware_functions_test.rs"]
mod test;
