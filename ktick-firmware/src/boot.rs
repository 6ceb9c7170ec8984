//! Startup sequence: resolve every registered device, run the start hooks and hand back the
//! runner ready for the scheduler. A failed startup leaves the firmware halted.

use crate::firmware_functions::{self, FatalReason};
use crate::registry::DeviceRegistry;
use crate::runner::{Runner, StartupError};

pub fn boot<const N: usize, const R: usize>(
    registry: &DeviceRegistry<'_, R>,
) -> Result<Runner<N>, StartupError> {
    let mut runner = Runner::init(registry)?;
    runner.start()?;
    Ok(runner)
}

/// Park the core forever.
pub fn halt() -> ! {
    loop {
        core::hint::spin_loop();
    }
}

pub fn fatal_reason(err: &StartupError) -> FatalReason {
    match err {
        StartupError::Capacity => FatalReason::ResourceExhausted,
        _ => FatalReason::StartupFailed,
    }
}

/// [boot], or report the failure and [halt].
pub fn boot_or_halt<const N: usize, const R: usize>(registry: &DeviceRegistry<'_, R>) -> Runner<N> {
    match boot(registry) {
        Ok(runner) => runner,
        Err(err) => {
            crate::error!("startup failed {:?}", err);
            firmware_functions::fatal(fatal_reason(&err));
            halt()
        }
    }
}

#[cfg(test)]
#[path = "boot_test.rs"]
mod test;
