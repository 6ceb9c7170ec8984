extern crate std;

use core::sync::atomic::{AtomicBool, Ordering};
use embedded_hal::digital::{Error, ErrorKind, ErrorType, InputPin};
use std::sync::Arc;

#[derive(Debug)]
pub struct TestError;

impl Error for TestError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

struct PinShared {
    is_high: AtomicBool,
    fail: AtomicBool,
}

/// Input line whose level is driven by the test. Clones share the same line.
#[derive(Clone)]
pub struct Pin(Arc<PinShared>);

impl Pin {
    pub fn new(is_high: bool) -> Self {
        Self(Arc::new(PinShared {
            is_high: AtomicBool::new(is_high),
            fail: AtomicBool::new(false),
        }))
    }

    pub fn set(&self, is_high: bool) {
        self.0.is_high.store(is_high, Ordering::Relaxed);
    }

    pub fn level(&self) -> bool {
        self.0.is_high.load(Ordering::Relaxed)
    }

    /// Make every following read fail.
    pub fn fail(&self, fail: bool) {
        self.0.fail.store(fail, Ordering::Relaxed);
    }
}

impl core::fmt::Debug for Pin {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Pin").field("is_high", &self.level()).finish()
    }
}

impl ErrorType for Pin {
    type Error = TestError;
}

impl InputPin for Pin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        if self.0.fail.load(Ordering::Relaxed) {
            return Err(TestError);
        }
        Ok(self.level())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|h| !h)
    }
}
