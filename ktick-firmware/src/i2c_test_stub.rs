extern crate std;

use core::sync::atomic::{AtomicBool, Ordering};
use std::{
    sync::{Arc, Mutex},
    vec::Vec,
};

use embedded_hal_async::i2c::{self, ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};

#[derive(Debug)]
pub struct I2cStubError;

impl i2c::Error for I2cStubError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
    }
}

/// Records every transaction as its concatenated write bytes, for both the blocking and the
/// async bus traits. Clones share the same log.
#[derive(Clone, Default)]
pub struct I2cStub {
    log: Arc<Mutex<Vec<(u8, Vec<u8>)>>>,
    fail: Arc<AtomicBool>,
}

impl I2cStub {
    pub fn log(&self) -> Vec<(u8, Vec<u8>)> {
        self.log.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn take(&self) -> Vec<Vec<u8>> {
        match self.log.lock() {
            Ok(mut l) => l.drain(..).map(|(_, b)| b).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Make every following transaction fail.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::Relaxed);
    }

    fn record(&self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), I2cStubError> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(I2cStubError);
        }
        let mut bytes = Vec::new();
        for op in operations.iter_mut() {
            match op {
                Operation::Write(data) => bytes.extend_from_slice(data),
                Operation::Read(buf) => buf.fill(0),
            }
        }
        if let Ok(mut l) = self.log.lock() {
            l.push((address, bytes));
        }
        Ok(())
    }
}

impl ErrorType for I2cStub {
    type Error = I2cStubError;
}

impl I2c for I2cStub {
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.record(address, operations)
    }
}

impl embedded_hal::i2c::I2c for I2cStub {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.record(address, operations)
    }
}
