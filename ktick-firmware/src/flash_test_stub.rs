use embedded_storage::nor_flash::{ErrorType, NorFlashError, NorFlashErrorKind, ReadNorFlash};

#[derive(Debug)]
pub enum FlashStubError {
    OutOfBounds,
    Unknown,
}

impl NorFlashError for FlashStubError {
    fn kind(&self) -> NorFlashErrorKind {
        match self {
            FlashStubError::OutOfBounds => NorFlashErrorKind::OutOfBounds,
            FlashStubError::Unknown => NorFlashErrorKind::Other,
        }
    }
}

/// Read-only flash image. Reads at or past `fail_from` report an error.
pub struct NorFlashStub<const FLASH_SIZE: usize> {
    pub buf: [u8; FLASH_SIZE],
    pub fail_from: Option<u32>,
}

impl<const FLASH_SIZE: usize> Default for NorFlashStub<FLASH_SIZE> {
    fn default() -> Self {
        Self {
            buf: [0xff; FLASH_SIZE],
            fail_from: None,
        }
    }
}

impl<const FLASH_SIZE: usize> NorFlashStub<FLASH_SIZE> {
    pub fn put(&mut self, offset: usize, bytes: &[u8]) {
        self.buf[offset..offset + bytes.len()].copy_from_slice(bytes);
    }
}

impl<const FLASH_SIZE: usize> ErrorType for NorFlashStub<FLASH_SIZE> {
    type Error = FlashStubError;
}

impl<const FLASH_SIZE: usize> ReadNorFlash for NorFlashStub<FLASH_SIZE> {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        if matches!(self.fail_from, Some(f) if offset >= f) {
            return Err(FlashStubError::Unknown);
        }
        let offset = offset as usize;
        let src = self
            .buf
            .get(offset..offset + bytes.len())
            .ok_or(FlashStubError::OutOfBounds)?;
        bytes.copy_from_slice(src);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.buf.len()
    }
}
