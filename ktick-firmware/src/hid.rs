//! Interrupt endpoint plumbing for HID reports.

use core::sync::atomic::{AtomicUsize, Ordering};

use embassy_usb::{
    class::hid::ReadError,
    driver::{Driver, Endpoint, EndpointError, EndpointIn, EndpointOut},
};

use crate::usb::LedState;

/// Writes input reports of at most `N` bytes.
pub struct HidWriter<'d, D: Driver<'d>, const N: usize> {
    ep_in: D::EndpointIn,
}

impl<'d, D: Driver<'d>, const N: usize> HidWriter<'d, D, N> {
    pub fn new(ep_in: D::EndpointIn) -> Self {
        Self { ep_in }
    }

    pub async fn write(&mut self, report: &[u8]) -> Result<(), EndpointError> {
        if report.len() > N {
            return Err(EndpointError::BufferOverflow);
        }

        let max_packet_size = usize::from(self.ep_in.info().max_packet_size);
        // a short report that fills its last packet exactly needs a terminating ZLP
        let zlp_needed = report.len() < N && report.len() % max_packet_size == 0;
        for chunk in report.chunks(max_packet_size) {
            self.ep_in.write(chunk).await?;
        }

        if zlp_needed {
            self.ep_in.write(&[]).await?;
        }

        Ok(())
    }
}

/// Receives output reports (keyboard LEDs) from the interrupt OUT endpoint.
pub struct HidReader<'d, D: Driver<'d>, const N: usize> {
    ep_out: D::EndpointOut,
    offset: &'d AtomicUsize,
}

impl<'d, D: Driver<'d>, const N: usize> HidReader<'d, D, N> {
    pub fn new(ep_out: D::EndpointOut, offset: &'d AtomicUsize) -> Self {
        Self { ep_out, offset }
    }

    /// Store every LED report the host sends.
    pub async fn run(mut self, leds: &LedState) -> ! {
        let mut buf = [0; N];
        loop {
            match self.read(&mut buf).await {
                Ok(len) if len > 0 => leds.set(buf[0]),
                Ok(_) => {}
                Err(ReadError::BufferOverflow) => {
                    crate::warn!("output report longer than {}", N);
                }
                Err(ReadError::Disabled) => self.ep_out.wait_enabled().await,
                Err(ReadError::Sync(_)) => {}
            }
        }
    }

    /// Read one output report, reassembling it from several packets when `N` exceeds the
    /// endpoint's packet size. If a previous read was cancelled part way, returns
    /// [ReadError::Sync] covering the part of `buf` filled by this call.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ReadError> {
        if N == 0 || buf.len() < N {
            return Err(ReadError::BufferOverflow);
        }

        let max_packet_size = usize::from(self.ep_out.info().max_packet_size);
        let starting_offset = self.offset.load(Ordering::Acquire);
        let mut total = starting_offset;
        loop {
            for chunk in buf[starting_offset..N].chunks_mut(max_packet_size) {
                match self.ep_out.read(chunk).await {
                    Ok(size) => {
                        total += size;
                        if size < max_packet_size || total == N {
                            self.offset.store(0, Ordering::Release);
                            break;
                        }
                        self.offset.store(total, Ordering::Release);
                    }
                    Err(err) => {
                        self.offset.store(0, Ordering::Release);
                        return Err(err.into());
                    }
                }
            }

            // hosts may send ZLPs the protocol does not need
            if total > 0 {
                break;
            }
        }

        if starting_offset > 0 {
            Err(ReadError::Sync(starting_offset..total))
        } else {
            Ok(total)
        }
    }
}
