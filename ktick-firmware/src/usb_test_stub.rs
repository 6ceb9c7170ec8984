extern crate std;

use core::cell::Cell;
use std::{rc::Rc, vec::Vec};

use embassy_sync::{blocking_mutex::raw::NoopRawMutex, channel::Channel};
use embassy_usb::driver::{
    Bus, ControlPipe, Driver, Endpoint, EndpointAddress, EndpointAllocError, EndpointError,
    EndpointIn, EndpointInfo, EndpointOut, EndpointType, Event, Unsupported,
};

/// Packets written to a stub endpoint, oldest first.
#[derive(Clone)]
pub struct Packets(Rc<Channel<NoopRawMutex, Vec<u8>, 16>>);

impl Packets {
    pub fn next(&self) -> Option<Vec<u8>> {
        self.0.try_receive().ok()
    }

    pub fn all(&self) -> Vec<Vec<u8>> {
        core::iter::from_fn(|| self.next()).collect()
    }

    pub async fn push(&self, packet: Vec<u8>) {
        self.0.send(packet).await;
    }
}

impl Default for Packets {
    fn default() -> Self {
        Self(Rc::new(Channel::new()))
    }
}

pub struct StubEndpointIn {
    pub packets: Packets,
    /// When set, writes fail as if the host had gone away.
    pub unplugged: Rc<Cell<bool>>,
    pub info: EndpointInfo,
}

impl StubEndpointIn {
    pub fn with_packet_size(max_packet_size: u16) -> Self {
        Self {
            packets: Packets::default(),
            unplugged: Rc::default(),
            info: EndpointInfo {
                addr: EndpointAddress::from(0x81),
                ep_type: EndpointType::Interrupt,
                max_packet_size,
                interval_ms: 1,
            },
        }
    }
}

impl Default for StubEndpointIn {
    fn default() -> Self {
        Self::with_packet_size(64)
    }
}

impl Endpoint for StubEndpointIn {
    fn info(&self) -> &EndpointInfo {
        &self.info
    }

    async fn wait_enabled(&mut self) {}
}

impl EndpointIn for StubEndpointIn {
    async fn write(&mut self, buf: &[u8]) -> Result<(), EndpointError> {
        if self.unplugged.get() {
            return Err(EndpointError::Disabled);
        }
        self.packets.push(Vec::from(buf)).await;
        Ok(())
    }
}

pub struct StubEndpointOut {
    pub packets: Packets,
    pub info: EndpointInfo,
}

impl Default for StubEndpointOut {
    fn default() -> Self {
        Self {
            packets: Packets::default(),
            info: EndpointInfo {
                addr: EndpointAddress::from(0x01),
                ep_type: EndpointType::Interrupt,
                max_packet_size: 64,
                interval_ms: 1,
            },
        }
    }
}

impl Endpoint for StubEndpointOut {
    fn info(&self) -> &EndpointInfo {
        &self.info
    }

    async fn wait_enabled(&mut self) {}
}

impl EndpointOut for StubEndpointOut {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, EndpointError> {
        let packet = self.packets.0.receive().await;
        let len = packet.len().min(buf.len());
        buf[..len].copy_from_slice(&packet[..len]);
        Ok(len)
    }
}

pub struct StubBus;

impl Bus for StubBus {
    async fn enable(&mut self) {}

    async fn disable(&mut self) {}

    async fn poll(&mut self) -> Event {
        unimplemented!()
    }

    fn endpoint_set_enabled(&mut self, _ep_addr: EndpointAddress, _enabled: bool) {}

    fn endpoint_set_stalled(&mut self, _ep_addr: EndpointAddress, _stalled: bool) {}

    fn endpoint_is_stalled(&mut self, _ep_addr: EndpointAddress) -> bool {
        false
    }

    async fn remote_wakeup(&mut self) -> Result<(), Unsupported> {
        Err(Unsupported)
    }
}

pub struct StubControlPipe;

impl ControlPipe for StubControlPipe {
    fn max_packet_size(&self) -> usize {
        64
    }

    async fn setup(&mut self) -> [u8; 8] {
        unimplemented!()
    }

    async fn data_out(
        &mut self,
        _buf: &mut [u8],
        _first: bool,
        _last: bool,
    ) -> Result<usize, EndpointError> {
        unimplemented!()
    }

    async fn data_in(&mut self, _data: &[u8], _first: bool, _last: bool) -> Result<(), EndpointError> {
        unimplemented!()
    }

    async fn accept(&mut self) {}

    async fn reject(&mut self) {}

    async fn accept_set_address(&mut self, _addr: u8) {}
}

/// Only the endpoint types are used; reporters and readers are built from stub endpoints
/// directly.
pub struct StubDriver;

impl Driver<'_> for StubDriver {
    type EndpointOut = StubEndpointOut;
    type EndpointIn = StubEndpointIn;
    type ControlPipe = StubControlPipe;
    type Bus = StubBus;

    fn alloc_endpoint_out(
        &mut self,
        _ep_type: EndpointType,
        _max_packet_size: u16,
        _interval_ms: u8,
    ) -> Result<Self::EndpointOut, EndpointAllocError> {
        Ok(StubEndpointOut::default())
    }

    fn alloc_endpoint_in(
        &mut self,
        _ep_type: EndpointType,
        max_packet_size: u16,
        _interval_ms: u8,
    ) -> Result<Self::EndpointIn, EndpointAllocError> {
        Ok(StubEndpointIn::with_packet_size(max_packet_size))
    }

    fn start(self, _control_max_packet_size: u16) -> (Self::Bus, Self::ControlPipe) {
        (StubBus, StubControlPipe)
    }
}
