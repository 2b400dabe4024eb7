//! Core [`Transport`] implementation over a pair of datagram sockets.
//!
//! Timestamping is software: egress and ingress stamps are sampled from the
//! daemon's clock at send/receive time. A hardware-timestamping transport
//! would fill the same [`HwTimestamp`]s from the NIC instead.

use std::rc::Rc;
use std::time::Instant as StdInstant;

use minptp::message::HwTimestamp;
use minptp::time::Instant;
use minptp::transport::{FdIndex, Timestamping, Transport, TransportError};

use crate::clock::VirtualClock;
use crate::net::NetworkSocket;

pub struct UdpTransport<N: NetworkSocket> {
    event: Rc<N>,
    general: Rc<N>,
    clock: Rc<VirtualClock>,
    start: StdInstant,
}

impl<N: NetworkSocket> UdpTransport<N> {
    pub fn new(event: Rc<N>, general: Rc<N>, clock: Rc<VirtualClock>) -> Self {
        Self {
            event,
            general,
            clock,
            start: StdInstant::now(),
        }
    }

    fn stamp(&self) -> HwTimestamp {
        HwTimestamp {
            ts: self.clock.now(),
            host: Instant::from_nanos(self.start.elapsed().as_nanos() as u64),
        }
    }
}

impl<N: NetworkSocket> Transport for UdpTransport<N> {
    fn open(&self, name: &str, timestamping: Timestamping) -> Result<(), TransportError> {
        if timestamping == Timestamping::Hardware {
            tracing::warn!("{name}: hardware timestamping unavailable, using software stamps");
        }
        tracing::info!("{name}: transport up");
        Ok(())
    }

    fn close(&self) {}

    fn send_event(&self, buf: &[u8]) -> Result<HwTimestamp, TransportError> {
        match self.event.try_send(buf) {
            Ok(_) => Ok(self.stamp()),
            Err(e) => {
                tracing::warn!(error = %e, "event socket send error");
                Err(TransportError::Send)
            }
        }
    }

    fn send_general(&self, buf: &[u8]) -> Result<(), TransportError> {
        match self.general.try_send(buf) {
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::warn!(error = %e, "general socket send error");
                Err(TransportError::Send)
            }
        }
    }

    fn recv(
        &self,
        fd_index: FdIndex,
        buf: &mut [u8],
    ) -> Result<(usize, HwTimestamp), TransportError> {
        let socket: &N = match fd_index {
            FdIndex::Event => &self.event,
            FdIndex::General => &self.general,
            _ => return Err(TransportError::Recv),
        };
        match socket.try_recv(buf) {
            Ok(size) => Ok((size, self.stamp())),
            Err(e) => {
                tracing::warn!(error = %e, "socket receive error");
                Err(TransportError::Recv)
            }
        }
    }
}
