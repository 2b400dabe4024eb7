//! Transport seam.
//!
//! A [`Transport`] hides the network below the port: two channels (event
//! messages on one, general messages on the other), timestamping on the
//! event channel, and non-blocking receive keyed by the descriptor slot the
//! external multiplexer reported ready.

use std::fmt;
use std::rc::Rc;

use crate::message::HwTimestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timestamping {
    Software,
    Hardware,
}

/// Fixed descriptor slots of one port.
///
/// The multiplexer polls the port's descriptors and passes the slot that
/// fired to `Port::event`. The two network slots come from the transport;
/// the two timer slots are owned by the port itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FdIndex {
    Event,
    General,
    AnnounceTimer,
    DelayTimer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    Open,
    Send,
    Recv,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Open => f.write_str("transport open failed"),
            TransportError::Send => f.write_str("transport send failed"),
            TransportError::Recv => f.write_str("transport receive failed"),
        }
    }
}

impl std::error::Error for TransportError {}

pub trait Transport {
    /// Bring the transport up for interface `name` with the requested
    /// timestamping mode.
    fn open(&self, name: &str, timestamping: Timestamping) -> Result<(), TransportError>;

    fn close(&self);

    /// Send an event message, capturing its egress timestamp.
    fn send_event(&self, buf: &[u8]) -> Result<HwTimestamp, TransportError>;

    /// Send a general message. No timestamp is captured.
    fn send_general(&self, buf: &[u8]) -> Result<(), TransportError>;

    /// Non-blocking receive from a network slot, returning the frame length
    /// and the ingress timestamp.
    fn recv(&self, fd_index: FdIndex, buf: &mut [u8]) -> Result<(usize, HwTimestamp), TransportError>;
}

impl<T: Transport> Transport for Rc<T> {
    fn open(&self, name: &str, timestamping: Timestamping) -> Result<(), TransportError> {
        self.as_ref().open(name, timestamping)
    }

    fn close(&self) {
        self.as_ref().close()
    }

    fn send_event(&self, buf: &[u8]) -> Result<HwTimestamp, TransportError> {
        self.as_ref().send_event(buf)
    }

    fn send_general(&self, buf: &[u8]) -> Result<(), TransportError> {
        self.as_ref().send_general(buf)
    }

    fn recv(&self, fd_index: FdIndex, buf: &mut [u8]) -> Result<(usize, HwTimestamp), TransportError> {
        self.as_ref().recv(fd_index, buf)
    }
}
