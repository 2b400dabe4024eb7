//! Fakes and fixtures shared by unit, scenario and daemon tests.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use crate::bmca::{Dataset, Priority1, Priority2, StepsRemoved};
use crate::clock::{Clock, ClockIdentity, ClockQuality};
use crate::message::{AnnounceBody, HwTimestamp, Message, SequenceId};
use crate::port::{DomainNumber, PortIdentity, PortNumber};
use crate::time::{Correction, Instant, LogInterval, TimeStamp};
use crate::timer::{Timeout, TimerHost, TimerKind};
use crate::transport::{FdIndex, Timestamping, Transport, TransportError};
use crate::wire;

impl PortIdentity {
    pub fn fake() -> Self {
        PortIdentity::new(
            ClockIdentity::new(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]),
            PortNumber::new(1),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SynchronizeCall {
    pub origin: TimeStamp,
    pub ingress: TimeStamp,
    pub correction_sync: Correction,
    pub correction_follow_up: Correction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathDelayCall {
    pub request_egress: TimeStamp,
    pub request_ingress: TimeStamp,
    pub correction: Correction,
}

/// Clock boundary that records every servo input it is handed.
pub struct FakeClock {
    identity: ClockIdentity,
    domain: DomainNumber,
    parent: RefCell<PortIdentity>,
    synchronize_calls: RefCell<Vec<SynchronizeCall>>,
    path_delay_calls: RefCell<Vec<PathDelayCall>>,
}

impl FakeClock {
    pub fn new(identity: ClockIdentity, domain: DomainNumber) -> Self {
        Self {
            identity,
            domain,
            parent: RefCell::new(PortIdentity::fake()),
            synchronize_calls: RefCell::new(Vec::new()),
            path_delay_calls: RefCell::new(Vec::new()),
        }
    }

    pub fn set_parent(&self, parent: PortIdentity) {
        *self.parent.borrow_mut() = parent;
    }

    pub fn take_synchronize_calls(&self) -> Vec<SynchronizeCall> {
        self.synchronize_calls.borrow_mut().drain(..).collect()
    }

    pub fn take_path_delay_calls(&self) -> Vec<PathDelayCall> {
        self.path_delay_calls.borrow_mut().drain(..).collect()
    }
}

impl Clock for FakeClock {
    fn identity(&self) -> ClockIdentity {
        self.identity
    }

    fn parent_identity(&self) -> PortIdentity {
        *self.parent.borrow()
    }

    fn domain_number(&self) -> DomainNumber {
        self.domain
    }

    fn synchronize(
        &self,
        origin: TimeStamp,
        ingress: TimeStamp,
        correction_sync: Correction,
        correction_follow_up: Correction,
    ) {
        self.synchronize_calls.borrow_mut().push(SynchronizeCall {
            origin,
            ingress,
            correction_sync,
            correction_follow_up,
        });
    }

    fn path_delay(
        &self,
        request_egress: TimeStamp,
        request_ingress: TimeStamp,
        correction: Correction,
    ) {
        self.path_delay_calls.borrow_mut().push(PathDelayCall {
            request_egress,
            request_ingress,
            correction,
        });
    }
}

/// Transport fake: scripted inbound frames per channel, captured outbound
/// frames, and a programmable egress timestamp.
pub struct FakeTransport {
    opened: Cell<bool>,
    fail_open: Cell<bool>,
    fail_event_send: Cell<bool>,
    fail_general_send: Cell<bool>,
    event_rx: RefCell<VecDeque<(Vec<u8>, HwTimestamp)>>,
    general_rx: RefCell<VecDeque<(Vec<u8>, HwTimestamp)>>,
    event_tx: RefCell<Vec<Vec<u8>>>,
    general_tx: RefCell<Vec<Vec<u8>>>,
    egress: Cell<HwTimestamp>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            opened: Cell::new(false),
            fail_open: Cell::new(false),
            fail_event_send: Cell::new(false),
            fail_general_send: Cell::new(false),
            event_rx: RefCell::new(VecDeque::new()),
            general_rx: RefCell::new(VecDeque::new()),
            event_tx: RefCell::new(Vec::new()),
            general_tx: RefCell::new(Vec::new()),
            egress: Cell::new(HwTimestamp {
                ts: TimeStamp::new(0, 0),
                host: Instant::from_nanos(0),
            }),
        }
    }

    pub fn is_open(&self) -> bool {
        self.opened.get()
    }

    pub fn fail_open(&self, fail: bool) {
        self.fail_open.set(fail);
    }

    pub fn fail_event_send(&self, fail: bool) {
        self.fail_event_send.set(fail);
    }

    pub fn fail_general_send(&self, fail: bool) {
        self.fail_general_send.set(fail);
    }

    /// Timestamp reported for the next event-channel send.
    pub fn set_egress(&self, hwts: HwTimestamp) {
        self.egress.set(hwts);
    }

    pub fn push_event_frame(&self, frame: Vec<u8>, hwts: HwTimestamp) {
        self.event_rx.borrow_mut().push_back((frame, hwts));
    }

    /// Queue a general-channel frame captured `host_secs` into the run. The
    /// hardware timestamp of general messages is never read by the engine.
    pub fn push_general_frame(&self, frame: Vec<u8>, host_secs: u64) {
        let hwts = HwTimestamp {
            ts: TimeStamp::new(host_secs, 0),
            host: Instant::from_secs(host_secs),
        };
        self.general_rx.borrow_mut().push_back((frame, hwts));
    }

    pub fn take_event_frames(&self) -> Vec<Vec<u8>> {
        self.event_tx.borrow_mut().drain(..).collect()
    }

    pub fn take_general_frames(&self) -> Vec<Vec<u8>> {
        self.general_tx.borrow_mut().drain(..).collect()
    }
}

impl Default for FakeTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for FakeTransport {
    fn open(&self, _name: &str, _timestamping: Timestamping) -> Result<(), TransportError> {
        if self.fail_open.get() {
            return Err(TransportError::Open);
        }
        self.opened.set(true);
        Ok(())
    }

    fn close(&self) {
        self.opened.set(false);
    }

    fn send_event(&self, buf: &[u8]) -> Result<HwTimestamp, TransportError> {
        if self.fail_event_send.get() {
            return Err(TransportError::Send);
        }
        self.event_tx.borrow_mut().push(buf.to_vec());
        Ok(self.egress.get())
    }

    fn send_general(&self, buf: &[u8]) -> Result<(), TransportError> {
        if self.fail_general_send.get() {
            return Err(TransportError::Send);
        }
        self.general_tx.borrow_mut().push(buf.to_vec());
        Ok(())
    }

    fn recv(
        &self,
        fd_index: FdIndex,
        buf: &mut [u8],
    ) -> Result<(usize, HwTimestamp), TransportError> {
        let queue = match fd_index {
            FdIndex::Event => &self.event_rx,
            FdIndex::General => &self.general_rx,
            _ => return Err(TransportError::Recv),
        };
        let (frame, hwts) = queue.borrow_mut().pop_front().ok_or(TransportError::Recv)?;
        if frame.len() > buf.len() {
            return Err(TransportError::Recv);
        }
        buf[..frame.len()].copy_from_slice(&frame);
        Ok((frame.len(), hwts))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    Restarted(TimerKind, Duration),
    Cleared(TimerKind),
}

pub struct FakeTimeout {
    kind: TimerKind,
    actions: Rc<RefCell<Vec<TimerAction>>>,
}

impl Timeout for FakeTimeout {
    fn restart(&self, delay: Duration) {
        self.actions
            .borrow_mut()
            .push(TimerAction::Restarted(self.kind, delay));
    }

    fn clear(&self) {
        self.actions.borrow_mut().push(TimerAction::Cleared(self.kind));
    }
}

/// Timer host recording every arm and clear.
pub struct FakeTimerHost {
    actions: Rc<RefCell<Vec<TimerAction>>>,
}

impl FakeTimerHost {
    pub fn new() -> Self {
        Self {
            actions: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn take_actions(&self) -> Vec<TimerAction> {
        self.actions.borrow_mut().drain(..).collect()
    }
}

impl Default for FakeTimerHost {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerHost for FakeTimerHost {
    type Timeout = FakeTimeout;

    fn timeout(&self, kind: TimerKind) -> Self::Timeout {
        FakeTimeout {
            kind,
            actions: Rc::clone(&self.actions),
        }
    }
}

/// Catalog of grandmaster datasets for tests, graded by clock quality.
#[derive(Debug, Clone, Copy)]
pub struct TestGrandmaster {
    identity: ClockIdentity,
    priority1: Priority1,
    priority2: Priority2,
    quality: ClockQuality,
    steps_removed: StepsRemoved,
}

impl TestGrandmaster {
    pub fn high_grade() -> Self {
        Self {
            identity: ClockIdentity::new(&[0x00, 0x1E, 0xC6, 0xFF, 0xFE, 0x90, 0x78, 0x56]),
            priority1: Priority1::new(128),
            priority2: Priority2::new(128),
            quality: ClockQuality::new(6, 0x21, 0x4E5D),
            steps_removed: StepsRemoved::new(0),
        }
    }

    pub fn mid_grade() -> Self {
        Self {
            identity: ClockIdentity::new(&[0x00, 0x1F, 0xC7, 0xFF, 0xFE, 0x91, 0x89, 0x67]),
            priority1: Priority1::new(128),
            priority2: Priority2::new(128),
            quality: ClockQuality::new(187, 0x2F, 0xFFFF),
            steps_removed: StepsRemoved::new(0),
        }
    }

    pub fn low_grade() -> Self {
        Self {
            identity: ClockIdentity::new(&[0x00, 0x20, 0xC8, 0xFF, 0xFE, 0x92, 0x90, 0x78]),
            priority1: Priority1::new(200),
            priority2: Priority2::new(200),
            quality: ClockQuality::new(248, 0xFE, 0xFFFF),
            steps_removed: StepsRemoved::new(0),
        }
    }

    pub fn with_priority1(self, priority1: u8) -> Self {
        Self {
            priority1: Priority1::new(priority1),
            ..self
        }
    }

    pub fn identity(&self) -> ClockIdentity {
        self.identity
    }

    pub fn quality(&self) -> ClockQuality {
        self.quality
    }

    pub fn dataset(&self, sender: PortIdentity, receiver: PortIdentity) -> Dataset {
        Dataset {
            priority1: self.priority1,
            identity: self.identity,
            quality: self.quality,
            priority2: self.priority2,
            steps_removed: self.steps_removed,
            sender,
            receiver,
        }
    }

    pub fn announce(
        &self,
        domain: DomainNumber,
        sender: PortIdentity,
        sequence_id: SequenceId,
        log_message_interval: LogInterval,
    ) -> Message {
        Message::announce_message(
            domain,
            sender,
            sequence_id,
            log_message_interval,
            AnnounceBody {
                origin_timestamp: TimeStamp::new(0, 0),
                current_utc_offset: 37,
                grandmaster_priority1: self.priority1,
                grandmaster_clock_quality: self.quality,
                grandmaster_priority2: self.priority2,
                grandmaster_identity: self.identity,
                steps_removed: self.steps_removed,
                time_source: 0xA0,
            },
        )
    }

    /// Wire-encoded Announce with domain 0 and a 2-second announce interval.
    pub fn announce_frame(&self, sender: PortIdentity, sequence_id: SequenceId) -> Vec<u8> {
        let msg = self.announce(
            DomainNumber::new(0),
            sender,
            sequence_id,
            LogInterval::new(1),
        );
        encode_frame(&msg)
    }
}

/// Encode any message into a fresh frame buffer.
pub fn encode_frame(msg: &Message) -> Vec<u8> {
    let mut buf = [0u8; wire::MAX_MESSAGE_LEN];
    let len = wire::encode(msg, &mut buf).expect("test message encodes");
    buf[..len].to_vec()
}
