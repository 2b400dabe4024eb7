//! Decoded PTP messages.
//!
//! [`Message`] is the in-memory form of one frame: the common header, a typed
//! body, and — for frames that crossed the event channel — the hardware
//! timestamp attached at ingress or egress. The port retains messages through
//! `Rc<Message>` handles (`last_sync`, `last_follow_up`, the outstanding
//! Delay_Req, and each foreign-master queue); dropping the last handle frees
//! the frame.

use std::fmt;

use crate::bmca::{Dataset, Priority1, Priority2, StepsRemoved};
use crate::clock::{ClockIdentity, ClockQuality};
use crate::port::{DomainNumber, PortIdentity};
use crate::result::ProtocolError;
use crate::time::{Correction, Instant, LogInterval, TimeStamp};
use crate::wire;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Sync,
    DelayReq,
    PdelayReq,
    PdelayResp,
    FollowUp,
    DelayResp,
    PdelayRespFollowUp,
    Announce,
    Signaling,
    Management,
}

impl MessageType {
    pub fn from_nibble(nibble: u8) -> Result<Self, ProtocolError> {
        match nibble {
            0x0 => Ok(MessageType::Sync),
            0x1 => Ok(MessageType::DelayReq),
            0x2 => Ok(MessageType::PdelayReq),
            0x3 => Ok(MessageType::PdelayResp),
            0x8 => Ok(MessageType::FollowUp),
            0x9 => Ok(MessageType::DelayResp),
            0xA => Ok(MessageType::PdelayRespFollowUp),
            0xB => Ok(MessageType::Announce),
            0xC => Ok(MessageType::Signaling),
            0xD => Ok(MessageType::Management),
            other => Err(ProtocolError::UnknownMessageType(other)),
        }
    }

    pub fn nibble(&self) -> u8 {
        match self {
            MessageType::Sync => 0x0,
            MessageType::DelayReq => 0x1,
            MessageType::PdelayReq => 0x2,
            MessageType::PdelayResp => 0x3,
            MessageType::FollowUp => 0x8,
            MessageType::DelayResp => 0x9,
            MessageType::PdelayRespFollowUp => 0xA,
            MessageType::Announce => 0xB,
            MessageType::Signaling => 0xC,
            MessageType::Management => 0xD,
        }
    }

    /// Legacy control field value for this message class.
    pub fn control(&self) -> u8 {
        match self {
            MessageType::Sync => 0,
            MessageType::DelayReq => 1,
            MessageType::FollowUp => 2,
            MessageType::DelayResp => 3,
            MessageType::Management => 4,
            _ => 5,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MessageType::Sync => "Sync",
            MessageType::DelayReq => "DelayReq",
            MessageType::PdelayReq => "PdelayReq",
            MessageType::PdelayResp => "PdelayResp",
            MessageType::FollowUp => "FollowUp",
            MessageType::DelayResp => "DelayResp",
            MessageType::PdelayRespFollowUp => "PdelayRespFollowUp",
            MessageType::Announce => "Announce",
            MessageType::Signaling => "Signaling",
            MessageType::Management => "Management",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SequenceId(u16);

impl SequenceId {
    pub fn new(id: u16) -> Self {
        Self(id)
    }

    pub fn raw(&self) -> u16 {
        self.0
    }

    pub fn next(&self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl From<u16> for SequenceId {
    fn from(id: u16) -> Self {
        Self(id)
    }
}

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The two flag bytes of the common header. Only the twoStep bit matters to
/// the engine; the rest is carried through verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MessageFlags([u8; 2]);

impl MessageFlags {
    const TWO_STEP_BIT: u8 = 0x02;

    pub fn from_wire(bytes: [u8; 2]) -> Self {
        Self(bytes)
    }

    pub fn two_step() -> Self {
        Self([Self::TWO_STEP_BIT, 0])
    }

    pub fn none() -> Self {
        Self([0, 0])
    }

    pub fn to_wire(&self) -> [u8; 2] {
        self.0
    }

    pub fn is_two_step(&self) -> bool {
        self.0[0] & Self::TWO_STEP_BIT != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub message_type: MessageType,
    pub version: u8,
    pub message_length: u16,
    pub domain: DomainNumber,
    pub flags: MessageFlags,
    pub correction: Correction,
    pub source_port_identity: PortIdentity,
    pub sequence_id: SequenceId,
    pub control: u8,
    pub log_message_interval: LogInterval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnounceBody {
    pub origin_timestamp: TimeStamp,
    pub current_utc_offset: i16,
    pub grandmaster_priority1: Priority1,
    pub grandmaster_clock_quality: ClockQuality,
    pub grandmaster_priority2: Priority2,
    pub grandmaster_identity: ClockIdentity,
    pub steps_removed: StepsRemoved,
    pub time_source: u8,
}

impl AnnounceBody {
    /// Compare the grandmaster fields two Announces from the same sender are
    /// judged on: priorities, quality, identity, and stepsRemoved. A change
    /// in any of them must re-trigger the state decision.
    pub fn same_grandmaster_fields(&self, other: &AnnounceBody) -> bool {
        self.grandmaster_priority1 == other.grandmaster_priority1
            && self.grandmaster_clock_quality == other.grandmaster_clock_quality
            && self.grandmaster_priority2 == other.grandmaster_priority2
            && self.grandmaster_identity == other.grandmaster_identity
            && self.steps_removed == other.steps_removed
    }

    pub fn to_dataset(&self, sender: PortIdentity, receiver: PortIdentity) -> Dataset {
        Dataset {
            priority1: self.grandmaster_priority1,
            identity: self.grandmaster_identity,
            quality: self.grandmaster_clock_quality,
            priority2: self.grandmaster_priority2,
            steps_removed: self.steps_removed,
            sender,
            receiver,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRespBody {
    pub receive_timestamp: TimeStamp,
    pub requesting_port_identity: PortIdentity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageBody {
    Announce(AnnounceBody),
    Sync { origin_timestamp: TimeStamp },
    FollowUp { precise_origin_timestamp: TimeStamp },
    DelayReq { origin_timestamp: TimeStamp },
    DelayResp(DelayRespBody),
    /// Recognized but unmodelled classes (peer delay, signaling, management).
    Unhandled,
}

/// Timestamp attached by the transport: the event-channel hardware stamp plus
/// the host-local capture time used to age foreign-master records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HwTimestamp {
    pub ts: TimeStamp,
    pub host: Instant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: MessageHeader,
    pub body: MessageBody,
    pub hwts: Option<HwTimestamp>,
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        self.header.message_type
    }

    pub fn sequence_id(&self) -> SequenceId {
        self.header.sequence_id
    }

    pub fn source_port_identity(&self) -> PortIdentity {
        self.header.source_port_identity
    }

    pub fn correction(&self) -> Correction {
        self.header.correction
    }

    pub fn log_message_interval(&self) -> LogInterval {
        self.header.log_message_interval
    }

    pub fn is_two_step(&self) -> bool {
        self.header.flags.is_two_step()
    }

    pub fn announce(&self) -> Option<&AnnounceBody> {
        match &self.body {
            MessageBody::Announce(body) => Some(body),
            _ => None,
        }
    }

    pub fn delay_resp(&self) -> Option<&DelayRespBody> {
        match &self.body {
            MessageBody::DelayResp(body) => Some(body),
            _ => None,
        }
    }

    /// The timestamp carried inside the message body, if the class has one.
    pub fn wire_timestamp(&self) -> Option<TimeStamp> {
        match &self.body {
            MessageBody::Announce(body) => Some(body.origin_timestamp),
            MessageBody::Sync { origin_timestamp } => Some(*origin_timestamp),
            MessageBody::FollowUp {
                precise_origin_timestamp,
            } => Some(*precise_origin_timestamp),
            MessageBody::DelayReq { origin_timestamp } => Some(*origin_timestamp),
            MessageBody::DelayResp(body) => Some(body.receive_timestamp),
            MessageBody::Unhandled => None,
        }
    }

    fn header(
        message_type: MessageType,
        message_length: u16,
        domain: DomainNumber,
        flags: MessageFlags,
        correction: Correction,
        source_port_identity: PortIdentity,
        sequence_id: SequenceId,
        log_message_interval: LogInterval,
    ) -> MessageHeader {
        MessageHeader {
            message_type,
            version: wire::PTP_VERSION,
            message_length,
            domain,
            flags,
            correction,
            source_port_identity,
            sequence_id,
            control: message_type.control(),
            log_message_interval,
        }
    }

    /// Build an outbound Delay_Req. The interval field carries the
    /// "unspecified" sentinel as required for requests.
    pub fn delay_request(
        domain: DomainNumber,
        source_port_identity: PortIdentity,
        sequence_id: SequenceId,
    ) -> Self {
        Self {
            header: Self::header(
                MessageType::DelayReq,
                wire::DELAY_REQ_LEN as u16,
                domain,
                MessageFlags::none(),
                Correction::ZERO,
                source_port_identity,
                sequence_id,
                LogInterval::UNSPECIFIED,
            ),
            body: MessageBody::DelayReq {
                origin_timestamp: TimeStamp::new(0, 0),
            },
            hwts: None,
        }
    }

    /// Build the Delay_Resp answering a Delay_Req: domain, correction and
    /// sequence id are copied from the request, the receive timestamp is the
    /// request's ingress hardware stamp.
    pub fn delay_response(
        domain: DomainNumber,
        correction: Correction,
        source_port_identity: PortIdentity,
        sequence_id: SequenceId,
        log_message_interval: LogInterval,
        receive_timestamp: TimeStamp,
        requesting_port_identity: PortIdentity,
    ) -> Self {
        Self {
            header: Self::header(
                MessageType::DelayResp,
                wire::DELAY_RESP_LEN as u16,
                domain,
                MessageFlags::none(),
                correction,
                source_port_identity,
                sequence_id,
                log_message_interval,
            ),
            body: MessageBody::DelayResp(DelayRespBody {
                receive_timestamp,
                requesting_port_identity,
            }),
            hwts: None,
        }
    }

    pub fn announce_message(
        domain: DomainNumber,
        source_port_identity: PortIdentity,
        sequence_id: SequenceId,
        log_message_interval: LogInterval,
        body: AnnounceBody,
    ) -> Self {
        Self {
            header: Self::header(
                MessageType::Announce,
                wire::ANNOUNCE_LEN as u16,
                domain,
                MessageFlags::none(),
                Correction::ZERO,
                source_port_identity,
                sequence_id,
                log_message_interval,
            ),
            body: MessageBody::Announce(body),
            hwts: None,
        }
    }

    pub fn sync(
        domain: DomainNumber,
        source_port_identity: PortIdentity,
        sequence_id: SequenceId,
        two_step: bool,
        origin_timestamp: TimeStamp,
        correction: Correction,
    ) -> Self {
        let flags = if two_step {
            MessageFlags::two_step()
        } else {
            MessageFlags::none()
        };
        Self {
            header: Self::header(
                MessageType::Sync,
                wire::SYNC_LEN as u16,
                domain,
                flags,
                correction,
                source_port_identity,
                sequence_id,
                LogInterval::new(0),
            ),
            body: MessageBody::Sync { origin_timestamp },
            hwts: None,
        }
    }

    pub fn follow_up(
        domain: DomainNumber,
        source_port_identity: PortIdentity,
        sequence_id: SequenceId,
        precise_origin_timestamp: TimeStamp,
        correction: Correction,
    ) -> Self {
        Self {
            header: Self::header(
                MessageType::FollowUp,
                wire::FOLLOW_UP_LEN as u16,
                domain,
                MessageFlags::none(),
                correction,
                source_port_identity,
                sequence_id,
                LogInterval::new(0),
            ),
            body: MessageBody::FollowUp {
                precise_origin_timestamp,
            },
            hwts: None,
        }
    }
}
