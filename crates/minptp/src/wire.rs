//! PTPv2 wire format.
//!
//! The common header is 34 bytes; bodies follow immediately. All multi-byte
//! fields are big-endian and timestamps use the
//! `seconds_msb:16 | seconds_lsb:32 | nanoseconds:32` split.

use crate::bmca::{Priority1, Priority2, StepsRemoved};
use crate::clock::{ClockIdentity, ClockQuality};
use crate::message::{
    AnnounceBody, DelayRespBody, HwTimestamp, Message, MessageBody, MessageFlags, MessageHeader,
    MessageType, SequenceId,
};
use crate::port::{DomainNumber, PortIdentity, PortNumber};
use crate::result::{ParseError, ProtocolError, Result};
use crate::time::{Correction, LogInterval, TimeStamp};

pub const PTP_VERSION: u8 = 2;

pub const HEADER_LEN: usize = 34;
pub const SYNC_LEN: usize = 44;
pub const DELAY_REQ_LEN: usize = 44;
pub const FOLLOW_UP_LEN: usize = 44;
pub const DELAY_RESP_LEN: usize = 54;
pub const ANNOUNCE_LEN: usize = 64;

/// Receive buffer size; comfortably larger than any message the engine
/// handles.
pub const MAX_MESSAGE_LEN: usize = 128;

fn read_timestamp(buf: &[u8], at: usize, field: &'static str) -> Result<TimeStamp> {
    let slice = buf
        .get(at..at + 10)
        .ok_or(ParseError::PayloadTooShort {
            field,
            expected: 10,
            found: buf.len().saturating_sub(at),
        })?;
    let mut wire = [0u8; 10];
    wire.copy_from_slice(slice);
    Ok(TimeStamp::from_wire(&wire)?)
}

fn read_port_identity(buf: &[u8], at: usize, field: &'static str) -> Result<PortIdentity> {
    let slice = buf
        .get(at..at + 10)
        .ok_or(ParseError::PayloadTooShort {
            field,
            expected: 10,
            found: buf.len().saturating_sub(at),
        })?;
    let mut identity = [0u8; 8];
    identity.copy_from_slice(&slice[0..8]);
    let port_number = u16::from_be_bytes([slice[8], slice[9]]);
    Ok(PortIdentity::new(
        ClockIdentity::new(&identity),
        PortNumber::new(port_number),
    ))
}

fn write_timestamp(buf: &mut [u8], at: usize, ts: TimeStamp) {
    buf[at..at + 10].copy_from_slice(&ts.to_wire());
}

fn write_port_identity(buf: &mut [u8], at: usize, identity: PortIdentity) {
    buf[at..at + 8].copy_from_slice(identity.clock_identity().as_bytes());
    buf[at + 8..at + 10].copy_from_slice(&identity.port_number().value().to_be_bytes());
}

/// Decode one received frame.
///
/// `hwts` is the timestamp the transport attached at ingress; it is carried
/// into the resulting [`Message`] untouched. Frames longer than the declared
/// message length are accepted (link-layer padding); shorter ones are not.
pub fn decode(buf: &[u8], hwts: Option<HwTimestamp>) -> Result<Message> {
    if buf.len() < HEADER_LEN {
        return Err(ParseError::HeaderTooShort { found: buf.len() }.into());
    }

    let version = buf[1] & 0x0f;
    if version != PTP_VERSION {
        return Err(ProtocolError::UnsupportedPtpVersion(version).into());
    }

    let message_type = MessageType::from_nibble(buf[0] & 0x0f)?;
    let message_length = u16::from_be_bytes([buf[2], buf[3]]);
    if (message_length as usize) < HEADER_LEN || buf.len() < message_length as usize {
        return Err(ParseError::LengthMismatch {
            declared: message_length as usize,
            actual: buf.len(),
        }
        .into());
    }
    let buf = &buf[..message_length as usize];

    let correction = Correction::from_raw(i64::from_be_bytes([
        buf[8], buf[9], buf[10], buf[11], buf[12], buf[13], buf[14], buf[15],
    ]));

    let header = MessageHeader {
        message_type,
        version,
        message_length,
        domain: DomainNumber::new(buf[4]),
        flags: MessageFlags::from_wire([buf[6], buf[7]]),
        correction,
        source_port_identity: read_port_identity(buf, 20, "sourcePortIdentity")?,
        sequence_id: SequenceId::new(u16::from_be_bytes([buf[30], buf[31]])),
        control: buf[32],
        log_message_interval: LogInterval::new(buf[33] as i8),
    };

    let body = match message_type {
        MessageType::Sync => MessageBody::Sync {
            origin_timestamp: read_timestamp(buf, HEADER_LEN, "originTimestamp")?,
        },
        MessageType::DelayReq => MessageBody::DelayReq {
            origin_timestamp: read_timestamp(buf, HEADER_LEN, "originTimestamp")?,
        },
        MessageType::FollowUp => MessageBody::FollowUp {
            precise_origin_timestamp: read_timestamp(buf, HEADER_LEN, "preciseOriginTimestamp")?,
        },
        MessageType::DelayResp => MessageBody::DelayResp(DelayRespBody {
            receive_timestamp: read_timestamp(buf, HEADER_LEN, "receiveTimestamp")?,
            requesting_port_identity: read_port_identity(buf, 44, "requestingPortIdentity")?,
        }),
        MessageType::Announce => decode_announce(buf)?,
        _ => MessageBody::Unhandled,
    };

    Ok(Message { header, body, hwts })
}

fn decode_announce(buf: &[u8]) -> Result<MessageBody> {
    if buf.len() < ANNOUNCE_LEN {
        return Err(ParseError::PayloadTooShort {
            field: "announce",
            expected: ANNOUNCE_LEN - HEADER_LEN,
            found: buf.len() - HEADER_LEN,
        }
        .into());
    }

    let mut grandmaster_identity = [0u8; 8];
    grandmaster_identity.copy_from_slice(&buf[53..61]);

    Ok(MessageBody::Announce(AnnounceBody {
        origin_timestamp: read_timestamp(buf, HEADER_LEN, "originTimestamp")?,
        current_utc_offset: i16::from_be_bytes([buf[44], buf[45]]),
        grandmaster_priority1: Priority1::new(buf[47]),
        grandmaster_clock_quality: ClockQuality::new(
            buf[48],
            buf[49],
            u16::from_be_bytes([buf[50], buf[51]]),
        ),
        grandmaster_priority2: Priority2::new(buf[52]),
        grandmaster_identity: ClockIdentity::new(&grandmaster_identity),
        steps_removed: StepsRemoved::new(u16::from_be_bytes([buf[61], buf[62]])),
        time_source: buf[63],
    }))
}

/// Encode a message into `buf`, returning the number of bytes written.
pub fn encode(msg: &Message, buf: &mut [u8]) -> Result<usize> {
    let needed = msg.header.message_length as usize;
    if buf.len() < needed {
        return Err(ParseError::BufferTooSmall {
            needed,
            available: buf.len(),
        }
        .into());
    }

    let header = &msg.header;
    buf[..needed].fill(0);
    buf[0] = header.message_type.nibble();
    buf[1] = header.version;
    buf[2..4].copy_from_slice(&header.message_length.to_be_bytes());
    buf[4] = header.domain.value();
    buf[6..8].copy_from_slice(&header.flags.to_wire());
    buf[8..16].copy_from_slice(&header.correction.raw().to_be_bytes());
    write_port_identity(buf, 20, header.source_port_identity);
    buf[30..32].copy_from_slice(&header.sequence_id.raw().to_be_bytes());
    buf[32] = header.control;
    buf[33] = header.log_message_interval.raw() as u8;

    match &msg.body {
        MessageBody::Sync { origin_timestamp } | MessageBody::DelayReq { origin_timestamp } => {
            write_timestamp(buf, HEADER_LEN, *origin_timestamp);
        }
        MessageBody::FollowUp {
            precise_origin_timestamp,
        } => {
            write_timestamp(buf, HEADER_LEN, *precise_origin_timestamp);
        }
        MessageBody::DelayResp(body) => {
            write_timestamp(buf, HEADER_LEN, body.receive_timestamp);
            write_port_identity(buf, 44, body.requesting_port_identity);
        }
        MessageBody::Announce(body) => {
            write_timestamp(buf, HEADER_LEN, body.origin_timestamp);
            buf[44..46].copy_from_slice(&body.current_utc_offset.to_be_bytes());
            buf[47] = body.grandmaster_priority1.value();
            buf[48] = body.grandmaster_clock_quality.clock_class;
            buf[49] = body.grandmaster_clock_quality.clock_accuracy;
            buf[50..52].copy_from_slice(
                &body
                    .grandmaster_clock_quality
                    .offset_scaled_log_variance
                    .to_be_bytes(),
            );
            buf[52] = body.grandmaster_priority2.value();
            buf[53..61].copy_from_slice(body.grandmaster_identity.as_bytes());
            buf[61..63].copy_from_slice(&body.steps_removed.value().to_be_bytes());
            buf[63] = body.time_source;
        }
        MessageBody::Unhandled => {
            return Err(ProtocolError::UnknownMessageType(header.message_type.nibble()).into());
        }
    }

    Ok(needed)
}
