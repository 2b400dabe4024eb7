//! Common `Result` and error types for `minptp`.
//!
//! Failures while turning bytes into messages fall into two categories:
//! - [`ParseError`]: the buffer is structurally unusable (truncated header,
//!   declared length larger than what was received, missing payload fields).
//! - [`ProtocolError`]: the buffer parses but carries an unsupported or
//!   invalid protocol value (wrong PTP version, unknown message type nibble,
//!   out-of-range timestamp nanoseconds).
//!
//! Both are produced by [`crate::wire`]. The port treats either as a bad
//! frame: log and drop, never fault.

use std::fmt;

/// Crate-wide `Result` type using [`Error`] as the error variant.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for fallible codec operations.
#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    /// The input bytes could not be parsed into a PTP message.
    Parse(ParseError),
    /// The input parsed but was rejected as unsupported or invalid.
    Protocol(ProtocolError),
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Error::Parse(err)
    }
}

impl From<ProtocolError> for Error {
    fn from(err: ProtocolError) -> Self {
        Error::Protocol(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Parse(e) => write!(f, "parse error: {}", e),
            Error::Protocol(e) => write!(f, "protocol error: {}", e),
        }
    }
}

impl std::error::Error for Error {}

/// Errors caused by malformed or incomplete buffers.
#[derive(Debug, PartialEq, Eq)]
pub enum ParseError {
    /// Not enough bytes for the common PTP header.
    HeaderTooShort { found: usize },
    /// The header's declared message length exceeds the received buffer.
    LengthMismatch { declared: usize, actual: usize },
    /// The payload did not contain enough bytes for a required field.
    PayloadTooShort {
        field: &'static str,
        expected: usize,
        found: usize,
    },
    /// The output buffer handed to the encoder is too small.
    BufferTooSmall { needed: usize, available: usize },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::HeaderTooShort { found } => {
                write!(f, "message too short for PTP header: found {found} bytes")
            }
            ParseError::LengthMismatch { declared, actual } => write!(
                f,
                "declared PTP length {declared} does not match actual {actual}"
            ),
            ParseError::PayloadTooShort {
                field,
                expected,
                found,
            } => write!(
                f,
                "payload too short for field `{field}`: expected {expected} bytes, found {found}"
            ),
            ParseError::BufferTooSmall { needed, available } => write!(
                f,
                "encode buffer too small: need {needed} bytes, have {available}"
            ),
        }
    }
}

impl std::error::Error for ParseError {}

/// Errors caused by unsupported or semantically invalid protocol values.
#[derive(Debug, PartialEq, Eq)]
pub enum ProtocolError {
    /// The PTP version field in the header is not supported.
    UnsupportedPtpVersion(u8),
    /// The message type nibble does not map to a known message class.
    UnknownMessageType(u8),
    /// A wire timestamp uses a nanosecond value outside `[0, 1_000_000_000)`.
    InvalidTimestamp { nanos: u32 },
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::UnsupportedPtpVersion(v) => {
                write!(f, "unsupported PTP version {v}")
            }
            ProtocolError::UnknownMessageType(t) => {
                write!(f, "unknown message type nibble 0x{t:02x}")
            }
            ProtocolError::InvalidTimestamp { nanos } => {
                write!(f, "invalid timestamp nanoseconds {nanos}")
            }
        }
    }
}

impl std::error::Error for ProtocolError {}
