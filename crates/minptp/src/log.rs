use crate::fsm::{FsmEvent, PortState};
use crate::port::PortIdentity;
use crate::result::Error;

/// One loggable port occurrence. The engine reports these through
/// [`PortLog`]; how (and whether) they reach an operator is the embedder's
/// concern.
#[derive(Debug)]
pub enum PortEvent<'a> {
    MessageSent(&'a str),
    MessageReceived(&'a str),
    StateTransition {
        from: PortState,
        to: PortState,
        event: FsmEvent,
    },
    NewForeignMaster {
        sender: PortIdentity,
    },
    AnnounceTimeout,
    DelayTimeout,
    MalformedMessage(&'a Error),
    SendFailed {
        message: &'a str,
    },
    DelayRequestIntervalChanged {
        log_interval: i8,
    },
}

pub trait PortLog {
    fn log(&self, event: PortEvent<'_>);
}

pub struct NoopPortLog;

impl PortLog for NoopPortLog {
    fn log(&self, _event: PortEvent<'_>) {}
}
