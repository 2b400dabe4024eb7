//! IEEE 1588 (PTPv2) ordinary clock port engine.
//!
//! The crate implements the per-port protocol machinery — the
//! Announce/Sync/Follow_Up/Delay_Req/Delay_Resp exchanges, the
//! foreign-master table, and the nine-state port state machine — behind
//! trait seams for the transport, the clock aggregate, timers, the dataset
//! comparator and logging. See [`port::Port`] for the driving surface.

pub mod bmca;
pub mod clock;
pub mod foreign;
pub mod fsm;
pub mod log;
pub mod message;
pub mod port;
pub mod result;
pub mod time;
pub mod timer;
pub mod transport;
pub mod wire;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
