//! Timer seams.
//!
//! The port owns two single-shot timers (announce receipt, delay request)
//! created from a [`TimerHost`] during port initialization. Arming is
//! idempotent — restarting a pending timer replaces its deadline — and
//! clearing disables the fire. Dropping a [`Timeout`] must cancel it.

use std::fmt;
use std::rc::Rc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    AnnounceReceipt,
    DelayRequest,
}

impl fmt::Display for TimerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerKind::AnnounceReceipt => f.write_str("announce"),
            TimerKind::DelayRequest => f.write_str("delay"),
        }
    }
}

pub trait Timeout {
    /// Arm (or re-arm) the timer to fire once after `delay`.
    fn restart(&self, delay: Duration);

    /// Disarm the timer; a pending fire is cancelled.
    fn clear(&self);
}

pub trait TimerHost {
    type Timeout: Timeout;

    /// Create a disarmed single-shot timer of the given kind.
    fn timeout(&self, kind: TimerKind) -> Self::Timeout;
}

impl<H: TimerHost> TimerHost for Rc<H> {
    type Timeout = H::Timeout;

    fn timeout(&self, kind: TimerKind) -> Self::Timeout {
        self.as_ref().timeout(kind)
    }
}
