use std::fmt;
use std::rc::Rc;

use crate::port::{DomainNumber, PortIdentity};
use crate::time::{Correction, TimeStamp};

/// EUI-64 style clock identity. Equality is byte-wise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ClockIdentity([u8; 8]);

impl ClockIdentity {
    pub fn new(id: &[u8; 8]) -> Self {
        Self(*id)
    }

    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

impl fmt::Display for ClockIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}{:02x}{:02x}.{:02x}{:02x}.{:02x}{:02x}{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]
        )
    }
}

/// clockClass / clockAccuracy / offsetScaledLogVariance triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockQuality {
    pub clock_class: u8,
    pub clock_accuracy: u8,
    pub offset_scaled_log_variance: u16,
}

impl ClockQuality {
    pub fn new(clock_class: u8, clock_accuracy: u8, offset_scaled_log_variance: u16) -> Self {
        Self {
            clock_class,
            clock_accuracy,
            offset_scaled_log_variance,
        }
    }

    /// Lower class, then lower accuracy, then lower variance wins.
    pub fn outranks(&self, other: &ClockQuality) -> bool {
        if self.clock_class != other.clock_class {
            return self.clock_class < other.clock_class;
        }
        if self.clock_accuracy != other.clock_accuracy {
            return self.clock_accuracy < other.clock_accuracy;
        }
        self.offset_scaled_log_variance < other.offset_scaled_log_variance
    }
}

/// The clock aggregate the port reports into.
///
/// The port never disciplines time itself; it hands (T1, T2) pairs and
/// (T3, T4) pairs to this boundary together with the correction fields it
/// observed. Implementations own the servo, the parent tracking, and any
/// cross-port aggregation.
pub trait Clock {
    fn identity(&self) -> ClockIdentity;

    /// Port identity of the master this clock currently follows.
    fn parent_identity(&self) -> PortIdentity;

    fn domain_number(&self) -> DomainNumber;

    /// Feed one Sync observation: `origin` is T1 (master egress), `ingress`
    /// is T2 (local ingress). `correction_follow_up` is zero for one-step
    /// Sync.
    fn synchronize(
        &self,
        origin: TimeStamp,
        ingress: TimeStamp,
        correction_sync: Correction,
        correction_follow_up: Correction,
    );

    /// Feed one delay observation: `request_egress` is T3 (local egress of
    /// the Delay_Req), `request_ingress` is T4 (master ingress carried in
    /// the Delay_Resp).
    fn path_delay(&self, request_egress: TimeStamp, request_ingress: TimeStamp, correction: Correction);
}

impl<C: Clock> Clock for Rc<C> {
    fn identity(&self) -> ClockIdentity {
        self.as_ref().identity()
    }

    fn parent_identity(&self) -> PortIdentity {
        self.as_ref().parent_identity()
    }

    fn domain_number(&self) -> DomainNumber {
        self.as_ref().domain_number()
    }

    fn synchronize(
        &self,
        origin: TimeStamp,
        ingress: TimeStamp,
        correction_sync: Correction,
        correction_follow_up: Correction,
    ) {
        self.as_ref()
            .synchronize(origin, ingress, correction_sync, correction_follow_up)
    }

    fn path_delay(&self, request_egress: TimeStamp, request_ingress: TimeStamp, correction: Correction) {
        self.as_ref()
            .path_delay(request_egress, request_ingress, correction)
    }
}
