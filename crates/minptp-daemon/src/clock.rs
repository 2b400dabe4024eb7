//! The daemon's clock aggregate: a software-disciplined virtual clock plus
//! the local datasets the state decision compares against.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Instant as StdInstant;

use minptp::bmca::{Dataset, Priority1, Priority2, StepsRemoved};
use minptp::clock::{Clock, ClockIdentity, ClockQuality};
use minptp::port::{DomainNumber, PortIdentity, PortNumber};
use minptp::time::{Correction, TimeInterval, TimeStamp};

/// Free-running clock over the host monotonic clock: a base timestamp plus a
/// rate. `step` rebases it, `adjust` changes the rate without stepping.
pub struct VirtualClock {
    start: RefCell<StdInstant>,
    base: RefCell<TimeStamp>,
    rate: RefCell<f64>,
}

impl VirtualClock {
    pub fn new(base: TimeStamp, rate: f64) -> Self {
        Self {
            start: RefCell::new(StdInstant::now()),
            base: RefCell::new(base),
            rate: RefCell::new(rate),
        }
    }

    pub fn now(&self) -> TimeStamp {
        let elapsed = self.start.borrow().elapsed();
        let scaled = elapsed.as_nanos() as f64 * *self.rate.borrow();
        let base = *self.base.borrow();
        base.checked_add(TimeInterval::from_nanos(scaled as i64))
            .unwrap_or(base)
    }

    pub fn step(&self, to: TimeStamp) {
        self.start.replace(StdInstant::now());
        self.base.replace(to);
    }

    pub fn adjust(&self, rate: f64) {
        let current = self.now();
        self.start.replace(StdInstant::now());
        self.base.replace(current);
        self.rate.replace(rate);
    }
}

#[derive(Clone, Copy)]
struct SyncSample {
    origin: TimeStamp,
    ingress: TimeStamp,
    correction_nanos: i64,
}

/// Single-port ordinary clock: default dataset, parent tracking, and a
/// stepping servo over a [`VirtualClock`].
pub struct SystemClock {
    identity: ClockIdentity,
    quality: ClockQuality,
    priority1: Priority1,
    priority2: Priority2,
    domain: DomainNumber,
    parent: RefCell<PortIdentity>,
    clock: Rc<VirtualClock>,
    last_sync: Cell<Option<SyncSample>>,
    mean_path_delay_nanos: Cell<Option<i64>>,
    synchronized: Cell<bool>,
}

impl SystemClock {
    pub fn new(
        clock: Rc<VirtualClock>,
        identity: ClockIdentity,
        quality: ClockQuality,
        priority1: Priority1,
        priority2: Priority2,
        domain: DomainNumber,
    ) -> Self {
        Self {
            identity,
            quality,
            priority1,
            priority2,
            domain,
            // Until the state decision picks a parent, the clock follows
            // itself.
            parent: RefCell::new(PortIdentity::new(identity, PortNumber::new(0))),
            clock,
            last_sync: Cell::new(None),
            mean_path_delay_nanos: Cell::new(None),
            synchronized: Cell::new(false),
        }
    }

    pub fn now(&self) -> TimeStamp {
        self.clock.now()
    }

    pub fn set_parent(&self, parent: PortIdentity) {
        *self.parent.borrow_mut() = parent;
    }

    /// Dataset the local clock would advertise, used as the comparison
    /// anchor for the state decision.
    pub fn local_dataset(&self, port: PortIdentity) -> Dataset {
        Dataset {
            priority1: self.priority1,
            identity: self.identity,
            quality: self.quality,
            priority2: self.priority2,
            steps_removed: StepsRemoved::new(0),
            sender: port,
            receiver: port,
        }
    }

    /// True once after each applied offset; the loop uses the first one to
    /// promote UNCALIBRATED to SLAVE.
    pub fn take_synchronized(&self) -> bool {
        self.synchronized.replace(false)
    }

    pub fn mean_path_delay_nanos(&self) -> Option<i64> {
        self.mean_path_delay_nanos.get()
    }

    fn apply_offset(&self, sample: SyncSample) {
        let path_delay = self.mean_path_delay_nanos.get().unwrap_or(0);
        let master_to_slave =
            sample.ingress.as_nanos() - sample.origin.as_nanos() - sample.correction_nanos as i128;
        let offset = master_to_slave - path_delay as i128;

        let now = self.clock.now();
        if let Some(corrected) = TimeStamp::from_nanos(now.as_nanos() - offset) {
            self.clock.step(corrected);
            self.synchronized.set(true);
            tracing::info!(offset_ns = offset as i64, "master offset");
        } else {
            tracing::warn!(offset_ns = offset as i64, "offset out of range, ignored");
        }
    }
}

impl Clock for SystemClock {
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
        let sample = SyncSample {
            origin,
            ingress,
            correction_nanos: correction_sync.nanos() + correction_follow_up.nanos(),
        };
        self.last_sync.set(Some(sample));
        self.apply_offset(sample);
    }

    fn path_delay(
        &self,
        request_egress: TimeStamp,
        request_ingress: TimeStamp,
        correction: Correction,
    ) {
        let Some(sync) = self.last_sync.get() else {
            return;
        };

        let ms = sync.ingress.as_nanos() - sync.origin.as_nanos() - sync.correction_nanos as i128;
        let sm = request_ingress.as_nanos() - request_egress.as_nanos() - correction.nanos() as i128;
        let mean = (ms + sm) / 2;

        if mean < 0 {
            tracing::warn!(path_delay_ns = mean as i64, "negative path delay, ignored");
            return;
        }

        self.mean_path_delay_nanos.set(Some(mean as i64));
        tracing::info!(path_delay_ns = mean as i64, "mean path delay");
    }
}
