//! Dataset comparison for the Best Master Clock algorithm.
//!
//! The port only ranks *foreign* candidates for its own interface; choosing
//! across ports (and against the local clock) belongs to the clock aggregate.
//! The comparator crosses the [`Bmca`] trait seam so that a full BMC
//! implementation can be plugged in; [`DefaultBmca`] provides the standard
//! pairwise dataset comparison so the crate is usable on its own.

use std::cmp::Ordering;

use crate::clock::{ClockIdentity, ClockQuality};
use crate::port::PortIdentity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Priority1(u8);

impl Priority1 {
    pub fn new(value: u8) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Priority2(u8);

impl Priority2 {
    pub fn new(value: u8) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct StepsRemoved(u16);

impl StepsRemoved {
    pub fn new(value: u16) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u16 {
        self.0
    }
}

/// Comparison key distilled from an Announce message.
///
/// `sender` is the advertising port, `receiver` the parent identity of the
/// clock that owns the receiving port at the time the dataset was built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dataset {
    pub priority1: Priority1,
    pub identity: ClockIdentity,
    pub quality: ClockQuality,
    pub priority2: Priority2,
    pub steps_removed: StepsRemoved,
    pub sender: PortIdentity,
    pub receiver: PortIdentity,
}

/// Dataset comparator supplied by the BMC module.
///
/// `Ordering::Greater` means `a` is the better master candidate.
pub trait Bmca {
    fn dscmp(&self, a: &Dataset, b: &Dataset) -> Ordering;
}

/// The standard pairwise dataset comparison (IEEE 1588 §9.3.4, part 1):
/// priority1, then clock quality, then priority2, then grandmaster identity;
/// datasets advertising the same grandmaster fall back to stepsRemoved and
/// the sender identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultBmca;

impl Bmca for DefaultBmca {
    fn dscmp(&self, a: &Dataset, b: &Dataset) -> Ordering {
        if a.identity == b.identity {
            // Same grandmaster seen along two paths: shorter path wins,
            // then the sender identity breaks the tie.
            return match a.steps_removed.cmp(&b.steps_removed) {
                Ordering::Less => Ordering::Greater,
                Ordering::Greater => Ordering::Less,
                Ordering::Equal => b.sender.cmp(&a.sender),
            };
        }

        if a.priority1 != b.priority1 {
            return b.priority1.cmp(&a.priority1);
        }
        if a.quality != b.quality {
            return if a.quality.outranks(&b.quality) {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }
        if a.priority2 != b.priority2 {
            return b.priority2.cmp(&a.priority2);
        }
        b.identity.cmp(&a.identity)
    }
}
