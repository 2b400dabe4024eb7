//! Foreign-master records.
//!
//! One [`ForeignClock`] tracks the recent Announce history of one remote
//! candidate. The queue is newest-first and bounded by
//! [`FOREIGN_MASTER_THRESHOLD`]; entries age out after four announce
//! intervals (the standard's qualification window). A record qualifies once
//! it holds the threshold number of current messages.

use std::collections::VecDeque;
use std::rc::Rc;

use crate::bmca::Dataset;
use crate::message::Message;
use crate::port::PortIdentity;
use crate::time::Instant;

/// Announce messages required within the window before a candidate is
/// eligible for selection (IEEE 1588 §9.3.2.5).
pub const FOREIGN_MASTER_THRESHOLD: usize = 2;

/// A message stays current for four of its own announce intervals.
fn is_current(msg: &Message, now: Instant) -> bool {
    let Some(hwts) = msg.hwts else {
        return false;
    };
    let window = msg.log_message_interval().nanos().saturating_mul(4);
    now.saturating_nanos_since(hwts.host) < window
}

pub struct ForeignClock {
    sender: PortIdentity,
    messages: VecDeque<Rc<Message>>,
    dataset: Option<Dataset>,
}

impl ForeignClock {
    pub fn new(sender: PortIdentity) -> Self {
        Self {
            sender,
            messages: VecDeque::new(),
            dataset: None,
        }
    }

    pub fn sender(&self) -> PortIdentity {
        self.sender
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn newest(&self) -> Option<&Rc<Message>> {
        self.messages.front()
    }

    /// The message before the newest, used to detect changed Announce
    /// content from the same sender.
    pub fn previous(&self) -> Option<&Rc<Message>> {
        self.messages.get(1)
    }

    /// Drop every retained message. The record itself stays in the table and
    /// re-qualifies if the sender keeps announcing.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Drop over-threshold entries from the tail, then drop stale entries
    /// from the tail. Afterwards every remaining message is current.
    pub fn prune(&mut self, now: Instant) {
        while self.messages.len() > FOREIGN_MASTER_THRESHOLD {
            self.messages.pop_back();
        }
        while let Some(oldest) = self.messages.back() {
            if is_current(oldest, now) {
                break;
            }
            self.messages.pop_back();
        }
    }

    /// Prepend a new Announce, evicting the oldest entry if the queue would
    /// exceed the threshold.
    pub fn add(&mut self, msg: Rc<Message>) {
        self.messages.push_front(msg);
        while self.messages.len() > FOREIGN_MASTER_THRESHOLD {
            self.messages.pop_back();
        }
    }

    pub fn is_qualified(&self) -> bool {
        self.messages.len() >= FOREIGN_MASTER_THRESHOLD
    }

    /// Build the comparison dataset from the newest message. Returns the
    /// dataset also kept on the record for later [`dataset`](Self::dataset)
    /// lookups.
    pub fn materialize_dataset(&mut self, receiver: PortIdentity) -> Option<Dataset> {
        let newest = self.messages.front()?;
        let announce = newest.announce()?;
        let dataset = announce.to_dataset(newest.source_port_identity(), receiver);
        self.dataset = Some(dataset);
        Some(dataset)
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }
}
