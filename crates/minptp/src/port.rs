//! The per-port protocol engine.
//!
//! A [`Port`] is one network interface of an ordinary clock. It listens for
//! time-distribution traffic on its domain, qualifies and ranks foreign
//! master candidates, feeds the clock aggregate with (T1, T2) and (T3, T4)
//! samples while slaved, and answers Delay_Req probes while master.
//!
//! The port is driven from outside by exactly two calls:
//! - [`Port::event`] consumes one ready descriptor (a timer slot or a
//!   network slot) and returns the [`FsmEvent`] it produced, and
//! - [`Port::dispatch`] applies that event through the pure transition
//!   function in [`crate::fsm`], re-arming or clearing timers per the target
//!   state.
//!
//! All collaborators — transport, clock aggregate, timers, dataset
//! comparator, logging — are trait parameters; the engine itself performs no
//! blocking I/O and owns no threads.

use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use crate::bmca::{Bmca, Dataset};
use crate::clock::{Clock, ClockIdentity};
use crate::foreign::{ForeignClock, FOREIGN_MASTER_THRESHOLD};
use crate::fsm::{self, FsmEvent, PortState};
use crate::log::{PortEvent, PortLog};
use crate::message::{Message, MessageType, SequenceId};
use crate::time::{Correction, Instant, LogInterval};
use crate::timer::{Timeout, TimerHost, TimerKind};
use crate::transport::{FdIndex, Timestamping, Transport, TransportError};
use crate::wire;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PortNumber(u16);

impl PortNumber {
    pub fn new(value: u16) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for PortNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DomainNumber(u8);

impl DomainNumber {
    pub fn new(value: u8) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

/// (clockIdentity, portNumber) pair. Equality is byte-wise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PortIdentity {
    clock_identity: ClockIdentity,
    port_number: PortNumber,
}

impl PortIdentity {
    pub fn new(clock_identity: ClockIdentity, port_number: PortNumber) -> Self {
        Self {
            clock_identity,
            port_number,
        }
    }

    pub fn clock_identity(&self) -> ClockIdentity {
        self.clock_identity
    }

    pub fn port_number(&self) -> PortNumber {
        self.port_number
    }
}

impl fmt::Display for PortIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.clock_identity, self.port_number)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DelayMechanism {
    #[default]
    E2E,
    P2P,
}

/// The portDS interval knobs with their protocol defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortTimingPolicy {
    log_min_delay_req_interval: LogInterval,
    log_announce_interval: LogInterval,
    announce_receipt_timeout: u8,
    log_sync_interval: LogInterval,
    log_min_pdelay_req_interval: LogInterval,
}

impl Default for PortTimingPolicy {
    fn default() -> Self {
        Self {
            log_min_delay_req_interval: LogInterval::new(0), // Delay_Req every 1 s
            log_announce_interval: LogInterval::new(1),      // Announce every 2 s
            announce_receipt_timeout: 3,                     // three missing announces
            log_sync_interval: LogInterval::new(0),          // Sync every 1 s
            log_min_pdelay_req_interval: LogInterval::new(2), // Pdelay_Req every 4 s
        }
    }
}

impl PortTimingPolicy {
    /// How long to wait for an Announce before declaring the master lost.
    pub fn announce_receipt_timeout_interval(&self) -> Duration {
        self.log_announce_interval.duration() * u32::from(self.announce_receipt_timeout)
    }

    /// Spacing of outbound Delay_Req messages: `2^(logMinDelayReqInterval+1)`
    /// seconds.
    pub fn delay_request_interval(&self) -> Duration {
        LogInterval::new(self.log_min_delay_req_interval.raw().saturating_add(1)).duration()
    }

    pub fn log_min_delay_req_interval(&self) -> LogInterval {
        self.log_min_delay_req_interval
    }

    pub fn log_announce_interval(&self) -> LogInterval {
        self.log_announce_interval
    }

    pub fn announce_receipt_timeout(&self) -> u8 {
        self.announce_receipt_timeout
    }

    pub fn log_sync_interval(&self) -> LogInterval {
        self.log_sync_interval
    }

    pub fn log_min_pdelay_req_interval(&self) -> LogInterval {
        self.log_min_pdelay_req_interval
    }

    /// Adopt the minimum delay-request interval a master instructed us to
    /// use, clamped to a sane range.
    pub fn adopt_delay_request_interval(&mut self, interval: LogInterval) -> LogInterval {
        self.log_min_delay_req_interval = LogInterval::new(interval.raw().clamp(-10, 10));
        self.log_min_delay_req_interval
    }
}

#[derive(Debug, Clone)]
pub struct PortConfig {
    pub name: String,
    pub port_number: PortNumber,
    pub timestamping: Timestamping,
    pub delay_mechanism: DelayMechanism,
    /// Use the slave-only transition table instead of the full one.
    pub slave_only: bool,
}

impl PortConfig {
    pub fn new(name: &str, port_number: PortNumber) -> Self {
        Self {
            name: name.to_string(),
            port_number,
            timestamping: Timestamping::Software,
            delay_mechanism: DelayMechanism::E2E,
            slave_only: false,
        }
    }
}

struct PortTimers<T: Timeout> {
    announce: T,
    delay: T,
}

pub struct Port<C: Clock, T: Transport, H: TimerHost, B: Bmca, L: PortLog> {
    name: String,
    clock: C,
    transport: T,
    timer_host: H,
    bmca: B,
    log: L,
    timestamping: Timestamping,
    delay_mechanism: DelayMechanism,
    slave_only: bool,
    timers: Option<PortTimers<H::Timeout>>,
    foreign_masters: Vec<ForeignClock>,
    best: Option<PortIdentity>,
    last_sync: Option<Rc<Message>>,
    last_follow_up: Option<Rc<Message>>,
    delay_req: Option<Rc<Message>>,
    seqnum: SequenceId,
    port_identity: PortIdentity,
    state: PortState,
    timing: PortTimingPolicy,
}

impl<C: Clock, T: Transport, H: TimerHost, B: Bmca, L: PortLog> Port<C, T, H, B, L> {
    /// Create a port in `INITIALIZING`. Nothing is opened or armed until the
    /// first `Initialize`/`PowerUp` event is dispatched.
    pub fn open(config: PortConfig, clock: C, transport: T, timer_host: H, bmca: B, log: L) -> Self {
        let port_identity = PortIdentity::new(clock.identity(), config.port_number);

        Self {
            name: config.name,
            clock,
            transport,
            timer_host,
            bmca,
            log,
            timestamping: config.timestamping,
            delay_mechanism: config.delay_mechanism,
            slave_only: config.slave_only,
            timers: None,
            foreign_masters: Vec::new(),
            best: None,
            last_sync: None,
            last_follow_up: None,
            delay_req: None,
            seqnum: SequenceId::new(0),
            port_identity,
            state: PortState::Initializing,
            timing: PortTimingPolicy::default(),
        }
    }

    pub fn state(&self) -> PortState {
        self.state
    }

    pub fn port_identity(&self) -> PortIdentity {
        self.port_identity
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn delay_mechanism(&self) -> DelayMechanism {
        self.delay_mechanism
    }

    pub fn timing(&self) -> &PortTimingPolicy {
        &self.timing
    }

    /// Release the transport and timers.
    pub fn close(mut self) {
        self.transport.close();
        self.timers = None;
    }

    /// Apply one FSM event.
    ///
    /// A transition into `INITIALIZING` is a skip-through: the port
    /// initializes immediately and lands in `LISTENING` (or `FAULTY` if
    /// initialization failed), so it is never observed in `INITIALIZING`
    /// after this returns.
    pub fn dispatch(&mut self, event: FsmEvent) {
        let next = if self.slave_only {
            fsm::ptp_slave_fsm(self.state, event)
        } else {
            fsm::ptp_fsm(self.state, event)
        };

        if next == PortState::Initializing {
            self.state = match self.initialize() {
                Ok(()) => PortState::Listening,
                Err(_) => PortState::Faulty,
            };
            return;
        }

        if next == self.state {
            return;
        }

        self.log.log(PortEvent::StateTransition {
            from: self.state,
            to: next,
            event,
        });

        match next {
            PortState::Initializing | PortState::Faulty | PortState::Disabled => {
                self.clear_announce_tmo();
                self.clear_delay_tmo();
            }
            PortState::Listening | PortState::Passive => {
                self.set_announce_tmo();
                self.clear_delay_tmo();
            }
            PortState::PreMaster | PortState::Master | PortState::GrandMaster => {
                self.clear_announce_tmo();
                self.clear_delay_tmo();
            }
            PortState::Uncalibrated | PortState::Slave => {
                self.set_announce_tmo();
                self.set_delay_tmo();
            }
        }

        self.state = next;
    }

    /// Service one ready descriptor and return the event it produced.
    ///
    /// `now` is the multiplexer's monotonic host time, used to age
    /// foreign-master records.
    pub fn event(&mut self, fd_index: FdIndex, now: Instant) -> FsmEvent {
        match fd_index {
            FdIndex::AnnounceTimer => {
                self.log.log(PortEvent::AnnounceTimeout);
                if let Some(best) = self.best {
                    if let Some(fc) = self
                        .foreign_masters
                        .iter_mut()
                        .find(|fc| fc.sender() == best)
                    {
                        // The qualification window has passed; the best
                        // candidate has to earn its place again.
                        fc.clear();
                    }
                }
                self.set_announce_tmo();
                FsmEvent::AnnounceReceiptTimeoutExpires
            }
            FdIndex::DelayTimer => {
                self.log.log(PortEvent::DelayTimeout);
                self.set_delay_tmo();
                match self.delay_request() {
                    Ok(()) => FsmEvent::None,
                    Err(_) => FsmEvent::FaultDetected,
                }
            }
            fd => self.network_event(fd, now),
        }
    }

    fn network_event(&mut self, fd_index: FdIndex, now: Instant) -> FsmEvent {
        let mut buf = [0u8; wire::MAX_MESSAGE_LEN];
        let (len, hwts) = match self.transport.recv(fd_index, &mut buf) {
            Ok(received) => received,
            Err(_) => return FsmEvent::FaultDetected,
        };

        let msg = match wire::decode(&buf[..len], Some(hwts)) {
            Ok(msg) => msg,
            Err(err) => {
                self.log.log(PortEvent::MalformedMessage(&err));
                return FsmEvent::None;
            }
        };

        self.log
            .log(PortEvent::MessageReceived(msg.message_type().name()));

        let msg = Rc::new(msg);
        match msg.message_type() {
            MessageType::Sync => self.process_sync(msg),
            MessageType::FollowUp => self.process_follow_up(msg),
            MessageType::DelayReq => {
                if self.process_delay_req(&msg).is_err() {
                    self.log.log(PortEvent::SendFailed {
                        message: "DelayResp",
                    });
                }
            }
            MessageType::DelayResp => self.process_delay_resp(&msg),
            MessageType::Announce => {
                if self.process_announce(msg, now) {
                    return FsmEvent::StateDecisionEvent;
                }
            }
            _ => {}
        }

        FsmEvent::None
    }

    /// Prune, qualify and rank this port's candidates, updating `best`.
    ///
    /// Records that lose the comparison have their message queues cleared;
    /// they re-qualify later if their sender keeps announcing.
    pub fn compute_best(&mut self, now: Instant) -> Option<&ForeignClock> {
        self.best = None;
        let receiver = self.clock.parent_identity();

        let mut best: Option<(usize, Dataset)> = None;
        for index in 0..self.foreign_masters.len() {
            {
                let fc = &mut self.foreign_masters[index];
                if fc.newest().is_none() {
                    continue;
                }
                fc.prune(now);
                if !fc.is_qualified() {
                    continue;
                }
            }
            let dataset = match self.foreign_masters[index].materialize_dataset(receiver) {
                Some(dataset) => dataset,
                None => continue,
            };

            best = match best.take() {
                None => Some((index, dataset)),
                Some((best_index, best_dataset)) => {
                    if self.bmca.dscmp(&dataset, &best_dataset) == Ordering::Greater {
                        Some((index, dataset))
                    } else {
                        self.foreign_masters[index].clear();
                        Some((best_index, best_dataset))
                    }
                }
            };
        }

        match best {
            Some((index, _)) => {
                let fc = &self.foreign_masters[index];
                self.best = Some(fc.sender());
                Some(fc)
            }
            None => None,
        }
    }

    /// Dataset of the currently selected best foreign master, if any.
    pub fn best_foreign(&self) -> Option<&Dataset> {
        let best = self.best?;
        self.foreign_masters
            .iter()
            .find(|fc| fc.sender() == best)
            .and_then(|fc| fc.dataset())
    }

    #[cfg(any(test, feature = "test-support"))]
    pub fn foreign_masters(&self) -> &[ForeignClock] {
        &self.foreign_masters
    }

    fn initialize(&mut self) -> Result<(), TransportError> {
        self.timing = PortTimingPolicy::default();

        let announce = self.timer_host.timeout(TimerKind::AnnounceReceipt);
        let delay = self.timer_host.timeout(TimerKind::DelayRequest);

        // If the transport fails to come up the timers unwind through drop.
        self.transport.open(&self.name, self.timestamping)?;

        announce.restart(self.timing.announce_receipt_timeout_interval());
        self.timers = Some(PortTimers { announce, delay });
        Ok(())
    }

    fn set_announce_tmo(&self) {
        if let Some(timers) = &self.timers {
            timers
                .announce
                .restart(self.timing.announce_receipt_timeout_interval());
        }
    }

    fn clear_announce_tmo(&self) {
        if let Some(timers) = &self.timers {
            timers.announce.clear();
        }
    }

    fn set_delay_tmo(&self) {
        if let Some(timers) = &self.timers {
            timers.delay.restart(self.timing.delay_request_interval());
        }
    }

    fn clear_delay_tmo(&self) {
        if let Some(timers) = &self.timers {
            timers.delay.clear();
        }
    }

    /// State gate for Announce processing. Returns true when the message is
    /// both qualified and different, i.e. the caller should raise a
    /// `STATE_DECISION_EVENT`.
    fn process_announce(&mut self, msg: Rc<Message>, now: Instant) -> bool {
        match self.state {
            PortState::Initializing | PortState::Faulty | PortState::Disabled => false,
            PortState::Listening
            | PortState::PreMaster
            | PortState::Master
            | PortState::GrandMaster
            | PortState::Passive => self.add_foreign_master(&msg, now),
            PortState::Uncalibrated | PortState::Slave => self.update_current_master(&msg, now),
        }
    }

    /// Admit an Announce into the foreign-master table.
    ///
    /// The first Announce from an unknown sender creates the record but
    /// never triggers a state decision on its own (IEEE 1588 §9.5.3 b).
    /// Returns true when this message qualified the record or changed its
    /// content.
    fn add_foreign_master(&mut self, msg: &Rc<Message>, now: Instant) -> bool {
        let sender = msg.source_port_identity();

        let Some(index) = self
            .foreign_masters
            .iter()
            .position(|fc| fc.sender() == sender)
        else {
            self.log.log(PortEvent::NewForeignMaster { sender });
            let mut fc = ForeignClock::new(sender);
            fc.add(Rc::clone(msg));
            self.foreign_masters.insert(0, fc);
            return false;
        };

        let fc = &mut self.foreign_masters[index];
        fc.prune(now);
        let broke_threshold = fc.message_count() == FOREIGN_MASTER_THRESHOLD - 1;
        fc.add(Rc::clone(msg));
        let diff = announce_differs(msg, fc.previous());

        broke_threshold || diff
    }

    /// Announce handling while slaved: messages from the current best rearm
    /// the receipt timeout and extend its window; anything else goes through
    /// normal admission.
    fn update_current_master(&mut self, msg: &Rc<Message>, now: Instant) -> bool {
        let sender = msg.source_port_identity();
        let best = match self.best {
            Some(best) if best == sender => best,
            _ => return self.add_foreign_master(msg, now),
        };

        self.set_announce_tmo();

        let Some(fc) = self
            .foreign_masters
            .iter_mut()
            .find(|fc| fc.sender() == best)
        else {
            return self.add_foreign_master(msg, now);
        };

        fc.prune(now);
        fc.add(Rc::clone(msg));
        announce_differs(msg, fc.previous())
    }

    fn process_sync(&mut self, msg: Rc<Message>) {
        if !matches!(self.state, PortState::Uncalibrated | PortState::Slave) {
            return;
        }
        if msg.source_port_identity() != self.clock.parent_identity() {
            return;
        }
        let Some(hwts) = msg.hwts else {
            return;
        };

        if !msg.is_two_step() {
            if let Some(origin) = msg.wire_timestamp() {
                self.clock
                    .synchronize(origin, hwts.ts, msg.correction(), Correction::ZERO);
            }
            return;
        }

        // The follow-up may have arrived first: timestamping hardware can
        // delay event frames past their general-channel companions.
        if let Some(fup) = self.last_follow_up.as_ref() {
            if fup.sequence_id() == msg.sequence_id() {
                if let Some(origin) = fup.wire_timestamp() {
                    self.clock
                        .synchronize(origin, hwts.ts, msg.correction(), fup.correction());
                }
                return;
            }
        }

        // Remember this sync until its follow-up shows up.
        self.last_sync = Some(msg);
    }

    fn process_follow_up(&mut self, msg: Rc<Message>) {
        if !matches!(self.state, PortState::Uncalibrated | PortState::Slave) {
            return;
        }
        if msg.source_port_identity() != self.clock.parent_identity() {
            return;
        }

        match self.last_sync.as_ref() {
            Some(syn) if syn.sequence_id() == msg.sequence_id() => {
                // Matching ids from different sources would pair a spoofed
                // follow-up with a genuine sync.
                if syn.source_port_identity() != msg.source_port_identity() {
                    return;
                }
                let Some(hwts) = syn.hwts else {
                    return;
                };
                if let Some(origin) = msg.wire_timestamp() {
                    self.clock
                        .synchronize(origin, hwts.ts, syn.correction(), msg.correction());
                }
            }
            _ => {
                self.last_follow_up = Some(msg);
            }
        }
    }

    fn process_delay_req(&mut self, msg: &Message) -> Result<(), TransportError> {
        if !matches!(self.state, PortState::Master | PortState::GrandMaster) {
            // Reply suppressed, not an error.
            return Ok(());
        }
        let Some(hwts) = msg.hwts else {
            return Ok(());
        };

        let response = Message::delay_response(
            msg.header.domain,
            msg.correction(),
            self.port_identity,
            msg.sequence_id(),
            self.timing.log_min_delay_req_interval(),
            hwts.ts,
            msg.source_port_identity(),
        );

        let mut buf = [0u8; wire::MAX_MESSAGE_LEN];
        let len = wire::encode(&response, &mut buf).map_err(|_| TransportError::Send)?;
        self.transport.send_general(&buf[..len])?;
        self.log.log(PortEvent::MessageSent("DelayResp"));
        Ok(())
    }

    fn process_delay_resp(&mut self, msg: &Message) {
        let Some(req) = self.delay_req.as_ref() else {
            return;
        };
        if !matches!(self.state, PortState::Uncalibrated | PortState::Slave) {
            return;
        }
        let Some(resp) = msg.delay_resp() else {
            return;
        };
        if resp.requesting_port_identity != req.source_port_identity() {
            return;
        }
        // Both sides are compared in host order; no wire-order copies exist.
        if msg.sequence_id() != req.sequence_id() {
            return;
        }
        let Some(req_hwts) = req.hwts else {
            return;
        };

        self.clock
            .path_delay(req_hwts.ts, resp.receive_timestamp, msg.correction());

        let interval = msg.log_message_interval();
        if interval != self.timing.log_min_delay_req_interval() {
            let adopted = self.timing.adopt_delay_request_interval(interval);
            self.log.log(PortEvent::DelayRequestIntervalChanged {
                log_interval: adopted.raw(),
            });
        }
    }

    /// Emit one Delay_Req on the event channel, retaining it with its egress
    /// timestamp until the matching Delay_Resp consumes it or a newer
    /// request supersedes it.
    fn delay_request(&mut self) -> Result<(), TransportError> {
        let mut msg = Message::delay_request(
            self.clock.domain_number(),
            self.port_identity,
            self.seqnum,
        );
        self.seqnum = self.seqnum.next();

        let mut buf = [0u8; wire::MAX_MESSAGE_LEN];
        let len = wire::encode(&msg, &mut buf).map_err(|_| TransportError::Send)?;
        let hwts = self.transport.send_event(&buf[..len])?;

        msg.hwts = Some(hwts);
        self.delay_req = Some(Rc::new(msg));
        self.log.log(PortEvent::MessageSent("DelayReq"));
        Ok(())
    }
}

fn announce_differs(msg: &Message, previous: Option<&Rc<Message>>) -> bool {
    match (msg.announce(), previous.and_then(|prev| prev.announce())) {
        (Some(a), Some(b)) => !a.same_grandmaster_fields(b),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::rc::Rc;

    use crate::bmca::DefaultBmca;
    use crate::log::NoopPortLog;
    use crate::test_support::{
        FakeClock, FakeTimerHost, FakeTransport, TestGrandmaster, TimerAction,
    };

    type TestPort =
        Port<Rc<FakeClock>, Rc<FakeTransport>, Rc<FakeTimerHost>, DefaultBmca, NoopPortLog>;

    struct Fixture {
        clock: Rc<FakeClock>,
        transport: Rc<FakeTransport>,
        timers: Rc<FakeTimerHost>,
        port: TestPort,
    }

    fn fixture() -> Fixture {
        let clock = Rc::new(FakeClock::new(
            ClockIdentity::new(&[0x00, 0x1B, 0x19, 0xFF, 0xFE, 0x00, 0x00, 0x01]),
            DomainNumber::new(0),
        ));
        let transport = Rc::new(FakeTransport::new());
        let timers = Rc::new(FakeTimerHost::new());
        let port = Port::open(
            PortConfig::new("eth0", PortNumber::new(1)),
            Rc::clone(&clock),
            Rc::clone(&transport),
            Rc::clone(&timers),
            DefaultBmca,
            NoopPortLog,
        );
        Fixture {
            clock,
            transport,
            timers,
            port,
        }
    }

    fn sender(tail: u8) -> PortIdentity {
        PortIdentity::new(
            ClockIdentity::new(&[0x00, 0x1A, 0xC5, 0xFF, 0xFE, 0x00, 0x00, tail]),
            PortNumber::new(1),
        )
    }

    fn deliver_announce(f: &mut Fixture, gm: &TestGrandmaster, from: PortIdentity, seq: u16, at_secs: u64) -> FsmEvent {
        f.transport
            .push_general_frame(gm.announce_frame(from, SequenceId::new(seq)), at_secs);
        f.port.event(FdIndex::General, Instant::from_secs(at_secs))
    }

    #[test]
    fn port_initializes_into_listening_and_arms_announce_timer() {
        let mut f = fixture();

        f.port.dispatch(FsmEvent::Initialize);

        assert_eq!(f.port.state(), PortState::Listening);
        assert!(f.transport.is_open());
        assert!(f
            .timers
            .take_actions()
            .iter()
            .any(|action| matches!(action, TimerAction::Restarted(TimerKind::AnnounceReceipt, _))));
    }

    #[test]
    fn failed_initialization_lands_in_faulty() {
        let mut f = fixture();
        f.transport.fail_open(true);

        f.port.dispatch(FsmEvent::Initialize);

        assert_eq!(f.port.state(), PortState::Faulty);
        assert!(!f.transport.is_open());
    }

    #[test]
    fn transition_to_uncalibrated_arms_both_timers() {
        let mut f = fixture();
        f.port.dispatch(FsmEvent::Initialize);
        f.timers.take_actions();

        f.port.dispatch(FsmEvent::RsSlave);

        let actions = f.timers.take_actions();
        assert!(actions
            .iter()
            .any(|a| matches!(a, TimerAction::Restarted(TimerKind::AnnounceReceipt, _))));
        assert!(actions
            .iter()
            .any(|a| matches!(a, TimerAction::Restarted(TimerKind::DelayRequest, _))));
    }

    #[test]
    fn transition_to_master_clears_both_timers() {
        let mut f = fixture();
        f.port.dispatch(FsmEvent::Initialize);
        f.port.dispatch(FsmEvent::RsSlave);
        f.port.dispatch(FsmEvent::AnnounceReceiptTimeoutExpires);

        assert_eq!(f.port.state(), PortState::Master);
        let actions = f.timers.take_actions();
        assert!(actions
            .iter()
            .any(|a| matches!(a, TimerAction::Cleared(TimerKind::AnnounceReceipt))));
        assert!(actions
            .iter()
            .any(|a| matches!(a, TimerAction::Cleared(TimerKind::DelayRequest))));
    }

    #[test]
    fn first_announce_creates_record_without_qualification_credit() {
        let mut f = fixture();
        f.port.dispatch(FsmEvent::Initialize);

        let gm = TestGrandmaster::mid_grade();
        let event = deliver_announce(&mut f, &gm, sender(1), 0, 1);

        assert_eq!(event, FsmEvent::None);
        assert_eq!(f.port.foreign_masters().len(), 1);
        assert_eq!(f.port.foreign_masters()[0].message_count(), 1);
    }

    #[test]
    fn second_announce_breaks_threshold_and_raises_state_decision() {
        let mut f = fixture();
        f.port.dispatch(FsmEvent::Initialize);

        let gm = TestGrandmaster::mid_grade();
        let first = deliver_announce(&mut f, &gm, sender(1), 0, 1);
        let second = deliver_announce(&mut f, &gm, sender(1), 1, 2);

        assert_eq!(first, FsmEvent::None);
        assert_eq!(second, FsmEvent::StateDecisionEvent);
    }

    #[test]
    fn changed_announce_content_raises_state_decision() {
        let mut f = fixture();
        f.port.dispatch(FsmEvent::Initialize);

        deliver_announce(&mut f, &TestGrandmaster::mid_grade(), sender(1), 0, 1);
        deliver_announce(&mut f, &TestGrandmaster::mid_grade(), sender(1), 1, 2);

        // Same sender, different grandmaster content.
        let event = deliver_announce(&mut f, &TestGrandmaster::high_grade(), sender(1), 2, 3);

        assert_eq!(event, FsmEvent::StateDecisionEvent);
    }

    #[test]
    fn compute_best_requires_qualification() {
        let mut f = fixture();
        f.port.dispatch(FsmEvent::Initialize);

        deliver_announce(&mut f, &TestGrandmaster::mid_grade(), sender(1), 0, 1);
        assert!(f.port.compute_best(Instant::from_secs(1)).is_none());

        deliver_announce(&mut f, &TestGrandmaster::mid_grade(), sender(1), 1, 2);
        deliver_announce(&mut f, &TestGrandmaster::mid_grade(), sender(1), 2, 3);

        let best = f.port.compute_best(Instant::from_secs(3));
        assert_eq!(best.map(|fc| fc.sender()), Some(sender(1)));
        assert!(f.port.best_foreign().is_some());
    }

    #[test]
    fn compute_best_prefers_better_dataset_and_clears_losers() {
        let mut f = fixture();
        f.port.dispatch(FsmEvent::Initialize);

        let low = TestGrandmaster::low_grade();
        let high = TestGrandmaster::high_grade();
        for seq in 0..3 {
            deliver_announce(&mut f, &low, sender(1), seq, 1 + seq as u64);
            deliver_announce(&mut f, &high, sender(2), seq, 1 + seq as u64);
        }

        let best = f.port.compute_best(Instant::from_secs(3));
        assert_eq!(best.map(|fc| fc.sender()), Some(sender(2)));

        // The loser's queue was cleared; it must re-qualify.
        let loser = f
            .port
            .foreign_masters()
            .iter()
            .find(|fc| fc.sender() == sender(1))
            .unwrap();
        assert_eq!(loser.message_count(), 0);
    }

    #[test]
    fn stale_records_never_qualify() {
        let mut f = fixture();
        f.port.dispatch(FsmEvent::Initialize);

        let gm = TestGrandmaster::mid_grade();
        deliver_announce(&mut f, &gm, sender(1), 0, 1);
        deliver_announce(&mut f, &gm, sender(1), 1, 2);
        deliver_announce(&mut f, &gm, sender(1), 2, 3);

        // Both retained messages are far outside the 4 x 2^1 s window.
        assert!(f.port.compute_best(Instant::from_secs(60)).is_none());
    }

    #[test]
    fn update_current_master_falls_back_for_unknown_sender() {
        let mut f = fixture();
        f.port.dispatch(FsmEvent::Initialize);

        let gm = TestGrandmaster::mid_grade();
        for seq in 0..3 {
            deliver_announce(&mut f, &gm, sender(1), seq, 1 + seq as u64);
        }
        f.port.compute_best(Instant::from_secs(3));
        f.clock.set_parent(sender(1));
        f.port.dispatch(FsmEvent::RsSlave);

        // An announce from a different sender lands in the table as a new
        // candidate rather than rearming the master's window.
        let event = deliver_announce(&mut f, &gm, sender(9), 0, 4);
        assert_eq!(event, FsmEvent::None);
        assert!(f
            .port
            .foreign_masters()
            .iter()
            .any(|fc| fc.sender() == sender(9)));
    }

    #[test]
    fn announce_timeout_clears_best_and_rearms() {
        let mut f = fixture();
        f.port.dispatch(FsmEvent::Initialize);

        let gm = TestGrandmaster::mid_grade();
        for seq in 0..3 {
            deliver_announce(&mut f, &gm, sender(1), seq, 1 + seq as u64);
        }
        f.port.compute_best(Instant::from_secs(3));
        f.timers.take_actions();

        let event = f.port.event(FdIndex::AnnounceTimer, Instant::from_secs(10));

        assert_eq!(event, FsmEvent::AnnounceReceiptTimeoutExpires);
        assert!(f
            .timers
            .take_actions()
            .iter()
            .any(|a| matches!(a, TimerAction::Restarted(TimerKind::AnnounceReceipt, _))));
        assert!(f.port.compute_best(Instant::from_secs(10)).is_none());
    }

    #[test]
    fn delay_timer_failure_faults_the_port() {
        let mut f = fixture();
        f.port.dispatch(FsmEvent::Initialize);
        f.port.dispatch(FsmEvent::RsSlave);
        f.transport.fail_event_send(true);

        let event = f.port.event(FdIndex::DelayTimer, Instant::from_secs(1));

        assert_eq!(event, FsmEvent::FaultDetected);
    }

    #[test]
    fn delay_requests_use_increasing_sequence_numbers() {
        let mut f = fixture();
        f.port.dispatch(FsmEvent::Initialize);
        f.port.dispatch(FsmEvent::RsSlave);

        for _ in 0..3 {
            assert_eq!(
                f.port.event(FdIndex::DelayTimer, Instant::from_secs(1)),
                FsmEvent::None
            );
        }

        let frames = f.transport.take_event_frames();
        let ids: Vec<u16> = frames
            .iter()
            .map(|frame| wire::decode(frame, None).unwrap().sequence_id().raw())
            .collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn malformed_frames_are_dropped_without_fault() {
        let mut f = fixture();
        f.port.dispatch(FsmEvent::Initialize);

        f.transport.push_general_frame(vec![0u8; 10], 1);
        let event = f.port.event(FdIndex::General, Instant::from_secs(1));

        assert_eq!(event, FsmEvent::None);
    }

    #[test]
    fn receive_failure_faults_the_port() {
        let mut f = fixture();
        f.port.dispatch(FsmEvent::Initialize);

        // Nothing queued: the fake reports a receive error.
        let event = f.port.event(FdIndex::General, Instant::from_secs(1));

        assert_eq!(event, FsmEvent::FaultDetected);
    }
}
