//! End-to-end scenarios for the port engine, driven through wire-encoded
//! frames and the fake transport/clock/timer boundaries.

use std::rc::Rc;

use minptp::bmca::DefaultBmca;
use minptp::clock::ClockIdentity;
use minptp::fsm::{FsmEvent, PortState};
use minptp::log::NoopPortLog;
use minptp::message::{HwTimestamp, Message, SequenceId};
use minptp::port::{DomainNumber, Port, PortConfig, PortIdentity, PortNumber};
use minptp::test_support::{
    encode_frame, FakeClock, FakeTimerHost, FakeTransport, PathDelayCall, SynchronizeCall,
    TestGrandmaster,
};
use minptp::time::{Correction, Instant, LogInterval, TimeStamp};
use minptp::transport::FdIndex;
use minptp::wire;

type TestPort = Port<Rc<FakeClock>, Rc<FakeTransport>, Rc<FakeTimerHost>, DefaultBmca, NoopPortLog>;

struct Fixture {
    clock: Rc<FakeClock>,
    transport: Rc<FakeTransport>,
    port: TestPort,
}

fn fixture_with(slave_only: bool) -> Fixture {
    let clock = Rc::new(FakeClock::new(
        ClockIdentity::new(&[0x00, 0x1B, 0x19, 0xFF, 0xFE, 0x00, 0x00, 0x01]),
        DomainNumber::new(0),
    ));
    let transport = Rc::new(FakeTransport::new());
    let timers = Rc::new(FakeTimerHost::new());
    let mut config = PortConfig::new("eth0", PortNumber::new(1));
    config.slave_only = slave_only;
    let port = Port::open(
        config,
        Rc::clone(&clock),
        Rc::clone(&transport),
        timers,
        DefaultBmca,
        NoopPortLog,
    );
    Fixture {
        clock,
        transport,
        port,
    }
}

fn fixture() -> Fixture {
    fixture_with(false)
}

fn master() -> PortIdentity {
    PortIdentity::new(
        ClockIdentity::new(&[0x00, 0x1A, 0xC5, 0xFF, 0xFE, 0x00, 0x00, 0x01]),
        PortNumber::new(1),
    )
}

fn into_slave(f: &mut Fixture, parent: PortIdentity) {
    f.clock.set_parent(parent);
    f.port.dispatch(FsmEvent::Initialize);
    f.port.dispatch(FsmEvent::RsSlave);
    f.port.dispatch(FsmEvent::MasterClockSelected);
    assert_eq!(f.port.state(), PortState::Slave);
}

fn deliver_sync(f: &mut Fixture, seq: u16, ingress_secs: u64, correction: Correction, two_step: bool) {
    let msg = Message::sync(
        DomainNumber::new(0),
        master(),
        SequenceId::new(seq),
        two_step,
        if two_step {
            TimeStamp::new(0, 0)
        } else {
            TimeStamp::new(90, 0)
        },
        correction,
    );
    f.transport.push_event_frame(
        encode_frame(&msg),
        HwTimestamp {
            ts: TimeStamp::new(ingress_secs, 0),
            host: Instant::from_secs(1),
        },
    );
    assert_eq!(
        f.port.event(FdIndex::Event, Instant::from_secs(1)),
        FsmEvent::None
    );
}

fn deliver_follow_up(f: &mut Fixture, seq: u16, origin_secs: u64, correction: Correction) {
    let msg = Message::follow_up(
        DomainNumber::new(0),
        master(),
        SequenceId::new(seq),
        TimeStamp::new(origin_secs, 0),
        correction,
    );
    f.transport.push_general_frame(encode_frame(&msg), 1);
    assert_eq!(
        f.port.event(FdIndex::General, Instant::from_secs(1)),
        FsmEvent::None
    );
}

#[test]
fn first_announce_never_qualifies() {
    let mut f = fixture();
    f.port.dispatch(FsmEvent::Initialize);
    assert_eq!(f.port.state(), PortState::Listening);

    let gm = TestGrandmaster::mid_grade();
    f.transport
        .push_general_frame(gm.announce_frame(master(), SequenceId::new(0)), 1);

    let event = f.port.event(FdIndex::General, Instant::from_secs(1));

    assert_eq!(event, FsmEvent::None);
    assert!(f.port.compute_best(Instant::from_secs(1)).is_none());
}

#[test]
fn threshold_crossing_emits_state_decision_event() {
    let mut f = fixture();
    f.port.dispatch(FsmEvent::Initialize);

    let gm = TestGrandmaster::mid_grade();
    f.transport
        .push_general_frame(gm.announce_frame(master(), SequenceId::new(0)), 1);
    assert_eq!(
        f.port.event(FdIndex::General, Instant::from_secs(1)),
        FsmEvent::None
    );

    f.transport
        .push_general_frame(gm.announce_frame(master(), SequenceId::new(1)), 3);
    assert_eq!(
        f.port.event(FdIndex::General, Instant::from_secs(3)),
        FsmEvent::StateDecisionEvent
    );

    let best = f.port.compute_best(Instant::from_secs(3));
    assert_eq!(best.map(|fc| fc.sender()), Some(master()));
}

#[test]
fn sync_then_follow_up_synchronizes_exactly_once() {
    let mut f = fixture();
    into_slave(&mut f, master());

    deliver_sync(&mut f, 42, 100, Correction::ZERO, true);
    deliver_follow_up(&mut f, 42, 90, Correction::from_nanos(3));

    assert_eq!(
        f.clock.take_synchronize_calls(),
        vec![SynchronizeCall {
            origin: TimeStamp::new(90, 0),
            ingress: TimeStamp::new(100, 0),
            correction_sync: Correction::ZERO,
            correction_follow_up: Correction::from_nanos(3),
        }]
    );
}

#[test]
fn follow_up_then_sync_synchronizes_exactly_once() {
    let mut f = fixture();
    into_slave(&mut f, master());

    deliver_follow_up(&mut f, 42, 90, Correction::from_nanos(3));
    deliver_sync(&mut f, 42, 100, Correction::ZERO, true);

    assert_eq!(
        f.clock.take_synchronize_calls(),
        vec![SynchronizeCall {
            origin: TimeStamp::new(90, 0),
            ingress: TimeStamp::new(100, 0),
            correction_sync: Correction::ZERO,
            correction_follow_up: Correction::from_nanos(3),
        }]
    );
}

#[test]
fn one_step_sync_synchronizes_immediately() {
    let mut f = fixture();
    into_slave(&mut f, master());

    deliver_sync(&mut f, 7, 100, Correction::from_nanos(2), false);

    assert_eq!(
        f.clock.take_synchronize_calls(),
        vec![SynchronizeCall {
            origin: TimeStamp::new(90, 0),
            ingress: TimeStamp::new(100, 0),
            correction_sync: Correction::from_nanos(2),
            correction_follow_up: Correction::ZERO,
        }]
    );
}

#[test]
fn mismatched_follow_up_is_held_until_its_sync_arrives() {
    let mut f = fixture();
    into_slave(&mut f, master());

    deliver_sync(&mut f, 41, 99, Correction::ZERO, true);
    deliver_follow_up(&mut f, 42, 90, Correction::ZERO);
    assert!(f.clock.take_synchronize_calls().is_empty());

    deliver_sync(&mut f, 42, 100, Correction::ZERO, true);
    assert_eq!(f.clock.take_synchronize_calls().len(), 1);
}

#[test]
fn sync_from_non_parent_is_ignored() {
    let mut f = fixture();
    into_slave(
        &mut f,
        PortIdentity::new(
            ClockIdentity::new(&[0x00, 0x1A, 0xC5, 0xFF, 0xFE, 0xBB, 0xBB, 0xBB]),
            PortNumber::new(1),
        ),
    );

    deliver_sync(&mut f, 1, 100, Correction::ZERO, false);

    assert!(f.clock.take_synchronize_calls().is_empty());
}

#[test]
fn delay_round_trip_feeds_path_delay() {
    let mut f = fixture();
    into_slave(&mut f, master());

    f.transport.set_egress(HwTimestamp {
        ts: TimeStamp::new(200, 0),
        host: Instant::from_secs(1),
    });
    assert_eq!(
        f.port.event(FdIndex::DelayTimer, Instant::from_secs(1)),
        FsmEvent::None
    );

    let sent = f.transport.take_event_frames();
    assert_eq!(sent.len(), 1);
    let req = wire::decode(&sent[0], None).unwrap();
    assert_eq!(req.sequence_id(), SequenceId::new(0));
    assert_eq!(req.log_message_interval(), LogInterval::UNSPECIFIED);

    let resp = Message::delay_response(
        DomainNumber::new(0),
        Correction::from_nanos(1),
        master(),
        SequenceId::new(0),
        LogInterval::new(0),
        TimeStamp::new(210, 0),
        f.port.port_identity(),
    );
    f.transport.push_general_frame(encode_frame(&resp), 2);
    assert_eq!(
        f.port.event(FdIndex::General, Instant::from_secs(2)),
        FsmEvent::None
    );

    assert_eq!(
        f.clock.take_path_delay_calls(),
        vec![PathDelayCall {
            request_egress: TimeStamp::new(200, 0),
            request_ingress: TimeStamp::new(210, 0),
            correction: Correction::from_nanos(1),
        }]
    );
}

#[test]
fn delay_resp_with_wrong_sequence_is_ignored() {
    let mut f = fixture();
    into_slave(&mut f, master());

    assert_eq!(
        f.port.event(FdIndex::DelayTimer, Instant::from_secs(1)),
        FsmEvent::None
    );

    let resp = Message::delay_response(
        DomainNumber::new(0),
        Correction::ZERO,
        master(),
        SequenceId::new(8),
        LogInterval::new(0),
        TimeStamp::new(210, 0),
        f.port.port_identity(),
    );
    f.transport.push_general_frame(encode_frame(&resp), 2);
    f.port.event(FdIndex::General, Instant::from_secs(2));

    assert!(f.clock.take_path_delay_calls().is_empty());
}

#[test]
fn delay_resp_for_another_requester_is_ignored() {
    let mut f = fixture();
    into_slave(&mut f, master());

    assert_eq!(
        f.port.event(FdIndex::DelayTimer, Instant::from_secs(1)),
        FsmEvent::None
    );

    let resp = Message::delay_response(
        DomainNumber::new(0),
        Correction::ZERO,
        master(),
        SequenceId::new(0),
        LogInterval::new(0),
        TimeStamp::new(210, 0),
        PortIdentity::fake(),
    );
    f.transport.push_general_frame(encode_frame(&resp), 2);
    f.port.event(FdIndex::General, Instant::from_secs(2));

    assert!(f.clock.take_path_delay_calls().is_empty());
}

#[test]
fn delay_resp_without_outstanding_request_is_ignored() {
    let mut f = fixture();
    into_slave(&mut f, master());

    let resp = Message::delay_response(
        DomainNumber::new(0),
        Correction::ZERO,
        master(),
        SequenceId::new(0),
        LogInterval::new(0),
        TimeStamp::new(210, 0),
        f.port.port_identity(),
    );
    f.transport.push_general_frame(encode_frame(&resp), 1);
    f.port.event(FdIndex::General, Instant::from_secs(1));

    assert!(f.clock.take_path_delay_calls().is_empty());
}

#[test]
fn master_instructed_interval_is_adopted_and_clamped() {
    let mut f = fixture();
    into_slave(&mut f, master());

    f.port.event(FdIndex::DelayTimer, Instant::from_secs(1));

    // A resp carrying the unspecified sentinel must not be adopted verbatim.
    let resp = Message::delay_response(
        DomainNumber::new(0),
        Correction::ZERO,
        master(),
        SequenceId::new(0),
        LogInterval::UNSPECIFIED,
        TimeStamp::new(210, 0),
        f.port.port_identity(),
    );
    f.transport.push_general_frame(encode_frame(&resp), 2);
    f.port.event(FdIndex::General, Instant::from_secs(2));

    assert_eq!(f.port.timing().log_min_delay_req_interval().raw(), 10);
}

#[test]
fn announce_timeout_returns_slave_only_port_to_listening() {
    let mut f = fixture_with(true);
    f.clock.set_parent(master());
    f.port.dispatch(FsmEvent::Initialize);

    // Qualify the master and select it.
    let gm = TestGrandmaster::mid_grade();
    for seq in 0..2u16 {
        f.transport
            .push_general_frame(gm.announce_frame(master(), SequenceId::new(seq)), 1 + seq as u64);
        f.port
            .event(FdIndex::General, Instant::from_secs(1 + seq as u64));
    }
    assert!(f.port.compute_best(Instant::from_secs(2)).is_some());

    f.port.dispatch(FsmEvent::RsSlave);
    f.port.dispatch(FsmEvent::MasterClockSelected);
    assert_eq!(f.port.state(), PortState::Slave);

    // No announce for the receipt window: the timer fires.
    let event = f.port.event(FdIndex::AnnounceTimer, Instant::from_secs(60));
    assert_eq!(event, FsmEvent::AnnounceReceiptTimeoutExpires);

    // The best candidate lost its qualification window.
    assert!(f.port.compute_best(Instant::from_secs(60)).is_none());

    f.port.dispatch(event);
    assert_eq!(f.port.state(), PortState::Listening);
}

#[test]
fn foreign_master_queues_stay_bounded() {
    let mut f = fixture();
    f.port.dispatch(FsmEvent::Initialize);

    let gm = TestGrandmaster::mid_grade();
    for seq in 0..10u16 {
        f.transport
            .push_general_frame(gm.announce_frame(master(), SequenceId::new(seq)), 1);
        f.port.event(FdIndex::General, Instant::from_secs(1));
    }

    for fc in f.port.foreign_masters() {
        assert!(fc.message_count() <= 2);
    }
}

#[test]
fn ranking_is_stable_under_the_comparator() {
    let mut f = fixture();
    f.port.dispatch(FsmEvent::Initialize);

    let senders = [
        (TestGrandmaster::low_grade(), 0x11),
        (TestGrandmaster::high_grade(), 0x22),
        (TestGrandmaster::mid_grade(), 0x33),
    ];
    for (gm, tail) in &senders {
        let sender = PortIdentity::new(
            ClockIdentity::new(&[0, 0, 0, 0, 0, 0, 0, *tail]),
            PortNumber::new(1),
        );
        for seq in 0..2u16 {
            f.transport
                .push_general_frame(gm.announce_frame(sender, SequenceId::new(seq)), 1);
            f.port.event(FdIndex::General, Instant::from_secs(1));
        }
    }

    let best = f.port.compute_best(Instant::from_secs(1)).unwrap();
    assert_eq!(
        best.dataset().map(|ds| ds.identity),
        Some(TestGrandmaster::high_grade().identity())
    );
}
