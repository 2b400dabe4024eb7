//! In-process end-to-end test: a scripted master drives the daemon port
//! from LISTENING through qualification into SLAVE, disciplines its clock
//! with a two-step Sync exchange, and answers its Delay_Req.
//!
//! Runs single-threaded over loopback socket pairs with the tokio clock
//! paused; virtual time is advanced manually so the PTP timers fire
//! quickly.

use std::rc::Rc;
use std::time::Duration;

use tokio::sync::mpsc;

use minptp::bmca::{DefaultBmca, Priority1, Priority2};
use minptp::clock::{Clock, ClockIdentity, ClockQuality};
use minptp::message::{Message, SequenceId};
use minptp::port::{DomainNumber, Port, PortConfig, PortIdentity, PortNumber};
use minptp::test_support::{encode_frame, TestGrandmaster};
use minptp::time::{Correction, TimeStamp};
use minptp::wire;

use minptp_daemon::clock::{SystemClock, VirtualClock};
use minptp_daemon::log::TracingPortLog;
use minptp_daemon::net::{LoopbackSocket, NetworkSocket};
use minptp_daemon::node::{PortLoop, TokioTimerHost};
use minptp_daemon::transport::UdpTransport;

async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

async fn advance(duration: Duration) {
    tokio::time::advance(duration).await;
    settle().await;
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn slave_follows_scripted_master() -> std::io::Result<()> {
    minptp_daemon::init_tracing();

    let (master_event, slave_event) = LoopbackSocket::pair();
    let (master_general, slave_general) = LoopbackSocket::pair();
    let slave_event = Rc::new(slave_event);
    let slave_general = Rc::new(slave_general);

    // The slave boots close to master time but visibly behind it.
    let vclock = Rc::new(VirtualClock::new(TimeStamp::new(995, 0), 1.0));
    let slave_identity = ClockIdentity::new(&[0x00, 0x1B, 0x19, 0xFF, 0xFE, 0x00, 0x00, 0x02]);
    let clock = Rc::new(SystemClock::new(
        Rc::clone(&vclock),
        slave_identity,
        ClockQuality::new(248, 0xFE, 0xFFFF),
        Priority1::new(200),
        Priority2::new(200),
        DomainNumber::new(0),
    ));

    let transport = Rc::new(UdpTransport::new(
        Rc::clone(&slave_event),
        Rc::clone(&slave_general),
        Rc::clone(&vclock),
    ));
    let (timer_tx, timer_rx) = mpsc::unbounded_channel();

    let port_identity = PortIdentity::new(slave_identity, PortNumber::new(1));
    let port = Port::open(
        PortConfig::new("lo", PortNumber::new(1)),
        Rc::clone(&clock),
        transport,
        TokioTimerHost::new(timer_tx),
        DefaultBmca,
        TracingPortLog::new(port_identity),
    );

    let port_loop = PortLoop::new(
        port,
        Rc::clone(&clock),
        Rc::clone(&slave_event),
        Rc::clone(&slave_general),
        timer_rx,
    );

    let gm = TestGrandmaster::high_grade();
    let master_identity = PortIdentity::new(gm.identity(), PortNumber::new(1));
    let domain = DomainNumber::new(0);
    let clock_probe = Rc::clone(&clock);

    let script = async move {
        settle().await;

        // Two Announces qualify the master and trigger the state decision.
        master_general
            .try_send(&gm.announce_frame(master_identity, SequenceId::new(0)))
            .unwrap();
        settle().await;
        advance(Duration::from_secs(2)).await;
        master_general
            .try_send(&gm.announce_frame(master_identity, SequenceId::new(1)))
            .unwrap();
        settle().await;

        assert_eq!(clock_probe.parent_identity(), master_identity);

        // Two-step Sync exchange: origin time 1000 s at the master.
        let sync = Message::sync(
            domain,
            master_identity,
            SequenceId::new(7),
            true,
            TimeStamp::new(0, 0),
            Correction::ZERO,
        );
        master_event.try_send(&encode_frame(&sync)).unwrap();
        settle().await;
        let follow_up = Message::follow_up(
            domain,
            master_identity,
            SequenceId::new(7),
            TimeStamp::new(1000, 0),
            Correction::ZERO,
        );
        master_general.try_send(&encode_frame(&follow_up)).unwrap();
        settle().await;

        // The offset was applied and calibration completed.
        assert!(clock_probe.now() >= TimeStamp::new(999, 0));

        // The slave's delay timer fires within 2^(0+1) seconds.
        let mut buf = [0u8; wire::MAX_MESSAGE_LEN];
        let mut request = None;
        for _ in 0..20 {
            advance(Duration::from_millis(500)).await;
            if let Ok(len) = master_event.try_recv(&mut buf) {
                request = Some(wire::decode(&buf[..len], None).unwrap());
                break;
            }
        }
        let request = request.expect("slave never sent a Delay_Req");
        assert_eq!(request.source_port_identity(), port_identity);

        // Answer it; T4 is master ingress time.
        let response = Message::delay_response(
            domain,
            Correction::ZERO,
            master_identity,
            request.sequence_id(),
            minptp::time::LogInterval::new(0),
            TimeStamp::new(1006, 0),
            request.source_port_identity(),
        );
        master_general.try_send(&encode_frame(&response)).unwrap();
        settle().await;

        assert!(clock_probe.mean_path_delay_nanos().is_some());
    };

    port_loop.run_until(script).await
}
