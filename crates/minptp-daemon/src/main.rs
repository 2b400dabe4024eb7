use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;
use tokio::sync::mpsc;

use minptp::bmca::{DefaultBmca, Priority1, Priority2};
use minptp::clock::{ClockIdentity, ClockQuality};
use minptp::port::{DomainNumber, Port, PortConfig, PortIdentity, PortNumber};
use minptp::time::TimeStamp;

use minptp_daemon::clock::{SystemClock, VirtualClock};
use minptp_daemon::log::TracingPortLog;
use minptp_daemon::net::MulticastSocket;
use minptp_daemon::node::{PortLoop, TokioTimerHost};
use minptp_daemon::transport::UdpTransport;

/// PTP ordinary clock daemon.
#[derive(Parser, Debug)]
#[command(name = "minptpd", version)]
struct Args {
    /// Interface name recorded in logs; sockets bind all interfaces.
    #[arg(short, long, default_value = "eth0")]
    interface: String,

    /// PTP domain number.
    #[arg(short, long, default_value_t = 0)]
    domain: u8,

    /// Port number advertised in the port identity.
    #[arg(long, default_value_t = 1)]
    port_number: u16,

    /// Local clock identity, 16 hex digits.
    #[arg(long, default_value = "001b19fffe000001", value_parser = parse_clock_identity)]
    clock_identity: ClockIdentity,

    #[arg(long, default_value_t = 128)]
    priority1: u8,

    #[arg(long, default_value_t = 128)]
    priority2: u8,

    /// clockClass of the local clock.
    #[arg(long, default_value_t = 248)]
    clock_class: u8,

    /// clockAccuracy of the local clock.
    #[arg(long, default_value_t = 0xFE)]
    clock_accuracy: u8,

    /// Never take the master role.
    #[arg(long)]
    slave_only: bool,

    /// Use the 5319/5320 test ports instead of 319/320.
    #[arg(long)]
    testing_ports: bool,
}

fn parse_clock_identity(s: &str) -> Result<ClockIdentity, String> {
    if s.len() != 16 {
        return Err("clock identity must be 16 hex digits".to_string());
    }
    let mut bytes = [0u8; 8];
    for (index, byte) in bytes.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&s[index * 2..index * 2 + 2], 16)
            .map_err(|e| format!("bad clock identity: {e}"))?;
    }
    Ok(ClockIdentity::new(&bytes))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();
    minptp_daemon::init_tracing();

    let epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let vclock = Rc::new(VirtualClock::new(
        TimeStamp::new(epoch.as_secs(), epoch.subsec_nanos()),
        1.0,
    ));

    let clock_class = if args.slave_only { 255 } else { args.clock_class };
    let clock = Rc::new(SystemClock::new(
        Rc::clone(&vclock),
        args.clock_identity,
        ClockQuality::new(clock_class, args.clock_accuracy, 0xFFFF),
        Priority1::new(args.priority1),
        Priority2::new(args.priority2),
        DomainNumber::new(args.domain),
    ));

    let (event_socket, general_socket) = if args.testing_ports {
        (
            Rc::new(MulticastSocket::event_testing().await?),
            Rc::new(MulticastSocket::general_testing().await?),
        )
    } else {
        (
            Rc::new(MulticastSocket::event().await?),
            Rc::new(MulticastSocket::general().await?),
        )
    };

    let transport = Rc::new(UdpTransport::new(
        Rc::clone(&event_socket),
        Rc::clone(&general_socket),
        Rc::clone(&vclock),
    ));

    let (timer_tx, timer_rx) = mpsc::unbounded_channel();
    let timer_host = TokioTimerHost::new(timer_tx);

    let mut config = PortConfig::new(&args.interface, PortNumber::new(args.port_number));
    config.slave_only = args.slave_only;

    let port_identity = PortIdentity::new(args.clock_identity, PortNumber::new(args.port_number));
    let port = Port::open(
        config,
        Rc::clone(&clock),
        transport,
        timer_host,
        DefaultBmca,
        TracingPortLog::new(port_identity),
    );

    PortLoop::new(port, clock, event_socket, general_socket, timer_rx)
        .run()
        .await
}
