//! The single-port event loop and its tokio timer host.
//!
//! The loop is the external multiplexer the engine expects: it waits for one
//! ready descriptor — event socket, general socket, or a timer slot
//! delivered over the timer channel — feeds it to [`Port::event`], and
//! applies the returned event through [`Port::dispatch`] before looking at
//! the next one. `STATE_DECISION_EVENT` is answered here with the
//! single-port state decision.

use std::cmp::Ordering;
use std::rc::Rc;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant as StdInstant;

use tokio::sync::mpsc;

use minptp::bmca::{Bmca, DefaultBmca};
use minptp::fsm::{FsmEvent, PortState};
use minptp::port::Port;
use minptp::time::Instant;
use minptp::timer::{Timeout, TimerHost, TimerKind};
use minptp::transport::FdIndex;

use crate::clock::SystemClock;
use crate::log::TracingPortLog;
use crate::net::NetworkSocket;
use crate::transport::UdpTransport;

/// Single-shot timer delivering its [`FdIndex`] slot over the loop's
/// channel. Restart aborts the pending sleep and spawns a new one; drop
/// cancels.
pub struct TokioTimeout {
    fd_index: FdIndex,
    tx: mpsc::UnboundedSender<FdIndex>,
    handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Timeout for TokioTimeout {
    fn restart(&self, delay: Duration) {
        let mut guard = self.handle.lock().unwrap();
        if let Some(handle) = guard.take() {
            handle.abort();
        }
        let tx = self.tx.clone();
        let fd_index = self.fd_index;
        *guard = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(fd_index);
        }));
    }

    fn clear(&self) {
        if let Some(handle) = self.handle.lock().unwrap().take() {
            handle.abort();
        }
    }
}

impl Drop for TokioTimeout {
    fn drop(&mut self) {
        self.clear();
    }
}

pub struct TokioTimerHost {
    tx: mpsc::UnboundedSender<FdIndex>,
}

impl TokioTimerHost {
    pub fn new(tx: mpsc::UnboundedSender<FdIndex>) -> Self {
        Self { tx }
    }
}

impl TimerHost for TokioTimerHost {
    type Timeout = TokioTimeout;

    fn timeout(&self, kind: TimerKind) -> Self::Timeout {
        let fd_index = match kind {
            TimerKind::AnnounceReceipt => FdIndex::AnnounceTimer,
            TimerKind::DelayRequest => FdIndex::DelayTimer,
        };
        TokioTimeout {
            fd_index,
            tx: self.tx.clone(),
            handle: Mutex::new(None),
        }
    }
}

pub type DaemonPort<N> =
    Port<Rc<SystemClock>, Rc<UdpTransport<N>>, TokioTimerHost, DefaultBmca, TracingPortLog>;

pub struct PortLoop<N: NetworkSocket> {
    port: DaemonPort<N>,
    clock: Rc<SystemClock>,
    event_socket: Rc<N>,
    general_socket: Rc<N>,
    timer_rx: mpsc::UnboundedReceiver<FdIndex>,
    start: StdInstant,
}

impl<N: NetworkSocket> PortLoop<N> {
    pub fn new(
        port: DaemonPort<N>,
        clock: Rc<SystemClock>,
        event_socket: Rc<N>,
        general_socket: Rc<N>,
        timer_rx: mpsc::UnboundedReceiver<FdIndex>,
    ) -> Self {
        Self {
            port,
            clock,
            event_socket,
            general_socket,
            timer_rx,
            start: StdInstant::now(),
        }
    }

    pub async fn run(self) -> std::io::Result<()> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Drive the port until `shutdown` resolves, ctrl-c arrives, or a socket
    /// dies.
    pub async fn run_until<F>(mut self, shutdown: F) -> std::io::Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        self.port.dispatch(FsmEvent::PowerUp);

        loop {
            tokio::select! {
                ready = self.event_socket.readable() => {
                    ready?;
                    self.handle(FdIndex::Event);
                }
                ready = self.general_socket.readable() => {
                    ready?;
                    self.handle(FdIndex::General);
                }
                fd_index = self.timer_rx.recv() => {
                    if let Some(fd_index) = fd_index {
                        self.handle(fd_index);
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    return Ok(());
                }
                _ = &mut shutdown => {
                    return Ok(());
                }
            }
        }
    }

    fn now(&self) -> Instant {
        Instant::from_nanos(self.start.elapsed().as_nanos() as u64)
    }

    fn handle(&mut self, fd_index: FdIndex) {
        let now = self.now();
        match self.port.event(fd_index, now) {
            FsmEvent::StateDecisionEvent => self.state_decision(now),
            event => self.port.dispatch(event),
        }

        // The first applied offset completes calibration.
        if self.clock.take_synchronized() && self.port.state() == PortState::Uncalibrated {
            self.port.dispatch(FsmEvent::MasterClockSelected);
        }
    }

    /// Single-port rendition of the clock-level state decision: compare the
    /// best qualified foreign candidate against the local dataset.
    fn state_decision(&mut self, now: Instant) {
        let best = self.port.compute_best(now).and_then(|fc| fc.dataset().copied());
        let Some(foreign) = best else {
            return;
        };

        let local = self.clock.local_dataset(self.port.port_identity());
        if DefaultBmca.dscmp(&local, &foreign) == Ordering::Greater {
            self.port.dispatch(FsmEvent::RsGrandMaster);
        } else {
            self.clock.set_parent(foreign.sender);
            self.port.dispatch(FsmEvent::RsSlave);
        }
    }
}
