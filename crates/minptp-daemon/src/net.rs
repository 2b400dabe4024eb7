use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::io::{Error, ErrorKind, Result};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::rc::Rc;

use tokio::net::UdpSocket;
use tokio::sync::Notify;

/// Non-blocking datagram boundary for the port loop. `readable` resolves
/// once `try_recv` will yield a frame (modulo spurious wakeups on real
/// sockets, which surface as receive errors exactly like a failed read
/// after poll).
pub trait NetworkSocket {
    fn readable(&self) -> impl Future<Output = Result<()>> + '_;

    fn try_send(&self, buf: &[u8]) -> Result<usize>;

    fn try_recv(&self, buf: &mut [u8]) -> Result<usize>;
}

impl<N: NetworkSocket> NetworkSocket for Rc<N> {
    fn readable(&self) -> impl Future<Output = Result<()>> + '_ {
        self.as_ref().readable()
    }

    fn try_send(&self, buf: &[u8]) -> Result<usize> {
        self.as_ref().try_send(buf)
    }

    fn try_recv(&self, buf: &mut [u8]) -> Result<usize> {
        self.as_ref().try_recv(buf)
    }
}

#[derive(Debug)]
pub struct MulticastSocket {
    socket: UdpSocket,
    dest: SocketAddrV4,
}

impl MulticastSocket {
    const PTP_MCAST: Ipv4Addr = Ipv4Addr::new(224, 0, 1, 129);

    pub async fn event() -> Result<Self> {
        Self::bind_v4(Self::PTP_MCAST, 319).await
    }

    pub async fn general() -> Result<Self> {
        Self::bind_v4(Self::PTP_MCAST, 320).await
    }

    pub async fn event_testing() -> Result<Self> {
        Self::bind_v4(Self::PTP_MCAST, 5319).await
    }

    pub async fn general_testing() -> Result<Self> {
        Self::bind_v4(Self::PTP_MCAST, 5320).await
    }

    pub async fn bind_v4(multicast: Ipv4Addr, port: u16) -> Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", port)).await?;
        socket.join_multicast_v4(multicast, Ipv4Addr::UNSPECIFIED)?;
        socket.set_multicast_loop_v4(false)?;
        socket.set_multicast_ttl_v4(1)?;
        Ok(Self {
            socket,
            dest: SocketAddrV4::new(multicast, port),
        })
    }
}

impl NetworkSocket for MulticastSocket {
    fn readable(&self) -> impl Future<Output = Result<()>> + '_ {
        self.socket.readable()
    }

    fn try_send(&self, buf: &[u8]) -> Result<usize> {
        self.socket.try_send_to(buf, SocketAddr::V4(self.dest))
    }

    fn try_recv(&self, buf: &mut [u8]) -> Result<usize> {
        self.socket.try_recv_from(buf).map(|(size, _peer)| size)
    }
}

struct LoopbackInner {
    queue: RefCell<VecDeque<Vec<u8>>>,
    notify: Notify,
}

impl LoopbackInner {
    fn new() -> Rc<Self> {
        Rc::new(Self {
            queue: RefCell::new(VecDeque::new()),
            notify: Notify::new(),
        })
    }
}

/// In-process datagram pair for tests: what one end sends, the other
/// receives.
pub struct LoopbackSocket {
    rx: Rc<LoopbackInner>,
    tx: Rc<LoopbackInner>,
}

impl LoopbackSocket {
    pub fn pair() -> (LoopbackSocket, LoopbackSocket) {
        let a = LoopbackInner::new();
        let b = LoopbackInner::new();
        (
            LoopbackSocket {
                rx: Rc::clone(&a),
                tx: Rc::clone(&b),
            },
            LoopbackSocket { rx: b, tx: a },
        )
    }
}

impl NetworkSocket for LoopbackSocket {
    fn readable(&self) -> impl Future<Output = Result<()>> + '_ {
        async {
            loop {
                if !self.rx.queue.borrow().is_empty() {
                    return Ok(());
                }
                self.rx.notify.notified().await;
            }
        }
    }

    fn try_send(&self, buf: &[u8]) -> Result<usize> {
        self.tx.queue.borrow_mut().push_back(buf.to_vec());
        self.tx.notify.notify_one();
        Ok(buf.len())
    }

    fn try_recv(&self, buf: &mut [u8]) -> Result<usize> {
        let frame = self
            .rx
            .queue
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| Error::from(ErrorKind::WouldBlock))?;
        if frame.len() > buf.len() {
            return Err(Error::from(ErrorKind::InvalidData));
        }
        buf[..frame.len()].copy_from_slice(&frame);
        Ok(frame.len())
    }
}
