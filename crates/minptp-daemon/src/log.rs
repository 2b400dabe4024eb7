use minptp::log::{PortEvent, PortLog};
use minptp::port::PortIdentity;

#[derive(Clone, Copy, Debug)]
pub struct TracingPortLog {
    port_identity: PortIdentity,
}

impl TracingPortLog {
    pub fn new(port_identity: PortIdentity) -> Self {
        Self { port_identity }
    }
}

impl PortLog for TracingPortLog {
    fn log(&self, event: PortEvent<'_>) {
        let port = self.port_identity;
        match event {
            PortEvent::MessageSent(msg) => tracing::debug!("{port}: sent {msg}"),
            PortEvent::MessageReceived(msg) => tracing::debug!("{port}: received {msg}"),
            PortEvent::StateTransition { from, to, event } => {
                tracing::info!("{port}: {from} to {to} on {event}")
            }
            PortEvent::NewForeignMaster { sender } => {
                tracing::info!("{port}: new foreign master {sender}")
            }
            PortEvent::AnnounceTimeout => tracing::debug!("{port}: announce timeout"),
            PortEvent::DelayTimeout => tracing::debug!("{port}: delay timeout"),
            PortEvent::MalformedMessage(err) => {
                tracing::warn!("{port}: dropping bad message: {err}")
            }
            PortEvent::SendFailed { message } => {
                tracing::warn!("{port}: failed to send {message}")
            }
            PortEvent::DelayRequestIntervalChanged { log_interval } => {
                tracing::info!("{port}: minimum delay request interval 2^{log_interval}")
            }
        }
    }
}
