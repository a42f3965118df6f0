//! Transport seam: the reactor reads and writes datagrams through these
//! traits, so tests can swap the UDP socket for an in-memory hub.

mod channel;
mod udp;

use std::net::SocketAddr;

use thiserror::Error;

pub use channel::{LocalHub, LocalSocket};
pub use udp::UdpTransport;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    /// Payload longer than the envelope length field can carry
    #[error("Payload of {len} bytes exceeds the {max}-byte transport limit")]
    PayloadTooLarge { len: usize, max: usize },
    /// The socket refused the datagram
    #[error("Failed to send packet")]
    Socket,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to receive packet")]
pub struct RecvError;

pub trait PacketSender: Send + Sync {
    fn send(&self, address: &SocketAddr, payload: &[u8]) -> Result<(), SendError>;
}

pub trait PacketReceiver: Send + Sync {
    /// Non-blocking receive; `Ok(None)` when no datagram is waiting
    fn receive(&mut self) -> Result<Option<(SocketAddr, &[u8])>, RecvError>;
}

/// A bindable socket, opened by the reactor on its first idle pass
pub trait Socket: Send {
    fn listen(self: Box<Self>) -> (Box<dyn PacketSender>, Box<dyn PacketReceiver>);
    fn local_addr(&self) -> SocketAddr;
}
