use thiserror::Error;

use tether_shared::WireError;

use crate::transport::SendError;

/// Errors surfaced by node-level operations.
///
/// Transient network conditions (checksum mismatch, duplicate ids, peer
/// silence) never appear here; they are dropped and counted by the
/// transport, per the substrate's propagation policy.
#[derive(Debug, Error)]
pub enum NodeError {
    /// The named peer is not in the peer table
    #[error("Unknown peer: {0}")]
    UnknownPeer(String),

    /// The node's socket has not been opened yet (it opens on the first
    /// idle pass of the reactor)
    #[error("Node is not listening yet")]
    NotListening,

    /// The transport backend refused the datagram
    #[error("Send failed: {0}")]
    Send(#[from] SendError),

    /// A command payload could not be composed
    #[error("Wire error: {0}")]
    Wire(#[from] WireError),

    /// Underlying socket error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by the async bridge
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// The bounded rendezvous wait elapsed; the reactor-side operation may
    /// still complete
    #[error("Bridge call timed out waiting for the reactor")]
    Timeout,

    /// The reactor side of the queue is gone
    #[error("Bridge queue is closed")]
    Closed,

    /// The queue is full (the reactor is not draining)
    #[error("Bridge queue is full")]
    Full,

    /// A bridge record could not be encoded or decoded
    #[error("Malformed bridge record: {0}")]
    Record(#[from] WireError),
}

/// Errors surfaced by the callback queue
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CqueError {
    /// No pending entry with this id; it never existed or already fired
    #[error("Unknown callback-queue id {0}")]
    UnknownId(u32),
}
