//! # Tether Node
//! A peer-to-peer networking substrate: reliable delivery over UDP
//! (per-peer sequencing, acknowledgment, retransmission, reordering), a
//! peer table with liveness probing, command dispatch with subscriptions,
//! and a single-threaded reactor that multiplexes socket I/O, timers,
//! signals and a cross-thread async bridge.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod bridge;
mod cque;
mod dispatch;
mod error;
mod events;
mod multi;
mod node;
mod peers;
mod restart;
mod signal;
mod subscribe;
mod transport;
mod trudp;

pub use bridge::{BridgeHandle, BridgeOp};
pub use cque::{CallbackQueue, CqueOutcome};
pub use error::{BridgeError, CqueError, NodeError};
pub use events::{Event, Events};
pub use multi::MultiNet;
pub use node::{Node, NodeConfig};
pub use peers::{PeerMode, PeerRecord, PeerTable};
pub use restart::{ExecFn, RestartHandler};
pub use transport::{
    LocalHub, LocalSocket, PacketReceiver, PacketSender, RecvError, SendError, Socket,
    UdpTransport,
};
pub use trudp::{ChannelStats, TrudpStat};
