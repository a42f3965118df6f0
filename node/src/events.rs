use std::collections::VecDeque;
use std::net::SocketAddr;

/// Lifecycle and data events emitted by a [`Node`](crate::Node) to the
/// application callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The reactor finished starting up and opened its socket
    Started,
    /// A new peer appeared in the peer table
    Connected { peer: String },
    /// A peer was removed, either explicitly or by the liveness timeout
    Disconnected { peer: String },
    /// A user-range command arrived from a peer
    Received {
        from: String,
        cmd: u8,
        data: Vec<u8>,
    },
    /// A DATA message we sent was acknowledged
    ReceivedAck {
        to: SocketAddr,
        cmd: u8,
        seq: u32,
    },
    /// The housekeeping tick elapsed
    Tick,
    /// The application's custom timer interval elapsed
    Timer,
    /// Nothing else was pending this pass
    Idle,
    /// A foreign thread injected data through the async bridge
    Async { data: Vec<u8> },
    /// Published data arrived for an event this node subscribed to
    Subscribe { event: u16, data: Vec<u8> },
    /// The reactor is about to tear down its modules
    StoppedBefore,
    /// Teardown finished
    Stopped,
}

/// Buffer of events produced by one reactor pass, drained by the
/// application
#[derive(Default)]
pub struct Events {
    queue: VecDeque<Event>,
}

impl Events {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event) {
        self.queue.push_back(event);
    }

    pub fn pop(&mut self) -> Option<Event> {
        self.queue.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn drain(&mut self) -> Vec<Event> {
        self.queue.drain(..).collect()
    }
}
