use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use smol::{
    channel,
    channel::{Receiver, Sender, TryRecvError},
};

use super::{PacketReceiver, PacketSender, RecvError, SendError, Socket};

type Datagram = (SocketAddr, Box<[u8]>);

/// In-memory datagram switch for tests and local multi-network setups.
///
/// Every endpoint registers under an address; a send looks the destination
/// up in the hub and delivers into its queue, tagged with the sender's
/// address. Datagrams to unregistered addresses vanish, which is exactly
/// what UDP does.
#[derive(Clone, Default)]
pub struct LocalHub {
    endpoints: Arc<Mutex<HashMap<SocketAddr, Sender<Datagram>>>>,
}

impl LocalHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a socket for `addr`; its queue is registered when the reactor
    /// calls `listen`
    pub fn endpoint(&self, addr: SocketAddr) -> LocalSocket {
        LocalSocket {
            hub: self.clone(),
            addr,
        }
    }
}

pub struct LocalSocket {
    hub: LocalHub,
    addr: SocketAddr,
}

impl Socket for LocalSocket {
    fn listen(self: Box<Self>) -> (Box<dyn PacketSender>, Box<dyn PacketReceiver>) {
        let (packet_sender, packet_receiver) = channel::unbounded();
        self.hub
            .endpoints
            .lock()
            .expect("local hub lock poisoned")
            .insert(self.addr, packet_sender);
        let sender = HubSender {
            hub: self.hub,
            from: self.addr,
        };
        let receiver = HubReceiver::new(packet_receiver);
        (Box::new(sender), Box::new(receiver))
    }

    fn local_addr(&self) -> SocketAddr {
        self.addr
    }
}

struct HubSender {
    hub: LocalHub,
    from: SocketAddr,
}

impl PacketSender for HubSender {
    fn send(&self, address: &SocketAddr, payload: &[u8]) -> Result<(), SendError> {
        let endpoints = self
            .hub
            .endpoints
            .lock()
            .map_err(|_| SendError::Socket)?;
        match endpoints.get(address) {
            Some(queue) => queue
                .send_blocking((self.from, payload.into()))
                .map_err(|_| SendError::Socket),
            // no listener at that address: dropped on the floor, UDP-style
            None => Ok(()),
        }
    }
}

struct HubReceiver {
    receiver: Receiver<Datagram>,
    current_payload: Option<Box<[u8]>>,
}

impl HubReceiver {
    fn new(receiver: Receiver<Datagram>) -> Self {
        Self {
            receiver,
            current_payload: None,
        }
    }
}

impl PacketReceiver for HubReceiver {
    fn receive(&mut self) -> Result<Option<(SocketAddr, &[u8])>, RecvError> {
        match self.receiver.try_recv() {
            Ok((address, payload)) => {
                self.current_payload = Some(payload);
                Ok(Some((
                    address,
                    self.current_payload
                        .as_ref()
                        .expect("payload was just stored"),
                )))
            }
            Err(TryRecvError::Empty) => Ok(None),
            Err(_) => Err(RecvError),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    #[test]
    fn delivers_between_endpoints() {
        let hub = LocalHub::new();
        let a = Box::new(hub.endpoint(addr(7001)));
        let b = Box::new(hub.endpoint(addr(7002)));
        let (send_a, _recv_a) = a.listen();
        let (_send_b, mut recv_b) = b.listen();

        send_a.send(&addr(7002), b"hello").unwrap();
        let (from, payload) = recv_b.receive().unwrap().unwrap();
        assert_eq!(from, addr(7001));
        assert_eq!(payload, b"hello");
        assert!(recv_b.receive().unwrap().is_none());
    }

    #[test]
    fn unknown_destination_is_silently_dropped() {
        let hub = LocalHub::new();
        let a = Box::new(hub.endpoint(addr(7003)));
        let (send_a, _recv_a) = a.listen();
        assert!(send_a.send(&addr(7999), b"void").is_ok());
    }
}
