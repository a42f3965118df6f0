use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};

use log::warn;

use super::{PacketReceiver, PacketSender, RecvError, SendError, Socket};

/// Largest datagram the receiver will accept; anything bigger is truncated
/// by the OS and will fail the envelope length check.
const MAX_DATAGRAM: usize = 2048;

/// Plain non-blocking UDP backend
pub struct UdpTransport {
    socket: UdpSocket,
    local_addr: SocketAddr,
}

impl UdpTransport {
    pub fn bind(addr: SocketAddr) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;
        let local_addr = socket.local_addr()?;
        Ok(Self { socket, local_addr })
    }
}

impl Socket for UdpTransport {
    fn listen(self: Box<Self>) -> (Box<dyn PacketSender>, Box<dyn PacketReceiver>) {
        let sender_socket = match self.socket.try_clone() {
            Ok(socket) => socket,
            Err(err) => {
                // A socket that cannot be cloned cannot be served; this is
                // resource exhaustion, which the substrate treats as fatal.
                panic!("cannot clone UDP socket for sending: {err}");
            }
        };
        let sender = UdpSender {
            socket: sender_socket,
        };
        let receiver = UdpReceiver {
            socket: self.socket,
            buffer: Box::new([0; MAX_DATAGRAM]),
            current_len: 0,
        };
        (Box::new(sender), Box::new(receiver))
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

struct UdpSender {
    socket: UdpSocket,
}

impl PacketSender for UdpSender {
    fn send(&self, address: &SocketAddr, payload: &[u8]) -> Result<(), SendError> {
        match self.socket.send_to(payload, address) {
            Ok(_) => Ok(()),
            Err(err) => {
                warn!("UDP send to {address} failed: {err}");
                Err(SendError::Socket)
            }
        }
    }
}

struct UdpReceiver {
    socket: UdpSocket,
    buffer: Box<[u8; MAX_DATAGRAM]>,
    current_len: usize,
}

impl PacketReceiver for UdpReceiver {
    fn receive(&mut self) -> Result<Option<(SocketAddr, &[u8])>, RecvError> {
        match self.socket.recv_from(&mut self.buffer[..]) {
            Ok((len, address)) => {
                self.current_len = len;
                Ok(Some((address, &self.buffer[..self.current_len])))
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => Ok(None),
            // Some platforms surface ICMP port-unreachable as a recv error;
            // that is a transient condition, not a dead socket.
            Err(err) if err.kind() == ErrorKind::ConnectionReset => Ok(None),
            Err(_) => Err(RecvError),
        }
    }
}
