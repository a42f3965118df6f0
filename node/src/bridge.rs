//! Cross-thread bridge into the reactor: foreign threads enqueue tagged
//! binary records on a bounded queue; the reactor drains them during idle
//! passes and performs the operations on its own thread.
//!
//! A caller may block on a per-call rendezvous until the reactor has
//! performed the operation. The wait has a bounded timeout; on expiry the
//! caller walks away while the operation itself still completes.

use std::net::SocketAddr;
use std::sync::mpsc::{sync_channel, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::time::Duration;

use log::{debug, warn};

use tether_shared::{ByteReader, ByteWriter, WireError};

use crate::error::BridgeError;

const OP_SEND_TO_PEER: u8 = 0;
const OP_PUBLISH: u8 = 1;
const OP_SEND_ANSWER: u8 = 2;
const OP_SUBSCRIBE: u8 = 3;
const OP_ASYNC_DATA: u8 = 4;

/// Operation a foreign thread asks the reactor to perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeOp {
    /// Send a command to a peer looked up by name
    SendToPeer { peer: String, cmd: u8, data: Vec<u8> },
    /// Publish data to every subscriber of an event
    Publish { event: u16, data: Vec<u8> },
    /// Send a command straight to an address (answering without a peer
    /// table lookup)
    SendAnswer {
        addr: SocketAddr,
        cmd: u8,
        data: Vec<u8>,
    },
    /// Subscribe this node to an event on a remote peer
    Subscribe { peer: String, event: u16 },
    /// Surface raw data to the application as an Async event
    AsyncData { data: Vec<u8> },
}

impl BridgeOp {
    /// Pack into a tagged binary record: discriminator byte + packed args
    pub(crate) fn encode(&self) -> Result<Vec<u8>, WireError> {
        let mut writer = ByteWriter::new();
        match self {
            BridgeOp::SendToPeer { peer, cmd, data } => {
                writer.write_u8(OP_SEND_TO_PEER);
                writer.write_str(peer)?;
                writer.write_u8(*cmd);
                writer.write_bytes(data);
            }
            BridgeOp::Publish { event, data } => {
                writer.write_u8(OP_PUBLISH);
                writer.write_u16(*event);
                writer.write_bytes(data);
            }
            BridgeOp::SendAnswer { addr, cmd, data } => {
                writer.write_u8(OP_SEND_ANSWER);
                writer.write_str(&addr.to_string())?;
                writer.write_u8(*cmd);
                writer.write_bytes(data);
            }
            BridgeOp::Subscribe { peer, event } => {
                writer.write_u8(OP_SUBSCRIBE);
                writer.write_str(peer)?;
                writer.write_u16(*event);
            }
            BridgeOp::AsyncData { data } => {
                writer.write_u8(OP_ASYNC_DATA);
                writer.write_bytes(data);
            }
        }
        Ok(writer.finish())
    }

    pub(crate) fn decode(record: &[u8]) -> Result<Self, WireError> {
        let mut reader = ByteReader::new(record);
        match reader.read_u8()? {
            OP_SEND_TO_PEER => Ok(BridgeOp::SendToPeer {
                peer: reader.read_str()?.to_owned(),
                cmd: reader.read_u8()?,
                data: reader.read_rest().to_vec(),
            }),
            OP_PUBLISH => Ok(BridgeOp::Publish {
                event: reader.read_u16()?,
                data: reader.read_rest().to_vec(),
            }),
            OP_SEND_ANSWER => {
                let addr = reader
                    .read_str()?
                    .parse()
                    .map_err(|_| WireError::InvalidUtf8)?;
                Ok(BridgeOp::SendAnswer {
                    addr,
                    cmd: reader.read_u8()?,
                    data: reader.read_rest().to_vec(),
                })
            }
            OP_SUBSCRIBE => Ok(BridgeOp::Subscribe {
                peer: reader.read_str()?.to_owned(),
                event: reader.read_u16()?,
            }),
            OP_ASYNC_DATA => Ok(BridgeOp::AsyncData {
                data: reader.read_rest().to_vec(),
            }),
            kind => Err(WireError::UnknownKind { kind }),
        }
    }
}

struct Record {
    bytes: Vec<u8>,
    picked_up: Option<SyncSender<()>>,
}

/// Handle foreign threads use to reach the reactor. Cheap to clone.
#[derive(Clone)]
pub struct BridgeHandle {
    queue: SyncSender<Record>,
}

impl BridgeHandle {
    /// Enqueue without waiting for the reactor to pick the record up
    pub fn post(&self, op: &BridgeOp) -> Result<(), BridgeError> {
        let bytes = op.encode()?;
        match self.queue.try_send(Record {
            bytes,
            picked_up: None,
        }) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(BridgeError::Full),
            Err(TrySendError::Disconnected(_)) => Err(BridgeError::Closed),
        }
    }

    /// Enqueue and block until the reactor has performed the operation, or
    /// until `timeout`. A timeout abandons the wait only; the operation
    /// still runs.
    pub fn call(&self, op: &BridgeOp, timeout: Duration) -> Result<(), BridgeError> {
        let bytes = op.encode()?;
        let (done, wait) = sync_channel(1);
        match self.queue.try_send(Record {
            bytes,
            picked_up: Some(done),
        }) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => return Err(BridgeError::Full),
            Err(TrySendError::Disconnected(_)) => return Err(BridgeError::Closed),
        }
        match wait.recv_timeout(timeout) {
            Ok(()) => Ok(()),
            Err(RecvTimeoutError::Timeout) => {
                debug!("bridge call not completed within {timeout:?}, abandoning wait");
                Err(BridgeError::Timeout)
            }
            Err(RecvTimeoutError::Disconnected) => Err(BridgeError::Closed),
        }
    }
}

/// Rendezvous of a caller blocked in [`BridgeHandle::call`]; the reactor
/// signals it only after the operation has run
pub(crate) struct Completion(Option<SyncSender<()>>);

impl Completion {
    pub fn signal(self) {
        if let Some(done) = self.0 {
            // the caller may already have timed out and gone
            let _ = done.try_send(());
        }
    }
}

/// Reactor-side end: drained once per idle pass
pub(crate) struct BridgeQueue {
    records: Receiver<Record>,
}

impl BridgeQueue {
    pub fn with_capacity(capacity: usize) -> (BridgeHandle, Self) {
        let (sender, receiver) = sync_channel(capacity);
        (
            BridgeHandle { queue: sender },
            Self { records: receiver },
        )
    }

    /// Take every queued record; the reactor signals each [`Completion`]
    /// after performing its operation. Undecodable records are logged and
    /// skipped; dropping their rendezvous wakes the caller with `Closed`
    /// rather than claiming the operation ran.
    pub fn drain(&mut self) -> Vec<(BridgeOp, Completion)> {
        let mut ops = Vec::new();
        while let Ok(record) = self.records.try_recv() {
            match BridgeOp::decode(&record.bytes) {
                Ok(op) => ops.push((op, Completion(record.picked_up))),
                Err(err) => warn!("dropping malformed bridge record: {err}"),
            }
        }
        ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn records_round_trip_through_the_queue() {
        let (handle, mut queue) = BridgeQueue::with_capacity(8);
        let op = BridgeOp::SendToPeer {
            peer: "relay-1".into(),
            cmd: 129,
            data: b"hi".to_vec(),
        };
        handle.post(&op).unwrap();
        handle
            .post(&BridgeOp::Publish {
                event: 7,
                data: b"pub".to_vec(),
            })
            .unwrap();

        let ops = queue.drain();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].0, op);
    }

    #[test]
    fn every_op_kind_encodes_and_decodes() {
        let ops = [
            BridgeOp::SendToPeer {
                peer: "a".into(),
                cmd: 200,
                data: vec![1, 2],
            },
            BridgeOp::Publish {
                event: 1,
                data: vec![3],
            },
            BridgeOp::SendAnswer {
                addr: "127.0.0.1:9001".parse().unwrap(),
                cmd: 5,
                data: vec![],
            },
            BridgeOp::Subscribe {
                peer: "b".into(),
                event: 9,
            },
            BridgeOp::AsyncData {
                data: b"raw".to_vec(),
            },
        ];
        for op in ops {
            assert_eq!(BridgeOp::decode(&op.encode().unwrap()).unwrap(), op);
        }
    }

    #[test]
    fn call_blocks_until_the_operation_completes() {
        let (handle, mut queue) = BridgeQueue::with_capacity(8);
        let worker = thread::spawn(move || {
            handle.call(
                &BridgeOp::AsyncData {
                    data: b"x".to_vec(),
                },
                Duration::from_secs(5),
            )
        });
        // spin until the record shows up
        let mut ops = Vec::new();
        while ops.is_empty() {
            ops = queue.drain();
        }
        // picked up but not yet performed: the caller must still be waiting
        thread::sleep(Duration::from_millis(50));
        assert!(!worker.is_finished());

        for (_, completion) in ops {
            completion.signal();
        }
        assert!(worker.join().unwrap().is_ok());
    }

    #[test]
    fn call_times_out_but_the_op_survives() {
        let (handle, mut queue) = BridgeQueue::with_capacity(8);
        let result = handle.call(
            &BridgeOp::Publish {
                event: 3,
                data: vec![],
            },
            Duration::from_millis(10),
        );
        assert!(matches!(result, Err(BridgeError::Timeout)));
        // the reactor still gets the op afterwards
        assert_eq!(queue.drain().len(), 1);
    }

    #[test]
    fn full_queue_rejects_instead_of_blocking() {
        let (handle, _queue) = BridgeQueue::with_capacity(1);
        let op = BridgeOp::AsyncData { data: vec![] };
        handle.post(&op).unwrap();
        assert!(matches!(handle.post(&op), Err(BridgeError::Full)));
    }
}
