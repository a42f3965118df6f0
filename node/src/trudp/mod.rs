//! TR-UDP: ordered, acknowledged delivery per destination over plain UDP.
//!
//! Each destination address gets an independent [`Channel`] created lazily
//! on first contact, so one slow peer never blocks another. Transient
//! network errors (bad checksum, duplicate ids) are dropped and counted
//! here and never surface to the application.

mod channel;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use log::{debug, trace};

use tether_shared::{trip_time_ms, Envelope, MessageKind, MAX_PAYLOAD};

pub use channel::ChannelStats;
use channel::{Channel, ReceiveOutcome};

use crate::transport::{PacketSender, SendError};

/// Aggregated transport statistics across all channels
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrudpStat {
    pub channels: usize,
    pub pending_total: usize,
    pub queued_total: usize,
    pub retransmits_total: u64,
    pub dropped_total: u64,
}

/// What one inbound datagram amounted to
pub(crate) enum Incoming {
    /// Malformed, duplicate or stale; already counted
    Dropped,
    /// In-order DATA payloads released to dispatch, in sequence order
    Data { payloads: Vec<Vec<u8>> },
    /// An ACK settled a pending DATA message
    Ack {
        seq: u32,
        cmd: u8,
        triptime_ms: f64,
    },
    /// The peer reset the channel
    Reset,
}

pub(crate) struct Trudp {
    channels: HashMap<SocketAddr, Channel>,
    retransmit_interval: Duration,
    max_attempts: Option<u32>,
    /// Undecodable datagrams, counted here so noise from strangers never
    /// allocates a channel
    malformed: u64,
}

impl Trudp {
    pub fn new(retransmit_interval: Duration, max_attempts: Option<u32>) -> Self {
        Self {
            channels: HashMap::new(),
            retransmit_interval,
            max_attempts,
            malformed: 0,
        }
    }

    fn channel(&mut self, addr: SocketAddr) -> &mut Channel {
        self.channels.entry(addr).or_insert_with(Channel::new)
    }

    /// Frame `payload` as DATA, transmit it and register it for
    /// retransmission until acknowledged
    pub fn send_data(
        &mut self,
        sender: &dyn PacketSender,
        addr: SocketAddr,
        payload: Vec<u8>,
        now_wire: u32,
    ) -> Result<u32, SendError> {
        if payload.len() > MAX_PAYLOAD {
            return Err(SendError::PayloadTooLarge {
                len: payload.len(),
                max: MAX_PAYLOAD,
            });
        }
        let deadline = Instant::now() + self.retransmit_interval;
        let channel = self.channel(addr);
        let seq = channel.take_seq();
        let envelope = Envelope::data(seq, now_wire, payload);
        sender.send(&addr, &envelope.encode())?;
        channel.register_pending(seq, envelope.payload, deadline);
        trace!("sent DATA id {seq} to {addr}");
        Ok(seq)
    }

    /// Decode and process one inbound datagram, answering DATA with an ACK
    /// on the spot
    pub fn handle_datagram(
        &mut self,
        sender: &dyn PacketSender,
        addr: SocketAddr,
        datagram: &[u8],
        now_wire: u32,
    ) -> Incoming {
        let envelope = match Envelope::decode(datagram) {
            Ok(envelope) => envelope,
            Err(err) => {
                debug!("dropping malformed datagram from {addr}: {err}");
                self.malformed += 1;
                return Incoming::Dropped;
            }
        };

        match envelope.kind {
            MessageKind::Data => {
                // ACK first, unconditionally: even a duplicate must cancel
                // the sender's retransmission timer
                let ack = Envelope::ack_to(&envelope);
                let _ = sender.send(&addr, &ack.encode());

                let channel = self.channel(addr);
                match channel.classify(envelope.seq) {
                    ReceiveOutcome::Deliver => Incoming::Data {
                        payloads: channel.deliver(envelope.payload),
                    },
                    ReceiveOutcome::Queue => {
                        trace!(
                            "parking out-of-order DATA id {} from {addr}",
                            envelope.seq
                        );
                        channel.park(envelope.seq, envelope.payload);
                        Incoming::Data {
                            payloads: Vec::new(),
                        }
                    }
                    ReceiveOutcome::Stale => {
                        trace!("dropping stale DATA id {} from {addr}", envelope.seq);
                        channel.count_dropped();
                        Incoming::Dropped
                    }
                }
            }
            MessageKind::Ack => {
                let channel = self.channel(addr);
                match channel.settle(envelope.seq) {
                    Some(pending) => {
                        let triptime_ms = trip_time_ms(now_wire, envelope.timestamp);
                        channel.stats.acks_received += 1;
                        channel.stats.triptime.record(triptime_ms);
                        Incoming::Ack {
                            seq: envelope.seq,
                            cmd: pending.payload.first().copied().unwrap_or(0),
                            triptime_ms,
                        }
                    }
                    None => Incoming::Dropped,
                }
            }
            MessageKind::Reset => {
                debug!("channel to {addr} reset by peer");
                self.channel(addr).reset();
                Incoming::Reset
            }
        }
    }

    /// Resend every pending DATA whose deadline has passed. With a
    /// `max_attempts` policy configured, a message out of attempts resets
    /// the whole channel instead (and tells the peer so).
    pub fn poll_retransmits(&mut self, sender: &dyn PacketSender, now_wire: u32) -> usize {
        let now = Instant::now();
        let max_attempts = self.max_attempts;
        let retransmit_interval = self.retransmit_interval;
        let mut resent = 0;
        for (addr, channel) in self.channels.iter_mut() {
            let mut reset_channel = false;
            for seq in channel.due(now) {
                let attempts_exhausted = {
                    let pending = match channel.pending_mut(seq) {
                        Some(pending) => pending,
                        None => continue,
                    };
                    pending.attempt += 1;
                    match max_attempts {
                        Some(limit) => pending.attempt >= limit,
                        None => false,
                    }
                };

                if attempts_exhausted {
                    debug!("message id {seq} to {addr} out of attempts, resetting channel");
                    let _ = sender.send(addr, &Envelope::reset(0, now_wire).encode());
                    reset_channel = true;
                    break;
                }

                let pending = channel
                    .pending_mut(seq)
                    .expect("pending entry checked above");
                // same payload, fresh timestamp
                let envelope = Envelope::data(seq, now_wire, pending.payload.clone());
                pending.deadline = now + retransmit_interval;
                let attempt = pending.attempt;
                if sender.send(addr, &envelope.encode()).is_ok() {
                    channel.stats.retransmits += 1;
                    resent += 1;
                    trace!("retransmitted DATA id {seq} to {addr} (attempt {attempt})");
                }
            }
            if reset_channel {
                channel.reset();
            }
        }
        resent
    }

    /// Tell the peer to reset and clear our own state for the channel
    pub fn send_reset(&mut self, sender: &dyn PacketSender, addr: SocketAddr, now_wire: u32) {
        let _ = sender.send(&addr, &Envelope::reset(0, now_wire).encode());
        self.channel(addr).reset();
    }

    /// Drop all state for a destination (peer removal cascade)
    pub fn remove_channel(&mut self, addr: SocketAddr) {
        self.channels.remove(&addr);
    }

    pub fn channel_stats(&self, addr: SocketAddr) -> Option<&ChannelStats> {
        self.channels.get(&addr).map(|channel| &channel.stats)
    }

    pub fn summary(&self) -> TrudpStat {
        let mut stat = TrudpStat {
            channels: self.channels.len(),
            dropped_total: self.malformed,
            ..TrudpStat::default()
        };
        for channel in self.channels.values() {
            stat.pending_total += channel.send_queue_len();
            stat.queued_total += channel.receive_heap_len();
            stat.retransmits_total += channel.stats.retransmits;
            stat.dropped_total += channel.stats.dropped_receives;
        }
        stat
    }
}
