use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};
use std::time::Instant;

use tether_shared::{next_seq, seq_diff, seq_less_than, TriptimeStats};

/// A DATA message waiting for its ACK
pub(crate) struct Pending {
    pub payload: Vec<u8>,
    pub attempt: u32,
    pub deadline: Instant,
}

/// Out-of-order DATA payload parked until the gap before it fills.
///
/// Ordering is wrap-aware; it is only total within one half of the id
/// space, which holds for any set of ids a live channel can be holding at
/// once.
struct HeapEntry {
    seq: u32,
    payload: Vec<u8>,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // signed wrapping distance: positive means self is ahead
        seq_diff(other.seq, self.seq).cmp(&0)
    }
}

/// Counters and timings for one channel
#[derive(Debug, Clone, Default)]
pub struct ChannelStats {
    pub triptime: TriptimeStats,
    pub packets_sent: u64,
    pub packets_received: u64,
    pub acks_received: u64,
    pub dropped_receives: u64,
    pub retransmits: u64,
    pub send_queue_max: usize,
    pub receive_heap_max: usize,
}

/// What a received DATA sequence id means for this channel
pub(crate) enum ReceiveOutcome {
    /// id == expected: deliver now
    Deliver,
    /// id ahead of expected: park in the receive heap
    Queue,
    /// id behind expected: duplicate or stale, drop
    Stale,
}

/// Per-destination transport state: sequence counters, the send-queue of
/// unacknowledged DATA and the receive-heap of early arrivals
pub(crate) struct Channel {
    next_seq: u32,
    expected_seq: u32,
    send_queue: HashMap<u32, Pending>,
    receive_heap: BinaryHeap<Reverse<HeapEntry>>,
    pub stats: ChannelStats,
}

impl Channel {
    pub fn new() -> Self {
        Self {
            next_seq: 0,
            expected_seq: 0,
            send_queue: HashMap::new(),
            receive_heap: BinaryHeap::new(),
            stats: ChannelStats::default(),
        }
    }

    /// Allocate the next outbound sequence id
    pub fn take_seq(&mut self) -> u32 {
        let seq = self.next_seq;
        self.next_seq = next_seq(self.next_seq);
        seq
    }

    pub fn register_pending(&mut self, seq: u32, payload: Vec<u8>, deadline: Instant) {
        self.send_queue.insert(
            seq,
            Pending {
                payload,
                attempt: 0,
                deadline,
            },
        );
        self.stats.packets_sent += 1;
        self.stats.send_queue_max = self.stats.send_queue_max.max(self.send_queue.len());
    }

    /// Remove the pending entry an ACK settles; `None` for unknown ids
    /// (late ACK after a RESET, or an ACK for a retransmit already settled)
    pub fn settle(&mut self, seq: u32) -> Option<Pending> {
        self.send_queue.remove(&seq)
    }

    pub fn classify(&self, seq: u32) -> ReceiveOutcome {
        if seq == self.expected_seq {
            ReceiveOutcome::Deliver
        } else if seq_less_than(seq, self.expected_seq) {
            ReceiveOutcome::Stale
        } else {
            ReceiveOutcome::Queue
        }
    }

    /// Deliver an in-order payload: bump expected and drain every parked
    /// payload that now continues the run
    pub fn deliver(&mut self, payload: Vec<u8>) -> Vec<Vec<u8>> {
        let mut released = vec![payload];
        self.expected_seq = next_seq(self.expected_seq);
        self.stats.packets_received += 1;
        while let Some(Reverse(entry)) = self.receive_heap.peek() {
            if entry.seq != self.expected_seq {
                break;
            }
            let Reverse(entry) = self
                .receive_heap
                .pop()
                .expect("peeked entry must still be present");
            released.push(entry.payload);
            self.expected_seq = next_seq(self.expected_seq);
            self.stats.packets_received += 1;
        }
        released
    }

    /// Park an early arrival; duplicates already in the heap are dropped
    pub fn park(&mut self, seq: u32, payload: Vec<u8>) {
        if self.receive_heap.iter().any(|Reverse(e)| e.seq == seq) {
            self.stats.dropped_receives += 1;
            return;
        }
        self.receive_heap.push(Reverse(HeapEntry { seq, payload }));
        self.stats.receive_heap_max = self.stats.receive_heap_max.max(self.receive_heap.len());
    }

    pub fn count_dropped(&mut self) {
        self.stats.dropped_receives += 1;
    }

    /// Ids of pending messages whose retransmit deadline has passed
    pub fn due(&self, now: Instant) -> Vec<u32> {
        self.send_queue
            .iter()
            .filter(|(_, pending)| pending.deadline <= now)
            .map(|(seq, _)| *seq)
            .collect()
    }

    pub fn pending_mut(&mut self, seq: u32) -> Option<&mut Pending> {
        self.send_queue.get_mut(&seq)
    }

    /// Clear both queues and zero both counters; the RESET semantics
    pub fn reset(&mut self) {
        self.send_queue.clear();
        self.receive_heap.clear();
        self.next_seq = 0;
        self.expected_seq = 0;
    }

    pub fn send_queue_len(&self) -> usize {
        self.send_queue.len()
    }

    pub fn receive_heap_len(&self) -> usize {
        self.receive_heap.len()
    }

    #[cfg(test)]
    pub fn expected_seq(&self) -> u32 {
        self.expected_seq
    }
}
