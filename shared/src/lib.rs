//! # Tether Shared
//! Wire format, sequencing and timing primitives shared between the
//! tether-node crate and its transport backends.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

pub mod wire;

mod command;
mod sequence;
mod timer;
mod timestamp;
mod triptime;

pub use command::{Command, CMD_USER};
pub use sequence::{next_seq, seq_diff, seq_greater_than, seq_less_than, try_seq_diff, SequenceError};
pub use timer::Timer;
pub use timestamp::{trip_time_ms, Clock};
pub use triptime::TriptimeStats;
pub use wire::{
    checksum, ByteReader, ByteWriter, Envelope, MessageKind, WireError, HEADER_LEN, MAX_PAYLOAD,
    PEER_NAME_MAX, PROTOCOL_VERSION,
};
