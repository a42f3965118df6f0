//! The TR-UDP wire format: a fixed 12-byte envelope followed by an opaque
//! payload. All integers are little-endian.

mod bytes;
mod envelope;
mod error;
mod kind;

pub use bytes::{ByteReader, ByteWriter};
pub use envelope::{checksum, Envelope, HEADER_LEN, MAX_PAYLOAD, PROTOCOL_VERSION};
pub use error::WireError;
pub use kind::MessageKind;

/// Peer names travel inside command payloads and ARP records; keeping them
/// short bounds every buffer that carries one.
pub const PEER_NAME_MAX: usize = 64;
