use thiserror::Error;

/// Errors that can occur while encoding or decoding wire data
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// Buffer ended before the envelope header was complete
    #[error("Datagram of {len} bytes is shorter than the {expected}-byte envelope header")]
    TooShort { len: usize, expected: usize },

    /// Checksum byte did not match the rest of the datagram
    #[error("Checksum mismatch: header carries {carried:#04x}, computed {computed:#04x}")]
    ChecksumMismatch { carried: u8, computed: u8 },

    /// Envelope declared a different protocol version than ours
    #[error("Unsupported protocol version {version} (expected {expected})")]
    VersionMismatch { version: u8, expected: u8 },

    /// The 4-bit kind field held a value outside DATA/ACK/RESET
    #[error("Unknown message kind {kind} (valid range: 0-2)")]
    UnknownKind { kind: u8 },

    /// Payload length field disagreed with the actual datagram size
    #[error("Payload length field says {declared} bytes but {actual} bytes followed the header")]
    LengthMismatch { declared: usize, actual: usize },

    /// A kind that allows no payload arrived carrying one
    #[error("Message kind {kind} carries {len} payload bytes but allows none")]
    UnexpectedPayload { kind: u8, len: usize },

    /// A reader ran past the end of its buffer
    #[error("Unexpected end of buffer: needed {needed} more bytes, {remaining} remain")]
    UnexpectedEnd { needed: usize, remaining: usize },

    /// A string field exceeded its fixed bound
    #[error("String of {len} bytes exceeds the {max}-byte limit")]
    StringTooLong { len: usize, max: usize },

    /// A string field was not valid UTF-8
    #[error("String field is not valid UTF-8")]
    InvalidUtf8,
}
