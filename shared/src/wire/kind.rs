// An enum representing the three kinds of transport messages that can be
// sent/received

use crate::wire::WireError;

#[derive(Copy, Debug, Clone, Eq, PartialEq)]
pub enum MessageKind {
    // A message carrying a command payload
    Data,
    // Acknowledges the arrival of a DATA message; echoes its id and
    // timestamp, carries no payload
    Ack,
    // Resets the sequence counters of one channel, carries no payload
    Reset,
}

impl MessageKind {
    pub fn to_bits(self) -> u8 {
        match self {
            MessageKind::Data => 0,
            MessageKind::Ack => 1,
            MessageKind::Reset => 2,
        }
    }

    /// Decode the 4-bit kind field. Malformed datagrams can carry any value
    /// here, so this returns an error instead of panicking.
    pub fn from_bits(bits: u8) -> Result<Self, WireError> {
        match bits {
            0 => Ok(MessageKind::Data),
            1 => Ok(MessageKind::Ack),
            2 => Ok(MessageKind::Reset),
            kind => Err(WireError::UnknownKind { kind }),
        }
    }

    /// Only DATA messages carry a payload
    pub fn has_payload(self) -> bool {
        self == MessageKind::Data
    }
}
