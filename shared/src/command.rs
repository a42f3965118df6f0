/// First command code of the user range; everything at or above this is an
/// application command surfaced verbatim as a Received event.
pub const CMD_USER: u8 = 128;

/// Application-level command carried as the first byte of every DATA
/// payload. Codes below [`CMD_USER`] are reserved for the substrate itself.
#[derive(Copy, Debug, Clone, Eq, PartialEq)]
pub enum Command {
    /// No-op / keep-alive
    None,
    /// Announce this host's name and type to a peer
    Connect,
    /// Inform a peer that a host left the network
    Disconnected,
    /// Round-trip probe carrying the sender's wire timestamp; answered
    /// automatically
    Echo,
    /// Answer to Echo, payload copied back verbatim
    EchoAnswer,
    /// Ask a peer for its name, type and version
    HostInfo,
    /// Answer to HostInfo
    HostInfoAnswer,
    /// Subscribe to a numbered event on the receiving host
    Subscribe,
    /// Remove an earlier subscription
    Unsubscribe,
    /// Published event data fanned out to subscribers
    SubscribeAnswer,
    /// Application command, code >= CMD_USER
    User(u8),
}

impl Command {
    pub fn to_byte(self) -> u8 {
        match self {
            Command::None => 0,
            Command::Connect => 2,
            Command::Disconnected => 3,
            Command::Echo => 4,
            Command::EchoAnswer => 5,
            Command::HostInfo => 6,
            Command::HostInfoAnswer => 7,
            Command::Subscribe => 8,
            Command::Unsubscribe => 9,
            Command::SubscribeAnswer => 10,
            Command::User(code) => code,
        }
    }

    /// Decode a command byte. Unassigned reserved codes yield `None` and are
    /// dropped by the dispatcher as wrong packets.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Command::None),
            2 => Some(Command::Connect),
            3 => Some(Command::Disconnected),
            4 => Some(Command::Echo),
            5 => Some(Command::EchoAnswer),
            6 => Some(Command::HostInfo),
            7 => Some(Command::HostInfoAnswer),
            8 => Some(Command::Subscribe),
            9 => Some(Command::Unsubscribe),
            10 => Some(Command::SubscribeAnswer),
            code if code >= CMD_USER => Some(Command::User(code)),
            _ => None,
        }
    }
}
