//! Command frames riding inside TR-UDP DATA payloads: one command byte
//! followed by an opaque, command-specific payload. This module is the
//! codec; the node applies the semantics.

use std::net::IpAddr;

use tether_shared::{ByteReader, ByteWriter, Command, WireError};

/// Version triple reported in HostInfoAnswer
pub(crate) const NODE_VERSION: (u8, u8, u8) = (0, 3, 0);

/// A decoded command frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Frame {
    pub cmd: Command,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(cmd: Command, data: Vec<u8>) -> Self {
        Self { cmd, data }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut writer = ByteWriter::new();
        writer.write_u8(self.cmd.to_byte());
        writer.write_bytes(&self.data);
        writer.finish()
    }

    /// Decode a DATA payload. Empty payloads and unassigned reserved codes
    /// are wrong packets; the dispatcher drops them.
    pub fn decode(payload: &[u8]) -> Option<Self> {
        let mut reader = ByteReader::new(payload);
        let cmd = Command::from_byte(reader.read_u8().ok()?)?;
        Some(Self {
            cmd,
            data: reader.read_rest().to_vec(),
        })
    }
}

/// Payload of Connect and Disconnected: which host, where
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PeerAnnounce {
    pub name: String,
    pub addr: IpAddr,
    pub port: u16,
}

impl PeerAnnounce {
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let mut writer = ByteWriter::new();
        writer.write_str(&self.name)?;
        writer.write_str(&self.addr.to_string())?;
        writer.write_u16(self.port);
        Ok(writer.finish())
    }

    pub fn decode(data: &[u8]) -> Option<Self> {
        let mut reader = ByteReader::new(data);
        let name = reader.read_str().ok()?.to_owned();
        let addr: IpAddr = reader.read_str().ok()?.parse().ok()?;
        let port = reader.read_u16().ok()?;
        Some(Self { name, addr, port })
    }
}

/// Payload of HostInfoAnswer
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HostInfoAnswer {
    pub name: String,
    pub peer_type: String,
    pub version: (u8, u8, u8),
}

impl HostInfoAnswer {
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let mut writer = ByteWriter::new();
        writer.write_str(&self.name)?;
        writer.write_str(&self.peer_type)?;
        writer.write_u8(self.version.0);
        writer.write_u8(self.version.1);
        writer.write_u8(self.version.2);
        Ok(writer.finish())
    }

    pub fn decode(data: &[u8]) -> Option<Self> {
        let mut reader = ByteReader::new(data);
        let name = reader.read_str().ok()?.to_owned();
        let peer_type = reader.read_str().ok()?.to_owned();
        let version = (
            reader.read_u8().ok()?,
            reader.read_u8().ok()?,
            reader.read_u8().ok()?,
        );
        Some(Self {
            name,
            peer_type,
            version,
        })
    }
}

/// Payload of Subscribe and Unsubscribe: the event id
pub(crate) fn encode_event_id(event: u16) -> Vec<u8> {
    let mut writer = ByteWriter::new();
    writer.write_u16(event);
    writer.finish()
}

pub(crate) fn decode_event_id(data: &[u8]) -> Option<u16> {
    ByteReader::new(data).read_u16().ok()
}

/// Payload of SubscribeAnswer: event id plus published data
pub(crate) fn encode_publication(event: u16, data: &[u8]) -> Vec<u8> {
    let mut writer = ByteWriter::new();
    writer.write_u16(event);
    writer.write_bytes(data);
    writer.finish()
}

pub(crate) fn decode_publication(data: &[u8]) -> Option<(u16, Vec<u8>)> {
    let mut reader = ByteReader::new(data);
    let event = reader.read_u16().ok()?;
    Some((event, reader.read_rest().to_vec()))
}

/// Payload of Echo: the sender's wire timestamp, echoed back verbatim in
/// EchoAnswer
pub(crate) fn encode_echo(now_wire: u32) -> Vec<u8> {
    let mut writer = ByteWriter::new();
    writer.write_u32(now_wire);
    writer.finish()
}

pub(crate) fn decode_echo(data: &[u8]) -> Option<u32> {
    ByteReader::new(data).read_u32().ok()
}
