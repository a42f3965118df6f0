//! Little-endian byte reader/writer used by the envelope, the command
//! payloads and the async-bridge records.

use crate::wire::{WireError, PEER_NAME_MAX};

#[derive(Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Write a length-prefixed string. Strings on the wire are bounded by
    /// [`PEER_NAME_MAX`]; longer inputs are an encoding error, caught here
    /// rather than on the receiving side.
    pub fn write_str(&mut self, value: &str) -> Result<(), WireError> {
        let len = value.len();
        if len > PEER_NAME_MAX {
            return Err(WireError::StringTooLong {
                len,
                max: PEER_NAME_MAX,
            });
        }
        self.buf.push(len as u8);
        self.buf.extend_from_slice(value.as_bytes());
        Ok(())
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

pub struct ByteReader<'b> {
    buf: &'b [u8],
    cursor: usize,
}

impl<'b> ByteReader<'b> {
    pub fn new(buf: &'b [u8]) -> Self {
        Self { buf, cursor: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.cursor
    }

    fn take(&mut self, len: usize) -> Result<&'b [u8], WireError> {
        if self.remaining() < len {
            return Err(WireError::UnexpectedEnd {
                needed: len,
                remaining: self.remaining(),
            });
        }
        let slice = &self.buf[self.cursor..self.cursor + len];
        self.cursor += len;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, WireError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, WireError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, WireError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'b [u8], WireError> {
        self.take(len)
    }

    /// Read the rest of the buffer as one payload slice
    pub fn read_rest(&mut self) -> &'b [u8] {
        let rest = &self.buf[self.cursor..];
        self.cursor = self.buf.len();
        rest
    }

    pub fn read_str(&mut self) -> Result<&'b str, WireError> {
        let len = self.read_u8()? as usize;
        if len > PEER_NAME_MAX {
            return Err(WireError::StringTooLong {
                len,
                max: PEER_NAME_MAX,
            });
        }
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes).map_err(|_| WireError::InvalidUtf8)
    }
}
