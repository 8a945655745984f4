//! Message header processing for the wire protocol.
//!
//! Every message starts with a 4-byte header: the total message length
//! (header included) followed by the opcode, both little-endian `u16`.

use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};

use crate::WireError;

/// Header size in bytes
pub const HEADER_SIZE: usize = 4;

/// Largest message length the header can express
pub const MAX_MESSAGE_SIZE: usize = u16::MAX as usize;

/// Message header (4 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeader {
    /// Total message length, header included
    pub length: u16,
    /// Message opcode
    pub code: u16,
}

impl MessageHeader {
    /// Create a header, checking that `length` fits the 16-bit field
    pub fn new(length: usize, code: u16) -> Result<Self, WireError> {
        if length > MAX_MESSAGE_SIZE {
            return Err(WireError::Size(length));
        }
        if length < HEADER_SIZE {
            return Err(WireError::Incomplete(length));
        }
        Ok(Self {
            length: length as u16,
            code,
        })
    }

    /// Payload length (total length minus header)
    pub fn payload_len(&self) -> usize {
        (self.length as usize).saturating_sub(HEADER_SIZE)
    }

    /// Write the header into the first 4 bytes of `buf` (little-endian)
    pub fn encode_into(&self, buf: &mut [u8]) -> Result<(), WireError> {
        if buf.len() < HEADER_SIZE {
            return Err(WireError::Incomplete(buf.len()));
        }
        let mut dst = &mut buf[..HEADER_SIZE];
        dst.put_u16_le(self.length);
        dst.put_u16_le(self.code);
        Ok(())
    }

    /// Read the header from the first 4 bytes of `buf` (little-endian)
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < HEADER_SIZE {
            return Err(WireError::Incomplete(buf.len()));
        }
        let mut src = &buf[..HEADER_SIZE];
        let length = src.get_u16_le();
        let code = src.get_u16_le();
        Ok(Self { length, code })
    }

    /// Check the recorded length against the buffer it was read from
    pub fn validate(&self, actual: usize) -> Result<(), WireError> {
        let header = self.length as usize;
        if header < HEADER_SIZE || header != actual {
            return Err(WireError::Length { header, actual });
        }
        Ok(())
    }
}
