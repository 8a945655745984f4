//! The codec trait every registered definition implements.

use serde_json::Value;
use thiserror::Error;

/// Reader, writer, and cloner routines for one definition.
///
/// Codecs work on views handed out by the engine's scratch buffers. A read
/// view covers a whole message, header included; a write view is the full
/// write region and payload bytes start at [`protodef_wire::HEADER_SIZE`].
pub trait Codec: Send + Sync {
    /// Decode the message in `view` (whose length is the message length)
    fn read(&self, view: &[u8]) -> Result<Value, CodecError>;

    /// Encode `data` into `view` starting after the header; returns the end offset
    fn write(&self, view: &mut [u8], data: &Value) -> Result<usize, CodecError>;

    /// Deep copy of `data`
    fn clone_value(&self, data: &Value) -> Value {
        data.clone()
    }
}

/// Codec errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Input ended before the field was complete
    #[error("truncated at '{field}': need {needed} bytes, {remaining} left")]
    Truncated {
        /// Field being read
        field: String,
        /// Bytes required
        needed: usize,
        /// Bytes available
        remaining: usize,
    },

    /// Output does not fit the write view
    #[error("write overflow at '{field}'")]
    Overflow {
        /// Field being written
        field: String,
    },

    /// Value has the wrong JSON type
    #[error("type mismatch at '{field}': expected {expected}")]
    Type {
        /// Field being written
        field: String,
        /// Expected type
        expected: &'static str,
    },

    /// Value does not fit the wire type
    #[error("value out of range at '{field}'")]
    Range {
        /// Field being written
        field: String,
    },

    /// String bytes are not valid UTF-8
    #[error("invalid utf-8 at '{field}'")]
    Utf8 {
        /// Field being read
        field: String,
    },

    /// Codec-specific failure (plugins)
    #[error("codec error: {0}")]
    Custom(String),
}
