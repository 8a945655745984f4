//! Message headers, scratch buffers, and definition file identities for protodef.
//!
//! This crate provides the low-level pieces shared by the registry and the
//! engine: the 4-byte message header, the fixed scratch regions that codecs
//! read from and write into, and the parser that derives a definition's
//! identity from its file name.
//!
//! ## Wire Format
//!
//! ```text
//! +----------------------+----------------------------+
//! | u16 length (LE)      | total length incl. header  |
//! +----------------------+----------------------------+
//! | u16 opcode (LE)      | message code               |
//! +----------------------+----------------------------+
//! | payload              | variable (0..65531)        |
//! +----------------------+----------------------------+
//! ```
//!
//! ## Definition file names
//!
//! ```text
//! name.version[.platform].(def|js)
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod header;
pub mod identity;
pub mod platform;
pub mod scratch;

// Re-export main types
pub use error::WireError;
pub use header::{MessageHeader, HEADER_SIZE, MAX_MESSAGE_SIZE};
pub use identity::{parse_identity, DefinitionIdentity, SourceKind};
pub use platform::{Platform, PlatformError};
pub use scratch::{ScratchBuffers, SCRATCH_SIZE};
