//! Engine error types.

use protodef_registry::LoadError;
use protodef_schema::CodecError;
use protodef_wire::{PlatformError, WireError};
use thiserror::Error;

/// Resolution errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// No mapping or no definition
    #[error("{0} not found")]
    NotFound(String),

    /// Requested version is older than the retained ones
    #[error("{name} version {version} is outdated (latest is {latest})")]
    Outdated {
        /// Message name
        name: String,
        /// Requested version
        version: u32,
        /// Latest registered version
        latest: u32,
    },

    /// Identifier is neither a name nor an opcode
    #[error("invalid identifier: {0}")]
    IdentifierType(String),
}

/// Engine errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Resolution failed
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Definition lacks the permission for the operation
    #[error("{name}.{version} is deprecated and not {operation}")]
    Deprecated {
        /// Message name
        name: String,
        /// Definition version
        version: u32,
        /// Missing permission ("readable" or "writeable")
        operation: &'static str,
    },

    /// Codec failure
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Wire format failure
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// Whole-load failure
    #[error("load error: {0}")]
    Load(#[from] LoadError),

    /// Unsupported platform
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// Protocol map errors
#[derive(Error, Debug)]
pub enum MapError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed line
    #[error("line {line}: {reason}")]
    Syntax {
        /// 1-based line number
        line: usize,
        /// What is wrong
        reason: String,
    },

    /// Name or opcode mapped twice
    #[error("duplicate mapping: {0}")]
    Duplicate(String),
}
