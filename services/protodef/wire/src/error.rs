//! Wire protocol error types.

use thiserror::Error;

/// Wire protocol errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Buffer too short to hold a message header
    #[error("incomplete header: {0} bytes")]
    Incomplete(usize),

    /// Size limit exceeded
    #[error("size limit exceeded: {0}")]
    Size(usize),

    /// Header length disagrees with the buffer
    #[error("length mismatch: header says {header}, buffer has {actual}")]
    Length {
        /// Length recorded in the header
        header: usize,
        /// Length of the buffer
        actual: usize,
    },
}
