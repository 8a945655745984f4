//! Fixed scratch regions reused across codec calls.
//!
//! The engine owns one `ScratchBuffers` and passes views of it to codecs, so
//! decoding and encoding do not allocate per call. Views are plain subslices:
//! a length-indexed read view is `&read[..len]`, which costs nothing to build.
//!
//! Access is single-owner: loading or writing needs `&mut self`, and every
//! view borrows the buffers, so nothing handed out can outlive the next call.
//! Only detached copies (see [`ScratchBuffers::detach_written`]) escape.

use bytes::Bytes;

use crate::WireError;

/// Size of each scratch region in bytes
pub const SCRATCH_SIZE: usize = 65536;

/// Read and write scratch regions
pub struct ScratchBuffers {
    read: Box<[u8]>,
    write: Box<[u8]>,
}

impl ScratchBuffers {
    /// Allocate both regions
    pub fn new() -> Self {
        Self {
            read: vec![0u8; SCRATCH_SIZE].into_boxed_slice(),
            write: vec![0u8; SCRATCH_SIZE].into_boxed_slice(),
        }
    }

    /// Copy `src` into the read region and return a view sized exactly to it
    pub fn load_read(&mut self, src: &[u8]) -> Result<&[u8], WireError> {
        if src.len() > SCRATCH_SIZE {
            return Err(WireError::Size(src.len()));
        }
        self.read[..src.len()].copy_from_slice(src);
        Ok(&self.read[..src.len()])
    }

    /// Full-size view of the write region
    pub fn write_view(&mut self) -> &mut [u8] {
        &mut self.write
    }

    /// Copy bytes `[0, len)` of the write region into an owned buffer
    pub fn detach_written(&self, len: usize) -> Result<Bytes, WireError> {
        if len > SCRATCH_SIZE {
            return Err(WireError::Size(len));
        }
        Ok(Bytes::copy_from_slice(&self.write[..len]))
    }
}

impl Default for ScratchBuffers {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ScratchBuffers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScratchBuffers")
            .field("size", &SCRATCH_SIZE)
            .finish()
    }
}
