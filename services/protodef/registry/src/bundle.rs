//! Default definition bundle.
//!
//! ```json
//! {
//!   "entries": { "S_LOGIN.3.def": "<base64 source>" },
//!   "deprecated": { "S_LOGIN": { "3": { "max": 92, "readable": true } } }
//! }
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::definition::DeprecationTable;
use crate::loader::SourceError;
use crate::LoadError;

/// Packaged default definitions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Bundle {
    /// File name -> base64-encoded source
    pub entries: BTreeMap<String, String>,
    /// Deprecation rules
    #[serde(default)]
    pub deprecated: DeprecationTable,
}

impl Bundle {
    /// Parse a bundle from JSON text
    pub fn from_json_str(json: &str) -> Result<Self, LoadError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a bundle file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Add an entry, encoding `source`
    pub fn insert_source(&mut self, file_name: impl Into<String>, source: &str) {
        self.entries
            .insert(file_name.into(), STANDARD.encode(source.as_bytes()));
    }

    /// Decode an encoded entry into source text
    pub fn decode_entry(encoded: &str) -> Result<String, SourceError> {
        let raw = STANDARD.decode(encoded.trim())?;
        String::from_utf8(raw).map_err(|_| SourceError::Utf8)
    }
}
