//! Bidirectional name/opcode maps.

use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::error::MapError;

/// Two-way lookup between message names and opcodes
pub trait ProtocolMap: Send + Sync {
    /// Opcode for a message name
    fn code(&self, name: &str) -> Option<u16>;

    /// Message name for an opcode
    fn name(&self, code: u16) -> Option<&str>;
}

/// Precomputed name/opcode table
///
/// Map files hold one mapping per line, `NAME CODE` or `NAME = CODE`, with
/// `#` comments.
#[derive(Debug, Clone, Default)]
pub struct OpcodeTable {
    by_name: HashMap<String, u16>,
    by_code: HashMap<u16, String>,
}

impl OpcodeTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mapping; names and opcodes must both be unused
    pub fn insert(&mut self, name: impl Into<String>, code: u16) -> Result<(), MapError> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(MapError::Duplicate(name));
        }
        if let Some(existing) = self.by_code.get(&code) {
            return Err(MapError::Duplicate(format!(
                "opcode {} ({} and {})",
                code, existing, name
            )));
        }
        self.by_code.insert(code, name.clone());
        self.by_name.insert(name, code);
        Ok(())
    }

    /// Parse a map from text
    pub fn from_map_str(text: &str) -> Result<Self, MapError> {
        let mut table = Self::new();
        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.split('#').next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }

            let tokens: Vec<&str> = line
                .split(|c: char| c.is_whitespace() || c == '=')
                .filter(|t| !t.is_empty())
                .collect();
            let [name, code] = tokens.as_slice() else {
                return Err(MapError::Syntax {
                    line: line_no,
                    reason: "expected '<name> <code>'".to_string(),
                });
            };
            let code = code.parse::<u16>().map_err(|_| MapError::Syntax {
                line: line_no,
                reason: format!("invalid opcode '{}'", code),
            })?;
            table.insert(*name, code)?;
        }
        debug!("Parsed protocol map with {} entries", table.len());
        Ok(table)
    }

    /// Read and parse a map file
    pub fn from_map_file<P: AsRef<Path>>(path: P) -> Result<Self, MapError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_map_str(&text)
    }

    /// Number of mappings
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl ProtocolMap for OpcodeTable {
    fn code(&self, name: &str) -> Option<u16> {
        self.by_name.get(name).copied()
    }

    fn name(&self, code: u16) -> Option<&str> {
        self.by_code.get(&code).map(String::as_str)
    }
}
