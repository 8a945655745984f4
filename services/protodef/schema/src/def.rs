//! Structural definitions and the line-based definition parser.
//!
//! ```text
//! # login response
//! bool   success
//! uint32 playerId
//! string name
//! array  items
//! - uint32 id
//! - int16  amount
//! object position
//! - float x
//! - float y
//! ```
//!
//! Leading `-` characters give the nesting depth; children belong to the
//! closest preceding `array` or `object` one level up.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Field wire types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// 1-byte boolean
    Bool,
    /// Unsigned 8-bit integer
    Byte,
    /// Signed 16-bit integer
    Int16,
    /// Unsigned 16-bit integer
    Uint16,
    /// Signed 32-bit integer
    Int32,
    /// Unsigned 32-bit integer
    Uint32,
    /// Signed 64-bit integer
    Int64,
    /// Unsigned 64-bit integer
    Uint64,
    /// 32-bit float
    Float,
    /// 64-bit float
    Double,
    /// u16 length-prefixed UTF-8 text
    String,
    /// u16 length-prefixed raw bytes
    Bytes,
    /// u16 count-prefixed list of objects
    Array,
    /// Inline group of fields
    Object,
}

impl FieldType {
    /// Keyword used in definition sources
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Bool => "bool",
            FieldType::Byte => "byte",
            FieldType::Int16 => "int16",
            FieldType::Uint16 => "uint16",
            FieldType::Int32 => "int32",
            FieldType::Uint32 => "uint32",
            FieldType::Int64 => "int64",
            FieldType::Uint64 => "uint64",
            FieldType::Float => "float",
            FieldType::Double => "double",
            FieldType::String => "string",
            FieldType::Bytes => "bytes",
            FieldType::Array => "array",
            FieldType::Object => "object",
        }
    }

    /// Whether fields of this type own child fields
    pub fn is_container(&self) -> bool {
        matches!(self, FieldType::Array | FieldType::Object)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "bool" => FieldType::Bool,
            "byte" => FieldType::Byte,
            "int16" => FieldType::Int16,
            "uint16" => FieldType::Uint16,
            "int32" => FieldType::Int32,
            "uint32" => FieldType::Uint32,
            "int64" => FieldType::Int64,
            "uint64" => FieldType::Uint64,
            "float" => FieldType::Float,
            "double" => FieldType::Double,
            "string" => FieldType::String,
            "bytes" => FieldType::Bytes,
            "array" => FieldType::Array,
            "object" => FieldType::Object,
            _ => return Err(()),
        })
    }
}

/// One field of a structural definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field name
    pub name: String,
    /// Wire type
    pub ty: FieldType,
    /// Child fields (containers only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FieldDef>,
}

impl FieldDef {
    /// Create a scalar field
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            children: Vec::new(),
        }
    }

    /// Create a container field
    pub fn container(name: impl Into<String>, ty: FieldType, children: Vec<FieldDef>) -> Self {
        Self {
            name: name.into(),
            ty,
            children,
        }
    }
}

/// Structural layout of one message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructDef {
    /// Top-level fields in wire order
    pub fields: Vec<FieldDef>,
}

/// Schema parsing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Unknown field type keyword
    #[error("line {line}: unknown type '{ty}'")]
    UnknownType {
        /// 1-based line number
        line: usize,
        /// Offending keyword
        ty: String,
    },

    /// Malformed field line
    #[error("line {line}: {reason}")]
    Syntax {
        /// 1-based line number
        line: usize,
        /// What is wrong
        reason: String,
    },

    /// Depth does not follow an open container
    #[error("line {line}: invalid nesting depth {depth}")]
    Nesting {
        /// 1-based line number
        line: usize,
        /// Depth found on the line
        depth: usize,
    },
}

/// Turns definition source text into a structural definition
pub trait SchemaParser: Send + Sync {
    /// Parse `source`
    fn parse(&self, source: &str) -> Result<StructDef, SchemaError>;
}

/// Parser for the line-based definition format
#[derive(Debug, Clone, Copy, Default)]
pub struct DefParser;

impl DefParser {
    /// Create a parser
    pub fn new() -> Self {
        Self
    }

    fn parse_line(line_no: usize, raw: &str) -> Result<Option<(usize, FieldDef)>, SchemaError> {
        let line = raw.split('#').next().unwrap_or_default().trim();
        if line.is_empty() {
            return Ok(None);
        }

        let depth = line.chars().take_while(|c| *c == '-').count();
        let mut tokens = line[depth..].split_whitespace();

        let (Some(ty), Some(name)) = (tokens.next(), tokens.next()) else {
            return Err(SchemaError::Syntax {
                line: line_no,
                reason: "expected '<type> <name>'".to_string(),
            });
        };
        if let Some(extra) = tokens.next() {
            return Err(SchemaError::Syntax {
                line: line_no,
                reason: format!("unexpected token '{}'", extra),
            });
        }

        let ty = ty.parse::<FieldType>().map_err(|_| SchemaError::UnknownType {
            line: line_no,
            ty: ty.to_string(),
        })?;

        if !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(SchemaError::Syntax {
                line: line_no,
                reason: format!("invalid field name '{}'", name),
            });
        }

        Ok(Some((depth, FieldDef::new(name, ty))))
    }
}

/// Attach the innermost open level to the last field of its parent
fn close_level(levels: &mut Vec<Vec<FieldDef>>) {
    if levels.len() < 2 {
        return;
    }
    if let Some(children) = levels.pop() {
        if let Some(parent) = levels.last_mut().and_then(|l| l.last_mut()) {
            parent.children = children;
        }
    }
}

impl SchemaParser for DefParser {
    fn parse(&self, source: &str) -> Result<StructDef, SchemaError> {
        // levels[d] collects the fields at depth d under the open container
        let mut levels: Vec<Vec<FieldDef>> = vec![Vec::new()];

        for (idx, raw) in source.lines().enumerate() {
            let line_no = idx + 1;
            let Some((depth, field)) = Self::parse_line(line_no, raw)? else {
                continue;
            };

            if depth == levels.len() {
                let opens = levels
                    .last()
                    .and_then(|l| l.last())
                    .is_some_and(|f| f.ty.is_container());
                if !opens {
                    return Err(SchemaError::Nesting {
                        line: line_no,
                        depth,
                    });
                }
                levels.push(Vec::new());
            } else if depth > levels.len() {
                return Err(SchemaError::Nesting {
                    line: line_no,
                    depth,
                });
            }

            while levels.len() > depth + 1 {
                close_level(&mut levels);
            }

            if let Some(level) = levels.last_mut() {
                level.push(field);
            }
        }

        while levels.len() > 1 {
            close_level(&mut levels);
        }

        Ok(StructDef {
            fields: levels.pop().unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flat_fields() {
        let def = DefParser::new()
            .parse("bool success\nuint32 playerId # trailing comment\n\nstring name\n")
            .unwrap();

        assert_eq!(
            def.fields,
            vec![
                FieldDef::new("success", FieldType::Bool),
                FieldDef::new("playerId", FieldType::Uint32),
                FieldDef::new("name", FieldType::String),
            ]
        );
    }

    #[test]
    fn test_parse_nested_containers() {
        let source = "\
# inventory
uint16 slot
array items
- uint32 id
- object stats
-- int16 attack
-- int16 defense
- int16 amount
object position
- float x
- float y
";
        let def = DefParser::new().parse(source).unwrap();

        assert_eq!(def.fields.len(), 3);
        let items = &def.fields[1];
        assert_eq!(items.ty, FieldType::Array);
        assert_eq!(items.children.len(), 3);
        assert_eq!(items.children[1].name, "stats");
        assert_eq!(items.children[1].children.len(), 2);
        assert_eq!(items.children[2].name, "amount");

        let position = &def.fields[2];
        assert_eq!(position.ty, FieldType::Object);
        assert_eq!(position.children.len(), 2);
    }

    #[test]
    fn test_parse_empty_source() {
        let def = DefParser::new().parse("# nothing here\n\n").unwrap();
        assert!(def.fields.is_empty());
    }

    #[test]
    fn test_unknown_type() {
        let err = DefParser::new().parse("int32 a\nvarint b").unwrap_err();
        assert_eq!(
            err,
            SchemaError::UnknownType {
                line: 2,
                ty: "varint".to_string()
            }
        );
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(
            DefParser::new().parse("int32"),
            Err(SchemaError::Syntax { line: 1, .. })
        ));
        assert!(matches!(
            DefParser::new().parse("int32 a b"),
            Err(SchemaError::Syntax { line: 1, .. })
        ));
        assert!(matches!(
            DefParser::new().parse("int32 a-b"),
            Err(SchemaError::Syntax { line: 1, .. })
        ));
    }

    #[test]
    fn test_nesting_errors() {
        // Child under a scalar
        assert_eq!(
            DefParser::new().parse("int32 a\n- int32 b"),
            Err(SchemaError::Nesting { line: 2, depth: 1 })
        );
        // Skipping a level
        assert_eq!(
            DefParser::new().parse("array a\n-- int32 b"),
            Err(SchemaError::Nesting { line: 2, depth: 2 })
        );
    }

    #[test]
    fn test_field_type_keywords_round_trip() {
        for kw in [
            "bool", "byte", "int16", "uint16", "int32", "uint32", "int64", "uint64", "float",
            "double", "string", "bytes", "array", "object",
        ] {
            let ty: FieldType = kw.parse().unwrap();
            assert_eq!(ty.as_str(), kw);
        }
    }
}
