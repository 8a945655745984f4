//! Compilation of structural definitions into codecs.
//!
//! [`LayoutCompiler`] produces a [`CompiledLayout`] that walks the field tree
//! with a sequential little-endian layout:
//!
//! ```text
//! bool/byte   1 byte           float      4 bytes
//! int16/u16   2 bytes          double     8 bytes
//! int32/u32   4 bytes          string     u16 len + utf-8
//! int64/u64   8 bytes          bytes      u16 len + raw
//! array       u16 count + elements (objects of the child fields)
//! object      child fields inline
//! ```

use bytes::{Buf, BufMut};
use protodef_wire::HEADER_SIZE;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::trace;

use crate::codec::{Codec, CodecError};
use crate::def::{FieldDef, FieldType, StructDef};

/// Compilation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// Array or object with no child fields
    #[error("container '{0}' has no fields")]
    EmptyContainer(String),

    /// Two siblings share a name
    #[error("duplicate field '{0}'")]
    DuplicateField(String),

    /// Scalar field declared with children
    #[error("scalar field '{0}' cannot have children")]
    UnexpectedChildren(String),
}

/// Turns a structural definition into reader/writer/cloner routines
pub trait DefinitionCompiler: Send + Sync {
    /// Compile `def`
    fn compile(&self, def: &StructDef) -> Result<Arc<dyn Codec>, CompileError>;
}

/// Compiler for the sequential layout
#[derive(Debug, Clone, Copy, Default)]
pub struct LayoutCompiler;

impl LayoutCompiler {
    /// Create a compiler
    pub fn new() -> Self {
        Self
    }

    fn validate(fields: &[FieldDef]) -> Result<(), CompileError> {
        let mut seen = HashSet::new();
        for field in fields {
            if !seen.insert(field.name.as_str()) {
                return Err(CompileError::DuplicateField(field.name.clone()));
            }
            if field.ty.is_container() {
                if field.children.is_empty() {
                    return Err(CompileError::EmptyContainer(field.name.clone()));
                }
                Self::validate(&field.children)?;
            } else if !field.children.is_empty() {
                return Err(CompileError::UnexpectedChildren(field.name.clone()));
            }
        }
        Ok(())
    }
}

impl DefinitionCompiler for LayoutCompiler {
    fn compile(&self, def: &StructDef) -> Result<Arc<dyn Codec>, CompileError> {
        Self::validate(&def.fields)?;
        trace!("Compiled layout with {} top-level fields", def.fields.len());
        Ok(Arc::new(CompiledLayout {
            fields: def.fields.clone(),
        }))
    }
}

/// Codec produced by [`LayoutCompiler`]
#[derive(Debug, Clone)]
pub struct CompiledLayout {
    fields: Vec<FieldDef>,
}

impl CompiledLayout {
    /// Top-level fields
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }
}

impl Codec for CompiledLayout {
    fn read(&self, view: &[u8]) -> Result<Value, CodecError> {
        if view.len() < HEADER_SIZE {
            return Err(CodecError::Truncated {
                field: "<header>".to_string(),
                needed: HEADER_SIZE,
                remaining: view.len(),
            });
        }
        let mut src = &view[HEADER_SIZE..];
        read_fields(&self.fields, &mut src).map(Value::Object)
    }

    fn write(&self, view: &mut [u8], data: &Value) -> Result<usize, CodecError> {
        let total = view.len();
        if total < HEADER_SIZE {
            return Err(CodecError::Overflow {
                field: "<header>".to_string(),
            });
        }
        let empty = Map::new();
        let obj = object_of(data, "<root>")?.unwrap_or(&empty);

        let mut dst = &mut view[HEADER_SIZE..];
        write_fields(&self.fields, obj, &mut dst)?;
        Ok(total - dst.len())
    }
}

fn need(src: &[u8], n: usize, field: &FieldDef) -> Result<(), CodecError> {
    if src.remaining() < n {
        return Err(CodecError::Truncated {
            field: field.name.clone(),
            needed: n,
            remaining: src.remaining(),
        });
    }
    Ok(())
}

fn read_fields(fields: &[FieldDef], src: &mut &[u8]) -> Result<Map<String, Value>, CodecError> {
    let mut obj = Map::with_capacity(fields.len());
    for field in fields {
        let value = read_field(field, src)?;
        obj.insert(field.name.clone(), value);
    }
    Ok(obj)
}

fn read_field(field: &FieldDef, src: &mut &[u8]) -> Result<Value, CodecError> {
    let value = match field.ty {
        FieldType::Bool => {
            need(src, 1, field)?;
            Value::Bool(src.get_u8() != 0)
        }
        FieldType::Byte => {
            need(src, 1, field)?;
            Value::from(src.get_u8())
        }
        FieldType::Int16 => {
            need(src, 2, field)?;
            Value::from(src.get_i16_le())
        }
        FieldType::Uint16 => {
            need(src, 2, field)?;
            Value::from(src.get_u16_le())
        }
        FieldType::Int32 => {
            need(src, 4, field)?;
            Value::from(src.get_i32_le())
        }
        FieldType::Uint32 => {
            need(src, 4, field)?;
            Value::from(src.get_u32_le())
        }
        FieldType::Int64 => {
            need(src, 8, field)?;
            Value::from(src.get_i64_le())
        }
        FieldType::Uint64 => {
            need(src, 8, field)?;
            Value::from(src.get_u64_le())
        }
        FieldType::Float => {
            need(src, 4, field)?;
            Value::from(src.get_f32_le() as f64)
        }
        FieldType::Double => {
            need(src, 8, field)?;
            Value::from(src.get_f64_le())
        }
        FieldType::String => {
            let raw = read_prefixed(field, src)?;
            let text = std::str::from_utf8(raw).map_err(|_| CodecError::Utf8 {
                field: field.name.clone(),
            })?;
            Value::String(text.to_string())
        }
        FieldType::Bytes => {
            let raw = read_prefixed(field, src)?;
            Value::Array(raw.iter().map(|b| Value::from(*b)).collect())
        }
        FieldType::Array => {
            need(src, 2, field)?;
            let count = src.get_u16_le() as usize;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(Value::Object(read_fields(&field.children, src)?));
            }
            Value::Array(items)
        }
        FieldType::Object => Value::Object(read_fields(&field.children, src)?),
    };
    Ok(value)
}

fn read_prefixed<'a>(field: &FieldDef, src: &mut &'a [u8]) -> Result<&'a [u8], CodecError> {
    need(src, 2, field)?;
    let len = src.get_u16_le() as usize;
    need(src, len, field)?;
    let whole: &'a [u8] = *src;
    let (raw, rest) = whole.split_at(len);
    *src = rest;
    Ok(raw)
}

fn object_of<'a>(
    value: &'a Value,
    field: &str,
) -> Result<Option<&'a Map<String, Value>>, CodecError> {
    match value {
        Value::Null => Ok(None),
        Value::Object(obj) => Ok(Some(obj)),
        _ => Err(CodecError::Type {
            field: field.to_string(),
            expected: "object",
        }),
    }
}

fn room(dst: &[u8], n: usize, field: &FieldDef) -> Result<(), CodecError> {
    if dst.len() < n {
        return Err(CodecError::Overflow {
            field: field.name.clone(),
        });
    }
    Ok(())
}

fn type_err(field: &FieldDef, expected: &'static str) -> CodecError {
    CodecError::Type {
        field: field.name.clone(),
        expected,
    }
}

fn range_err(field: &FieldDef) -> CodecError {
    CodecError::Range {
        field: field.name.clone(),
    }
}

fn as_unsigned<T: TryFrom<u64>>(field: &FieldDef, value: Option<&Value>) -> Result<T, CodecError> {
    let n = match value {
        None | Some(Value::Null) => 0,
        Some(Value::Number(n)) => n.as_u64().ok_or_else(|| range_err(field))?,
        Some(_) => return Err(type_err(field, "unsigned integer")),
    };
    T::try_from(n).map_err(|_| range_err(field))
}

fn as_signed<T: TryFrom<i64>>(field: &FieldDef, value: Option<&Value>) -> Result<T, CodecError> {
    let n = match value {
        None | Some(Value::Null) => 0,
        Some(Value::Number(n)) => n.as_i64().ok_or_else(|| range_err(field))?,
        Some(_) => return Err(type_err(field, "integer")),
    };
    T::try_from(n).map_err(|_| range_err(field))
}

fn as_float(field: &FieldDef, value: Option<&Value>) -> Result<f64, CodecError> {
    match value {
        None | Some(Value::Null) => Ok(0.0),
        Some(Value::Number(n)) => n.as_f64().ok_or_else(|| range_err(field)),
        Some(_) => Err(type_err(field, "number")),
    }
}

fn write_prefixed(field: &FieldDef, raw: &[u8], dst: &mut &mut [u8]) -> Result<(), CodecError> {
    let len = u16::try_from(raw.len()).map_err(|_| range_err(field))?;
    room(dst, 2 + raw.len(), field)?;
    dst.put_u16_le(len);
    dst.put_slice(raw);
    Ok(())
}

fn write_fields(
    fields: &[FieldDef],
    obj: &Map<String, Value>,
    dst: &mut &mut [u8],
) -> Result<(), CodecError> {
    for field in fields {
        write_field(field, obj.get(&field.name), dst)?;
    }
    Ok(())
}

fn write_field(
    field: &FieldDef,
    value: Option<&Value>,
    dst: &mut &mut [u8],
) -> Result<(), CodecError> {
    match field.ty {
        FieldType::Bool => {
            let b = match value {
                None | Some(Value::Null) => false,
                Some(Value::Bool(b)) => *b,
                Some(_) => return Err(type_err(field, "bool")),
            };
            room(dst, 1, field)?;
            dst.put_u8(b as u8);
        }
        FieldType::Byte => {
            let n: u8 = as_unsigned(field, value)?;
            room(dst, 1, field)?;
            dst.put_u8(n);
        }
        FieldType::Int16 => {
            let n: i16 = as_signed(field, value)?;
            room(dst, 2, field)?;
            dst.put_i16_le(n);
        }
        FieldType::Uint16 => {
            let n: u16 = as_unsigned(field, value)?;
            room(dst, 2, field)?;
            dst.put_u16_le(n);
        }
        FieldType::Int32 => {
            let n: i32 = as_signed(field, value)?;
            room(dst, 4, field)?;
            dst.put_i32_le(n);
        }
        FieldType::Uint32 => {
            let n: u32 = as_unsigned(field, value)?;
            room(dst, 4, field)?;
            dst.put_u32_le(n);
        }
        FieldType::Int64 => {
            let n: i64 = as_signed(field, value)?;
            room(dst, 8, field)?;
            dst.put_i64_le(n);
        }
        FieldType::Uint64 => {
            let n: u64 = as_unsigned(field, value)?;
            room(dst, 8, field)?;
            dst.put_u64_le(n);
        }
        FieldType::Float => {
            let n = as_float(field, value)?;
            room(dst, 4, field)?;
            dst.put_f32_le(n as f32);
        }
        FieldType::Double => {
            let n = as_float(field, value)?;
            room(dst, 8, field)?;
            dst.put_f64_le(n);
        }
        FieldType::String => {
            let text = match value {
                None | Some(Value::Null) => "",
                Some(Value::String(s)) => s.as_str(),
                Some(_) => return Err(type_err(field, "string")),
            };
            write_prefixed(field, text.as_bytes(), dst)?;
        }
        FieldType::Bytes => {
            let raw = match value {
                None | Some(Value::Null) => Vec::new(),
                Some(Value::Array(items)) => items
                    .iter()
                    .map(|v| {
                        v.as_u64()
                            .and_then(|n| u8::try_from(n).ok())
                            .ok_or_else(|| range_err(field))
                    })
                    .collect::<Result<Vec<u8>, _>>()?,
                Some(_) => return Err(type_err(field, "byte array")),
            };
            write_prefixed(field, &raw, dst)?;
        }
        FieldType::Array => {
            let items: &[Value] = match value {
                None | Some(Value::Null) => &[],
                Some(Value::Array(items)) => items,
                Some(_) => return Err(type_err(field, "array")),
            };
            let count = u16::try_from(items.len()).map_err(|_| range_err(field))?;
            room(dst, 2, field)?;
            dst.put_u16_le(count);

            let empty = Map::new();
            for item in items {
                let obj = object_of(item, &field.name)?.unwrap_or(&empty);
                write_fields(&field.children, obj, dst)?;
            }
        }
        FieldType::Object => {
            let empty = Map::new();
            let obj = match value {
                Some(v) => object_of(v, &field.name)?.unwrap_or(&empty),
                None => &empty,
            };
            write_fields(&field.children, obj, dst)?;
        }
    }
    Ok(())
}
