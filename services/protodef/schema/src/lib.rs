//! Structural definitions, the codec trait, and the layout compiler for protodef.
//!
//! A definition goes through two collaborators before the registry can use it:
//!
//! ```text
//! source text --SchemaParser--> StructDef --DefinitionCompiler--> Arc<dyn Codec>
//! ```
//!
//! Both collaborators are traits so hosts can plug in their own formats. The
//! crate ships [`DefParser`] and [`LayoutCompiler`], which implement a small
//! line-based format with a sequential little-endian layout.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod compiler;
pub mod def;

// Re-export main types
pub use codec::{Codec, CodecError};
pub use compiler::{CompileError, CompiledLayout, DefinitionCompiler, LayoutCompiler};
pub use def::{DefParser, FieldDef, FieldType, SchemaError, SchemaParser, StructDef};
