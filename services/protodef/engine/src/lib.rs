//! Identifier resolution and codec invocation for protodef.
//!
//! The [`ProtocolEngine`] ties the pieces together: it owns the definition
//! registry, the loader, the protocol map, and the scratch buffers, and it
//! exposes the per-message operations.
//!
//! ## Example
//!
//! ```rust
//! use protodef_engine::{EngineOptions, OpcodeTable, ProtocolEngine, VersionRequest};
//! use protodef_registry::Bundle;
//! use serde_json::json;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let map = OpcodeTable::from_map_str("S_CHAT 100")?;
//! let mut engine = ProtocolEngine::new(EngineOptions::new("pc", 100)?, Box::new(map));
//!
//! let mut bundle = Bundle::default();
//! bundle.insert_source("S_CHAT.2.def", "uint32 channel\nstring message");
//! engine.load(&bundle, None)?;
//!
//! let resolved = engine.resolve("S_CHAT", VersionRequest::Latest)?;
//! let data = json!({ "channel": 1, "message": "hello" });
//! let bytes = engine.write(&resolved, Some(&data))?;
//! assert_eq!(engine.parse(&resolved, &bytes)?, data);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod engine;
pub mod error;
pub mod map;
pub mod resolve;

// Re-export main types
pub use engine::{EngineOptions, ProtocolEngine};
pub use error::{EngineError, MapError, ResolveError};
pub use map::{OpcodeTable, ProtocolMap};
pub use resolve::{Identifier, Resolved, VersionRequest};
