//! Definition registry and loader for protodef.
//!
//! This crate owns the in-memory store of compiled definitions and the rules
//! that populate it: the default bundle, the custom override directory,
//! platform precedence, staleness checks, and deprecation gating.
//!
//! ## Precedence
//!
//! - A platform-tagged definition always replaces the slot for its
//!   (name, version).
//! - A platform-agnostic definition only fills an empty slot.
//! - Custom definitions older than the lowest bundled version of the same
//!   name are skipped, except version 0.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bundle;
pub mod definition;
pub mod loader;
pub mod plugin;
pub mod registry;

use thiserror::Error;

// Re-export main types
pub use bundle::Bundle;
pub use definition::{
    Definition, DefinitionSource, DeprecationEntry, DeprecationTable, Origin, Permissions,
};
pub use loader::{LoadReport, Loader, LoaderOptions, Registration, SourceError};
pub use plugin::{PluginKey, PluginTable};
pub use registry::DefinitionRegistry;

/// Whole-load errors
///
/// Per-definition failures never surface here; they are logged and counted
/// in [`LoadReport`].
#[derive(Error, Debug)]
pub enum LoadError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Bundle is not valid JSON
    #[error("bundle error: {0}")]
    Bundle(#[from] serde_json::Error),
}
