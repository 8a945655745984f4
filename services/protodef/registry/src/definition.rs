//! Registered definitions and deprecation rules.

use bitflags::bitflags;
use protodef_schema::{Codec, CodecError, StructDef};
use protodef_wire::Platform;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

bitflags! {
    /// What callers may do with a definition
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Permissions: u8 {
        /// Messages may be decoded
        const READABLE = 1 << 0;
        /// Messages may be encoded
        const WRITEABLE = 1 << 1;
    }
}

/// Where a definition was loaded from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    /// Default bundle
    Default,
    /// Custom override directory
    Custom,
    /// Registered directly by the host
    Runtime,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Default => write!(f, "default"),
            Origin::Custom => write!(f, "custom"),
            Origin::Runtime => write!(f, "runtime"),
        }
    }
}

/// Deprecation rule for one (name, version)
///
/// The definition stays fully usable while the configured major patch
/// version lies within `[min, max]`; a missing bound is open.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeprecationEntry {
    /// Lowest supported major patch version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<u32>,
    /// Highest supported major patch version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<u32>,
    /// Whether decoding stays allowed outside the range
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readable: Option<bool>,
}

impl DeprecationEntry {
    /// Whether `patch` falls outside `[min, max]`
    pub fn excludes(&self, patch: u32) -> bool {
        self.min.is_some_and(|min| patch < min) || self.max.is_some_and(|max| patch > max)
    }

    /// Permissions granted at `patch`
    pub fn permissions(&self, patch: u32) -> Permissions {
        if !self.excludes(patch) {
            return Permissions::all();
        }
        if self.readable.unwrap_or(false) {
            Permissions::READABLE
        } else {
            Permissions::empty()
        }
    }
}

/// Deprecation rules keyed by name then version
pub type DeprecationTable = HashMap<String, BTreeMap<u32, DeprecationEntry>>;

/// Input to registration: a layout still to be compiled, or a ready codec
#[derive(Clone)]
pub enum DefinitionSource {
    /// Structural layout, compiled on registration
    Structural(StructDef),
    /// Precompiled codec (plugins)
    Compiled(Arc<dyn Codec>),
}

impl fmt::Debug for DefinitionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefinitionSource::Structural(def) => {
                f.debug_tuple("Structural").field(&def.fields.len()).finish()
            }
            DefinitionSource::Compiled(_) => f.write_str("Compiled"),
        }
    }
}

/// Compiled codec plus permissions for one version of one message
#[derive(Clone)]
pub struct Definition {
    /// Message name
    pub name: String,
    /// Definition version (0 = always current)
    pub version: u32,
    /// Platform the layout was registered for, if specific
    pub platform: Option<Platform>,
    /// Computed permissions
    pub permissions: Permissions,
    /// Provenance
    pub origin: Origin,
    codec: Arc<dyn Codec>,
}

impl Definition {
    /// Create a definition around a compiled codec
    pub fn new(
        name: impl Into<String>,
        version: u32,
        platform: Option<Platform>,
        permissions: Permissions,
        origin: Origin,
        codec: Arc<dyn Codec>,
    ) -> Self {
        Self {
            name: name.into(),
            version,
            platform,
            permissions,
            origin,
            codec,
        }
    }

    /// Whether messages may be decoded
    pub fn readable(&self) -> bool {
        self.permissions.contains(Permissions::READABLE)
    }

    /// Whether messages may be encoded
    pub fn writeable(&self) -> bool {
        self.permissions.contains(Permissions::WRITEABLE)
    }

    /// Decode a whole message view
    pub fn read(&self, view: &[u8]) -> Result<Value, CodecError> {
        self.codec.read(view)
    }

    /// Encode into a write view; returns the end offset
    pub fn write(&self, view: &mut [u8], data: &Value) -> Result<usize, CodecError> {
        self.codec.write(view, data)
    }

    /// Deep copy
    pub fn clone_value(&self, data: &Value) -> Value {
        self.codec.clone_value(data)
    }

    /// Whether two definitions share the same codec instance
    pub fn same_codec(&self, other: &Definition) -> bool {
        Arc::ptr_eq(&self.codec, &other.codec)
    }
}

impl fmt::Debug for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Definition")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("platform", &self.platform)
            .field("permissions", &self.permissions)
            .field("origin", &self.origin)
            .finish()
    }
}
