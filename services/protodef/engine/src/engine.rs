//! The protocol engine.

use bytes::Bytes;
use protodef_registry::{
    Bundle, DefinitionRegistry, DefinitionSource, LoadReport, Loader, LoaderOptions, Origin,
    PluginTable, Registration,
};
use protodef_schema::{DefinitionCompiler, SchemaParser};
use protodef_wire::{MessageHeader, Platform, PlatformError, ScratchBuffers};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{debug, info};

use crate::error::EngineError;
use crate::map::ProtocolMap;
use crate::resolve::{self, Identifier, Resolved, VersionRequest};

/// Engine configuration fixed at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EngineOptions {
    /// Platform whose tagged layouts are loaded
    pub platform: Platform,
    /// Major patch version checked against deprecation rules
    pub major_patch_version: u32,
}

impl EngineOptions {
    /// Build options from a platform tag
    pub fn new(platform: &str, major_patch_version: u32) -> Result<Self, PlatformError> {
        Ok(Self {
            platform: platform.parse()?,
            major_patch_version,
        })
    }
}

impl From<EngineOptions> for LoaderOptions {
    fn from(options: EngineOptions) -> Self {
        LoaderOptions {
            platform: options.platform,
            major_patch_version: options.major_patch_version,
        }
    }
}

/// Versioned protocol engine
///
/// One instance owns its registry and scratch buffers. Decoding, encoding,
/// and loading take `&mut self`; resolution and cloning only read.
pub struct ProtocolEngine {
    options: EngineOptions,
    map: Box<dyn ProtocolMap>,
    registry: DefinitionRegistry,
    loader: Loader,
    scratch: ScratchBuffers,
}

impl ProtocolEngine {
    /// Create an engine with an empty registry
    pub fn new(options: EngineOptions, map: Box<dyn ProtocolMap>) -> Self {
        info!(
            "Creating protocol engine (platform {}, major patch {})",
            options.platform, options.major_patch_version
        );
        Self {
            options,
            map,
            registry: DefinitionRegistry::new(),
            loader: Loader::new(options.into()),
            scratch: ScratchBuffers::new(),
        }
    }

    /// Use a plugin table for script-kind definitions
    pub fn with_plugins(self, plugins: PluginTable) -> Self {
        Self {
            loader: self.loader.with_plugins(plugins),
            ..self
        }
    }

    /// Use a different structural parser
    pub fn with_parser(self, parser: Box<dyn SchemaParser>) -> Self {
        Self {
            loader: self.loader.with_parser(parser),
            ..self
        }
    }

    /// Use a different compiler
    pub fn with_compiler(self, compiler: Box<dyn DefinitionCompiler>) -> Self {
        Self {
            loader: self.loader.with_compiler(compiler),
            ..self
        }
    }

    /// Engine configuration
    pub fn options(&self) -> EngineOptions {
        self.options
    }

    /// Registered definitions
    pub fn registry(&self) -> &DefinitionRegistry {
        &self.registry
    }

    /// Protocol map
    pub fn map(&self) -> &dyn ProtocolMap {
        self.map.as_ref()
    }

    /// Mutable access to the plugin table
    pub fn plugins_mut(&mut self) -> &mut PluginTable {
        self.loader.plugins_mut()
    }

    /// Rebuild the registry from `bundle`, then apply `custom_dir`
    pub fn load(
        &mut self,
        bundle: &Bundle,
        custom_dir: Option<&Path>,
    ) -> Result<LoadReport, EngineError> {
        Ok(self.loader.load(&mut self.registry, bundle, custom_dir)?)
    }

    /// Clear the registry and load the default bundle only
    pub fn load_default_bundle(&mut self, bundle: &Bundle) -> LoadReport {
        self.loader.load_default_bundle(&mut self.registry, bundle)
    }

    /// Load custom definitions on top of the current registry
    pub fn load_custom_definitions(&mut self, dir: &Path) -> Result<LoadReport, EngineError> {
        Ok(self.loader.load_custom_definitions(&mut self.registry, dir)?)
    }

    /// Register a definition directly
    pub fn add_definition(
        &mut self,
        name: &str,
        version: u32,
        source: DefinitionSource,
        overwrite: bool,
    ) -> Registration {
        self.loader.add_definition(
            &mut self.registry,
            name,
            version,
            None,
            source,
            overwrite,
            Origin::Runtime,
        )
    }

    /// Resolve a name or opcode to a definition
    pub fn resolve(
        &self,
        identifier: impl Into<Identifier>,
        version: VersionRequest,
    ) -> Result<Resolved, EngineError> {
        let identifier = identifier.into();
        let resolved = resolve::resolve(self.map.as_ref(), &self.registry, &identifier, version)?;
        debug!(
            "Resolved {} to {}.{} (opcode {})",
            identifier, resolved.name, resolved.version, resolved.code
        );
        Ok(resolved)
    }

    /// Decode a whole message (header included)
    pub fn parse(&mut self, resolved: &Resolved, buffer: &[u8]) -> Result<Value, EngineError> {
        if !resolved.definition.readable() {
            return Err(deprecated(resolved, "readable"));
        }
        let view = self.scratch.load_read(buffer)?;
        Ok(resolved.definition.read(view)?)
    }

    /// Encode a message, header included
    ///
    /// `None` encodes an empty object, so every field takes its default.
    pub fn write(&mut self, resolved: &Resolved, data: Option<&Value>) -> Result<Bytes, EngineError> {
        if !resolved.definition.writeable() {
            return Err(deprecated(resolved, "writeable"));
        }

        let empty = Value::Object(Map::new());
        let data = data.unwrap_or(&empty);

        let view = self.scratch.write_view();
        let length = resolved.definition.write(view, data)?;
        let header = MessageHeader::new(length, resolved.code)?;
        header.encode_into(view)?;

        Ok(self.scratch.detach_written(length)?)
    }

    /// Deep copy of `data` through the definition's cloner
    pub fn clone_data(&self, resolved: &Resolved, data: &Value) -> Value {
        resolved.definition.clone_value(data)
    }

    /// Resolve, then decode
    pub fn parse_message(
        &mut self,
        identifier: impl Into<Identifier>,
        version: VersionRequest,
        buffer: &[u8],
    ) -> Result<Value, EngineError> {
        let resolved = self.resolve(identifier, version)?;
        self.parse(&resolved, buffer)
    }

    /// Resolve, then encode
    pub fn write_message(
        &mut self,
        identifier: impl Into<Identifier>,
        version: VersionRequest,
        data: Option<&Value>,
    ) -> Result<Bytes, EngineError> {
        let resolved = self.resolve(identifier, version)?;
        self.write(&resolved, data)
    }

    /// Read the header of a message
    pub fn read_header(&self, buffer: &[u8]) -> Result<MessageHeader, EngineError> {
        Ok(MessageHeader::decode(buffer)?)
    }

    /// Decode a complete frame using its own opcode at the latest version
    pub fn parse_frame(&mut self, buffer: &[u8]) -> Result<(Resolved, Value), EngineError> {
        let header = self.read_header(buffer)?;
        header.validate(buffer.len())?;
        let resolved = self.resolve(header.code, VersionRequest::Latest)?;
        let data = self.parse(&resolved, buffer)?;
        Ok((resolved, data))
    }
}

impl std::fmt::Debug for ProtocolEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolEngine")
            .field("options", &self.options)
            .field("definitions", &self.registry.len())
            .field("loader", &self.loader)
            .finish()
    }
}

fn deprecated(resolved: &Resolved, operation: &'static str) -> EngineError {
    EngineError::Deprecated {
        name: resolved.name.clone(),
        version: resolved.version,
        operation,
    }
}
