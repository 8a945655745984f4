//! Statically linked codecs for script-kind definitions.
//!
//! A `name.version[.platform].js` entry is never evaluated. The loader looks
//! up a codec registered here under the same key and registers that instead.

use protodef_schema::Codec;
use protodef_wire::{DefinitionIdentity, Platform};
use std::collections::HashMap;
use std::sync::Arc;

/// Key a plugin is registered under
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PluginKey {
    /// Message name
    pub name: String,
    /// Definition version
    pub version: u32,
    /// Platform tag, if platform specific
    pub platform: Option<String>,
}

impl From<&DefinitionIdentity> for PluginKey {
    fn from(id: &DefinitionIdentity) -> Self {
        Self {
            name: id.name.clone(),
            version: id.version,
            platform: id.platform.clone(),
        }
    }
}

/// Registered plugin codecs
#[derive(Default, Clone)]
pub struct PluginTable {
    plugins: HashMap<PluginKey, Arc<dyn Codec>>,
}

impl PluginTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a codec; returns the codec it replaced, if any
    pub fn register(
        &mut self,
        name: impl Into<String>,
        version: u32,
        platform: Option<Platform>,
        codec: Arc<dyn Codec>,
    ) -> Option<Arc<dyn Codec>> {
        let key = PluginKey {
            name: name.into(),
            version,
            platform: platform.map(|p| p.as_str().to_string()),
        };
        self.plugins.insert(key, codec)
    }

    /// Codec for a script-kind identity
    pub fn lookup(&self, id: &DefinitionIdentity) -> Option<Arc<dyn Codec>> {
        self.plugins.get(&PluginKey::from(id)).cloned()
    }

    /// Number of registered plugins
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl std::fmt::Debug for PluginTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginTable")
            .field("plugins", &self.plugins.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protodef_schema::{DefinitionCompiler, LayoutCompiler, StructDef};
    use protodef_wire::parse_identity;

    fn codec() -> Arc<dyn Codec> {
        LayoutCompiler::new().compile(&StructDef::default()).unwrap()
    }

    #[test]
    fn test_lookup_by_identity() {
        let mut plugins = PluginTable::new();
        plugins.register("S_SPAWN", 4, None, codec());
        plugins.register("S_SPAWN", 4, Some(Platform::Console), codec());

        let generic = parse_identity("S_SPAWN.4.js").unwrap();
        let console = parse_identity("S_SPAWN.4.console.js").unwrap();
        let classic = parse_identity("S_SPAWN.4.classic.js").unwrap();
        let other = parse_identity("S_SPAWN.5.js").unwrap();

        assert!(plugins.lookup(&generic).is_some());
        assert!(plugins.lookup(&console).is_some());
        assert!(plugins.lookup(&classic).is_none());
        assert!(plugins.lookup(&other).is_none());
        assert_eq!(plugins.len(), 2);
    }

    #[test]
    fn test_register_replaces() {
        let mut plugins = PluginTable::new();
        assert!(plugins.register("A", 1, None, codec()).is_none());
        assert!(plugins.register("A", 1, None, codec()).is_some());
        assert_eq!(plugins.len(), 1);
    }
}
