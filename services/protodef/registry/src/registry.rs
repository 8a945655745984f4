//! In-memory definition store.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use crate::definition::{Definition, DeprecationEntry, DeprecationTable};

/// Definitions keyed by name then version, plus bundle bookkeeping
#[derive(Debug, Default)]
pub struct DefinitionRegistry {
    /// name -> version -> definition
    definitions: HashMap<String, BTreeMap<u32, Arc<Definition>>>,
    /// Deprecation rules from the default bundle
    deprecated: DeprecationTable,
    /// (name, version) pairs shipped in the default bundle
    defaults: HashSet<(String, u32)>,
    /// Lowest bundled version per name
    lowest_default: HashMap<String, u32>,
}

impl DefinitionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every definition; bundle bookkeeping is kept
    pub fn clear(&mut self) {
        self.definitions.clear();
    }

    /// Replace the bundle bookkeeping
    pub fn set_bundle_info(
        &mut self,
        deprecated: DeprecationTable,
        defaults: HashSet<(String, u32)>,
        lowest_default: HashMap<String, u32>,
    ) {
        self.deprecated = deprecated;
        self.defaults = defaults;
        self.lowest_default = lowest_default;
    }

    /// Insert a definition.
    ///
    /// With `overwrite` the slot is always replaced; without it the
    /// definition only fills an empty slot. Returns whether it was stored.
    pub fn insert(&mut self, definition: Definition, overwrite: bool) -> bool {
        let versions = self
            .definitions
            .entry(definition.name.clone())
            .or_default();

        if !overwrite && versions.contains_key(&definition.version) {
            debug!(
                "Keeping existing definition {}.{}",
                definition.name, definition.version
            );
            return false;
        }

        debug!(
            "Registered definition {}.{} (origin: {}, readable: {}, writeable: {})",
            definition.name,
            definition.version,
            definition.origin,
            definition.readable(),
            definition.writeable()
        );
        versions.insert(definition.version, Arc::new(definition));
        true
    }

    /// Get a definition
    pub fn get(&self, name: &str, version: u32) -> Option<Arc<Definition>> {
        self.definitions
            .get(name)
            .and_then(|versions| versions.get(&version))
            .cloned()
    }

    /// Highest registered version for `name`
    pub fn latest_version(&self, name: &str) -> Option<u32> {
        self.definitions
            .get(name)
            .and_then(|versions| versions.keys().next_back().copied())
    }

    /// Registered versions for `name`, ascending
    pub fn versions(&self, name: &str) -> Vec<u32> {
        self.definitions
            .get(name)
            .map(|versions| versions.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Names with at least one definition, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .definitions
            .iter()
            .filter(|(_, versions)| !versions.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Total number of definitions
    pub fn len(&self) -> usize {
        self.definitions.values().map(BTreeMap::len).sum()
    }

    /// Whether no definition is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether (name, version) ships in the default bundle
    pub fn is_default(&self, name: &str, version: u32) -> bool {
        self.defaults.contains(&(name.to_string(), version))
    }

    /// Lowest bundled version for `name`
    pub fn lowest_default_version(&self, name: &str) -> Option<u32> {
        self.lowest_default.get(name).copied()
    }

    /// Deprecation rule for (name, version)
    pub fn deprecation(&self, name: &str, version: u32) -> Option<&DeprecationEntry> {
        self.deprecated
            .get(name)
            .and_then(|versions| versions.get(&version))
    }
}
