//! Registry population from the default bundle and the custom directory.

use protodef_schema::{
    CompileError, DefParser, DefinitionCompiler, LayoutCompiler, SchemaError, SchemaParser,
};
use protodef_wire::{parse_identity, DefinitionIdentity, Platform, SourceKind};
use std::collections::{HashMap, HashSet};
use std::ops::AddAssign;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::bundle::Bundle;
use crate::definition::{Definition, DefinitionSource, Origin, Permissions};
use crate::plugin::PluginTable;
use crate::registry::DefinitionRegistry;
use crate::LoadError;

/// Per-definition source failures (logged, never fatal)
#[derive(Error, Debug)]
pub enum SourceError {
    /// Bundle entry is not valid base64
    #[error("base64 decode failed: {0}")]
    Base64(#[from] base64::DecodeError),
    /// Decoded source is not UTF-8
    #[error("source is not valid utf-8")]
    Utf8,
    /// Custom file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Structural parser rejected the source
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
    /// Script-kind definition without a registered plugin
    #[error("no plugin registered")]
    MissingPlugin,
}

/// Engine settings the loader applies to every definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoaderOptions {
    /// Platform whose tagged layouts are loaded
    pub platform: Platform,
    /// Major patch version checked against deprecation rules
    pub major_patch_version: u32,
}

/// Result of one registration attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// Stored in the registry
    Inserted,
    /// Slot already taken and overwrite not allowed
    Kept,
    /// Compilation failed; definition dropped
    Dropped,
}

/// Counters for one load pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Definitions stored
    pub registered: usize,
    /// Entries ignored (bad name, other platform, stale, slot taken)
    pub skipped: usize,
    /// Entries that failed to decode, parse, or compile
    pub failed: usize,
}

impl AddAssign for LoadReport {
    fn add_assign(&mut self, other: Self) {
        self.registered += other.registered;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

enum Outcome {
    Registered,
    Skipped,
    Failed,
}

impl LoadReport {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Registered => self.registered += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Failed => self.failed += 1,
        }
    }
}

/// Applies load, precedence, staleness, and deprecation rules to a registry
pub struct Loader {
    options: LoaderOptions,
    parser: Box<dyn SchemaParser>,
    compiler: Box<dyn DefinitionCompiler>,
    plugins: PluginTable,
}

impl Loader {
    /// Create a loader with the built-in parser and compiler
    pub fn new(options: LoaderOptions) -> Self {
        Self {
            options,
            parser: Box::new(DefParser::new()),
            compiler: Box::new(LayoutCompiler::new()),
            plugins: PluginTable::new(),
        }
    }

    /// Use a different structural parser
    pub fn with_parser(mut self, parser: Box<dyn SchemaParser>) -> Self {
        self.parser = parser;
        self
    }

    /// Use a different compiler
    pub fn with_compiler(mut self, compiler: Box<dyn DefinitionCompiler>) -> Self {
        self.compiler = compiler;
        self
    }

    /// Use a plugin table for script-kind definitions
    pub fn with_plugins(mut self, plugins: PluginTable) -> Self {
        self.plugins = plugins;
        self
    }

    /// Loader settings
    pub fn options(&self) -> LoaderOptions {
        self.options
    }

    /// Mutable access to the plugin table
    pub fn plugins_mut(&mut self) -> &mut PluginTable {
        &mut self.plugins
    }

    /// Rebuild `registry` from `bundle`, then apply custom definitions from `custom_dir`
    pub fn load(
        &self,
        registry: &mut DefinitionRegistry,
        bundle: &Bundle,
        custom_dir: Option<&Path>,
    ) -> Result<LoadReport, LoadError> {
        let mut report = self.load_default_bundle(registry, bundle);
        if let Some(dir) = custom_dir {
            report += self.load_custom_definitions(registry, dir)?;
        }
        info!(
            "Loaded {} definitions ({} skipped, {} failed)",
            report.registered, report.skipped, report.failed
        );
        Ok(report)
    }

    /// Clear `registry` and load every definition in `bundle`
    pub fn load_default_bundle(
        &self,
        registry: &mut DefinitionRegistry,
        bundle: &Bundle,
    ) -> LoadReport {
        let mut report = LoadReport::default();

        let mut parsed = Vec::with_capacity(bundle.entries.len());
        for (file_name, encoded) in &bundle.entries {
            match parse_identity(file_name) {
                Some(id) => parsed.push((id, encoded)),
                None => report.skipped += 1,
            }
        }

        let mut lowest: HashMap<String, u32> = HashMap::new();
        let mut defaults = HashSet::with_capacity(parsed.len());
        for (id, _) in &parsed {
            lowest
                .entry(id.name.clone())
                .and_modify(|v| *v = (*v).min(id.version))
                .or_insert(id.version);
            defaults.insert((id.name.clone(), id.version));
        }

        registry.set_bundle_info(bundle.deprecated.clone(), defaults, lowest);
        registry.clear();

        for (id, encoded) in &parsed {
            let outcome =
                self.register_entry(registry, id, Origin::Default, || Bundle::decode_entry(encoded));
            report.record(outcome);
        }

        debug!(
            "Default bundle: {} registered, {} skipped, {} failed",
            report.registered, report.skipped, report.failed
        );
        report
    }

    /// Load definitions from a flat directory on top of the current registry
    pub fn load_custom_definitions(
        &self,
        registry: &mut DefinitionRegistry,
        dir: &Path,
    ) -> Result<LoadReport, LoadError> {
        let mut report = LoadReport::default();

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Custom definition directory {:?} not found", dir);
                return Ok(report);
            }
            Err(e) => return Err(e.into()),
        };

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        for path in paths {
            let Some(id) = parse_identity(&path) else {
                report.skipped += 1;
                continue;
            };

            if id.version != 0 {
                if let Some(lowest) = registry.lowest_default_version(&id.name) {
                    if id.version < lowest {
                        warn!(
                            "Skipping stale custom definition {} (lowest supported version is {})",
                            id, lowest
                        );
                        report.skipped += 1;
                        continue;
                    }
                }
            }

            let outcome = self.register_entry(registry, &id, Origin::Custom, || {
                Ok(std::fs::read_to_string(&path)?)
            });
            report.record(outcome);
        }

        debug!(
            "Custom definitions from {:?}: {} registered, {} skipped, {} failed",
            dir, report.registered, report.skipped, report.failed
        );
        Ok(report)
    }

    /// Compile (when needed), apply deprecation, and insert one definition.
    ///
    /// Compile failures are logged and the definition is dropped.
    #[allow(clippy::too_many_arguments)]
    pub fn add_definition(
        &self,
        registry: &mut DefinitionRegistry,
        name: &str,
        version: u32,
        platform: Option<Platform>,
        source: DefinitionSource,
        overwrite: bool,
        origin: Origin,
    ) -> Registration {
        let codec = match source {
            DefinitionSource::Compiled(codec) => codec,
            DefinitionSource::Structural(def) => match self.compiler.compile(&def) {
                Ok(codec) => codec,
                Err(e) => {
                    log_compile_failure(name, version, &e);
                    return Registration::Dropped;
                }
            },
        };

        let permissions = registry
            .deprecation(name, version)
            .map(|entry| entry.permissions(self.options.major_patch_version))
            .unwrap_or(Permissions::all());

        let definition = Definition::new(name, version, platform, permissions, origin, codec);
        if registry.insert(definition, overwrite) {
            Registration::Inserted
        } else {
            Registration::Kept
        }
    }

    fn register_entry(
        &self,
        registry: &mut DefinitionRegistry,
        id: &DefinitionIdentity,
        origin: Origin,
        fetch: impl FnOnce() -> Result<String, SourceError>,
    ) -> Outcome {
        if let Some(tag) = &id.platform {
            if !self.options.platform.matches(tag) {
                debug!("Skipping {} (platform is {})", id, self.options.platform);
                return Outcome::Skipped;
            }
        }

        let source = match id.kind {
            SourceKind::Script => self
                .plugins
                .lookup(id)
                .map(DefinitionSource::Compiled)
                .ok_or(SourceError::MissingPlugin),
            SourceKind::Def => fetch().and_then(|text| {
                self.parser
                    .parse(&text)
                    .map(DefinitionSource::Structural)
                    .map_err(SourceError::from)
            }),
        };

        let source = match source {
            Ok(source) => source,
            Err(e) => {
                warn!("Failed to load definition {} ({}): {}", id, origin, e);
                return Outcome::Failed;
            }
        };

        let platform = id.platform.as_ref().map(|_| self.options.platform);
        let overwrite = id.platform.is_some();
        match self.add_definition(
            registry, &id.name, id.version, platform, source, overwrite, origin,
        ) {
            Registration::Inserted => Outcome::Registered,
            Registration::Kept => Outcome::Skipped,
            Registration::Dropped => Outcome::Failed,
        }
    }
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader")
            .field("options", &self.options)
            .field("plugins", &self.plugins)
            .finish()
    }
}

fn log_compile_failure(name: &str, version: u32, e: &CompileError) {
    error!("Failed to compile definition {}.{}: {}", name, version, e);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::DeprecationEntry;
    use protodef_schema::{Codec, CodecError};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tempfile::TempDir;

    struct FixedCodec(u8);

    impl Codec for FixedCodec {
        fn read(&self, _view: &[u8]) -> Result<Value, CodecError> {
            Ok(json!({ "tag": self.0 }))
        }

        fn write(&self, view: &mut [u8], _data: &Value) -> Result<usize, CodecError> {
            view[4] = self.0;
            Ok(5)
        }
    }

    fn loader(platform: Platform, patch: u32) -> Loader {
        Loader::new(LoaderOptions {
            platform,
            major_patch_version: patch,
        })
    }

    fn bundle(entries: &[(&str, &str)]) -> Bundle {
        let mut bundle = Bundle::default();
        for (file, source) in entries {
            bundle.insert_source(*file, source);
        }
        bundle
    }

    fn field_count(reg: &DefinitionRegistry, name: &str, version: u32) -> usize {
        let def = reg.get(name, version).unwrap();
        let mut view = vec![0u8; 64];
        def.write(&mut view, &Value::Null).unwrap() - 4
    }

    #[test]
    fn test_bundle_load_basic() {
        let mut reg = DefinitionRegistry::new();
        let report = loader(Platform::Pc, 100).load_default_bundle(
            &mut reg,
            &bundle(&[
                ("S_PING.1.def", "uint32 seq"),
                ("S_PING.2.def", "uint32 seq\nuint32 time"),
                ("README.txt", "ignored"),
            ]),
        );

        assert_eq!(report.registered, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(reg.latest_version("S_PING"), Some(2));
        assert_eq!(reg.lowest_default_version("S_PING"), Some(1));
        assert!(reg.is_default("S_PING", 2));
        assert_eq!(reg.get("S_PING", 1).unwrap().origin, Origin::Default);
    }

    #[test]
    fn test_bundle_load_clears_registry() {
        let mut reg = DefinitionRegistry::new();
        let loader = loader(Platform::Pc, 0);
        loader.load_default_bundle(&mut reg, &bundle(&[("A.1.def", "byte a")]));
        loader.load_default_bundle(&mut reg, &bundle(&[("B.1.def", "byte b")]));

        assert!(reg.get("A", 1).is_none());
        assert!(reg.get("B", 1).is_some());
        assert!(!reg.is_default("A", 1));
    }

    #[test]
    fn test_platform_layout_wins_regardless_of_order() {
        // "A.3.console.def" sorts before "A.3.def", "B.3.def" before "B.3.pc.def"
        let entries = [
            ("A.3.console.def", "uint32 a\nuint32 b"),
            ("A.3.def", "uint32 a"),
            ("B.3.def", "uint32 a"),
            ("B.3.pc.def", "uint32 a\nuint32 b"),
        ];
        let mut reg = DefinitionRegistry::new();
        loader(Platform::Console, 0).load_default_bundle(&mut reg, &bundle(&entries));
        assert_eq!(field_count(&reg, "A", 3), 8);
        assert_eq!(reg.get("A", 3).unwrap().platform, Some(Platform::Console));
        assert_eq!(field_count(&reg, "B", 3), 4);

        let mut reg = DefinitionRegistry::new();
        loader(Platform::Pc, 0).load_default_bundle(&mut reg, &bundle(&entries));
        assert_eq!(field_count(&reg, "A", 3), 4);
        assert_eq!(field_count(&reg, "B", 3), 8);
        assert_eq!(reg.get("B", 3).unwrap().platform, Some(Platform::Pc));
    }

    #[test]
    fn test_bad_sources_do_not_abort_load() {
        let mut reg = DefinitionRegistry::new();
        let mut b = bundle(&[
            ("A.1.def", "uint32 a"),
            ("B.1.def", "varint broken"),
            ("C.1.def", "array empty"),
            ("E.1.js", "module.exports = {}"),
        ]);
        b.entries.insert("D.1.def".to_string(), "***".to_string());

        let report = loader(Platform::Pc, 0).load_default_bundle(&mut reg, &b);
        assert_eq!(report.registered, 1);
        assert_eq!(report.failed, 4);
        assert!(reg.get("A", 1).is_some());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_script_definitions_use_plugins() {
        let mut plugins = PluginTable::new();
        plugins.register("S_SPAWN", 2, None, Arc::new(FixedCodec(7)));
        plugins.register("S_SPAWN", 2, Some(Platform::Classic), Arc::new(FixedCodec(9)));
        let loader = loader(Platform::Classic, 0).with_plugins(plugins);

        let mut reg = DefinitionRegistry::new();
        let report = loader.load_default_bundle(
            &mut reg,
            &bundle(&[("S_SPAWN.2.js", ""), ("S_SPAWN.2.classic.js", "")]),
        );
        // The classic entry sorts first; the generic one then finds the slot taken
        assert_eq!(report.registered, 1);
        assert_eq!(report.skipped, 1);

        let def = reg.get("S_SPAWN", 2).unwrap();
        assert_eq!(def.read(&[]).unwrap(), json!({ "tag": 9 }));
    }

    #[test]
    fn test_deprecation_flags() {
        let mut b = bundle(&[
            ("OLD.1.def", "byte a"),
            ("OLDR.1.def", "byte a"),
            ("CUR.1.def", "byte a"),
        ]);
        let rule = |max, readable| DeprecationEntry {
            min: None,
            max: Some(max),
            readable,
        };
        b.deprecated
            .entry("OLD".to_string())
            .or_default()
            .insert(1, rule(90, None));
        b.deprecated
            .entry("OLDR".to_string())
            .or_default()
            .insert(1, rule(90, Some(true)));
        b.deprecated
            .entry("CUR".to_string())
            .or_default()
            .insert(1, rule(200, None));

        let mut reg = DefinitionRegistry::new();
        loader(Platform::Pc, 100).load_default_bundle(&mut reg, &b);

        let old = reg.get("OLD", 1).unwrap();
        assert!(!old.readable());
        assert!(!old.writeable());

        let old_readable = reg.get("OLDR", 1).unwrap();
        assert!(old_readable.readable());
        assert!(!old_readable.writeable());

        let current = reg.get("CUR", 1).unwrap();
        assert!(current.readable());
        assert!(current.writeable());
    }

    #[test]
    fn test_add_definition_overwrite_rule() {
        let loader = loader(Platform::Pc, 0);
        let mut reg = DefinitionRegistry::new();
        let first: Arc<dyn Codec> = Arc::new(FixedCodec(1));
        let second: Arc<dyn Codec> = Arc::new(FixedCodec(2));

        let add = |reg: &mut DefinitionRegistry, codec: &Arc<dyn Codec>, overwrite| {
            loader.add_definition(
                reg,
                "X",
                1,
                None,
                DefinitionSource::Compiled(codec.clone()),
                overwrite,
                Origin::Runtime,
            )
        };

        assert_eq!(add(&mut reg, &first, false), Registration::Inserted);
        assert_eq!(add(&mut reg, &second, false), Registration::Kept);
        assert_eq!(reg.get("X", 1).unwrap().read(&[]).unwrap(), json!({ "tag": 1 }));

        assert_eq!(add(&mut reg, &second, true), Registration::Inserted);
        assert_eq!(reg.get("X", 1).unwrap().read(&[]).unwrap(), json!({ "tag": 2 }));
    }

    #[test]
    fn test_add_definition_compile_failure() {
        let loader = loader(Platform::Pc, 0);
        let mut reg = DefinitionRegistry::new();
        let def = protodef_schema::StructDef {
            fields: vec![protodef_schema::FieldDef::new(
                "items",
                protodef_schema::FieldType::Array,
            )],
        };
        let result = loader.add_definition(
            &mut reg,
            "Y",
            1,
            None,
            DefinitionSource::Structural(def),
            false,
            Origin::Runtime,
        );
        assert_eq!(result, Registration::Dropped);
        assert!(reg.is_empty());
    }

    #[test]
    fn test_custom_definitions_staleness() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("S_STAT.5.def"), "byte a").unwrap();
        std::fs::write(dir.path().join("S_STAT.0.def"), "byte a").unwrap();
        std::fs::write(dir.path().join("S_STAT.8.def"), "byte a").unwrap();
        std::fs::write(dir.path().join("S_NEW.1.def"), "byte a").unwrap();
        std::fs::write(dir.path().join("notes.md"), "# notes").unwrap();

        let loader = loader(Platform::Pc, 0);
        let mut reg = DefinitionRegistry::new();
        loader.load_default_bundle(&mut reg, &bundle(&[("S_STAT.7.def", "byte a")]));
        let report = loader.load_custom_definitions(&mut reg, dir.path()).unwrap();

        assert!(reg.get("S_STAT", 5).is_none());
        assert!(reg.get("S_STAT", 0).is_some());
        assert!(reg.get("S_STAT", 8).is_some());
        assert!(reg.get("S_NEW", 1).is_some());
        assert_eq!(reg.get("S_STAT", 8).unwrap().origin, Origin::Custom);
        assert_eq!(report.registered, 3);
        assert_eq!(report.skipped, 2);
    }

    #[test]
    fn test_custom_generic_does_not_replace_default() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("A.1.def"), "uint32 a\nuint32 b").unwrap();
        std::fs::write(dir.path().join("B.1.pc.def"), "uint32 a\nuint32 b").unwrap();

        let loader = loader(Platform::Pc, 0);
        let mut reg = DefinitionRegistry::new();
        let report = loader
            .load(
                &mut reg,
                &bundle(&[("A.1.def", "uint32 a"), ("B.1.def", "uint32 a")]),
                Some(dir.path()),
            )
            .unwrap();

        assert_eq!(field_count(&reg, "A", 1), 4);
        assert_eq!(reg.get("A", 1).unwrap().origin, Origin::Default);
        assert_eq!(field_count(&reg, "B", 1), 8);
        assert_eq!(reg.get("B", 1).unwrap().origin, Origin::Custom);
        assert_eq!(report.registered, 3);
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn test_missing_custom_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        let mut reg = DefinitionRegistry::new();
        let report = loader(Platform::Pc, 0)
            .load_custom_definitions(&mut reg, &dir.path().join("absent"))
            .unwrap();
        assert_eq!(report, LoadReport::default());
    }
}
