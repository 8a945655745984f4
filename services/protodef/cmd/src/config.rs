//! Configuration handling for the protodef tool.
//!
//! Settings come from a YAML file, then `PROTODEF_*` environment variables,
//! then command-line flags (applied by the caller).

use anyhow::{Context, Result};
use protodef_engine::EngineOptions;
use protodef_wire::Platform;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Protodef configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtodefConfig {
    /// Target platform
    pub platform: Platform,
    /// Major patch version used for deprecation checks
    pub major_patch_version: u32,
    /// Default definition bundle (JSON)
    pub bundle_path: PathBuf,
    /// Custom definition directory
    pub custom_dir: Option<PathBuf>,
    /// Protocol map file
    pub map_path: PathBuf,
}

impl Default for ProtodefConfig {
    fn default() -> Self {
        Self {
            platform: Platform::Pc,
            major_patch_version: 0,
            bundle_path: PathBuf::from("definitions.json"),
            custom_dir: None,
            map_path: PathBuf::from("protocol.map"),
        }
    }
}

/// Root configuration structure (matches the YAML structure)
#[derive(Debug, Deserialize)]
struct RootConfig {
    protodef: Option<FileConfig>,
}

#[derive(Debug, Deserialize)]
struct FileConfig {
    platform: Option<String>,
    major_patch_version: Option<u32>,
    bundle: Option<PathBuf>,
    custom_dir: Option<PathBuf>,
    map: Option<PathBuf>,
}

impl ProtodefConfig {
    /// Load configuration from file and environment variables
    pub fn load_from_file<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        Self::load_with(config_path, |key| std::env::var(key).ok())
    }

    /// Load configuration from file, reading overrides through `lookup`
    pub fn load_with<P: AsRef<Path>>(
        config_path: P,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut config = Self::default();
        let path = config_path.as_ref();

        match std::fs::read_to_string(path) {
            Ok(content) => match serde_yaml::from_str::<RootConfig>(&content) {
                Ok(root) => {
                    config.apply_root_config(root)?;
                    info!("Loaded configuration from {:?}", path);
                }
                Err(e) => warn!("Failed to parse config file {:?} ({}), using defaults", path, e),
            },
            Err(_) => debug!("Config file {:?} not found, using defaults", path),
        }

        config.apply_overrides(lookup)?;

        debug!(
            "Final configuration: platform={}, major_patch={}, bundle={:?}, map={:?}, custom_dir={:?}",
            config.platform,
            config.major_patch_version,
            config.bundle_path,
            config.map_path,
            config.custom_dir
        );
        Ok(config)
    }

    /// Engine options derived from this configuration
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            platform: self.platform,
            major_patch_version: self.major_patch_version,
        }
    }

    fn apply_root_config(&mut self, root: RootConfig) -> Result<()> {
        let Some(file) = root.protodef else {
            return Ok(());
        };

        if let Some(platform) = file.platform {
            self.set_platform(&platform, "config file")?;
        }
        if let Some(patch) = file.major_patch_version {
            self.major_patch_version = patch;
        }
        if let Some(bundle) = file.bundle {
            self.bundle_path = bundle;
        }
        if let Some(dir) = file.custom_dir {
            self.custom_dir = Some(dir);
        }
        if let Some(map) = file.map {
            self.map_path = map;
        }
        Ok(())
    }

    /// Apply `PROTODEF_*` overrides
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(platform) = lookup("PROTODEF_PLATFORM") {
            self.set_platform(&platform, "PROTODEF_PLATFORM")?;
            info!("Platform overridden by environment: {}", self.platform);
        }

        if let Some(patch) = lookup("PROTODEF_MAJOR_PATCH") {
            match patch.parse::<u32>() {
                Ok(patch) => {
                    self.major_patch_version = patch;
                    info!("Major patch version overridden by environment: {}", patch);
                }
                Err(_) => warn!("Ignoring invalid PROTODEF_MAJOR_PATCH '{}'", patch),
            }
        }

        if let Some(bundle) = lookup("PROTODEF_BUNDLE") {
            self.bundle_path = PathBuf::from(bundle);
            info!("Bundle path overridden by environment: {:?}", self.bundle_path);
        }

        if let Some(dir) = lookup("PROTODEF_CUSTOM_DIR") {
            self.custom_dir = Some(PathBuf::from(dir));
            info!("Custom directory overridden by environment: {:?}", self.custom_dir);
        }

        if let Some(map) = lookup("PROTODEF_MAP") {
            self.map_path = PathBuf::from(map);
            info!("Map path overridden by environment: {:?}", self.map_path);
        }
        Ok(())
    }

    fn set_platform(&mut self, tag: &str, source: &str) -> Result<()> {
        self.platform = tag
            .parse::<Platform>()
            .with_context(|| format!("unsupported platform '{}' from {}", tag, source))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn yaml_file(content: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();
        temp_file
    }

    #[test]
    fn test_default_config() {
        let config = ProtodefConfig::default();
        assert_eq!(config.platform, Platform::Pc);
        assert_eq!(config.major_patch_version, 0);
        assert_eq!(config.bundle_path, PathBuf::from("definitions.json"));
        assert!(config.custom_dir.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let temp_file = yaml_file(
            r#"
protodef:
  platform: console
  major_patch_version: 92
  bundle: /opt/protodef/definitions.json
  custom_dir: ./custom
  map: maps/protocol.376012.map
"#,
        );

        let config = ProtodefConfig::load_with(temp_file.path(), no_env).unwrap();

        assert_eq!(config.platform, Platform::Console);
        assert_eq!(config.major_patch_version, 92);
        assert_eq!(config.bundle_path, PathBuf::from("/opt/protodef/definitions.json"));
        assert_eq!(config.custom_dir, Some(PathBuf::from("./custom")));
        assert_eq!(config.map_path, PathBuf::from("maps/protocol.376012.map"));
    }

    #[test]
    fn test_missing_or_broken_file_uses_defaults() {
        let broken = yaml_file("protodef: [not, a, map]");
        let config = ProtodefConfig::load_with(broken.path(), no_env).unwrap();
        assert_eq!(config, ProtodefConfig::default());

        let missing = broken.path().with_extension("absent");
        let config = ProtodefConfig::load_with(missing, no_env).unwrap();
        assert_eq!(config, ProtodefConfig::default());
    }

    #[test]
    fn test_invalid_platform_in_file_is_an_error() {
        let temp_file = yaml_file("protodef:\n  platform: mobile\n");
        let err = ProtodefConfig::load_with(temp_file.path(), no_env).unwrap_err();
        assert!(err.to_string().contains("mobile"));
    }

    #[test]
    fn test_invalid_platform_in_environment_is_an_error() {
        let missing = std::env::temp_dir().join("protodef-absent-config.yaml");
        let result = ProtodefConfig::load_with(&missing, |key| {
            (key == "PROTODEF_PLATFORM").then(|| "xbox".to_string())
        });
        let err = result.unwrap_err();
        assert!(err.to_string().contains("xbox"));

        let mut config = ProtodefConfig::default();
        assert!(config
            .apply_overrides(|key| (key == "PROTODEF_PLATFORM").then(|| "xbox".to_string()))
            .is_err());
        assert_eq!(config.platform, Platform::Pc);
    }

    #[test]
    fn test_environment_overrides() {
        let env: HashMap<&str, &str> = [
            ("PROTODEF_PLATFORM", "classic"),
            ("PROTODEF_MAJOR_PATCH", "100"),
            ("PROTODEF_CUSTOM_DIR", "/tmp/custom"),
            ("PROTODEF_MAP", "other.map"),
        ]
        .into_iter()
        .collect();

        let mut config = ProtodefConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.platform, Platform::Classic);
        assert_eq!(config.major_patch_version, 100);
        assert_eq!(config.custom_dir, Some(PathBuf::from("/tmp/custom")));
        assert_eq!(config.map_path, PathBuf::from("other.map"));
        assert_eq!(config.bundle_path, PathBuf::from("definitions.json"));

        let options = config.engine_options();
        assert_eq!(options.platform, Platform::Classic);
        assert_eq!(options.major_patch_version, 100);
    }

    #[test]
    fn test_invalid_patch_override_is_ignored() {
        let mut config = ProtodefConfig::default();
        config
            .apply_overrides(|key| (key == "PROTODEF_MAJOR_PATCH").then(|| "ninety".to_string()))
            .unwrap();
        assert_eq!(config.major_patch_version, 0);
    }
}
