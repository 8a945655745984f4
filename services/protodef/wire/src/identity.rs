//! Definition identities derived from file names.
//!
//! Definition files are named `name.version[.platform].(def|js)`, where name
//! and platform are ASCII word characters and version is ASCII digits. The parser
//! never fails hard: names that do not follow the convention yield `None` and
//! a log line, so one stray file cannot abort a load.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

static IDENTITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z0-9_]+)\.([0-9]+)(?:\.([A-Za-z0-9_]+))?\.(def|js)$")
        .expect("identity pattern is valid")
});

/// How a definition's source is turned into a codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    /// Structural layout text, compiled by the definition compiler
    Def,
    /// Executable codec, supplied by a statically registered plugin
    Script,
}

impl SourceKind {
    fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "def" => Some(SourceKind::Def),
            "js" => Some(SourceKind::Script),
            _ => None,
        }
    }

    /// File extension for this kind
    pub fn extension(&self) -> &'static str {
        match self {
            SourceKind::Def => "def",
            SourceKind::Script => "js",
        }
    }
}

/// Identity of a definition as encoded in its file name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DefinitionIdentity {
    /// Message name
    pub name: String,
    /// Definition version
    pub version: u32,
    /// Platform tag, if the layout is platform specific
    pub platform: Option<String>,
    /// Source kind
    pub kind: SourceKind,
}

impl fmt::Display for DefinitionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.name, self.version)?;
        if let Some(platform) = &self.platform {
            write!(f, ".{}", platform)?;
        }
        write!(f, ".{}", self.kind.extension())
    }
}

/// Parse a definition identity from a file path or logical name.
///
/// Only the final path component is considered.
pub fn parse_identity(path: impl AsRef<Path>) -> Option<DefinitionIdentity> {
    let path = path.as_ref();
    let file_name = path.file_name().and_then(|n| n.to_str())?;

    let Some(caps) = IDENTITY_RE.captures(file_name) else {
        let protocol_like = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(SourceKind::from_extension)
            .is_some();
        if protocol_like {
            warn!("Unrecognized definition file name: {}", file_name);
        } else {
            debug!("Ignoring non-definition file: {}", file_name);
        }
        return None;
    };

    let Ok(version) = caps[2].parse::<u32>() else {
        warn!("Definition version out of range: {}", file_name);
        return None;
    };

    Some(DefinitionIdentity {
        name: caps[1].to_string(),
        version,
        platform: caps.get(3).map(|m| m.as_str().to_string()),
        kind: SourceKind::from_extension(&caps[4])?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_def() {
        let id = parse_identity("Foo.3.def").unwrap();
        assert_eq!(id.name, "Foo");
        assert_eq!(id.version, 3);
        assert_eq!(id.platform, None);
        assert_eq!(id.kind, SourceKind::Def);
    }

    #[test]
    fn test_parse_platform_script() {
        let id = parse_identity("Foo.3.pc.js").unwrap();
        assert_eq!(id.name, "Foo");
        assert_eq!(id.version, 3);
        assert_eq!(id.platform.as_deref(), Some("pc"));
        assert_eq!(id.kind, SourceKind::Script);
    }

    #[test]
    fn test_parse_uses_file_name_only() {
        let id = parse_identity("/var/lib/defs/S_LOGIN.14.console.def").unwrap();
        assert_eq!(id.name, "S_LOGIN");
        assert_eq!(id.version, 14);
        assert_eq!(id.platform.as_deref(), Some("console"));
    }

    #[test]
    fn test_non_matching_names() {
        assert_eq!(parse_identity("bar.txt"), None);
        assert_eq!(parse_identity("Foo.def"), None);
        assert_eq!(parse_identity("Foo.x.def"), None);
        assert_eq!(parse_identity("Foo.3.pc.extra.def"), None);
        assert_eq!(parse_identity("Foo-bar.3.def"), None);
        assert_eq!(parse_identity(""), None);
    }

    #[test]
    fn test_non_ascii_names_are_rejected() {
        assert_eq!(parse_identity("Föo.3.def"), None);
        assert_eq!(parse_identity("Foo.3.pç.def"), None);
        assert_eq!(parse_identity("Foo.\u{0663}.def"), None);
    }

    #[test]
    fn test_version_overflow_is_skipped() {
        assert_eq!(parse_identity("Foo.99999999999.def"), None);
    }

    #[test]
    fn test_display_round_trip() {
        let id = parse_identity("C_CHAT.2.classic.def").unwrap();
        assert_eq!(id.to_string(), "C_CHAT.2.classic.def");
        assert_eq!(parse_identity(id.to_string()), Some(id));
    }
}
