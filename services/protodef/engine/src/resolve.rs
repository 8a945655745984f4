//! Identifier resolution.
//!
//! Resolution turns a message name or opcode plus a version request into a
//! [`Resolved`] value that can be reused for any number of codec calls.

use protodef_registry::{Definition, DefinitionRegistry};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use crate::error::ResolveError;
use crate::map::ProtocolMap;

/// Message identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    /// Symbolic name
    Name(String),
    /// Numeric opcode
    Code(u16),
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Name(name) => write!(f, "name '{}'", name),
            Identifier::Code(code) => write!(f, "opcode {}", code),
        }
    }
}

impl From<&str> for Identifier {
    fn from(name: &str) -> Self {
        Identifier::Name(name.to_string())
    }
}

impl From<String> for Identifier {
    fn from(name: String) -> Self {
        Identifier::Name(name)
    }
}

impl From<u16> for Identifier {
    fn from(code: u16) -> Self {
        Identifier::Code(code)
    }
}

impl TryFrom<&Value> for Identifier {
    type Error = ResolveError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(name) => Ok(Identifier::Name(name.clone())),
            Value::Number(n) => n
                .as_u64()
                .and_then(|c| u16::try_from(c).ok())
                .map(Identifier::Code)
                .ok_or_else(|| ResolveError::IdentifierType(n.to_string())),
            other => Err(ResolveError::IdentifierType(other.to_string())),
        }
    }
}

impl FromStr for Identifier {
    type Err = ResolveError;

    /// Decimal integers are opcodes; anything else is a name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ResolveError::IdentifierType("empty identifier".to_string()));
        }
        if s.chars().all(|c| c.is_ascii_digit()) {
            return s
                .parse::<u16>()
                .map(Identifier::Code)
                .map_err(|_| ResolveError::IdentifierType(s.to_string()));
        }
        Ok(Identifier::Name(s.to_string()))
    }
}

/// Requested definition version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VersionRequest {
    /// Highest registered version at call time
    #[default]
    Latest,
    /// One specific version
    Exact(u32),
}

impl From<u32> for VersionRequest {
    fn from(version: u32) -> Self {
        VersionRequest::Exact(version)
    }
}

impl From<Option<u32>> for VersionRequest {
    fn from(version: Option<u32>) -> Self {
        version.map_or(VersionRequest::Latest, VersionRequest::Exact)
    }
}

impl fmt::Display for VersionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionRequest::Latest => write!(f, "latest"),
            VersionRequest::Exact(v) => write!(f, "{}", v),
        }
    }
}

impl FromStr for VersionRequest {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "latest" | "*" => Ok(VersionRequest::Latest),
            _ => s.parse().map(VersionRequest::Exact),
        }
    }
}

/// Result of a resolution, reusable across codec calls
#[derive(Debug, Clone)]
pub struct Resolved {
    /// Message name
    pub name: String,
    /// Message opcode
    pub code: u16,
    /// Resolved version
    pub version: u32,
    /// Highest registered version at resolution time
    pub latest_version: Option<u32>,
    /// Definition to invoke
    pub definition: Arc<Definition>,
}

/// Resolve an identifier against a protocol map and registry
pub fn resolve(
    map: &dyn ProtocolMap,
    registry: &DefinitionRegistry,
    identifier: &Identifier,
    requested: VersionRequest,
) -> Result<Resolved, ResolveError> {
    let (name, code) = match identifier {
        Identifier::Name(name) => {
            let code = map
                .code(name)
                .ok_or_else(|| ResolveError::NotFound(identifier.to_string()))?;
            (name.clone(), code)
        }
        Identifier::Code(code) => {
            let name = map
                .name(*code)
                .ok_or_else(|| ResolveError::NotFound(identifier.to_string()))?;
            (name.to_string(), *code)
        }
    };

    let latest_version = registry.latest_version(&name);
    let version = match requested {
        VersionRequest::Exact(v) => Some(v),
        VersionRequest::Latest => latest_version,
    };

    let definition = version.and_then(|v| registry.get(&name, v));
    let (Some(version), Some(definition)) = (version, definition) else {
        debug!("No definition for {} at version {}", name, requested);
        return Err(match (requested, latest_version) {
            (VersionRequest::Exact(v), Some(latest)) if v < latest => ResolveError::Outdated {
                name,
                version: v,
                latest,
            },
            _ => ResolveError::NotFound(format!("definition {} (version {})", name, requested)),
        });
    };

    Ok(Resolved {
        name,
        code,
        version,
        latest_version,
        definition,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::OpcodeTable;
    use protodef_registry::{Loader, LoaderOptions};
    use serde_json::json;

    fn fixture() -> (OpcodeTable, DefinitionRegistry) {
        let map = OpcodeTable::from_map_str("S_STAT 10\nC_PING 11\nS_UNUSED 12").unwrap();
        let mut bundle = protodef_registry::Bundle::default();
        bundle.insert_source("S_STAT.3.def", "byte a");
        bundle.insert_source("S_STAT.7.def", "byte a");
        bundle.insert_source("S_STAT.12.def", "byte a");
        bundle.insert_source("C_PING.1.def", "uint32 seq");

        let mut registry = DefinitionRegistry::new();
        Loader::new(LoaderOptions::default()).load_default_bundle(&mut registry, &bundle);
        (map, registry)
    }

    #[test]
    fn test_resolve_latest_by_name() {
        let (map, registry) = fixture();
        let resolved = resolve(&map, &registry, &"S_STAT".into(), VersionRequest::Latest).unwrap();

        assert_eq!(resolved.name, "S_STAT");
        assert_eq!(resolved.code, 10);
        assert_eq!(resolved.version, 12);
        assert_eq!(resolved.latest_version, Some(12));
        assert_eq!(resolved.definition.version, 12);
    }

    #[test]
    fn test_resolve_exact_by_code() {
        let (map, registry) = fixture();
        let resolved = resolve(&map, &registry, &Identifier::Code(10), VersionRequest::Exact(7)).unwrap();
        assert_eq!(resolved.name, "S_STAT");
        assert_eq!(resolved.version, 7);
        assert_eq!(resolved.latest_version, Some(12));
    }

    #[test]
    fn test_unknown_mappings() {
        let (map, registry) = fixture();
        assert!(matches!(
            resolve(&map, &registry, &"S_NOPE".into(), VersionRequest::Latest),
            Err(ResolveError::NotFound(_))
        ));
        assert!(matches!(
            resolve(&map, &registry, &Identifier::Code(999), VersionRequest::Latest),
            Err(ResolveError::NotFound(_))
        ));
    }

    #[test]
    fn test_outdated_versus_not_found() {
        let (map, registry) = fixture();
        let id: Identifier = "S_STAT".into();

        assert_eq!(
            resolve(&map, &registry, &id, VersionRequest::Exact(5)).unwrap_err(),
            ResolveError::Outdated {
                name: "S_STAT".to_string(),
                version: 5,
                latest: 12
            }
        );
        assert!(matches!(
            resolve(&map, &registry, &id, VersionRequest::Exact(13)),
            Err(ResolveError::NotFound(_))
        ));
        // Mapped name with no definitions at all
        assert!(matches!(
            resolve(&map, &registry, &"S_UNUSED".into(), VersionRequest::Latest),
            Err(ResolveError::NotFound(_))
        ));
        assert!(matches!(
            resolve(&map, &registry, &"S_UNUSED".into(), VersionRequest::Exact(1)),
            Err(ResolveError::NotFound(_))
        ));
    }

    #[test]
    fn test_identifier_conversions() {
        assert_eq!("19900".parse::<Identifier>().unwrap(), Identifier::Code(19900));
        assert_eq!(
            "S_LOGIN".parse::<Identifier>().unwrap(),
            Identifier::Name("S_LOGIN".to_string())
        );
        assert!(matches!(
            "70000".parse::<Identifier>(),
            Err(ResolveError::IdentifierType(_))
        ));
        assert!("".parse::<Identifier>().is_err());

        assert_eq!(
            Identifier::try_from(&json!("S_LOGIN")).unwrap(),
            Identifier::Name("S_LOGIN".to_string())
        );
        assert_eq!(Identifier::try_from(&json!(5)).unwrap(), Identifier::Code(5));
        for bad in [json!(true), json!(null), json!(-1), json!(1.5), json!({})] {
            assert!(matches!(
                Identifier::try_from(&bad),
                Err(ResolveError::IdentifierType(_))
            ));
        }
    }

    #[test]
    fn test_version_request_parsing() {
        assert_eq!("latest".parse::<VersionRequest>().unwrap(), VersionRequest::Latest);
        assert_eq!("*".parse::<VersionRequest>().unwrap(), VersionRequest::Latest);
        assert_eq!("4".parse::<VersionRequest>().unwrap(), VersionRequest::Exact(4));
        assert!("four".parse::<VersionRequest>().is_err());
        assert_eq!(VersionRequest::from(None), VersionRequest::Latest);
        assert_eq!(VersionRequest::from(Some(2)), VersionRequest::Exact(2));
    }
}
