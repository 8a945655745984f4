//! Client platform variants.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Target client variant; some messages use a distinct layout per platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Desktop client
    #[default]
    Pc,
    /// Console client
    Console,
    /// Classic client
    Classic,
}

/// Platform errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// Tag is not one of the supported platforms
    #[error("invalid platform: {0}")]
    Invalid(String),
}

impl Platform {
    /// All supported platforms
    pub const ALL: [Platform; 3] = [Platform::Pc, Platform::Console, Platform::Classic];

    /// Tag used in definition file names
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Pc => "pc",
            Platform::Console => "console",
            Platform::Classic => "classic",
        }
    }

    /// Whether a file name platform tag selects this platform
    pub fn matches(&self, tag: &str) -> bool {
        self.as_str() == tag
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = PlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| PlatformError::Invalid(s.to_string()))
    }
}
