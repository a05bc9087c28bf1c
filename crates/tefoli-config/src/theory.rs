//! Theory Configuration (tefoli.toml)
//!
//! Names the extension library, the prefix of its exported functions and the
//! key/value options handed to the theory before it is registered.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Theory configuration from tefoli.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct TheoryConfig {
    /// Extension library location
    #[serde(default)]
    pub library: LibraryConfig,

    /// Host engine settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<HostConfig>,

    /// Options passed to the theory via `configure`, in key order
    #[serde(default)]
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, OptionValue>,
}

/// Extension library section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct LibraryConfig {
    /// Library name (e.g. "clingolpx") or path to the shared object
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Prefix of the exported functions (`<prefix>_create`, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,

    /// Extra directories searched before the platform defaults
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub search_paths: Vec<PathBuf>,
}

/// Host engine section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct HostConfig {
    /// Library exporting the host's error channel (default: "clingo")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library: Option<String>,
}

/// Option value; scalars are accepted and handed over in their textual form
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum OptionValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Flag(bool),
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Text(s) => write!(f, "{}", s),
            OptionValue::Integer(n) => write!(f, "{}", n),
            OptionValue::Float(x) => write!(f, "{}", x),
            OptionValue::Flag(b) => write!(f, "{}", b),
        }
    }
}

impl TheoryConfig {
    /// Load theory configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the theory configuration
    ///
    /// Missing fields are fine here; they may still come from the environment.
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(name) = &self.library.name {
            if name.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "library.name".to_string(),
                    reason: "name cannot be empty".to_string(),
                });
            }
        }

        if let Some(prefix) = &self.library.prefix {
            validate_prefix(prefix)?;
        }

        if let Some(host) = &self.host {
            if host.library.as_deref().is_some_and(|l| l.trim().is_empty()) {
                return Err(ConfigError::InvalidValue {
                    field: "host.library".to_string(),
                    reason: "library cannot be empty".to_string(),
                });
            }
        }

        for key in self.options.keys() {
            if key.is_empty() || key.contains('\0') {
                return Err(ConfigError::InvalidValue {
                    field: format!("options.{}", key),
                    reason: "option keys must be non-empty and free of NUL bytes".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Options rendered as the strings passed to `configure`
    pub fn option_pairs(&self) -> Vec<(String, String)> {
        self.options
            .iter()
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect()
    }

    /// Merge another theory config into this one
    /// Other config takes precedence for non-None values
    pub fn merge(&mut self, other: &TheoryConfig) {
        if other.library.name.is_some() {
            self.library.name = other.library.name.clone();
        }
        if other.library.prefix.is_some() {
            self.library.prefix = other.library.prefix.clone();
        }
        if !other.library.search_paths.is_empty() {
            let mut paths = other.library.search_paths.clone();
            paths.extend(self.library.search_paths.drain(..));
            self.library.search_paths = paths;
        }
        if other.host.is_some() {
            self.host = other.host.clone();
        }
        self.options.extend(other.options.clone());
    }
}

/// Check that a prefix can form C symbol names `<prefix>_<operation>`
pub(crate) fn validate_prefix(prefix: &str) -> ConfigResult<()> {
    let mut chars = prefix.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field: "library.prefix".to_string(),
            reason: format!("'{}' is not a valid C identifier", prefix),
        })
    }
}
