//! Tefoli Configuration
//!
//! Describes where a theory extension library lives and how it is set up:
//! - Theory configuration (tefoli.toml)
//! - Global user configuration (~/.tefoli/config.toml)
//! - Environment overrides (TEFOLI_*)
//!
//! # Configuration Hierarchy
//!
//! Later sources override earlier ones:
//! 1. Global config (~/.tefoli/config.toml)
//! 2. Theory config (./tefoli.toml, searched upwards)
//! 3. Environment variables (TEFOLI_LIBRARY, TEFOLI_PREFIX, TEFOLI_LIBRARY_PATH)
//! 4. Explicit arguments (handled by caller)
//!
//! # Example
//!
//! ```no_run
//! use tefoli_config::ConfigLoader;
//! use std::path::Path;
//!
//! let mut loader = ConfigLoader::new();
//! let config = loader.load_from_directory(Path::new(".")).unwrap();
//! println!("{}", config.library_name().unwrap());
//! ```

pub mod global;
pub mod loader;
pub mod theory;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Missing required field '{field}'")]
    MissingField { field: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Home directory not found")]
    HomeNotFound,
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// File name of the per-theory configuration
pub const CONFIG_FILE_NAME: &str = "tefoli.toml";

// Re-export main types
pub use global::GlobalConfig;
pub use loader::{Config, ConfigLoader};
pub use theory::{HostConfig, LibraryConfig, OptionValue, TheoryConfig};
