//! Configuration Loader
//!
//! Loads configuration from multiple sources and merges them with proper precedence.

use crate::global::GlobalConfig;
use crate::theory::{validate_prefix, TheoryConfig};
use crate::{ConfigError, ConfigResult, CONFIG_FILE_NAME};
use std::env;
use std::path::{Path, PathBuf};

/// Host library used when nothing else is configured
pub const DEFAULT_HOST_LIBRARY: &str = "clingo";

/// Configuration loader
///
/// Precedence, lowest first:
/// 1. Global config (~/.tefoli/config.toml)
/// 2. Theory config (./tefoli.toml)
/// 3. Environment variables (TEFOLI_*)
pub struct ConfigLoader {
    /// Cached global config path
    global_config_path: Option<PathBuf>,
}

/// Merged configuration result
#[derive(Debug, Clone)]
pub struct Config {
    /// Theory configuration (with environment overrides applied)
    pub theory: TheoryConfig,

    /// Global configuration
    pub global: GlobalConfig,

    /// Directory where tefoli.toml was found
    pub config_root: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            global_config_path: None,
        }
    }

    /// Use an explicit global config file instead of ~/.tefoli/config.toml
    pub fn with_global_config_path(path: PathBuf) -> Self {
        Self {
            global_config_path: Some(path),
        }
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find tefoli.toml. A missing file is not an
    /// error; the environment may still name the library.
    pub fn load_from_directory(&mut self, start_dir: &Path) -> ConfigResult<Config> {
        let (config_root, theory) = self.find_theory_config(start_dir)?;
        let global = self.load_global_config()?;
        let theory = self.apply_env_overrides(theory)?;

        Ok(Config {
            theory,
            global,
            config_root,
        })
    }

    /// Load configuration from a specific tefoli.toml
    pub fn load_from_file(&mut self, config_path: &Path) -> ConfigResult<Config> {
        let theory = TheoryConfig::load_from_file(config_path)?;
        let global = self.load_global_config()?;
        let theory = self.apply_env_overrides(theory)?;

        Ok(Config {
            theory,
            global,
            config_root: config_path.parent().map(|p| p.to_path_buf()),
        })
    }

    fn find_theory_config(
        &self,
        start_dir: &Path,
    ) -> ConfigResult<(Option<PathBuf>, TheoryConfig)> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);

            if config_path.exists() {
                let config = TheoryConfig::load_from_file(&config_path)?;
                return Ok((Some(current), config));
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok((None, TheoryConfig::default())),
            }
        }
    }

    /// Load the global config; absent file (or home) yields the default
    fn load_global_config(&mut self) -> ConfigResult<GlobalConfig> {
        if self.global_config_path.is_none() {
            match GlobalConfig::global_config_path() {
                Ok(path) => self.global_config_path = Some(path),
                Err(ConfigError::HomeNotFound) => return Ok(GlobalConfig::default()),
                Err(e) => return Err(e),
            }
        }

        match &self.global_config_path {
            Some(path) if path.exists() => GlobalConfig::load_from_file(path),
            _ => Ok(GlobalConfig::default()),
        }
    }

    /// Apply TEFOLI_LIBRARY, TEFOLI_PREFIX and TEFOLI_LIBRARY_PATH
    fn apply_env_overrides(&self, mut config: TheoryConfig) -> ConfigResult<TheoryConfig> {
        if let Ok(name) = env::var("TEFOLI_LIBRARY") {
            if name.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "TEFOLI_LIBRARY".to_string(),
                    reason: "name cannot be empty".to_string(),
                });
            }
            config.library.name = Some(name);
        }

        if let Ok(prefix) = env::var("TEFOLI_PREFIX") {
            validate_prefix(&prefix)?;
            config.library.prefix = Some(prefix);
        }

        if let Some(paths) = env::var_os("TEFOLI_LIBRARY_PATH") {
            let mut search_paths: Vec<PathBuf> = env::split_paths(&paths)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
            search_paths.append(&mut config.library.search_paths);
            config.library.search_paths = search_paths;
        }

        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Library to load
    pub fn library_name(&self) -> ConfigResult<&str> {
        self.theory
            .library
            .name
            .as_deref()
            .ok_or_else(|| ConfigError::MissingField {
                field: "library.name".to_string(),
            })
    }

    /// Prefix of the exported functions
    pub fn prefix(&self) -> ConfigResult<&str> {
        self.theory
            .library
            .prefix
            .as_deref()
            .ok_or_else(|| ConfigError::MissingField {
                field: "library.prefix".to_string(),
            })
    }

    /// Library search directories: theory paths (relative ones resolved against
    /// the config root) followed by the global ones
    pub fn search_paths(&self) -> Vec<PathBuf> {
        let theory_paths = self.theory.library.search_paths.iter().map(|p| {
            match (&self.config_root, p.is_relative()) {
                (Some(root), true) => root.join(p),
                _ => p.clone(),
            }
        });

        theory_paths
            .chain(self.global.search_paths.iter().cloned())
            .collect()
    }

    /// Library exporting the host's error channel
    pub fn host_library(&self) -> &str {
        self.theory
            .host
            .as_ref()
            .and_then(|h| h.library.as_deref())
            .or_else(|| self.global.host_library())
            .unwrap_or(DEFAULT_HOST_LIBRARY)
    }

    /// Options handed to `configure`, in key order
    pub fn options(&self) -> Vec<(String, String)> {
        self.theory.option_pairs()
    }

    /// Check if a tefoli.toml was found
    pub fn has_config_file(&self) -> bool {
        self.config_root.is_some()
    }
}
