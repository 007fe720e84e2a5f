//! Configuration loader using figment.
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Profile-specific config file (`ibex.{profile}.toml`)
//! 3. Main config file (`ibex.toml`, then `config.toml`), or an explicit file
//! 4. Environment variables (`IBEX_*`)
//! 5. Programmatic values ([`ConfigLoader::merge`], [`ConfigLoader::set`])
//! 6. Run-time [`Overrides`]
//!
//! # Environment Variable Mapping
//!
//! Environment variables use the `IBEX_` prefix with `__` as separator:
//!
//! - `IBEX_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//! - `IBEX_DISPATCHER__HANDLER_TIMEOUT_SECS=30` → `dispatcher.handler_timeout_secs = 30`
//! - `IBEX_SOURCES__LIBERA__NICK=ibex` → `sources.libera.nick = "ibex"`
//!
//! # Example
//!
//! ```rust,ignore
//! use ibex_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .file("./config/ibex.toml")
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::overrides::Overrides;
use super::schema::IbexConfig;
use super::validation::validate_config;

const BASE_NAMES: &[&str] = &["ibex.toml", "config.toml"];

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Reads `IBEX_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        std::env::var("IBEX_PROFILE")
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Layered configuration loader.
///
/// The loader is kept by the running application and replayed on every
/// configuration reload, so files and environment are read afresh each time.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Programmatic values, merged after the environment.
    figment: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    /// Specific config file to load (overrides search).
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            figment: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a search path for configuration files.
    ///
    /// Without any, the current directory and the user configuration
    /// directory (`~/.config/ibex` on Linux) are searched.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Sets a specific configuration file to load.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges a whole configuration over the file and environment layers.
    pub fn merge(mut self, config: IbexConfig) -> Self {
        self.figment = self.figment.merge(Serialized::defaults(config));
        self
    }

    /// Sets a single dotted key over the file and environment layers.
    pub fn set<T: Serialize>(mut self, key: &str, value: T) -> Self {
        self.figment = self.figment.merge(Serialized::default(key, value));
        self
    }

    /// Loads and validates the configuration.
    pub fn load(&self) -> ConfigResult<IbexConfig> {
        self.load_with(&Overrides::default())
    }

    /// Loads the configuration with `overrides` applied last.
    pub fn load_with(&self, overrides: &Overrides) -> ConfigResult<IbexConfig> {
        let figment = overrides.apply(self.build_figment()?);
        let config: IbexConfig = figment.extract()?;
        validate_config(&config)?;

        debug!(
            profile = %self.profile,
            logging_level = %config.logging.level,
            overrides = overrides.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    fn build_figment(&self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(IbexConfig::default()));

        if let Some(path) = &self.config_file {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = Self::merge_config_file(figment, path)?;
        } else {
            figment = self.load_config_files(figment);
        }

        if self.load_env {
            trace!("Loading environment variables with IBEX_ prefix");
            figment = figment.merge(Env::prefixed("IBEX_").ignore(&["profile"]).split("__"));
        }

        Ok(figment.merge(self.figment.clone()))
    }

    fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            "toml" => Ok(figment.merge(Toml::file(path))),
            _ => Err(ConfigError::UnsupportedFormat(ext.to_string())),
        }
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("ibex"));
        }
        paths
    }

    /// Tries `search_paths × BASE_NAMES`; the profile variant of a base file
    /// is merged before the base file itself. Stops at the first base file.
    fn load_config_files(&self, mut figment: Figment) -> Figment {
        for search_path in self.resolve_search_paths() {
            for base_name in BASE_NAMES {
                let Some((stem, ext)) = base_name.rsplit_once('.') else {
                    continue;
                };

                let profile_path = search_path.join(format!("{stem}.{}.{ext}", self.profile));
                if profile_path.exists() {
                    debug!(path = %profile_path.display(), "Loading profile-specific config");
                    figment = figment.merge(Toml::file(&profile_path));
                }

                let base_path = search_path.join(base_name);
                if base_path.exists() {
                    info!(path = %base_path.display(), "Loading configuration file");
                    return figment.merge(Toml::file(&base_path));
                }
            }
        }
        warn!("No configuration file found, using defaults");
        figment
    }
}
