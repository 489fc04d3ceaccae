//! Layered configuration loading with figment.
//!
//! Sources, lowest precedence first:
//!
//! 1. Built-in defaults
//! 2. Programmatic overrides passed to [`ConfigLoader::merge`]
//! 3. Profile-specific file (`courier.{profile}.toml`)
//! 4. Main file (`courier.toml`, or `config.toml`)
//! 5. `COURIER_*` environment variables
//! 6. Single values pinned with [`ConfigLoader::set`]
//!
//! [`ConfigLoader::merge`] takes a whole [`CourierConfig`], so every field
//! carries a value; it sits low so that files and the environment can still
//! refine it. [`ConfigLoader::set`] pins one key above everything else.
//!
//! YAML files (`courier.yaml`, `courier.yml`, ...) are searched as well when the
//! `yaml-config` feature is enabled.
//!
//! Environment variables use `__` as the nesting separator:
//!
//! - `COURIER_LOGGING__LEVEL=debug` sets `logging.level`
//! - `COURIER_INTERCEPTORS__LOGGING__ENABLED=false` sets
//!   `interceptors.logging.enabled`
//!
//! ```rust,ignore
//! use courier_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .file("./config/courier.toml")
//!     .load()?;
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use serde::Serialize;
use tracing::{debug, info, trace};

use super::error::{ConfigError, ConfigResult};
use super::schema::CourierConfig;
use super::validation::validate_config;

const ENV_PREFIX: &str = "COURIER_";
const PROFILE_VAR: &str = "COURIER_PROFILE";
const CONFIG_DIR_NAME: &str = "courier";

#[cfg(feature = "toml-config")]
const TOML_NAMES: &[&str] = &["courier.toml", "config.toml"];
#[cfg(feature = "yaml-config")]
const YAML_NAMES: &[&str] = &["courier.yaml", "courier.yml", "config.yaml", "config.yml"];

/// Configuration profile selecting `courier.{profile}.*` overlay files.
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

    /// Parses a profile name, accepting the `dev` and `prod` shorthands.
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Reads `COURIER_PROFILE`, defaulting to [`Profile::Development`].
    pub fn from_env() -> Self {
        std::env::var(PROFILE_VAR)
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builder over the configuration sources.
pub struct ConfigLoader {
    overrides: Figment,
    pinned: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    load_env: bool,
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
            overrides: Figment::new(),
            pinned: Figment::new(),
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

    /// Adds a directory to search. Without any, the current directory and
    /// the user config directory (`~/.config/courier`) are searched.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Loads exactly this file instead of searching.
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

    /// Layers `config` above the built-in defaults.
    pub fn merge(mut self, config: CourierConfig) -> Self {
        self.overrides = self.overrides.merge(Serialized::defaults(config));
        self
    }

    /// Pins `key` (a dotted path such as `logging.level`) to `value`,
    /// above files and environment variables.
    pub fn set<T: Serialize>(mut self, key: &str, value: T) -> Self {
        self.pinned = self.pinned.merge(Serialized::default(key, value));
        self
    }

    /// Extracts and validates the configuration.
    pub fn load(self) -> ConfigResult<CourierConfig> {
        let profile = self.profile.clone();
        let figment = self.build_figment()?;

        let config: CourierConfig = figment.extract().map_err(|e| {
            ConfigError::ParseError(format!("Failed to extract configuration: {e}"))
        })?;
        validate_config(&config)?;

        debug!(
            profile = %profile,
            logging_level = %config.logging.level,
            logging_interceptor = config.interceptors.logging.enabled,
            "Configuration loaded"
        );

        Ok(config)
    }

    fn build_figment(mut self) -> ConfigResult<Figment> {
        let overrides = std::mem::take(&mut self.overrides);
        let mut figment = Figment::from(Serialized::defaults(CourierConfig::default())).merge(overrides);

        figment = match self.config_file.take() {
            Some(path) if path.exists() => {
                info!(path = %path.display(), "Loading configuration file");
                Self::merge_file(figment, &path)?
            }
            Some(path) => return Err(ConfigError::FileNotFound(path)),
            None => self.search_files(figment),
        };

        if self.load_env {
            trace!(prefix = ENV_PREFIX, "Loading environment variables");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }

        Ok(figment.merge(std::mem::take(&mut self.pinned)))
    }

    fn merge_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            #[cfg(feature = "toml-config")]
            "toml" => Ok(figment.merge(Toml::file(path))),
            #[cfg(feature = "yaml-config")]
            "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
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
            paths.push(config_dir.join(CONFIG_DIR_NAME));
        }
        paths
    }

    /// Merges the first base file found for one format, preceded by its
    /// profile overlay. Returns whether a base file was found.
    #[cfg(any(feature = "toml-config", feature = "yaml-config"))]
    fn search_format<F>(
        &self,
        figment: &mut Figment,
        search_paths: &[PathBuf],
        names: &[&str],
        merge: F,
    ) -> bool
    where
        F: Fn(Figment, &Path) -> Figment,
    {
        for dir in search_paths {
            for name in names {
                let Some((stem, ext)) = name.rsplit_once('.') else {
                    continue;
                };

                let overlay = dir.join(format!("{stem}.{}.{ext}", self.profile));
                if overlay.exists() {
                    debug!(path = %overlay.display(), "Loading profile configuration");
                    *figment = merge(std::mem::take(figment), &overlay);
                }

                let base = dir.join(name);
                if base.exists() {
                    info!(path = %base.display(), "Loading configuration file");
                    *figment = merge(std::mem::take(figment), &base);
                    return true;
                }
            }
        }
        false
    }

    fn search_files(&self, mut figment: Figment) -> Figment {
        let search_paths = self.resolve_search_paths();
        let mut found = false;

        #[cfg(feature = "toml-config")]
        {
            found |= self.search_format(&mut figment, &search_paths, TOML_NAMES, |f, p| {
                f.merge(Toml::file(p))
            });
        }

        #[cfg(feature = "yaml-config")]
        {
            found |= self.search_format(&mut figment, &search_paths, YAML_NAMES, |f, p| {
                f.merge(Yaml::file(p))
            });
        }

        if !found {
            debug!("No configuration file found, using defaults");
        }
        figment
    }
}

/// Loads the configuration from the default locations.
pub fn load_config() -> ConfigResult<CourierConfig> {
    ConfigLoader::new().load()
}

/// Loads the configuration from `path`, still honouring `COURIER_*` variables.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<CourierConfig> {
    ConfigLoader::new().file(path).load()
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;
    use crate::config::{LogFormat, LogLevel, LogOutput};

    #[test]
    fn test_defaults_without_sources() {
        Jail::expect_with(|jail| {
            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .load()
                .unwrap();
            assert_eq!(config.logging.level, LogLevel::Info);
            assert!(config.interceptors.logging.enabled);
            Ok(())
        });
    }

    #[test]
    fn test_file_then_env_precedence() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "courier.toml",
                r#"
                [logging]
                level = "debug"
                format = "pretty"

                [interceptors.logging]
                logger = "orders"
                "#,
            )?;
            jail.set_env("COURIER_LOGGING__LEVEL", "warn");

            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .load()
                .unwrap();
            assert_eq!(config.logging.level, LogLevel::Warn);
            assert_eq!(config.logging.format, LogFormat::Pretty);
            assert_eq!(config.interceptors.logging.logger, "orders");
            Ok(())
        });
    }

    #[test]
    fn test_profile_overlay_is_overridden_by_base_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "courier.production.toml",
                r#"
                [logging]
                level = "error"
                thread_ids = true
                "#,
            )?;
            jail.create_file("courier.toml", "[logging]\nlevel = \"info\"\n")?;

            let config = ConfigLoader::new()
                .profile("prod")
                .search_path(jail.directory())
                .without_env()
                .load()
                .unwrap();
            assert_eq!(config.logging.level, LogLevel::Info);
            assert!(config.logging.thread_ids);
            Ok(())
        });
    }

    #[test]
    fn test_explicit_file_errors() {
        Jail::expect_with(|jail| {
            let missing = ConfigLoader::new().file("absent.toml").without_env().load();
            assert!(matches!(missing, Err(ConfigError::FileNotFound(_))));

            jail.create_file("courier.ini", "level=debug")?;
            let unsupported = ConfigLoader::new().file("courier.ini").without_env().load();
            assert!(matches!(unsupported, Err(ConfigError::UnsupportedFormat(_))));
            Ok(())
        });
    }

    #[test]
    fn test_invalid_configuration_is_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("courier.toml", "[logging]\noutput = \"file\"\n")?;
            let result = load_config_from_file("courier.toml");
            assert!(matches!(result, Err(ConfigError::MissingField { .. })));

            jail.create_file(
                "courier.toml",
                "[logging]\noutput = \"file\"\nfile_path = \"courier.log\"\n",
            )?;
            let config = load_config_from_file("courier.toml").unwrap();
            assert_eq!(config.logging.output, LogOutput::File);
            Ok(())
        });
    }

    #[test]
    fn test_programmatic_overrides_sit_below_env() {
        Jail::expect_with(|jail| {
            jail.set_env("COURIER_INTERCEPTORS__LOGGING__ENABLED", "false");
            let mut overrides = CourierConfig::default();
            overrides.logging.level = LogLevel::Trace;

            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .merge(overrides)
                .load()
                .unwrap();
            assert_eq!(config.logging.level, LogLevel::Trace);
            assert!(!config.interceptors.logging.enabled);
            Ok(())
        });
    }

    #[test]
    fn test_pinned_values_win_over_file_and_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "courier.toml",
                r#"
                [logging]
                level = "debug"
                thread_ids = true
                "#,
            )?;
            jail.set_env("COURIER_LOGGING__LEVEL", "warn");

            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .set("logging.level", LogLevel::Trace)
                .load()
                .unwrap();
            assert_eq!(config.logging.level, LogLevel::Trace);
            assert!(config.logging.thread_ids, "unpinned keys still come from the file");
            Ok(())
        });
    }

    #[test]
    fn test_profile_from_env() {
        Jail::expect_with(|jail| {
            jail.set_env("COURIER_PROFILE", "Staging");
            assert_eq!(Profile::from_env(), Profile::Custom("staging".into()));
            jail.set_env("COURIER_PROFILE", "prod");
            assert_eq!(Profile::from_env(), Profile::Production);
            Ok(())
        });
    }
}
