//! Configuration module for the Courier runtime.
//!
//! Configuration is layered with figment: built-in defaults, then a whole
//! programmatic [`CourierConfig`] passed to [`ConfigLoader::merge`], then
//! `courier.toml` (or YAML with the `yaml-config` feature), then `COURIER_*`
//! environment variables, then single keys pinned with [`ConfigLoader::set`].

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    CourierConfig, InterceptorConfig, LogFormat, LogLevel, LogOutput, LoggingConfig,
    LoggingInterceptorConfig, SpanEventConfig,
};
pub use validation::validate_config;
