//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{CourierConfig, InterceptorConfig, LogFormat, LogOutput, LoggingConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &CourierConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    validate_interceptor_config(&config.interceptors)?;
    Ok(())
}

/// Validates the tracing subscriber settings.
fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }

    if logging.format == LogFormat::Json && !cfg!(feature = "json-log") {
        return Err(ConfigError::validation(
            "JSON log format requires the `json-log` feature",
        ));
    }

    for target in logging.filters.keys() {
        if target.is_empty() || target.contains(['=', ',', ' ']) {
            return Err(ConfigError::validation(format!(
                "Invalid log filter target: '{target}'"
            )));
        }
    }

    Ok(())
}

/// Validates the interceptor settings.
fn validate_interceptor_config(interceptors: &InterceptorConfig) -> ConfigResult<()> {
    let logging = &interceptors.logging;
    if logging.enabled && logging.logger.trim().is_empty() {
        return Err(ConfigError::missing_field("interceptors.logging.logger"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&CourierConfig::default()).is_ok());
    }

    #[test]
    fn test_file_output_requires_path() {
        let mut config = CourierConfig::default();
        config.logging.output = LogOutput::File;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { .. })
        ));

        config.logging.file_path = Some(PathBuf::from("logs/courier.log"));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_filter_targets_are_checked() {
        let mut config = CourierConfig::default();
        config
            .logging
            .filters
            .insert("courier_framework".into(), LogLevel::Debug);
        assert!(validate_config(&config).is_ok());

        config.logging.filters.insert("bad=target".into(), LogLevel::Warn);
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_enabled_logging_interceptor_needs_a_logger() {
        let mut config = CourierConfig::default();
        config.interceptors.logging.logger = "  ".into();
        assert!(validate_config(&config).is_err());

        config.interceptors.logging.enabled = false;
        assert!(validate_config(&config).is_ok());
    }
}
