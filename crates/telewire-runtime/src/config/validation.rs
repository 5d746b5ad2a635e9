//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{ApiConfig, LogOutput, LoggingConfig, PollingConfig, TelewireConfig};

/// Largest batch the Bot API hands out per `getUpdates`.
const MAX_FETCH_LIMIT: u32 = 100;

/// Validates the entire configuration.
pub fn validate_config(config: &TelewireConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    validate_api_config(&config.api)?;
    validate_polling_config(&config.polling)?;
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::validation(
            "logging.file_path is required when logging.output is 'file'",
        ));
    }
    Ok(())
}

fn validate_api_config(api: &ApiConfig) -> ConfigResult<()> {
    validate_url(&api.base_url)?;

    if api.request_timeout_ms == 0 {
        return Err(ConfigError::validation(
            "api.request_timeout_ms must be greater than 0",
        ));
    }

    Ok(())
}

fn validate_polling_config(polling: &PollingConfig) -> ConfigResult<()> {
    if polling.interval_ms == 0 {
        return Err(ConfigError::validation(
            "polling.interval_ms must be greater than 0",
        ));
    }

    if polling.fetch_timeout_ms == 0 {
        return Err(ConfigError::validation(
            "polling.fetch_timeout_ms must be greater than 0",
        ));
    }

    // The server holds a long poll open for this long; the client must wait longer.
    if polling.long_poll_secs.saturating_mul(1000) >= polling.fetch_timeout_ms {
        return Err(ConfigError::validation(format!(
            "polling.long_poll_secs ({}s) must be shorter than polling.fetch_timeout_ms ({}ms)",
            polling.long_poll_secs, polling.fetch_timeout_ms
        )));
    }

    if let Some(limit) = polling.limit
        && !(1..=MAX_FETCH_LIMIT).contains(&limit)
    {
        return Err(ConfigError::validation(format!(
            "polling.limit must be between 1 and {MAX_FETCH_LIMIT}, got {limit}"
        )));
    }

    Ok(())
}

fn validate_url(url: &str) -> ConfigResult<()> {
    if url.is_empty() {
        return Err(ConfigError::invalid_url(url, "URL must not be empty"));
    }

    let valid_schemes = ["http://", "https://"];
    if !valid_schemes.iter().any(|s| url.starts_with(s)) {
        return Err(ConfigError::invalid_url(
            url,
            format!("URL must start with one of: {valid_schemes:?}"),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&TelewireConfig::default()).is_ok());
    }

    #[test]
    fn test_validate_bad_base_url() {
        let mut config = TelewireConfig::default();
        config.api.base_url = "ftp://api.telegram.org".to_string();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_validate_zero_interval() {
        let mut config = TelewireConfig::default();
        config.polling.interval_ms = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_long_poll_exceeds_fetch_timeout() {
        let mut config = TelewireConfig::default();
        config.polling.long_poll_secs = 60;
        config.polling.fetch_timeout_ms = 60000;
        assert!(validate_config(&config).is_err());

        config.polling.long_poll_secs = 50;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_limit_range() {
        let mut config = TelewireConfig::default();
        config.polling.limit = Some(0);
        assert!(validate_config(&config).is_err());
        config.polling.limit = Some(101);
        assert!(validate_config(&config).is_err());
        config.polling.limit = Some(100);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_file_output_needs_path() {
        let mut config = TelewireConfig::default();
        config.logging.output = LogOutput::File;
        assert!(validate_config(&config).is_err());
    }
}
