//! Configuration validation.
//!
//! Returns every problem found, not just the first.

use thiserror::Error;

use crate::config::schema::RuntimeConfig;

/// Longest shutdown deadline accepted from configuration.
pub const MAX_SHUTDOWN_DEADLINE_MS: u64 = 60 * 60 * 1000;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("shutdown.deadline_ms {0} exceeds maximum of {max}", max = MAX_SHUTDOWN_DEADLINE_MS)]
    DeadlineTooLong(u64),

    #[error("observability.log_level {0:?} is not one of trace, debug, info, warn, error")]
    UnknownLogLevel(String),
}

/// Check semantic constraints that serde cannot express.
pub fn validate_config(config: &RuntimeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.shutdown.deadline_ms > MAX_SHUTDOWN_DEADLINE_MS {
        errors.push(ValidationError::DeadlineTooLong(config.shutdown.deadline_ms));
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::UnknownLogLevel(
            config.observability.log_level.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&RuntimeConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = RuntimeConfig::default();
        config.shutdown.deadline_ms = MAX_SHUTDOWN_DEADLINE_MS + 1;
        config.observability.log_level = "loud".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[1], ValidationError::UnknownLogLevel("loud".into()));
    }

    #[test]
    fn test_log_level_is_case_insensitive() {
        let mut config = RuntimeConfig::default();
        config.observability.log_level = "DEBUG".into();
        assert!(validate_config(&config).is_ok());
    }
}
