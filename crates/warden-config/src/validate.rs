//! Post-merge configuration validation.
//!
//! Validates that deserialized [`Config`](crate::Config) values are within
//! acceptable ranges and that cross-field invariants hold.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Upper bound on the clock skew grace period.
pub const MAX_CLOCK_SKEW_SECS: u64 = 60;

/// Upper bound on a notification delivery timeout.
const MAX_NOTIFY_TIMEOUT_SECS: u64 = 60;

/// Smallest secret length an operator may configure.
const MIN_PASSWORD_LENGTH_FLOOR: usize = 8;

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_owned(),
        message: message.into(),
    }
}

/// Validate a fully-merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_session(config)?;
    validate_password(config)?;
    validate_roles(config)?;
    validate_notify(config)?;
    validate_logging(config)?;
    Ok(())
}

fn validate_session(config: &Config) -> ConfigResult<()> {
    let s = &config.session;
    if s.ttl_secs == 0 {
        return Err(invalid("session.ttl_secs", "ttl_secs must be positive"));
    }
    if s.clock_skew_secs > MAX_CLOCK_SKEW_SECS {
        return Err(invalid(
            "session.clock_skew_secs",
            format!("clock_skew_secs must be at most {MAX_CLOCK_SKEW_SECS}"),
        ));
    }
    Ok(())
}

fn validate_password(config: &Config) -> ConfigResult<()> {
    let p = &config.password;
    if p.iterations == 0 {
        return Err(invalid("password.iterations", "iterations must be positive"));
    }
    if p.parallelism == 0 {
        return Err(invalid("password.parallelism", "parallelism must be positive"));
    }
    if u64::from(p.memory_kib) < u64::from(p.parallelism).saturating_mul(8) {
        return Err(invalid(
            "password.memory_kib",
            "memory_kib must be at least 8 times parallelism",
        ));
    }
    if p.min_length < MIN_PASSWORD_LENGTH_FLOOR {
        return Err(invalid(
            "password.min_length",
            format!("min_length must be at least {MIN_PASSWORD_LENGTH_FLOOR}"),
        ));
    }
    Ok(())
}

fn validate_roles(config: &Config) -> ConfigResult<()> {
    if config.registration.default_role.trim().is_empty() {
        return Err(invalid(
            "registration.default_role",
            "default_role must not be empty",
        ));
    }
    let b = &config.bootstrap;
    if b.root_role.trim().is_empty() {
        return Err(invalid("bootstrap.root_role", "root_role must not be empty"));
    }
    if b.root_role.eq_ignore_ascii_case(&config.registration.default_role) {
        return Err(invalid(
            "bootstrap.root_role",
            "root_role must differ from registration.default_role",
        ));
    }
    if b.root_rank == 0 {
        return Err(invalid(
            "bootstrap.root_rank",
            "root_rank must be above the default role's rank 0",
        ));
    }
    Ok(())
}

fn validate_notify(config: &Config) -> ConfigResult<()> {
    let n = &config.notify;
    if n.timeout_secs == 0 || n.timeout_secs > MAX_NOTIFY_TIMEOUT_SECS {
        return Err(invalid(
            "notify.timeout_secs",
            format!("timeout_secs must be between 1 and {MAX_NOTIFY_TIMEOUT_SECS}"),
        ));
    }
    if !n.allowed_url_pattern.starts_with("^https://") {
        return Err(invalid(
            "notify.allowed_url_pattern",
            "pattern must be anchored and require https (start with '^https://')",
        ));
    }
    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let l = &config.logging;
    if !matches!(
        l.level.as_str(),
        "error" | "warn" | "info" | "debug" | "trace"
    ) {
        return Err(invalid(
            "logging.level",
            format!(
                "unsupported level '{}'; expected one of: error, warn, info, debug, trace",
                l.level
            ),
        ));
    }
    if !matches!(l.format.as_str(), "pretty" | "compact" | "json" | "full") {
        return Err(invalid(
            "logging.format",
            format!(
                "unsupported format '{}'; expected one of: pretty, compact, json, full",
                l.format
            ),
        ));
    }
    match l.target.as_str() {
        "stderr" | "stdout" => Ok(()),
        "file" if l.directory.is_some() => Ok(()),
        "file" => Err(invalid(
            "logging.directory",
            "directory is required when target is 'file'",
        )),
        other => Err(invalid(
            "logging.target",
            format!("unsupported target '{other}'; expected one of: stderr, stdout, file"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(result: ConfigResult<()>) -> String {
        match result {
            Err(ConfigError::ValidationError { field, .. }) => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_default_config_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_clock_skew_capped() {
        let mut config = Config::default();
        config.session.clock_skew_secs = 60;
        assert!(validate(&config).is_ok());
        config.session.clock_skew_secs = 61;
        assert_eq!(field_of(validate(&config)), "session.clock_skew_secs");
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let mut config = Config::default();
        config.session.ttl_secs = 0;
        assert_eq!(field_of(validate(&config)), "session.ttl_secs");
    }

    #[test]
    fn test_password_params() {
        let mut config = Config::default();
        config.password.min_length = 4;
        assert_eq!(field_of(validate(&config)), "password.min_length");

        let mut config = Config::default();
        config.password.parallelism = 4;
        config.password.memory_kib = 16;
        assert_eq!(field_of(validate(&config)), "password.memory_kib");
    }

    #[test]
    fn test_role_names() {
        let mut config = Config::default();
        config.bootstrap.root_role = "user".into();
        assert_eq!(field_of(validate(&config)), "bootstrap.root_role");

        let mut config = Config::default();
        config.bootstrap.root_rank = 0;
        assert_eq!(field_of(validate(&config)), "bootstrap.root_rank");
    }

    #[test]
    fn test_notify_pattern_must_require_https() {
        let mut config = Config::default();
        config.notify.allowed_url_pattern = ".*".into();
        assert_eq!(field_of(validate(&config)), "notify.allowed_url_pattern");
    }

    #[test]
    fn test_file_logging_needs_directory() {
        let mut config = Config::default();
        config.logging.target = "file".into();
        assert_eq!(field_of(validate(&config)), "logging.directory");
        config.logging.directory = Some("/var/log/warden".into());
        assert!(validate(&config).is_ok());
    }
}
