//! Config file discovery and layered loading.
//!
//! Implements the `Config::load()` algorithm:
//! 1. Parse `defaults.toml` → base
//! 2. Merge `/etc/warden/config.toml` (system)
//! 3. Merge `~/.warden/config.toml` (user)
//! 4. Merge the explicitly named file, if any (must exist)
//! 5. Apply `WARDEN_*` env var fallbacks for fields no file set
//! 6. Deserialize merged tree → `Config`
//! 7. Validate

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::env::{apply_env_fallbacks, collect_env_vars};
use crate::error::{ConfigError, ConfigResult};
use crate::merge::{ConfigLayer, FieldSources, deep_merge_tracking, record_leaves};
use crate::show::ResolvedConfig;
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
pub(crate) const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// System-wide config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/warden/config.toml";

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// Load the configuration with layered file precedence.
///
/// `explicit` is a file named on the command line; unlike the system and user
/// files it must exist. `warden_home_override` replaces `~/.warden` as the
/// directory holding the user config.
///
/// # Errors
///
/// Returns a [`ConfigError`] if any config file is malformed or missing when
/// required, or if the merged configuration fails validation.
pub fn load(
    explicit: Option<&Path>,
    warden_home_override: Option<&Path>,
) -> ConfigResult<ResolvedConfig> {
    let user_dir = match warden_home_override {
        Some(dir) => dir.to_path_buf(),
        None => home_directory()?.join(".warden"),
    };
    load_layers(
        Path::new(SYSTEM_CONFIG_PATH),
        &user_dir.join("config.toml"),
        explicit,
        &collect_env_vars(),
    )
}

pub(crate) fn load_layers(
    system_path: &Path,
    user_path: &Path,
    explicit: Option<&Path>,
    env_vars: &HashMap<String, String>,
) -> ConfigResult<ResolvedConfig> {
    // 1. Embedded defaults.
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;

    let mut field_sources = FieldSources::new();
    let mut loaded_files = Vec::new();
    record_leaves(&merged, "", &ConfigLayer::Defaults, &mut field_sources);

    // 2–3. System and user files are optional.
    for (path, layer) in [
        (system_path, ConfigLayer::System),
        (user_path, ConfigLayer::User),
    ] {
        if let Some(overlay) = try_load_file(path)? {
            deep_merge_tracking(&mut merged, &overlay, "", &layer, &mut field_sources);
            loaded_files.push(path.display().to_string());
            info!(path = %path.display(), layer = %layer, "loaded config");
        }
    }

    // 4. Explicit file is required.
    if let Some(path) = explicit {
        let overlay = try_load_file(path)?.ok_or_else(|| ConfigError::ReadError {
            path: path.display().to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        })?;
        let layer = ConfigLayer::Explicit(path.display().to_string());
        deep_merge_tracking(&mut merged, &overlay, "", &layer, &mut field_sources);
        loaded_files.push(path.display().to_string());
        info!(path = %path.display(), "loaded explicit config");
    }

    // 5. Env fallbacks.
    let env_count = apply_env_fallbacks(&mut merged, &mut field_sources, env_vars);
    if env_count > 0 {
        debug!(count = env_count, "applied environment variable fallbacks");
    }

    // 6. Deserialize.
    let config: Config =
        merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError {
                path: "<merged config>".to_owned(),
                source: e,
            })?;

    // 7. Validate.
    validate::validate(&config)?;

    Ok(ResolvedConfig {
        config,
        field_sources,
        loaded_files,
    })
}

/// Load a config from a specific file path (no layering).
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
/// validation.
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    let value = try_load_file(path)?.ok_or_else(|| ConfigError::ReadError {
        path: path.display().to_string(),
        source: std::io::Error::from(std::io::ErrorKind::NotFound),
    })?;
    let config: Config = value
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::ParseError {
            path: path.display().to_string(),
            source: e,
        })?;
    validate::validate(&config)?;
    Ok(config)
}

/// Try to load a file, returning `None` if the file doesn't exist.
///
/// Reads once; no separate existence check.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.display().to_string(),
                source: e,
            });
        },
    };

    if content.len() as u64 > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {} bytes, exceeding the {MAX_CONFIG_FILE_SIZE} byte limit",
                content.len()
            ),
        });
    }

    let value: toml::Value = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(Some(value))
}

/// Determine the user's home directory.
fn home_directory() -> ConfigResult<PathBuf> {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .ok_or(ConfigError::NoHomeDir)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env() -> HashMap<String, String> {
        HashMap::new()
    }

    #[test]
    fn test_defaults_deserialize_to_config() {
        let config: Config = toml::from_str(DEFAULTS_TOML).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_layers_apply_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let system = dir.path().join("system.toml");
        let user = dir.path().join("user.toml");
        let explicit = dir.path().join("explicit.toml");
        std::fs::write(&system, "[session]\nttl_secs = 100\nclock_skew_secs = 10\n").unwrap();
        std::fs::write(&user, "[session]\nttl_secs = 200\n").unwrap();
        std::fs::write(&explicit, "[bootstrap]\nroot_role = \"Admin\"\n").unwrap();

        let resolved = load_layers(&system, &user, Some(&explicit), &no_env()).unwrap();
        assert_eq!(resolved.config.session.ttl_secs, 200);
        assert_eq!(resolved.config.session.clock_skew_secs, 10);
        assert_eq!(resolved.config.bootstrap.root_role, "Admin");
        assert_eq!(resolved.loaded_files.len(), 3);
        assert_eq!(
            resolved.field_sources.get("session.ttl_secs"),
            Some(&ConfigLayer::User)
        );
    }

    #[test]
    fn test_missing_optional_files_use_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = load_layers(
            &dir.path().join("none.toml"),
            &dir.path().join("none2.toml"),
            None,
            &no_env(),
        )
        .unwrap();
        assert_eq!(resolved.config, Config::default());
        assert!(resolved.loaded_files.is_empty());
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        let result = load_layers(&missing, &missing, Some(&missing), &no_env());
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn test_env_fallback_and_file_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let user = dir.path().join("user.toml");
        std::fs::write(&user, "[storage]\npath = \"/from/file\"\n").unwrap();
        let env: HashMap<String, String> = [
            ("WARDEN_STORAGE_PATH".to_owned(), "/from/env".to_owned()),
            ("WARDEN_SESSION_TTL_SECS".to_owned(), "60".to_owned()),
        ]
        .into_iter()
        .collect();

        let resolved = load_layers(&dir.path().join("none.toml"), &user, None, &env).unwrap();
        assert_eq!(resolved.config.storage.path.as_deref(), Some("/from/file"));
        assert_eq!(resolved.config.session.ttl_secs, 60);
    }

    #[test]
    fn test_invalid_merged_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let user = dir.path().join("user.toml");
        std::fs::write(&user, "[session]\nclock_skew_secs = 300\n").unwrap();
        let result = load_layers(&dir.path().join("none.toml"), &user, None, &no_env());
        assert!(matches!(result, Err(ConfigError::ValidationError { .. })));
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let user = dir.path().join("user.toml");
        std::fs::write(&user, "[session\nttl_secs = ").unwrap();
        let result = load_layers(&dir.path().join("none.toml"), &user, None, &no_env());
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_oversized_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("huge.toml");
        let data = "x = \"".to_owned() + &"a".repeat(1_100_000) + "\"";
        std::fs::write(&file_path, data).unwrap();

        let result = try_load_file(&file_path);
        assert!(matches!(result, Err(ConfigError::ValidationError { .. })));
    }

    #[test]
    fn test_load_file_single() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.toml");
        std::fs::write(&path, "[notify]\nenabled = false\n").unwrap();
        let config = load_file(&path).unwrap();
        assert!(!config.notify.enabled);
        assert_eq!(config.session.ttl_secs, 3600);
    }
}
