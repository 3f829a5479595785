//! `WARDEN_*` environment variable fallbacks.
//!
//! Environment variables are a fallback, not an override: they only apply to
//! fields that no config file set.

use std::collections::HashMap;

use tracing::debug;

use crate::merge::{ConfigLayer, FieldSources};

/// Mapping from environment variable name to config field path.
struct EnvMapping {
    var_name: &'static str,
    field_path: &'static str,
    kind: ValueKind,
}

#[derive(Clone, Copy)]
enum ValueKind {
    Str,
    Int,
    Bool,
}

const ENV_MAPPINGS: &[EnvMapping] = &[
    EnvMapping {
        var_name: "WARDEN_SESSION_TTL_SECS",
        field_path: "session.ttl_secs",
        kind: ValueKind::Int,
    },
    EnvMapping {
        var_name: "WARDEN_SESSION_KEY_PATH",
        field_path: "session.key_path",
        kind: ValueKind::Str,
    },
    EnvMapping {
        var_name: "WARDEN_SESSION_REVOKE_ON_SUSPEND",
        field_path: "session.revoke_on_suspend",
        kind: ValueKind::Bool,
    },
    EnvMapping {
        var_name: "WARDEN_AUDIT_KEY_PATH",
        field_path: "audit.key_path",
        kind: ValueKind::Str,
    },
    EnvMapping {
        var_name: "WARDEN_AUDIT_STORAGE_PATH",
        field_path: "audit.storage_path",
        kind: ValueKind::Str,
    },
    EnvMapping {
        var_name: "WARDEN_STORAGE_PATH",
        field_path: "storage.path",
        kind: ValueKind::Str,
    },
    EnvMapping {
        var_name: "WARDEN_DEFAULT_ROLE",
        field_path: "registration.default_role",
        kind: ValueKind::Str,
    },
    EnvMapping {
        var_name: "WARDEN_NOTIFY_ENABLED",
        field_path: "notify.enabled",
        kind: ValueKind::Bool,
    },
    EnvMapping {
        var_name: "WARDEN_NOTIFY_TIMEOUT_SECS",
        field_path: "notify.timeout_secs",
        kind: ValueKind::Int,
    },
    EnvMapping {
        var_name: "WARDEN_LOG_LEVEL",
        field_path: "logging.level",
        kind: ValueKind::Str,
    },
    EnvMapping {
        var_name: "WARDEN_LOG_FORMAT",
        field_path: "logging.format",
        kind: ValueKind::Str,
    },
];

/// Apply environment fallbacks to fields that were not set by any file.
///
/// A field still carrying its embedded default counts as unset. Returns the
/// number of variables applied.
pub fn apply_env_fallbacks<S: ::std::hash::BuildHasher>(
    merged: &mut toml::Value,
    sources: &mut FieldSources,
    env_vars: &HashMap<String, String, S>,
) -> usize {
    let mut count: usize = 0;

    for mapping in ENV_MAPPINGS {
        let set_by_file = sources
            .get(mapping.field_path)
            .is_some_and(|layer| *layer != ConfigLayer::Defaults);
        if set_by_file {
            continue;
        }

        let Some(raw) = env_vars.get(mapping.var_name) else {
            continue;
        };
        let Some(value) = coerce(mapping.kind, raw) else {
            tracing::warn!(
                var = mapping.var_name,
                "ignoring environment variable with a malformed value"
            );
            continue;
        };

        debug!(
            var = mapping.var_name,
            field = mapping.field_path,
            "applying env var fallback"
        );
        set_field(merged, mapping.field_path, value);
        sources.insert(mapping.field_path.to_owned(), ConfigLayer::Environment);
        count = count.saturating_add(1);
    }

    count
}

fn coerce(kind: ValueKind, raw: &str) -> Option<toml::Value> {
    match kind {
        ValueKind::Str => Some(toml::Value::String(raw.to_owned())),
        ValueKind::Int => raw.parse::<i64>().ok().map(toml::Value::Integer),
        ValueKind::Bool => raw.parse::<bool>().ok().map(toml::Value::Boolean),
    }
}

/// Set a dotted `section.key` path, creating the section table if needed.
fn set_field(root: &mut toml::Value, path: &str, value: toml::Value) {
    let Some((section, key)) = path.split_once('.') else {
        return;
    };
    let Some(root) = root.as_table_mut() else {
        return;
    };
    let section = root
        .entry(section.to_owned())
        .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    if let Some(table) = section.as_table_mut() {
        table.insert(key.to_owned(), value);
    }
}

/// Collect all current environment variables into a map.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    fn base() -> toml::Value {
        toml::from_str("[session]\nttl_secs = 3600\n").unwrap()
    }

    #[test]
    fn test_env_fills_defaults() {
        let mut merged = base();
        let mut sources = FieldSources::new();
        sources.insert("session.ttl_secs".into(), ConfigLayer::Defaults);

        let count = apply_env_fallbacks(
            &mut merged,
            &mut sources,
            &make_env(&[
                ("WARDEN_SESSION_TTL_SECS", "900"),
                ("WARDEN_STORAGE_PATH", "/srv/warden"),
            ]),
        );

        assert_eq!(count, 2);
        assert_eq!(merged["session"]["ttl_secs"].as_integer(), Some(900));
        assert_eq!(merged["storage"]["path"].as_str(), Some("/srv/warden"));
        assert_eq!(
            sources.get("storage.path"),
            Some(&ConfigLayer::Environment)
        );
    }

    #[test]
    fn test_env_does_not_override_files() {
        let mut merged = base();
        let mut sources = FieldSources::new();
        sources.insert("session.ttl_secs".into(), ConfigLayer::User);

        let count = apply_env_fallbacks(
            &mut merged,
            &mut sources,
            &make_env(&[("WARDEN_SESSION_TTL_SECS", "900")]),
        );
        assert_eq!(count, 0);
        assert_eq!(merged["session"]["ttl_secs"].as_integer(), Some(3600));
    }

    #[test]
    fn test_malformed_values_ignored() {
        let mut merged = base();
        let mut sources = FieldSources::new();
        let count = apply_env_fallbacks(
            &mut merged,
            &mut sources,
            &make_env(&[
                ("WARDEN_SESSION_TTL_SECS", "soon"),
                ("WARDEN_NOTIFY_ENABLED", "yes"),
            ]),
        );
        assert_eq!(count, 0);
    }
}
