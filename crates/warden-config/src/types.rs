//! Configuration struct definitions.
//!
//! Every section derives `Default` with the same values as the embedded
//! `defaults.toml`, so a partially written file deserializes cleanly.

use serde::{Deserialize, Serialize};

/// The complete Warden configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Session token settings.
    pub session: SessionSection,
    /// Password hashing settings.
    pub password: PasswordSection,
    /// Self-registration settings.
    pub registration: RegistrationSection,
    /// Role hierarchy bootstrap settings.
    pub bootstrap: BootstrapSection,
    /// Audit log settings.
    pub audit: AuditSection,
    /// Persistent store settings.
    pub storage: StorageSection,
    /// Notification settings.
    pub notify: NotifySection,
    /// Logging settings.
    pub logging: LoggingSection,
}

/// `[session]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// Token lifetime in seconds.
    pub ttl_secs: u64,
    /// Grace period applied to token expiry, in seconds.
    pub clock_skew_secs: u64,
    /// Path of the session MAC key file. In-memory key if unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_path: Option<String>,
    /// Revoke outstanding sessions when an identity is suspended.
    pub revoke_on_suspend: bool,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            clock_skew_secs: 30,
            key_path: None,
            revoke_on_suspend: true,
        }
    }
}

/// `[password]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordSection {
    /// Argon2 memory cost in KiB.
    pub memory_kib: u32,
    /// Argon2 iteration count.
    pub iterations: u32,
    /// Argon2 lanes.
    pub parallelism: u32,
    /// Minimum secret length at registration.
    pub min_length: usize,
}

impl Default for PasswordSection {
    fn default() -> Self {
        Self {
            memory_kib: 19_456,
            iterations: 2,
            parallelism: 1,
            min_length: 8,
        }
    }
}

/// `[registration]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationSection {
    /// Name of the role given to newly registered identities.
    pub default_role: String,
}

impl Default for RegistrationSection {
    fn default() -> Self {
        Self {
            default_role: "User".to_owned(),
        }
    }
}

/// `[bootstrap]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapSection {
    /// Name of the all-capability root role.
    pub root_role: String,
    /// Rank of the root role.
    pub root_rank: u32,
}

impl Default for BootstrapSection {
    fn default() -> Self {
        Self {
            root_role: "Owner".to_owned(),
            root_rank: 100,
        }
    }
}

/// `[audit]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditSection {
    /// Path of the ed25519 runtime key file. In-memory key if unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_path: Option<String>,
    /// Directory of the audit store. Shares `[storage]` if unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<String>,
}

/// `[storage]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Directory of the persistent store. In-memory store if unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// `[notify]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifySection {
    /// Whether notifications are delivered at all.
    pub enabled: bool,
    /// Per-delivery timeout in seconds.
    pub timeout_secs: u64,
    /// Regular expression every webhook URL must match.
    pub allowed_url_pattern: String,
}

impl Default for NotifySection {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: 5,
            allowed_url_pattern: r"^https://discord\.com/api/webhooks/.+$".to_owned(),
        }
    }
}

/// `[logging]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Base level filter (`error`, `warn`, `info`, `debug`, `trace`).
    pub level: String,
    /// Output format (`pretty`, `compact`, `json`, `full`).
    pub format: String,
    /// Output target (`stderr`, `stdout`, `file`).
    pub target: String,
    /// Log directory when `target = "file"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
    /// Extra filter directives such as `warden::security=debug`.
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            target: "stderr".to_owned(),
            directory: None,
            directives: Vec::new(),
        }
    }
}
