//! Runtime settings of the authorization core.

use warden_config::Config;
use warden_core::Rank;
use warden_crypto::PasswordParams;
use warden_notify::UrlPolicy;
use warden_session::SessionConfig;

use crate::error::{AuthzError, AuthzResult};

/// Settings the [`Gatekeeper`](crate::Gatekeeper) is built with.
#[derive(Debug, Clone)]
pub struct AuthzConfig {
    /// Session token lifetime and skew.
    pub session: SessionConfig,
    /// Argon2id cost.
    pub password: PasswordParams,
    /// Minimum secret length at registration.
    pub min_secret_len: usize,
    /// Role given to new registrations.
    pub default_role: String,
    /// All-capability role created at bootstrap.
    pub root_role: String,
    /// Rank of the root role.
    pub root_rank: Rank,
    /// Refuse outstanding sessions of a suspended identity.
    pub revoke_on_suspend: bool,
    /// Allow-list for webhook URLs.
    pub webhook_policy: UrlPolicy,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            password: PasswordParams::default(),
            min_secret_len: 8,
            default_role: "User".to_string(),
            root_role: "Owner".to_string(),
            root_rank: Rank::new(100),
            revoke_on_suspend: true,
            webhook_policy: UrlPolicy::default(),
        }
    }
}

impl AuthzConfig {
    /// Derive the core settings from a loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::InvalidInput`] if the webhook pattern does not
    /// compile.
    pub fn from_config(config: &Config) -> AuthzResult<Self> {
        let webhook_policy = UrlPolicy::new(&config.notify.allowed_url_pattern)
            .map_err(|e| AuthzError::InvalidInput(e.to_string()))?;
        Ok(Self {
            session: SessionConfig {
                ttl_secs: config.session.ttl_secs,
                clock_skew_secs: config.session.clock_skew_secs,
            },
            password: PasswordParams {
                memory_kib: config.password.memory_kib,
                iterations: config.password.iterations,
                parallelism: config.password.parallelism,
            },
            min_secret_len: config.password.min_length,
            default_role: config.registration.default_role.clone(),
            root_role: config.bootstrap.root_role.clone(),
            root_rank: Rank::new(config.bootstrap.root_rank),
            revoke_on_suspend: config.session.revoke_on_suspend,
            webhook_policy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_config_defaults() {
        let from_file = AuthzConfig::from_config(&Config::default()).unwrap();
        let built_in = AuthzConfig::default();
        assert_eq!(from_file.session, built_in.session);
        assert_eq!(from_file.password, built_in.password);
        assert_eq!(from_file.root_rank, built_in.root_rank);
        assert_eq!(from_file.default_role, built_in.default_role);
        assert_eq!(from_file.webhook_policy.as_str(), built_in.webhook_policy.as_str());
    }

    #[test]
    fn test_bad_pattern_rejected() {
        let mut config = Config::default();
        config.notify.allowed_url_pattern = "^https://(".into();
        assert!(AuthzConfig::from_config(&config).is_err());
    }
}
