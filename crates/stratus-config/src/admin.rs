//! Bearer-token authorization gate for administrative operations.
//!
//! Every mutation and privileged read passes through [`AdminGate`] before
//! touching the store. The gate is itself re-armed whenever a new document is
//! applied, so rotating the cluster secret takes effect cluster-wide like any
//! other configuration change.

use std::sync::RwLock;

use subtle::ConstantTimeEq;

use crate::error::{ConfigError, ConfigResult};
use crate::model::AdminSettings;

/// Validates cluster-admin bearer tokens against the current settings.
pub struct AdminGate {
    settings: RwLock<AdminSettings>,
}

impl AdminGate {
    /// Construct a gate with the provided settings.
    #[must_use]
    pub fn new(settings: AdminSettings) -> Self {
        Self {
            settings: RwLock::new(settings),
        }
    }

    /// Replace the admin settings during reconfiguration.
    ///
    /// # Panics
    ///
    /// Panics if the settings lock has been poisoned.
    pub fn set_config(&self, settings: AdminSettings) {
        let mut guard = self.settings.write().expect("admin settings lock poisoned");
        *guard = settings;
    }

    /// Check a bearer token against the cluster secret and named user keys.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` when the token is absent, the cluster has no
    /// secret configured, or the token matches neither the secret nor any
    /// user key.
    ///
    /// # Panics
    ///
    /// Panics if the settings lock has been poisoned.
    pub fn validate_token(&self, token: Option<&str>) -> ConfigResult<()> {
        let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) else {
            return Err(ConfigError::Unauthorized {
                reason: "missing admin token",
            });
        };

        let guard = self.settings.read().expect("admin settings lock poisoned");
        if guard.secret.is_empty() && guard.users.is_empty() {
            return Err(ConfigError::Unauthorized {
                reason: "no admin credentials configured",
            });
        }

        if token_matches(token, &guard.secret)
            || guard.users.iter().any(|user| token_matches(token, &user.key))
        {
            return Ok(());
        }

        Err(ConfigError::Unauthorized {
            reason: "invalid admin token",
        })
    }
}

fn token_matches(token: &str, candidate: &str) -> bool {
    !candidate.is_empty() && token.as_bytes().ct_eq(candidate.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AdminUser;

    fn settings() -> AdminSettings {
        AdminSettings {
            secret: "cluster-secret".to_string(),
            users: vec![AdminUser {
                name: "ops".to_string(),
                key: "ops-key".to_string(),
            }],
        }
    }

    #[test]
    fn accepts_secret_and_user_keys() {
        let gate = AdminGate::new(settings());
        assert!(gate.validate_token(Some("cluster-secret")).is_ok());
        assert!(gate.validate_token(Some("ops-key")).is_ok());
    }

    #[test]
    fn rejects_missing_and_invalid_tokens() {
        let gate = AdminGate::new(settings());
        assert!(gate.validate_token(None).is_err());
        assert!(gate.validate_token(Some("")).is_err());
        assert!(gate.validate_token(Some("wrong")).is_err());
    }

    #[test]
    fn rejects_everything_when_unconfigured() {
        let gate = AdminGate::new(AdminSettings::default());
        assert!(gate.validate_token(Some("anything")).is_err());
    }

    #[test]
    fn set_config_rotates_the_secret() {
        let gate = AdminGate::new(settings());
        gate.set_config(AdminSettings {
            secret: "rotated".to_string(),
            users: Vec::new(),
        });
        assert!(gate.validate_token(Some("cluster-secret")).is_err());
        assert!(gate.validate_token(Some("rotated")).is_ok());
    }
}
