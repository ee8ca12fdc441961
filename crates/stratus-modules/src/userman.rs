//! User-management module: sign-in provider configuration.

use async_trait::async_trait;
use tokio::sync::RwLock;

use stratus_config::{Config, ConfigError, ConfigResult, Project, UserManConfig};

use crate::sink::ModuleSink;

/// In-process user-management module.
pub struct UserManModule {
    config: RwLock<UserManConfig>,
}

impl UserManModule {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: RwLock::new(UserManConfig::default()),
        }
    }

    /// The sub-config this module is currently armed with.
    pub async fn current_config(&self) -> UserManConfig {
        self.config.read().await.clone()
    }

    /// Whether the named provider is enabled in the armed config.
    pub async fn provider_enabled(&self, name: &str) -> bool {
        self.config
            .read()
            .await
            .providers
            .get(name)
            .is_some_and(|provider| provider.enabled)
    }
}

impl Default for UserManModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModuleSink for UserManModule {
    fn name(&self) -> &'static str {
        "userman"
    }

    async fn apply(&self, project: &Project, _config: &Config) -> ConfigResult<()> {
        let userman = &project.modules.userman;
        for (name, provider) in &userman.providers {
            // Third-party providers need client credentials; the builtin
            // email provider authenticates against stored users directly.
            if provider.enabled
                && name != "email"
                && (provider.id.is_none() || provider.secret.is_none())
            {
                return Err(ConfigError::InvalidField {
                    section: "userman",
                    field: format!("providers.{name}"),
                    value: None,
                    reason: "enabled provider requires id and secret",
                });
            }
        }

        let mut guard = self.config.write().await;
        *guard = userman.clone();
        Ok(())
    }
}
