//! Static-hosting module. Unlike the tenant modules it is armed from the
//! root document, not the project sub-tree.

use async_trait::async_trait;
use tokio::sync::RwLock;

use stratus_config::{Config, ConfigError, ConfigResult, Project, StaticConfig};

use crate::sink::ModuleSink;

/// In-process static-hosting module.
pub struct StaticModule {
    config: RwLock<StaticConfig>,
}

impl StaticModule {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: RwLock::new(StaticConfig::default()),
        }
    }

    /// The settings this module is currently armed with.
    pub async fn current_config(&self) -> StaticConfig {
        self.config.read().await.clone()
    }
}

impl Default for StaticModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModuleSink for StaticModule {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn apply(&self, _project: &Project, config: &Config) -> ConfigResult<()> {
        for route in &config.static_hosting.routes {
            if !route.prefix.starts_with('/') {
                return Err(ConfigError::InvalidField {
                    section: "static",
                    field: "prefix".to_string(),
                    value: Some(route.prefix.clone()),
                    reason: "prefix must start with '/'",
                });
            }
            if route.path.trim().is_empty() {
                return Err(ConfigError::InvalidField {
                    section: "static",
                    field: format!("{}.path", route.prefix),
                    value: None,
                    reason: "route path must not be empty",
                });
            }
        }

        let mut guard = self.config.write().await;
        *guard = config.static_hosting.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratus_config::StaticRoute;

    #[tokio::test]
    async fn routes_are_validated_and_armed() {
        let module = StaticModule::new();
        let mut config = Config::default();
        config.static_hosting.routes.push(StaticRoute {
            host: None,
            prefix: "/assets".to_string(),
            path: "/var/www/assets".to_string(),
        });
        module
            .apply(&Project::default(), &config)
            .await
            .expect("apply");
        assert_eq!(module.current_config().await.routes.len(), 1);

        config.static_hosting.routes[0].prefix = "assets".to_string();
        assert!(module.apply(&Project::default(), &config).await.is_err());
    }
}
