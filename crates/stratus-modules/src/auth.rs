//! Auth-rule module. Depends on the crud module for the collection list, so
//! the coordinator arms it second.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use stratus_config::{AuthConfig, Config, ConfigError, ConfigResult, Project, parse_rule_expr};

use crate::crud::CrudModule;
use crate::sink::ModuleSink;

/// Collection name that matches when no explicit rule exists.
const DEFAULT_RULE_KEY: &str = "default";

struct AuthState {
    project_id: String,
    secret: String,
    config: AuthConfig,
}

/// Per-collection access-rule module.
pub struct AuthModule {
    crud: Arc<CrudModule>,
    state: RwLock<AuthState>,
}

impl AuthModule {
    #[must_use]
    pub fn new(crud: Arc<CrudModule>) -> Self {
        Self {
            crud,
            state: RwLock::new(AuthState {
                project_id: String::new(),
                secret: String::new(),
                config: AuthConfig::default(),
            }),
        }
    }

    /// The sub-config this module is currently armed with.
    pub async fn current_config(&self) -> AuthConfig {
        self.state.read().await.config.clone()
    }

    /// Project the module is currently armed for.
    pub async fn project_id(&self) -> String {
        self.state.read().await.project_id.clone()
    }

    /// Signing secret for project-scoped tokens.
    pub async fn secret(&self) -> String {
        self.state.read().await.secret.clone()
    }
}

#[async_trait]
impl ModuleSink for AuthModule {
    fn name(&self) -> &'static str {
        "auth"
    }

    async fn apply(&self, project: &Project, _config: &Config) -> ConfigResult<()> {
        let auth = &project.modules.auth;
        let collections = self.crud.collections().await;
        for (collection, expr) in &auth.rules {
            parse_rule_expr(expr)?;
            if collection != DEFAULT_RULE_KEY && !collections.contains(collection) {
                return Err(ConfigError::InvalidField {
                    section: "auth",
                    field: format!("rules.{collection}"),
                    value: None,
                    reason: "rule references a collection the crud module does not expose",
                });
            }
        }

        let mut guard = self.state.write().await;
        guard.project_id = project.id.clone();
        guard.secret = project.secret.clone();
        guard.config = auth.clone();
        debug!(project_id = %guard.project_id, rules = guard.config.rules.len(), "auth module armed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratus_config::{CollectionConfig, CrudConfig, DatabaseConfig, ModuleConfigs};

    async fn armed_crud() -> Arc<CrudModule> {
        let crud_module = Arc::new(CrudModule::new());
        let mut crud = CrudConfig::default();
        let mut db = DatabaseConfig {
            enabled: true,
            conn: "postgres://localhost/app".to_string(),
            ..DatabaseConfig::default()
        };
        db.collections
            .insert("users".to_string(), CollectionConfig::default());
        crud.databases.insert("sql".to_string(), db);
        let project = Project {
            id: "p1".to_string(),
            modules: ModuleConfigs {
                crud,
                ..Default::default()
            },
            ..Project::default()
        };
        crud_module
            .apply(&project, &Config::default())
            .await
            .expect("crud apply");
        crud_module
    }

    fn project_with_rules(rules: &[(&str, &str)]) -> Project {
        let mut auth = AuthConfig::default();
        for (collection, expr) in rules {
            auth.rules
                .insert((*collection).to_string(), (*expr).to_string());
        }
        Project {
            id: "p1".to_string(),
            secret: "signing-key".to_string(),
            modules: ModuleConfigs {
                auth,
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn rules_over_known_collections_are_accepted() {
        let module = AuthModule::new(armed_crud().await);
        let project = project_with_rules(&[("users", "authenticated"), ("default", "deny")]);
        module
            .apply(&project, &Config::default())
            .await
            .expect("apply");
        assert_eq!(module.project_id().await, "p1");
        assert_eq!(module.secret().await, "signing-key");
        assert_eq!(module.current_config().await.rules.len(), 2);
    }

    #[tokio::test]
    async fn rules_over_unknown_collections_are_rejected() {
        let module = AuthModule::new(armed_crud().await);
        let project = project_with_rules(&[("payments", "allow")]);
        let err = module
            .apply(&project, &Config::default())
            .await
            .expect_err("unknown collection must reject");
        assert!(matches!(err, ConfigError::InvalidField { .. }));
    }
}
