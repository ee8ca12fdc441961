//! Data-access module. Always armed first: the auth, eventing, and realtime
//! modules consult its collection list when validating their own sub-configs.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use stratus_config::{Config, ConfigError, ConfigResult, CrudConfig, Project, parse_rule_expr};

use crate::sink::ModuleSink;

/// Observer for data-plane mutations flowing through the crud module.
///
/// Listeners are registered at composition time (the eventing module is the
/// canonical implementor); the crud module fans every intent out to all of
/// them before the mutation is staged.
#[async_trait]
pub trait MutationListener: Send + Sync {
    async fn on_create(&self, project_id: &str, collection: &str, payload: &Value);
    async fn on_update(&self, project_id: &str, collection: &str, payload: &Value);
    async fn on_delete(&self, project_id: &str, collection: &str, payload: &Value);
    async fn on_batch(&self, project_id: &str, collection: &str, payload: &Value);
    async fn on_stage(&self, project_id: &str, collection: &str, intent_id: &str);
}

/// In-process data-access module.
pub struct CrudModule {
    config: RwLock<CrudConfig>,
    listeners: RwLock<Vec<Arc<dyn MutationListener>>>,
}

impl CrudModule {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: RwLock::new(CrudConfig::default()),
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Register a mutation listener. Composition-time wiring only.
    pub async fn register_listener(&self, listener: Arc<dyn MutationListener>) {
        self.listeners.write().await.push(listener);
    }

    /// The sub-config this module is currently armed with.
    pub async fn current_config(&self) -> CrudConfig {
        self.config.read().await.clone()
    }

    /// Collection names across enabled databases in the armed config.
    pub async fn collections(&self) -> Vec<String> {
        self.config.read().await.collections()
    }

    /// Dispatch a create intent to every registered listener.
    pub async fn notify_create(&self, project_id: &str, collection: &str, payload: &Value) {
        let listeners = self.listeners.read().await.clone();
        for listener in listeners {
            listener.on_create(project_id, collection, payload).await;
        }
    }

    /// Dispatch an update intent to every registered listener.
    pub async fn notify_update(&self, project_id: &str, collection: &str, payload: &Value) {
        let listeners = self.listeners.read().await.clone();
        for listener in listeners {
            listener.on_update(project_id, collection, payload).await;
        }
    }

    /// Dispatch a delete intent to every registered listener.
    pub async fn notify_delete(&self, project_id: &str, collection: &str, payload: &Value) {
        let listeners = self.listeners.read().await.clone();
        for listener in listeners {
            listener.on_delete(project_id, collection, payload).await;
        }
    }

    /// Dispatch a batch intent to every registered listener.
    pub async fn notify_batch(&self, project_id: &str, collection: &str, payload: &Value) {
        let listeners = self.listeners.read().await.clone();
        for listener in listeners {
            listener.on_batch(project_id, collection, payload).await;
        }
    }

    /// Mark an intent as staged and inform listeners.
    pub async fn notify_stage(&self, project_id: &str, collection: &str, intent_id: &str) {
        let listeners = self.listeners.read().await.clone();
        for listener in listeners {
            listener.on_stage(project_id, collection, intent_id).await;
        }
    }

    fn validate(config: &CrudConfig) -> ConfigResult<()> {
        for (alias, db) in &config.databases {
            if db.enabled && db.conn.trim().is_empty() {
                return Err(ConfigError::InvalidField {
                    section: "crud",
                    field: format!("{alias}.conn"),
                    value: None,
                    reason: "enabled database requires a connection string",
                });
            }
            for (name, collection) in &db.collections {
                for expr in collection.rules.values() {
                    parse_rule_expr(expr).map_err(|_| ConfigError::InvalidField {
                        section: "crud",
                        field: format!("{alias}.{name}.rules"),
                        value: Some(expr.clone()),
                        reason: "unsupported rule expression",
                    })?;
                }
            }
        }
        Ok(())
    }
}

impl Default for CrudModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModuleSink for CrudModule {
    fn name(&self) -> &'static str {
        "crud"
    }

    async fn apply(&self, project: &Project, _config: &Config) -> ConfigResult<()> {
        Self::validate(&project.modules.crud)?;
        let mut guard = self.config.write().await;
        *guard = project.modules.crud.clone();
        debug!(databases = guard.databases.len(), "crud module armed");
        Ok(())
    }
}
