//! Realtime module: live subscriptions over the event bus, gated by the crud
//! module's per-collection realtime flag.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use stratus_config::{Config, ConfigError, ConfigResult, Project, RealtimeConfig};
use stratus_events::{EventBus, EventStream};

use crate::crud::CrudModule;
use crate::sink::ModuleSink;

const KNOWN_BROKERS: &[&str] = &["nats", "embedded"];

struct RealtimeState {
    project_id: String,
    config: RealtimeConfig,
}

/// In-process realtime subscription module.
pub struct RealtimeModule {
    node_id: String,
    crud: Arc<CrudModule>,
    bus: EventBus,
    state: RwLock<RealtimeState>,
}

impl RealtimeModule {
    #[must_use]
    pub fn new(node_id: impl Into<String>, crud: Arc<CrudModule>, bus: EventBus) -> Self {
        Self {
            node_id: node_id.into(),
            crud,
            bus,
            state: RwLock::new(RealtimeState {
                project_id: String::new(),
                config: RealtimeConfig::default(),
            }),
        }
    }

    /// The sub-config this module is currently armed with.
    pub async fn current_config(&self) -> RealtimeConfig {
        self.state.read().await.config.clone()
    }

    /// Node this module is running on.
    #[must_use]
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Attach a live subscription to a collection.
    ///
    /// # Errors
    ///
    /// Returns an error when the module is disabled or the collection does
    /// not have realtime enabled in the armed crud config.
    pub async fn subscribe(&self, db_alias: &str, collection: &str) -> ConfigResult<EventStream> {
        if !self.state.read().await.config.enabled {
            return Err(ConfigError::InvalidField {
                section: "realtime",
                field: "enabled".to_string(),
                value: None,
                reason: "realtime module is disabled",
            });
        }
        let crud = self.crud.current_config().await;
        let allowed = crud
            .databases
            .get(db_alias)
            .and_then(|db| db.collections.get(collection))
            .is_some_and(|col| col.realtime_enabled);
        if !allowed {
            return Err(ConfigError::InvalidField {
                section: "realtime",
                field: format!("{db_alias}.{collection}"),
                value: None,
                reason: "collection does not have realtime enabled",
            });
        }
        Ok(self.bus.subscribe(None))
    }
}

#[async_trait]
impl ModuleSink for RealtimeModule {
    fn name(&self) -> &'static str {
        "realtime"
    }

    async fn apply(&self, project: &Project, _config: &Config) -> ConfigResult<()> {
        let realtime = &project.modules.realtime;
        if realtime.enabled && !KNOWN_BROKERS.contains(&realtime.broker.as_str()) {
            return Err(ConfigError::InvalidField {
                section: "realtime",
                field: "broker".to_string(),
                value: Some(realtime.broker.clone()),
                reason: "unknown realtime broker",
            });
        }

        let mut guard = self.state.write().await;
        guard.project_id = project.id.clone();
        guard.config = realtime.clone();
        Ok(())
    }
}
