//! Eventing module. Implements the crud mutation-listener seam and turns
//! data-plane intents into bus events; armed after the crud module so its
//! staging database reference can be checked.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use stratus_config::{Config, ConfigError, ConfigResult, EventingConfig, Project};
use stratus_events::{Event, EventBus, MutationKind};

use crate::crud::{CrudModule, MutationListener};
use crate::sink::ModuleSink;

struct EventingState {
    project_id: String,
    config: EventingConfig,
}

/// In-process eventing module.
pub struct EventingModule {
    crud: Arc<CrudModule>,
    bus: EventBus,
    state: RwLock<EventingState>,
}

impl EventingModule {
    #[must_use]
    pub fn new(crud: Arc<CrudModule>, bus: EventBus) -> Self {
        Self {
            crud,
            bus,
            state: RwLock::new(EventingState {
                project_id: String::new(),
                config: EventingConfig::default(),
            }),
        }
    }

    /// The sub-config this module is currently armed with.
    pub async fn current_config(&self) -> EventingConfig {
        self.state.read().await.config.clone()
    }

    async fn publish_intent(&self, project_id: &str, collection: &str, kind: MutationKind, payload: &Value) {
        if !self.state.read().await.config.enabled {
            return;
        }
        let _ = self.bus.publish(Event::MutationIntent {
            project_id: project_id.to_string(),
            collection: collection.to_string(),
            kind,
            payload: payload.clone(),
        });
    }
}

#[async_trait]
impl ModuleSink for EventingModule {
    fn name(&self) -> &'static str {
        "eventing"
    }

    async fn apply(&self, project: &Project, _config: &Config) -> ConfigResult<()> {
        let eventing = &project.modules.eventing;
        if eventing.enabled {
            if eventing.db_type.trim().is_empty() || eventing.col.trim().is_empty() {
                return Err(ConfigError::InvalidField {
                    section: "eventing",
                    field: "dbType/col".to_string(),
                    value: None,
                    reason: "eventing requires a staging database and collection",
                });
            }
            let crud = self.crud.current_config().await;
            if !crud.databases.contains_key(&eventing.db_type) {
                return Err(ConfigError::InvalidField {
                    section: "eventing",
                    field: "dbType".to_string(),
                    value: Some(eventing.db_type.clone()),
                    reason: "staging database is not configured in the crud module",
                });
            }
        }

        let mut guard = self.state.write().await;
        guard.project_id = project.id.clone();
        guard.config = eventing.clone();
        Ok(())
    }
}

#[async_trait]
impl MutationListener for EventingModule {
    async fn on_create(&self, project_id: &str, collection: &str, payload: &Value) {
        self.publish_intent(project_id, collection, MutationKind::Create, payload)
            .await;
    }

    async fn on_update(&self, project_id: &str, collection: &str, payload: &Value) {
        self.publish_intent(project_id, collection, MutationKind::Update, payload)
            .await;
    }

    async fn on_delete(&self, project_id: &str, collection: &str, payload: &Value) {
        self.publish_intent(project_id, collection, MutationKind::Delete, payload)
            .await;
    }

    async fn on_batch(&self, project_id: &str, collection: &str, payload: &Value) {
        self.publish_intent(project_id, collection, MutationKind::Batch, payload)
            .await;
    }

    async fn on_stage(&self, project_id: &str, collection: &str, intent_id: &str) {
        if !self.state.read().await.config.enabled {
            return;
        }
        let intent_id = if intent_id.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            intent_id.to_string()
        };
        let _ = self.bus.publish(Event::MutationStaged {
            project_id: project_id.to_string(),
            collection: collection.to_string(),
            intent_id,
        });
    }
}
