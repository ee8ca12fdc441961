//! Functions module: remote service registry and invocation rules.

use async_trait::async_trait;
use tokio::sync::RwLock;

use stratus_config::{Config, ConfigError, ConfigResult, FunctionsConfig, Project, parse_rule_expr};

use crate::sink::ModuleSink;

const KNOWN_BROKERS: &[&str] = &["nats", "embedded"];

struct FunctionsState {
    project_id: String,
    config: FunctionsConfig,
}

/// In-process functions module.
pub struct FunctionsModule {
    state: RwLock<FunctionsState>,
}

impl FunctionsModule {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(FunctionsState {
                project_id: String::new(),
                config: FunctionsConfig::default(),
            }),
        }
    }

    /// The sub-config this module is currently armed with.
    pub async fn current_config(&self) -> FunctionsConfig {
        self.state.read().await.config.clone()
    }

    pub async fn project_id(&self) -> String {
        self.state.read().await.project_id.clone()
    }
}

impl Default for FunctionsModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModuleSink for FunctionsModule {
    fn name(&self) -> &'static str {
        "functions"
    }

    async fn apply(&self, project: &Project, _config: &Config) -> ConfigResult<()> {
        let functions = &project.modules.functions;
        if functions.enabled && !KNOWN_BROKERS.contains(&functions.broker.as_str()) {
            return Err(ConfigError::InvalidField {
                section: "functions",
                field: "broker".to_string(),
                value: Some(functions.broker.clone()),
                reason: "unknown function broker",
            });
        }
        for (service, entry) in &functions.services {
            for (function, expr) in &entry.functions {
                parse_rule_expr(expr).map_err(|_| ConfigError::InvalidField {
                    section: "functions",
                    field: format!("{service}.{function}"),
                    value: Some(expr.clone()),
                    reason: "unsupported rule expression",
                })?;
            }
        }

        let mut guard = self.state.write().await;
        guard.project_id = project.id.clone();
        guard.config = functions.clone();
        Ok(())
    }
}
