//! GraphQL composition layer. Carries no validation of its own; it is armed
//! last because query federation spans every other module.

use async_trait::async_trait;
use tokio::sync::RwLock;

use stratus_config::{Config, ConfigResult, Project};

use crate::sink::ModuleSink;

/// Query-federation module.
pub struct GraphqlModule {
    project_id: RwLock<String>,
}

impl GraphqlModule {
    #[must_use]
    pub fn new() -> Self {
        Self {
            project_id: RwLock::new(String::new()),
        }
    }

    /// Project the federation layer is currently armed for.
    pub async fn project_id(&self) -> String {
        self.project_id.read().await.clone()
    }
}

impl Default for GraphqlModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModuleSink for GraphqlModule {
    fn name(&self) -> &'static str {
        "graphql"
    }

    async fn apply(&self, project: &Project, _config: &Config) -> ConfigResult<()> {
        let mut guard = self.project_id.write().await;
        *guard = project.id.clone();
        Ok(())
    }
}
