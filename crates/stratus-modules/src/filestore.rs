//! File-storage module: backing store selection and ordered access rules.

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::debug;

use stratus_config::{
    Config, ConfigError, ConfigResult, FileRule, FileStoreConfig, Project, validate_file_store,
};

use crate::sink::ModuleSink;

/// In-process file-storage module.
pub struct FileStoreModule {
    config: RwLock<FileStoreConfig>,
}

impl FileStoreModule {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: RwLock::new(FileStoreConfig::default()),
        }
    }

    /// The sub-config this module is currently armed with.
    pub async fn current_config(&self) -> FileStoreConfig {
        self.config.read().await.clone()
    }

    /// Rules in the armed config, optionally filtered by name.
    pub async fn rules(&self, name_filter: &str) -> Vec<FileRule> {
        let guard = self.config.read().await;
        guard
            .rules
            .iter()
            .filter(|rule| name_filter.is_empty() || rule.name == name_filter)
            .cloned()
            .collect()
    }

    /// Probe whether the armed backing store is usable right now.
    ///
    /// # Errors
    ///
    /// Returns an error when the module is disabled or a local store root is
    /// missing. Probing remote stores is the data plane's concern and always
    /// reports healthy here.
    pub async fn get_state(&self) -> ConfigResult<()> {
        let config = self.config.read().await.clone();
        if !config.enabled {
            return Err(ConfigError::InvalidField {
                section: "file_store",
                field: "enabled".to_string(),
                value: None,
                reason: "file store is disabled",
            });
        }
        if config.store_type == "local" {
            let metadata =
                fs::metadata(&config.conn)
                    .await
                    .map_err(|_| ConfigError::InvalidField {
                        section: "file_store",
                        field: "conn".to_string(),
                        value: Some(config.conn.clone()),
                        reason: "local store root does not exist",
                    })?;
            if !metadata.is_dir() {
                return Err(ConfigError::InvalidField {
                    section: "file_store",
                    field: "conn".to_string(),
                    value: Some(config.conn),
                    reason: "local store root is not a directory",
                });
            }
        }
        Ok(())
    }
}

impl Default for FileStoreModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModuleSink for FileStoreModule {
    fn name(&self) -> &'static str {
        "filestore"
    }

    async fn apply(&self, project: &Project, _config: &Config) -> ConfigResult<()> {
        let file_store = &project.modules.file_store;
        validate_file_store(file_store)?;

        let mut guard = self.config.write().await;
        *guard = file_store.clone();
        debug!(
            store_type = %guard.store_type,
            rules = guard.rules.len(),
            "file store module armed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratus_config::ModuleConfigs;

    fn project(file_store: FileStoreConfig) -> Project {
        Project {
            id: "p1".to_string(),
            modules: ModuleConfigs {
                file_store,
                ..Default::default()
            },
            ..Project::default()
        }
    }

    #[tokio::test]
    async fn apply_rejects_invalid_rule_sets() {
        let module = FileStoreModule::new();
        let config = FileStoreConfig {
            enabled: true,
            store_type: "local".to_string(),
            conn: "/tmp".to_string(),
            bucket: None,
            rules: vec![FileRule {
                name: "broken".to_string(),
                prefix: "no-slash".to_string(),
                rule: "allow".to_string(),
                operations: Vec::new(),
            }],
        };
        assert!(
            module
                .apply(&project(config), &Config::default())
                .await
                .is_err()
        );
        assert!(module.current_config().await.rules.is_empty());
    }

    #[tokio::test]
    async fn rules_filter_by_name() {
        let module = FileStoreModule::new();
        let rule = |name: &str| FileRule {
            name: name.to_string(),
            prefix: "/".to_string(),
            rule: "allow".to_string(),
            operations: Vec::new(),
        };
        let config = FileStoreConfig {
            enabled: false,
            store_type: "local".to_string(),
            conn: String::new(),
            bucket: None,
            rules: vec![rule("a"), rule("b")],
        };
        module
            .apply(&project(config), &Config::default())
            .await
            .expect("apply");

        assert_eq!(module.rules("").await.len(), 2);
        let filtered = module.rules("b").await;
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].name, "b");
    }

    #[tokio::test]
    async fn state_probe_checks_local_root() {
        let module = FileStoreModule::new();
        assert!(module.get_state().await.is_err(), "disabled store");

        let dir = tempfile::tempdir().expect("tempdir");
        let config = FileStoreConfig {
            enabled: true,
            store_type: "local".to_string(),
            conn: dir.path().display().to_string(),
            bucket: None,
            rules: Vec::new(),
        };
        module
            .apply(&project(config), &Config::default())
            .await
            .expect("apply");
        assert!(module.get_state().await.is_ok());
    }
}
