//! Durable, versioned storage for the authoritative configuration document.
//!
//! The store is the single serialization point for configuration writes:
//! concurrent writers race on the expected version and only one wins per
//! compare-and-swap round. Every successful swap bumps the version by exactly
//! one and is flushed to disk before the call returns success.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};
use crate::model::Config;
use crate::validate::validate_project_id;

/// Versioned store owning the authoritative [`Config`].
pub struct ConfigStore {
    current: Mutex<Arc<Config>>,
    path: Option<PathBuf>,
}

impl ConfigStore {
    /// Construct a store without disk persistence (tests, embedded use).
    #[must_use]
    pub fn in_memory(initial: Config) -> Self {
        Self {
            current: Mutex::new(Arc::new(initial)),
            path: None,
        }
    }

    /// Load the persisted configuration document from `path`.
    ///
    /// A missing file yields an empty document at version 0; it is persisted
    /// on the first successful write.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        let config = match fs::read_to_string(&path).await {
            Ok(raw) => {
                let config: Config =
                    serde_yaml::from_str(&raw).map_err(|source| ConfigError::Serde {
                        operation: "store.load.parse",
                        source,
                    })?;
                for project in &config.projects {
                    validate_project_id(&project.id)?;
                }
                info!(
                    path = %path.display(),
                    version = config.version,
                    projects = config.projects.len(),
                    "loaded configuration document"
                );
                config
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no configuration document; starting empty");
                Config::default()
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    operation: "store.load.read",
                    source,
                });
            }
        };

        Ok(Self {
            current: Mutex::new(Arc::new(config)),
            path: Some(path),
        })
    }

    /// Read the current document and its version.
    pub async fn read(&self) -> (Arc<Config>, u64) {
        let guard = self.current.lock().await;
        let config = Arc::clone(&guard);
        let version = config.version;
        (config, version)
    }

    /// Replace the document if `expected_version` still matches, bumping the
    /// version by exactly one and flushing to disk before acknowledging.
    ///
    /// # Errors
    ///
    /// Returns `VersionConflict` when `expected_version` is stale, or an IO /
    /// serialization error if the flush fails (the in-memory document is left
    /// unchanged in that case).
    pub async fn compare_and_swap(
        &self,
        expected_version: u64,
        mut new_config: Config,
    ) -> ConfigResult<Arc<Config>> {
        let mut guard = self.current.lock().await;
        if guard.version != expected_version {
            return Err(ConfigError::VersionConflict {
                expected: expected_version,
                actual: guard.version,
            });
        }

        new_config.version = expected_version + 1;
        self.persist(&new_config).await?;

        let published = Arc::new(new_config);
        *guard = Arc::clone(&published);
        debug!(version = published.version, "configuration swapped");
        Ok(published)
    }

    /// Install a full snapshot regardless of the local version, flushing it
    /// to disk first. Used when adopting a newer document from a peer.
    ///
    /// # Errors
    ///
    /// Returns an IO / serialization error if the flush fails.
    pub async fn install_snapshot(&self, snapshot: Config) -> ConfigResult<Arc<Config>> {
        let mut guard = self.current.lock().await;
        self.persist(&snapshot).await?;
        let published = Arc::new(snapshot);
        *guard = Arc::clone(&published);
        info!(version = published.version, "configuration snapshot installed");
        Ok(published)
    }

    async fn persist(&self, config: &Config) -> ConfigResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let encoded = serde_yaml::to_string(config).map_err(|source| ConfigError::Serde {
            operation: "store.persist.encode",
            source,
        })?;

        // Write-then-rename so a crash mid-flush never truncates the document.
        let tmp = path.with_extension("yaml.tmp");
        fs::write(&tmp, encoded.as_bytes())
            .await
            .map_err(|source| ConfigError::Io {
                operation: "store.persist.write",
                source,
            })?;
        fs::rename(&tmp, path)
            .await
            .map_err(|source| ConfigError::Io {
                operation: "store.persist.rename",
                source,
            })?;
        Ok(())
    }
}
