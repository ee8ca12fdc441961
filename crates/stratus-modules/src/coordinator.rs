//! Atomic reconfiguration coordinator.
//!
//! Pushes a configuration snapshot into every module in a declared dependency
//! order. The cycle aborts on the first module rejection and deliberately
//! does not roll back modules that already adopted the new sub-config: the
//! node is left mixed-version and the next valid snapshot re-arms everything.
//! Applies are serialized; while one cycle runs, at most one snapshot waits
//! in a supersede slot and a newer arrival replaces an older waiter.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Instant;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use stratus_config::{Config, ConfigError};
use stratus_events::{Event, EventBus};

use crate::sink::ModuleSink;

/// Error produced by an apply cycle.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// A module rejected its sub-config; the cycle stopped there.
    #[error("apply aborted by module rejection")]
    Aborted {
        /// Module that rejected the snapshot.
        module: &'static str,
        /// Version of the rejected snapshot.
        version: u64,
        /// Underlying validation failure.
        source: ConfigError,
    },
}

/// Result of a successful `apply` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The snapshot (or a newer one that superseded it) is now armed.
    Applied {
        /// Version that ended up armed.
        version: u64,
    },
    /// A newer snapshot replaced this one before its cycle started.
    Superseded,
}

/// Serialized, ordered module reconfiguration.
pub struct Coordinator {
    sinks: Vec<Arc<dyn ModuleSink>>,
    bus: EventBus,
    serial: Mutex<()>,
    pending: StdMutex<Option<Arc<Config>>>,
}

impl Coordinator {
    /// Build a coordinator over modules in their declared dependency order.
    #[must_use]
    pub fn new(sinks: Vec<Arc<dyn ModuleSink>>, bus: EventBus) -> Self {
        Self {
            sinks,
            bus,
            serial: Mutex::new(()),
            pending: StdMutex::new(None),
        }
    }

    /// Declared module order, for logs and diagnostics.
    #[must_use]
    pub fn module_order(&self) -> Vec<&'static str> {
        self.sinks.iter().map(|sink| sink.name()).collect()
    }

    /// Apply a configuration snapshot to every module in order.
    ///
    /// Concurrent calls are serialized. A snapshot that is waiting for the
    /// in-flight cycle to finish is replaced by any newer arrival; the caller
    /// whose snapshot was replaced observes [`ApplyOutcome::Superseded`].
    ///
    /// # Errors
    ///
    /// Returns [`ApplyError::Aborted`] when a module rejects its sub-config.
    /// Modules armed earlier in the cycle keep the new snapshot.
    pub async fn apply(&self, config: Arc<Config>) -> Result<ApplyOutcome, ApplyError> {
        {
            let mut pending = self.pending.lock().expect("pending slot lock poisoned");
            match pending.as_ref() {
                Some(queued) if queued.version > config.version => {
                    // A newer snapshot is already queued; this one is stale.
                    return Ok(ApplyOutcome::Superseded);
                }
                _ => *pending = Some(Arc::clone(&config)),
            }
        }

        let _cycle = self.serial.lock().await;
        let next = self
            .pending
            .lock()
            .expect("pending slot lock poisoned")
            .take();
        let Some(next) = next else {
            // Another caller's cycle consumed the slot, which held a snapshot
            // at least as new as ours.
            return Ok(ApplyOutcome::Superseded);
        };

        self.run_cycle(&next).await?;
        Ok(ApplyOutcome::Applied {
            version: next.version,
        })
    }

    async fn run_cycle(&self, config: &Config) -> Result<(), ApplyError> {
        let started = Instant::now();

        // Validating: nothing to arm without a project, mirroring a fresh
        // node that has not been seeded yet.
        let Some(project) = config.projects.first() else {
            info!(version = config.version, "no projects in snapshot; modules untouched");
            return Ok(());
        };

        for sink in &self.sinks {
            if let Err(source) = sink.apply(project, config).await {
                error!(
                    module = sink.name(),
                    version = config.version,
                    error = %source,
                    "module rejected configuration; aborting apply cycle"
                );
                let _ = self.bus.publish(Event::ConfigApplyAborted {
                    version: config.version,
                    module: sink.name().to_string(),
                    message: source.to_string(),
                });
                return Err(ApplyError::Aborted {
                    module: sink.name(),
                    version: config.version,
                    source,
                });
            }
        }

        let elapsed = started.elapsed();
        if elapsed.as_millis() > 1_000 {
            warn!(
                version = config.version,
                elapsed_ms = elapsed.as_millis() as u64,
                "apply cycle ran long"
            );
        }
        info!(
            version = config.version,
            project_id = %project.id,
            modules = self.sinks.len(),
            "configuration applied"
        );
        let _ = self.bus.publish(Event::ConfigApplied {
            version: config.version,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use stratus_config::{ConfigResult, Project};
    use tokio::time::sleep;

    struct RecordingSink {
        name: &'static str,
        log: Arc<Mutex<Vec<(&'static str, u64)>>>,
        armed_version: Mutex<Option<u64>>,
        delay: Option<Duration>,
        reject_version: Option<u64>,
    }

    impl RecordingSink {
        fn new(name: &'static str, log: Arc<Mutex<Vec<(&'static str, u64)>>>) -> Arc<Self> {
            Arc::new(Self {
                name,
                log,
                armed_version: Mutex::new(None),
                delay: None,
                reject_version: None,
            })
        }

        fn rejecting(
            name: &'static str,
            log: Arc<Mutex<Vec<(&'static str, u64)>>>,
            version: u64,
        ) -> Arc<Self> {
            Arc::new(Self {
                name,
                log,
                armed_version: Mutex::new(None),
                delay: None,
                reject_version: Some(version),
            })
        }

        fn slow(
            name: &'static str,
            log: Arc<Mutex<Vec<(&'static str, u64)>>>,
            delay: Duration,
        ) -> Arc<Self> {
            Arc::new(Self {
                name,
                log,
                armed_version: Mutex::new(None),
                delay: Some(delay),
                reject_version: None,
            })
        }

        fn armed(&self) -> Option<u64> {
            *self.armed_version.lock().unwrap()
        }
    }

    #[async_trait]
    impl ModuleSink for RecordingSink {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn apply(&self, _project: &Project, config: &Config) -> ConfigResult<()> {
            if let Some(delay) = self.delay {
                sleep(delay).await;
            }
            if self.reject_version == Some(config.version) {
                return Err(ConfigError::InvalidField {
                    section: "test",
                    field: self.name.to_string(),
                    value: None,
                    reason: "rejected by test sink",
                });
            }
            self.log.lock().unwrap().push((self.name, config.version));
            *self.armed_version.lock().unwrap() = Some(config.version);
            Ok(())
        }
    }

    fn snapshot(version: u64) -> Arc<Config> {
        Arc::new(Config {
            version,
            projects: vec![Project {
                id: "p1".to_string(),
                ..Project::default()
            }],
            ..Config::default()
        })
    }

    #[tokio::test]
    async fn modules_apply_in_declared_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sinks: Vec<Arc<dyn ModuleSink>> = vec![
            RecordingSink::new("crud", log.clone()),
            RecordingSink::new("auth", log.clone()),
            RecordingSink::new("filestore", log.clone()),
        ];
        let coordinator = Coordinator::new(sinks, EventBus::with_capacity(8));

        let outcome = coordinator.apply(snapshot(1)).await.expect("apply");
        assert_eq!(outcome, ApplyOutcome::Applied { version: 1 });
        assert_eq!(
            log.lock().unwrap().clone(),
            vec![("crud", 1), ("auth", 1), ("filestore", 1)]
        );
        assert_eq!(
            coordinator.module_order(),
            vec!["crud", "auth", "filestore"]
        );
    }

    #[tokio::test]
    async fn abort_leaves_earlier_modules_on_the_new_version() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let first = RecordingSink::new("crud", log.clone());
        let second = RecordingSink::new("auth", log.clone());
        let rejecting = RecordingSink::rejecting("filestore", log.clone(), 2);
        let last = RecordingSink::new("eventing", log.clone());
        let bus = EventBus::with_capacity(8);
        let coordinator = Coordinator::new(
            vec![
                first.clone(),
                second.clone(),
                rejecting.clone(),
                last.clone(),
            ],
            bus.clone(),
        );

        coordinator.apply(snapshot(1)).await.expect("seed apply");
        let mut stream = bus.subscribe(bus.last_event_id());

        let err = coordinator
            .apply(snapshot(2))
            .await
            .expect_err("rejection must abort");
        let ApplyError::Aborted {
            module, version, ..
        } = err;
        assert_eq!(module, "filestore");
        assert_eq!(version, 2);

        // Modules before the rejection carry the new version, the rejecting
        // module and everything after it keep the old one.
        assert_eq!(first.armed(), Some(2));
        assert_eq!(second.armed(), Some(2));
        assert_eq!(rejecting.armed(), Some(1));
        assert_eq!(last.armed(), Some(1));

        let event = stream.next().await.expect("abort event");
        assert_eq!(event.event.kind(), "config_apply_aborted");

        // A later valid snapshot self-heals the mixed state.
        coordinator.apply(snapshot(3)).await.expect("healing apply");
        assert_eq!(rejecting.armed(), Some(3));
        assert_eq!(last.armed(), Some(3));
    }

    #[tokio::test]
    async fn queued_snapshot_is_superseded_by_a_newer_one() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let slow = RecordingSink::slow("crud", log.clone(), Duration::from_millis(100));
        let coordinator = Arc::new(Coordinator::new(
            vec![slow.clone()],
            EventBus::with_capacity(8),
        ));

        let first = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.apply(snapshot(1)).await })
        };
        sleep(Duration::from_millis(20)).await;

        // Both queue while version 1 is still applying; version 3 replaces
        // version 2 in the supersede slot.
        let second = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.apply(snapshot(2)).await })
        };
        sleep(Duration::from_millis(10)).await;
        let third = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.apply(snapshot(3)).await })
        };

        let first = first.await.unwrap().expect("first apply");
        let second = second.await.unwrap().expect("second apply");
        let third = third.await.unwrap().expect("third apply");

        assert_eq!(first, ApplyOutcome::Applied { version: 1 });
        let applied_versions: Vec<u64> =
            log.lock().unwrap().iter().map(|(_, v)| *v).collect();
        assert!(
            !applied_versions.contains(&2),
            "superseded snapshot must never arm modules: {applied_versions:?}"
        );
        assert!(applied_versions.contains(&3));
        assert!(
            second == ApplyOutcome::Superseded || third == ApplyOutcome::Superseded,
            "one of the queued applies must be superseded"
        );
    }

    #[tokio::test]
    async fn empty_document_applies_without_touching_modules() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = RecordingSink::new("crud", log.clone());
        let coordinator = Coordinator::new(vec![sink], EventBus::with_capacity(8));

        let outcome = coordinator
            .apply(Arc::new(Config::default()))
            .await
            .expect("apply");
        assert_eq!(outcome, ApplyOutcome::Applied { version: 0 });
        assert!(log.lock().unwrap().is_empty());
    }
}
