//! The sync manager: every node's administrative mutation surface.
//!
//! Writes follow one template: read the current document, apply the edit to
//! the addressed project, publish through compare-and-swap (bounded retry),
//! arm the local modules, and fan the delta out to peers in the background.
//! The administrative caller sees success once the local node runs the new
//! configuration; cluster-wide convergence is asynchronous.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info, warn};

use stratus_config::{
    Config, ConfigDelta, ConfigError, ConfigStore, DeltaPayload, FileRule, FileStoreConfig,
    Project, validate_file_rule, validate_file_store,
};
use stratus_events::{Event, EventBus};
use stratus_modules::Coordinator;
use stratus_telemetry::Metrics;

use crate::error::{SyncError, SyncResult};
use crate::propagate::ChangePropagator;
use crate::registry::{ClusterRegistry, HEARTBEAT_INTERVAL};
use crate::transport::{HeartbeatPing, JoinRequest, NodeIdentity, PeerTransport};

/// Compare-and-swap rounds attempted before surfacing a conflict.
const CAS_ATTEMPTS: u32 = 3;

/// Dependencies required to assemble a [`SyncManager`].
pub struct SyncManagerDeps {
    pub node_id: String,
    pub advertise_addr: String,
    pub bootstrap_peers: Vec<String>,
    pub store: Arc<ConfigStore>,
    pub coordinator: Arc<Coordinator>,
    pub transport: Arc<dyn PeerTransport>,
    pub bus: EventBus,
    pub metrics: Metrics,
}

/// Node-local synchronization manager.
pub struct SyncManager {
    node_id: String,
    advertise_addr: String,
    bootstrap_peers: Vec<String>,
    store: Arc<ConfigStore>,
    coordinator: Arc<Coordinator>,
    transport: Arc<dyn PeerTransport>,
    registry: Arc<ClusterRegistry>,
    propagator: Arc<ChangePropagator>,
    bus: EventBus,
    metrics: Metrics,
    last_alive: Mutex<HashSet<String>>,
}

impl SyncManager {
    /// Assemble a manager from its dependencies.
    #[must_use]
    pub fn new(deps: SyncManagerDeps) -> Arc<Self> {
        let registry = Arc::new(ClusterRegistry::new(deps.node_id.clone()));
        let propagator = Arc::new(ChangePropagator::new(
            Arc::clone(&deps.transport),
            Arc::clone(&registry),
            deps.metrics.clone(),
        ));
        Arc::new(Self {
            node_id: deps.node_id,
            advertise_addr: deps.advertise_addr,
            bootstrap_peers: deps.bootstrap_peers,
            store: deps.store,
            coordinator: deps.coordinator,
            transport: deps.transport,
            registry,
            propagator,
            bus: deps.bus,
            metrics: deps.metrics,
            last_alive: Mutex::new(HashSet::new()),
        })
    }

    /// Identifier of the node this manager runs on.
    #[must_use]
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Cluster membership view.
    #[must_use]
    pub fn registry(&self) -> &Arc<ClusterRegistry> {
        &self.registry
    }

    /// Arm the local modules with the loaded document and announce this node
    /// to its bootstrap peers. Called once at process start, before the
    /// listener accepts traffic.
    ///
    /// # Errors
    ///
    /// Returns an error if the boot document is rejected by a module.
    pub async fn start(&self) -> SyncResult<()> {
        let (config, version) = self.store.read().await;
        info!(node_id = %self.node_id, version, "arming modules with boot configuration");
        self.apply_local(config).await?;

        let token = self.cluster_token().await;
        let join = JoinRequest {
            node_id: self.node_id.clone(),
            address: self.advertise_addr.clone(),
        };
        for address in &self.bootstrap_peers {
            if address == &self.advertise_addr {
                continue;
            }
            match self.transport.announce_join(address, &token, &join).await {
                Ok(identity) => {
                    self.registry.join(&identity.node_id, &identity.address);
                    let _ = self.bus.publish(Event::MemberJoined {
                        node_id: identity.node_id,
                        address: identity.address,
                    });
                }
                Err(err) => {
                    warn!(peer = %address, error = %err, "join announcement failed");
                }
            }
        }
        self.metrics
            .set_cluster_members(self.registry.members().len() as i64);
        Ok(())
    }

    /// Spawn the periodic heartbeat loop.
    pub fn spawn_heartbeat(self: Arc<Self>) -> JoinHandle<()> {
        let manager = self;
        tokio::spawn(async move {
            let mut ticker = interval(HEARTBEAT_INTERVAL);
            loop {
                ticker.tick().await;
                manager.heartbeat_round().await;
            }
        })
    }

    async fn heartbeat_round(&self) {
        let (_, version) = self.store.read().await;
        let token = self.cluster_token().await;
        let ping = HeartbeatPing {
            node_id: self.node_id.clone(),
            address: self.advertise_addr.clone(),
            version,
        };

        for address in self.heartbeat_targets() {
            if let Err(err) = self.transport.send_heartbeat(&address, &token, &ping).await {
                self.metrics.inc_heartbeat_miss(&address);
                debug!(peer = %address, error = %err, "heartbeat failed");
            }
        }

        self.note_liveness_transitions();
        self.metrics
            .set_cluster_members(self.registry.members().len() as i64);
    }

    fn heartbeat_targets(&self) -> Vec<String> {
        let mut targets: Vec<String> = self
            .registry
            .members()
            .into_iter()
            .map(|node| node.address)
            .chain(self.bootstrap_peers.iter().cloned())
            .filter(|address| address != &self.advertise_addr)
            .collect();
        targets.sort();
        targets.dedup();
        targets
    }

    fn note_liveness_transitions(&self) {
        let alive: HashSet<String> = self
            .registry
            .alive_members()
            .into_iter()
            .map(|node| node.node_id)
            .collect();
        let mut guard = self
            .last_alive
            .lock()
            .unwrap_or_else(|err| panic!("liveness set lock poisoned: {err}"));
        for node_id in guard.difference(&alive) {
            warn!(peer = %node_id, "peer missed its liveness window");
            let _ = self.bus.publish(Event::MemberUnreachable {
                node_id: node_id.clone(),
            });
        }
        *guard = alive;
    }

    /// Record a heartbeat received from a peer.
    pub fn handle_heartbeat(&self, ping: &HeartbeatPing) {
        let known = self.registry.is_alive(&ping.node_id);
        self.registry.heartbeat(&ping.node_id, &ping.address);
        if !known {
            let _ = self.bus.publish(Event::MemberJoined {
                node_id: ping.node_id.clone(),
                address: ping.address.clone(),
            });
        }
    }

    /// Register a joining peer and reveal the local identity.
    pub fn handle_join(&self, join: &JoinRequest) -> NodeIdentity {
        self.registry.join(&join.node_id, &join.address);
        let _ = self.bus.publish(Event::MemberJoined {
            node_id: join.node_id.clone(),
            address: join.address.clone(),
        });
        NodeIdentity {
            node_id: self.node_id.clone(),
            address: self.advertise_addr.clone(),
        }
    }

    /// The node-local document and its version.
    pub async fn local_snapshot(&self) -> (Arc<Config>, u64) {
        self.store.read().await
    }

    /// Replace a project's file-store configuration.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a malformed payload, `ProjectNotFound` for an
    /// unknown project, `Conflict` when retries are exhausted, or
    /// `ApplyAborted` when a local module rejects the published document.
    pub async fn set_file_store(
        &self,
        project_id: &str,
        value: FileStoreConfig,
    ) -> SyncResult<()> {
        validate_file_store(&value).map_err(|source| SyncError::Validation { source })?;
        self.mutate_project(project_id, "file store replaced", move |project| {
            project.modules.file_store = value.clone();
            Ok(())
        })
        .await
    }

    /// Insert or replace a file rule by name. Rule identity is
    /// `(project, name)`; a second write with the same name replaces the
    /// prior rule entirely.
    ///
    /// # Errors
    ///
    /// Same failure surface as [`SyncManager::set_file_store`].
    pub async fn set_file_rule(
        &self,
        project_id: &str,
        rule_name: &str,
        mut rule: FileRule,
    ) -> SyncResult<()> {
        rule.name = rule_name.to_string();
        validate_file_rule(&rule).map_err(|source| SyncError::Validation { source })?;
        self.mutate_project(project_id, "file rule upserted", move |project| {
            let rules = &mut project.modules.file_store.rules;
            if let Some(existing) = rules.iter_mut().find(|r| r.name == rule.name) {
                *existing = rule.clone();
            } else {
                rules.push(rule.clone());
            }
            Ok(())
        })
        .await
    }

    /// Delete a file rule by name. Deleting an absent rule succeeds, keeping
    /// the operation idempotent.
    ///
    /// # Errors
    ///
    /// Same failure surface as [`SyncManager::set_file_store`].
    pub async fn set_delete_file_rule(
        &self,
        project_id: &str,
        rule_name: &str,
    ) -> SyncResult<()> {
        let rule_name = rule_name.to_string();
        self.mutate_project(project_id, "file rule deleted", move |project| {
            project
                .modules
                .file_store
                .rules
                .retain(|rule| rule.name != rule_name);
            Ok(())
        })
        .await
    }

    /// The addressed project's file-store configuration, served from the
    /// node-local snapshot.
    ///
    /// # Errors
    ///
    /// Returns `ProjectNotFound` for an unknown project.
    pub async fn get_file_store_config(&self, project_id: &str) -> SyncResult<FileStoreConfig> {
        let (config, _) = self.store.read().await;
        config
            .project(project_id)
            .map(|project| project.modules.file_store.clone())
            .ok_or_else(|| SyncError::ProjectNotFound {
                project_id: project_id.to_string(),
            })
    }

    /// File rules for a project, optionally filtered by rule name. An empty
    /// filter returns every rule.
    ///
    /// # Errors
    ///
    /// Returns `ProjectNotFound` for an unknown project.
    pub async fn get_file_store_rules(
        &self,
        project_id: &str,
        name_filter: &str,
    ) -> SyncResult<Vec<FileRule>> {
        let config = self.get_file_store_config(project_id).await?;
        Ok(config
            .rules
            .into_iter()
            .filter(|rule| name_filter.is_empty() || rule.name == name_filter)
            .collect())
    }

    /// Ingest a delta broadcast by a peer.
    ///
    /// Redelivery of an already-held version is a no-op. A delta whose base
    /// does not match the local version is rejected so the sender (and this
    /// node's reconciliation loop) fall back to a full snapshot. A module
    /// rejection during the local apply is logged and counted, never
    /// surfaced to the originating node.
    ///
    /// # Errors
    ///
    /// Returns `DeltaBaseMismatch` on a version mismatch or `Store` when the
    /// flush fails.
    pub async fn apply_delta(&self, delta: ConfigDelta) -> SyncResult<u64> {
        let (current, local_version) = self.store.read().await;
        if delta.version <= local_version {
            debug!(
                delta_version = delta.version,
                local_version, "delta already incorporated"
            );
            return Ok(local_version);
        }
        if delta.base_version != local_version {
            return Err(SyncError::DeltaBaseMismatch {
                base_version: delta.base_version,
                local_version,
            });
        }

        let mut next = match delta.payload {
            DeltaPayload::Full { config } => config,
            DeltaPayload::Project {
                project_id,
                modules,
            } => {
                let mut next = (*current).clone();
                let Some(project) = next.project_mut(&project_id) else {
                    return Err(SyncError::DeltaBaseMismatch {
                        base_version: delta.base_version,
                        local_version,
                    });
                };
                project.modules = *modules;
                next
            }
        };
        next.version = delta.version;

        let published = self
            .store
            .install_snapshot(next)
            .await
            .map_err(|source| SyncError::Store {
                operation: "sync.apply_delta.install",
                source,
            })?;
        info!(
            origin = %delta.origin,
            version = delta.version,
            "delta accepted from peer"
        );

        if let Err(err) = self.apply_local(published).await {
            warn!(
                version = delta.version,
                error = %err,
                "module rejected peer delta; node left mixed until next apply"
            );
        }
        Ok(delta.version)
    }

    /// Adopt a full snapshot pulled from a peer if it is strictly newer.
    ///
    /// # Errors
    ///
    /// Returns `Store` when the flush fails.
    pub async fn adopt_snapshot(&self, snapshot: Config) -> SyncResult<bool> {
        let (_, local_version) = self.store.read().await;
        if snapshot.version <= local_version {
            return Ok(false);
        }

        let version = snapshot.version;
        let published =
            self.store
                .install_snapshot(snapshot)
                .await
                .map_err(|source| SyncError::Store {
                    operation: "sync.adopt_snapshot.install",
                    source,
                })?;
        self.metrics.inc_reconciliation_pull();
        info!(version, "adopted newer snapshot from peer");

        if let Err(err) = self.apply_local(published).await {
            warn!(
                version,
                error = %err,
                "module rejected reconciled snapshot; node left mixed until next apply"
            );
        }
        Ok(true)
    }

    /// One reconciliation pass: pull snapshots from reachable peers and adopt
    /// the newest if it is ahead of the local version.
    ///
    /// # Errors
    ///
    /// Returns `Store` when adopting a snapshot fails to flush.
    pub async fn reconcile_once(&self) -> SyncResult<bool> {
        let (_, local_version) = self.store.read().await;
        let token = self.cluster_token().await;

        let mut best: Option<Config> = None;
        for address in self.reconcile_targets() {
            match self.transport.fetch_snapshot(&address, &token).await {
                Ok(snapshot) => {
                    let best_version = best.as_ref().map_or(local_version, |b| b.version);
                    if snapshot.version > best_version {
                        best = Some(snapshot);
                    }
                }
                Err(err) => {
                    debug!(peer = %address, error = %err, "snapshot fetch failed");
                }
            }
        }

        match best {
            Some(snapshot) => self.adopt_snapshot(snapshot).await,
            None => Ok(false),
        }
    }

    fn reconcile_targets(&self) -> Vec<String> {
        let mut targets: Vec<String> = self
            .registry
            .alive_members()
            .into_iter()
            .map(|node| node.address)
            .chain(self.bootstrap_peers.iter().cloned())
            .filter(|address| address != &self.advertise_addr)
            .collect();
        targets.sort();
        targets.dedup();
        targets
    }

    async fn mutate_project<F>(
        &self,
        project_id: &str,
        description: &'static str,
        mutate: F,
    ) -> SyncResult<()>
    where
        F: Fn(&mut Project) -> SyncResult<()>,
    {
        for _attempt in 0..CAS_ATTEMPTS {
            let (current, version) = self.store.read().await;
            let mut next = (*current).clone();
            let Some(project) = next.project_mut(project_id) else {
                return Err(SyncError::ProjectNotFound {
                    project_id: project_id.to_string(),
                });
            };
            mutate(project)?;

            match self.store.compare_and_swap(version, next).await {
                Ok(published) => {
                    return self.publish(published, project_id, description).await;
                }
                Err(ConfigError::VersionConflict { .. }) => {
                    self.metrics.inc_cas_conflict();
                    continue;
                }
                Err(source) => {
                    return Err(SyncError::Store {
                        operation: "sync.mutate.cas",
                        source,
                    });
                }
            }
        }
        Err(SyncError::Conflict {
            attempts: CAS_ATTEMPTS,
        })
    }

    /// Arm the local modules with `published` and fan the change out to the
    /// cluster in the background, detached from the caller's lifetime.
    async fn publish(
        &self,
        published: Arc<Config>,
        project_id: &str,
        description: &'static str,
    ) -> SyncResult<()> {
        self.apply_local(Arc::clone(&published)).await?;
        let _ = self.bus.publish(Event::ConfigChanged {
            project_id: project_id.to_string(),
            description: description.to_string(),
        });

        let Some(project) = published.project(project_id) else {
            return Ok(());
        };
        let delta = ConfigDelta {
            base_version: published.version - 1,
            version: published.version,
            origin: self.node_id.clone(),
            payload: DeltaPayload::Project {
                project_id: project.id.clone(),
                modules: Box::new(project.modules.clone()),
            },
        };

        let token = published.admin.secret.clone();
        let propagator = Arc::clone(&self.propagator);
        tokio::spawn(async move {
            let results = propagator.broadcast(&token, &delta).await;
            let failed = results.iter().filter(|(_, r)| r.is_err()).count();
            if failed > 0 {
                warn!(
                    version = delta.version,
                    failed,
                    total = results.len(),
                    "broadcast finished with failures; reconciliation will heal"
                );
            }
        });
        Ok(())
    }

    async fn apply_local(&self, config: Arc<Config>) -> SyncResult<()> {
        let version = config.version;
        let started = Instant::now();
        match self.coordinator.apply(config).await {
            Ok(_) => {
                self.metrics.observe_config_apply_latency(started.elapsed());
                self.metrics.set_config_version(version as i64);
                Ok(())
            }
            Err(err) => {
                self.metrics.inc_config_apply_abort();
                Err(err.into())
            }
        }
    }

    async fn cluster_token(&self) -> String {
        let (config, _) = self.store.read().await;
        config.admin.secret.clone()
    }
}
