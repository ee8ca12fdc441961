//! Pluggable peer replication seam.
//!
//! The default backend speaks JSON over HTTP to the cluster-internal routes
//! every node exposes; the in-memory backend wires managers together
//! directly and can drop deliveries on demand, which is how the convergence
//! tests simulate lost broadcasts. Swapping in a consensus-backed transport
//! only requires implementing [`PeerTransport`].

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use stratus_config::{Config, ConfigDelta};

use crate::error::{SyncError, SyncResult};
use crate::manager::SyncManager;

/// Identity a node reveals when another node joins through it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeIdentity {
    pub node_id: String,
    pub address: String,
}

/// Liveness ping exchanged between peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatPing {
    pub node_id: String,
    pub address: String,
    /// Version the sender currently holds, advertised for diagnostics.
    pub version: u64,
}

/// Join announcement sent to bootstrap peers at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRequest {
    pub node_id: String,
    pub address: String,
}

/// Transport used to reach cluster peers.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Deliver a config delta to `address` and wait for acknowledgement.
    async fn send_delta(&self, address: &str, token: &str, delta: &ConfigDelta) -> SyncResult<()>;

    /// Deliver a liveness ping to `address`.
    async fn send_heartbeat(
        &self,
        address: &str,
        token: &str,
        ping: &HeartbeatPing,
    ) -> SyncResult<()>;

    /// Announce this node to `address`, learning the peer's identity.
    async fn announce_join(
        &self,
        address: &str,
        token: &str,
        join: &JoinRequest,
    ) -> SyncResult<NodeIdentity>;

    /// Pull the peer's full configuration snapshot.
    async fn fetch_snapshot(&self, address: &str, token: &str) -> SyncResult<Config>;
}

#[derive(Deserialize)]
struct ResultEnvelope<T> {
    result: T,
}

/// JSON-over-HTTP transport targeting the cluster-internal routes.
pub struct HttpPeerTransport {
    client: reqwest::Client,
}

impl HttpPeerTransport {
    /// Build a transport whose individual requests are bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(timeout: Duration) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| SyncError::PeerHttp {
                operation: "transport.client.build",
                url: String::new(),
                source,
            })?;
        Ok(Self { client })
    }

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        operation: &'static str,
        url: String,
        token: &str,
        body: &B,
    ) -> SyncResult<reqwest::Response> {
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|source| SyncError::PeerHttp {
                operation,
                url: url.clone(),
                source,
            })?;
        if !response.status().is_success() {
            return Err(SyncError::PeerStatus {
                operation,
                url,
                status: response.status().as_u16(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl PeerTransport for HttpPeerTransport {
    async fn send_delta(&self, address: &str, token: &str, delta: &ConfigDelta) -> SyncResult<()> {
        let url = format!("{address}/v1/cluster/config");
        self.post_json("transport.send_delta", url, token, delta)
            .await?;
        Ok(())
    }

    async fn send_heartbeat(
        &self,
        address: &str,
        token: &str,
        ping: &HeartbeatPing,
    ) -> SyncResult<()> {
        let url = format!("{address}/v1/cluster/heartbeat");
        self.post_json("transport.send_heartbeat", url, token, ping)
            .await?;
        Ok(())
    }

    async fn announce_join(
        &self,
        address: &str,
        token: &str,
        join: &JoinRequest,
    ) -> SyncResult<NodeIdentity> {
        let url = format!("{address}/v1/cluster/join");
        let response = self
            .post_json("transport.announce_join", url.clone(), token, join)
            .await?;
        let envelope: ResultEnvelope<NodeIdentity> =
            response
                .json()
                .await
                .map_err(|source| SyncError::PeerHttp {
                    operation: "transport.announce_join.decode",
                    url,
                    source,
                })?;
        Ok(envelope.result)
    }

    async fn fetch_snapshot(&self, address: &str, token: &str) -> SyncResult<Config> {
        let url = format!("{address}/v1/cluster/snapshot");
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|source| SyncError::PeerHttp {
                operation: "transport.fetch_snapshot",
                url: url.clone(),
                source,
            })?;
        if !response.status().is_success() {
            return Err(SyncError::PeerStatus {
                operation: "transport.fetch_snapshot",
                url,
                status: response.status().as_u16(),
            });
        }
        let envelope: ResultEnvelope<Config> =
            response
                .json()
                .await
                .map_err(|source| SyncError::PeerHttp {
                    operation: "transport.fetch_snapshot.decode",
                    url,
                    source,
                })?;
        Ok(envelope.result)
    }
}

/// Shared fabric connecting in-memory managers by address.
#[derive(Default)]
pub struct MemoryCluster {
    nodes: Mutex<HashMap<String, Arc<SyncManager>>>,
    dropping_deltas: Mutex<HashSet<String>>,
}

impl MemoryCluster {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Attach a manager at the given address.
    pub fn register(&self, address: &str, manager: Arc<SyncManager>) {
        self.lock_nodes().insert(address.to_string(), manager);
    }

    /// Start or stop dropping delta deliveries addressed to `address`.
    pub fn set_dropping_deltas(&self, address: &str, dropping: bool) {
        let mut guard = self
            .dropping_deltas
            .lock()
            .unwrap_or_else(|err| panic!("memory cluster lock poisoned: {err}"));
        if dropping {
            guard.insert(address.to_string());
        } else {
            guard.remove(address);
        }
    }

    fn manager(&self, address: &str) -> SyncResult<Arc<SyncManager>> {
        self.lock_nodes()
            .get(address)
            .cloned()
            .ok_or_else(|| SyncError::PeerUnavailable {
                address: address.to_string(),
                reason: "no node registered at address".to_string(),
            })
    }

    fn delta_dropped(&self, address: &str) -> bool {
        self.dropping_deltas
            .lock()
            .unwrap_or_else(|err| panic!("memory cluster lock poisoned: {err}"))
            .contains(address)
    }

    fn lock_nodes(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<SyncManager>>> {
        self.nodes
            .lock()
            .unwrap_or_else(|err| panic!("memory cluster lock poisoned: {err}"))
    }
}

/// Transport that short-circuits to in-process managers.
pub struct MemoryTransport {
    cluster: Arc<MemoryCluster>,
}

impl MemoryTransport {
    #[must_use]
    pub fn new(cluster: Arc<MemoryCluster>) -> Self {
        Self { cluster }
    }
}

#[async_trait]
impl PeerTransport for MemoryTransport {
    async fn send_delta(&self, address: &str, _token: &str, delta: &ConfigDelta) -> SyncResult<()> {
        if self.cluster.delta_dropped(address) {
            return Err(SyncError::PropagationTimeout {
                address: address.to_string(),
            });
        }
        let manager = self.cluster.manager(address)?;
        manager.apply_delta(delta.clone()).await.map(|_| ())
    }

    async fn send_heartbeat(
        &self,
        address: &str,
        _token: &str,
        ping: &HeartbeatPing,
    ) -> SyncResult<()> {
        let manager = self.cluster.manager(address)?;
        manager.handle_heartbeat(ping);
        Ok(())
    }

    async fn announce_join(
        &self,
        address: &str,
        _token: &str,
        join: &JoinRequest,
    ) -> SyncResult<NodeIdentity> {
        let manager = self.cluster.manager(address)?;
        Ok(manager.handle_join(join))
    }

    async fn fetch_snapshot(&self, address: &str, _token: &str) -> SyncResult<Config> {
        let manager = self.cluster.manager(address)?;
        let (config, _) = manager.local_snapshot().await;
        Ok((*config).clone())
    }
}
