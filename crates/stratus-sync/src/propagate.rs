//! Best-effort broadcast of config deltas to live cluster members.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::time::timeout;
use tracing::{debug, warn};

use stratus_config::ConfigDelta;
use stratus_telemetry::Metrics;

use crate::error::{SyncError, SyncResult};
use crate::registry::ClusterRegistry;
use crate::transport::PeerTransport;

/// Default per-peer acknowledgement budget.
pub(crate) const DEFAULT_PEER_TIMEOUT: Duration = Duration::from_secs(5);

/// Fans a validated delta out to every live member, each delivery bounded by
/// its own timeout. A peer that fails to acknowledge is recorded and left to
/// the reconciliation loop; it never blocks the administrative caller.
pub struct ChangePropagator {
    transport: Arc<dyn PeerTransport>,
    registry: Arc<ClusterRegistry>,
    metrics: Metrics,
    peer_timeout: Duration,
}

impl ChangePropagator {
    #[must_use]
    pub fn new(
        transport: Arc<dyn PeerTransport>,
        registry: Arc<ClusterRegistry>,
        metrics: Metrics,
    ) -> Self {
        Self {
            transport,
            registry,
            metrics,
            peer_timeout: DEFAULT_PEER_TIMEOUT,
        }
    }

    /// Override the per-peer acknowledgement budget.
    #[must_use]
    pub fn with_peer_timeout(mut self, peer_timeout: Duration) -> Self {
        self.peer_timeout = peer_timeout;
        self
    }

    /// Broadcast `delta` to every live member, excluding the sender (which
    /// applies locally by direct call). Returns one result per targeted node.
    pub async fn broadcast(
        &self,
        token: &str,
        delta: &ConfigDelta,
    ) -> Vec<(String, SyncResult<()>)> {
        let targets = self.registry.alive_members();
        if targets.is_empty() {
            debug!(version = delta.version, "no live peers to broadcast to");
            return Vec::new();
        }

        let deliveries = targets.into_iter().map(|node| {
            let transport = Arc::clone(&self.transport);
            let peer_timeout = self.peer_timeout;
            async move {
                let outcome = match timeout(
                    peer_timeout,
                    transport.send_delta(&node.address, token, delta),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(SyncError::PropagationTimeout {
                        address: node.address.clone(),
                    }),
                };
                (node.node_id, outcome)
            }
        });

        let results = join_all(deliveries).await;
        for (node_id, outcome) in &results {
            if let Err(err) = outcome {
                self.metrics.inc_propagation_failure(node_id);
                warn!(
                    peer = %node_id,
                    version = delta.version,
                    error = %err,
                    "delta broadcast failed; peer left to reconciliation"
                );
            }
        }
        results
    }
}
