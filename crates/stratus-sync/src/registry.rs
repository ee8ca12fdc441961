//! Cluster membership and liveness tracking.
//!
//! Membership is process-lifetime state rebuilt on restart: peers register
//! through join announcements and heartbeats, go unreachable after missed
//! heartbeats, and are never forcibly evicted (avoids flapping during
//! transient partitions).

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Cadence at which every node pings its peers.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(2);

/// Consecutive missed heartbeats before a peer counts as unreachable.
pub const LIVENESS_MISSES: u32 = 3;

/// A registered cluster member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterNode {
    pub node_id: String,
    pub address: String,
    pub last_seen: DateTime<Utc>,
}

/// Tracks the set of live node identifiers and their network addresses.
pub struct ClusterRegistry {
    local_id: String,
    nodes: Mutex<HashMap<String, ClusterNode>>,
}

impl ClusterRegistry {
    /// Construct a registry for the given local node.
    #[must_use]
    pub fn new(local_id: impl Into<String>) -> Self {
        Self {
            local_id: local_id.into(),
            nodes: Mutex::new(HashMap::new()),
        }
    }

    /// Identifier of the node this registry runs on.
    #[must_use]
    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    /// Register a peer or refresh its address. The local node never joins
    /// its own registry.
    pub fn join(&self, node_id: &str, address: &str) {
        if node_id == self.local_id {
            return;
        }
        let mut nodes = self.lock();
        nodes.insert(
            node_id.to_string(),
            ClusterNode {
                node_id: node_id.to_string(),
                address: address.to_string(),
                last_seen: Utc::now(),
            },
        );
    }

    /// Remove a peer that announced a clean departure.
    pub fn leave(&self, node_id: &str) {
        self.lock().remove(node_id);
    }

    /// Refresh a peer's liveness timestamp, registering it if unknown.
    pub fn heartbeat(&self, node_id: &str, address: &str) {
        self.join(node_id, address);
    }

    /// Every registered peer, reachable or not.
    pub fn members(&self) -> Vec<ClusterNode> {
        let mut members: Vec<ClusterNode> = self.lock().values().cloned().collect();
        members.sort_by(|a, b| a.node_id.cmp(&b.node_id));
        members
    }

    /// Peers currently within the liveness window.
    pub fn alive_members(&self) -> Vec<ClusterNode> {
        let cutoff = liveness_cutoff();
        self.members()
            .into_iter()
            .filter(|node| node.last_seen >= cutoff)
            .collect()
    }

    /// Whether the given peer is within the liveness window.
    pub fn is_alive(&self, node_id: &str) -> bool {
        self.lock()
            .get(node_id)
            .is_some_and(|node| node.last_seen >= liveness_cutoff())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ClusterNode>> {
        self.nodes.lock().unwrap_or_else(|err| {
            panic!("cluster registry lock poisoned: {err}");
        })
    }
}

fn liveness_cutoff() -> DateTime<Utc> {
    let window = HEARTBEAT_INTERVAL * LIVENESS_MISSES;
    Utc::now() - chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::seconds(6))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_refresh_and_leave() {
        let registry = ClusterRegistry::new("node-a");
        registry.join("node-b", "http://10.0.0.2:4122");
        registry.join("node-c", "http://10.0.0.3:4122");
        assert_eq!(registry.members().len(), 2);
        assert!(registry.is_alive("node-b"));

        registry.heartbeat("node-b", "http://10.0.0.9:4122");
        let members = registry.members();
        let b = members.iter().find(|n| n.node_id == "node-b").unwrap();
        assert_eq!(b.address, "http://10.0.0.9:4122");

        registry.leave("node-c");
        assert_eq!(registry.members().len(), 1);
        assert!(!registry.is_alive("node-c"));
    }

    #[test]
    fn local_node_never_registers_itself() {
        let registry = ClusterRegistry::new("node-a");
        registry.join("node-a", "http://127.0.0.1:4122");
        registry.heartbeat("node-a", "http://127.0.0.1:4122");
        assert!(registry.members().is_empty());
    }

    #[test]
    fn stale_peers_drop_out_of_the_alive_set_but_stay_registered() {
        let registry = ClusterRegistry::new("node-a");
        registry.join("node-b", "http://10.0.0.2:4122");

        {
            let mut nodes = registry.nodes.lock().unwrap();
            let entry = nodes.get_mut("node-b").unwrap();
            entry.last_seen = Utc::now() - chrono::Duration::seconds(30);
        }

        assert!(!registry.is_alive("node-b"));
        assert!(registry.alive_members().is_empty());
        assert_eq!(registry.members().len(), 1, "no forced eviction");

        registry.heartbeat("node-b", "http://10.0.0.2:4122");
        assert!(registry.is_alive("node-b"));
    }
}
