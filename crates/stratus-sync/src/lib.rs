//! Cluster configuration synchronization for the Stratus gateway.
//!
//! Layout: `registry.rs` (cluster membership and liveness), `transport.rs`
//! (the pluggable peer replication seam plus the HTTP and in-memory
//! backends), `propagate.rs` (best-effort broadcast fan-out), `reconcile.rs`
//! (background convergence loop), `manager.rs` (`SyncManager`, the
//! administrative mutation surface every node exposes).

pub mod error;
pub mod manager;
pub mod propagate;
pub mod reconcile;
pub mod registry;
pub mod transport;

pub use error::{SyncError, SyncResult};
pub use manager::{SyncManager, SyncManagerDeps};
pub use propagate::ChangePropagator;
pub use reconcile::Reconciler;
pub use registry::{ClusterNode, ClusterRegistry, HEARTBEAT_INTERVAL, LIVENESS_MISSES};
pub use transport::{
    HeartbeatPing, HttpPeerTransport, JoinRequest, MemoryCluster, MemoryTransport, NodeIdentity,
    PeerTransport,
};
