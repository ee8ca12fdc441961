//! Background convergence loop.
//!
//! Broadcast delivery is best-effort, so every node periodically compares
//! its version against reachable peers and pulls a full snapshot when it is
//! behind. This is what makes eventual convergence safe despite dropped
//! deliveries.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::warn;

use crate::manager::SyncManager;

/// Default cadence for reconciliation passes.
pub const RECONCILE_INTERVAL: Duration = Duration::from_secs(15);

/// Periodic snapshot-pull loop over a [`SyncManager`].
pub struct Reconciler {
    manager: Arc<SyncManager>,
    cadence: Duration,
}

impl Reconciler {
    #[must_use]
    pub fn new(manager: Arc<SyncManager>) -> Self {
        Self {
            manager,
            cadence: RECONCILE_INTERVAL,
        }
    }

    /// Override the reconciliation cadence.
    #[must_use]
    pub fn with_cadence(mut self, cadence: Duration) -> Self {
        self.cadence = cadence;
        self
    }

    /// Spawn the loop; it runs for the lifetime of the process.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.cadence);
            loop {
                ticker.tick().await;
                if let Err(err) = self.manager.reconcile_once().await {
                    warn!(error = %err, "reconciliation pass failed");
                }
            }
        })
    }
}
