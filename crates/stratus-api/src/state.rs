//! Shared handler state.

use std::sync::Arc;

use stratus_config::AdminGate;
use stratus_modules::FileStoreModule;
use stratus_sync::SyncManager;
use stratus_telemetry::Metrics;

/// State threaded through every route.
pub struct ApiState {
    pub gate: Arc<AdminGate>,
    pub sync: Arc<SyncManager>,
    pub filestore: Arc<FileStoreModule>,
    pub metrics: Metrics,
}

impl ApiState {
    #[must_use]
    pub fn new(
        gate: Arc<AdminGate>,
        sync: Arc<SyncManager>,
        filestore: Arc<FileStoreModule>,
        metrics: Metrics,
    ) -> Arc<Self> {
        Arc::new(Self {
            gate,
            sync,
            filestore,
            metrics,
        })
    }
}
