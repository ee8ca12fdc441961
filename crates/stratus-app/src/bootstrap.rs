//! Environment-driven dependency construction and the boot sequence.
//!
//! Boot contract: load the persisted document, arm every module once through
//! the coordinator, announce this node to its bootstrap peers, and only then
//! start accepting HTTP traffic.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use uuid::Uuid;

use stratus_api::{ApiServer, ApiServerDeps};
use stratus_config::{AdminGate, ConfigStore};
use stratus_events::EventBus;
use stratus_sync::{HttpPeerTransport, Reconciler, SyncManager, SyncManagerDeps};
use stratus_telemetry::{LoggingConfig, Metrics};

use crate::composition::assemble_modules;
use crate::error::{AppError, AppResult};

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:4122";
const PEER_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Dependencies required to bootstrap a Stratus node.
pub struct BootstrapDependencies {
    node_id: String,
    config_path: PathBuf,
    http_addr: SocketAddr,
    advertise_addr: String,
    bootstrap_peers: Vec<String>,
}

impl BootstrapDependencies {
    /// Construct production dependencies from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if an environment value fails to parse.
    pub fn from_env() -> AppResult<Self> {
        let node_id = std::env::var("STRATUS_NODE_ID")
            .unwrap_or_else(|_| Uuid::new_v4().to_string());
        let config_path = PathBuf::from(
            std::env::var("STRATUS_CONFIG_PATH")
                .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string()),
        );
        let http_addr_raw = std::env::var("STRATUS_HTTP_ADDR")
            .unwrap_or_else(|_| DEFAULT_HTTP_ADDR.to_string());
        let http_addr: SocketAddr =
            http_addr_raw
                .parse()
                .map_err(|_| AppError::InvalidEnv {
                    name: "STRATUS_HTTP_ADDR",
                    value: http_addr_raw.clone(),
                })?;
        let advertise_addr = std::env::var("STRATUS_ADVERTISE_ADDR")
            .unwrap_or_else(|_| format!("http://127.0.0.1:{}", http_addr.port()));
        let bootstrap_peers = std::env::var("STRATUS_PEERS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|peer| !peer.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            node_id,
            config_path,
            http_addr,
            advertise_addr,
            bootstrap_peers,
        })
    }
}

/// Entry point for the Stratus node boot sequence.
///
/// # Errors
///
/// Returns an error if dependency construction or startup fails.
pub async fn run_app() -> AppResult<()> {
    let dependencies = BootstrapDependencies::from_env()?;
    run_app_with(dependencies).await
}

async fn run_app_with(deps: BootstrapDependencies) -> AppResult<()> {
    stratus_telemetry::init_logging(&LoggingConfig {
        node_id: &deps.node_id,
        ..LoggingConfig::default()
    })
    .map_err(|err| AppError::telemetry("telemetry.init", err))?;

    info!(node_id = %deps.node_id, "stratus node bootstrap starting");

    let metrics = Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
    let bus = EventBus::new();

    let store = Arc::new(
        ConfigStore::load(&deps.config_path)
            .await
            .map_err(|err| AppError::config("store.load", err))?,
    );
    let (boot_config, boot_version) = store.read().await;
    let gate = Arc::new(AdminGate::new(boot_config.admin.clone()));
    info!(version = boot_version, "configuration document loaded");

    let modules = assemble_modules(&deps.node_id, Arc::clone(&gate), &bus).await;

    let transport = Arc::new(
        HttpPeerTransport::new(PEER_REQUEST_TIMEOUT)
            .map_err(|err| AppError::sync("transport.new", err))?,
    );
    let sync = SyncManager::new(SyncManagerDeps {
        node_id: deps.node_id.clone(),
        advertise_addr: deps.advertise_addr.clone(),
        bootstrap_peers: deps.bootstrap_peers.clone(),
        store,
        coordinator: Arc::clone(&modules.coordinator),
        transport,
        bus: bus.clone(),
        metrics: metrics.clone(),
    });

    // Boot-time apply happens before the listener binds; an invalid document
    // keeps the node out of rotation instead of serving half-armed.
    sync.start()
        .await
        .map_err(|err| AppError::sync("sync.start", err))?;
    let _heartbeat = Arc::clone(&sync).spawn_heartbeat();
    let _reconciler = Reconciler::new(Arc::clone(&sync)).spawn();

    let server = ApiServer::new(ApiServerDeps {
        gate,
        sync,
        filestore: modules.filestore,
        metrics,
    });
    server
        .serve(deps.http_addr)
        .await
        .map_err(|err| AppError::api_server("api.serve", err))?;
    Ok(())
}
