//! Telemetry primitives shared across the Stratus workspace.
//!
//! This crate centralises logging bootstrap and the Prometheus metrics
//! registry so every node reports the same observability surface regardless
//! of which gateway modules are armed.

pub mod error;

use std::convert::TryFrom;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use serde::Serialize;
use tracing_subscriber::{EnvFilter, fmt};

pub use error::{Result, TelemetryError};

/// Default logging target when `RUST_LOG` is not provided.
const DEFAULT_LOG_LEVEL: &str = "info";

static NODE_ID: OnceCell<String> = OnceCell::new();

/// Configure and install the global tracing subscriber.
///
/// # Errors
///
/// Returns an error if the tracing subscriber cannot be installed (for
/// example, because another subscriber has already been set globally).
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let _ = NODE_ID.set(config.node_id.to_string());

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.level));

    let builder = fmt::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false);

    match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    }
    .map_err(|source| TelemetryError::SubscriberInstall { source })?;

    Ok(())
}

/// Access the node identifier recorded during logging initialisation.
#[must_use]
pub fn node_id() -> &'static str {
    NODE_ID.get().map_or("unknown", String::as_str)
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig<'a> {
    /// Log level string (e.g., `info`, `debug`).
    pub level: &'a str,
    /// Output format selection for the tracing subscriber.
    pub format: LogFormat,
    /// Node identifier recorded in structured logs.
    pub node_id: &'a str,
}

impl Default for LoggingConfig<'_> {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL,
            format: LogFormat::infer(),
            node_id: node_id(),
        }
    }
}

/// Available output formats for the logger.
#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    /// Emit logs as structured JSON objects.
    Json,
    /// Emit human-readable, pretty-printed logs.
    Pretty,
}

impl LogFormat {
    /// Choose a sensible default for the current build.
    #[must_use]
    pub const fn infer() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    http_requests_total: IntCounterVec,
    config_version: IntGauge,
    config_apply_latency_ms: IntGauge,
    config_apply_aborts_total: IntCounter,
    cas_conflicts_total: IntCounter,
    propagation_failures_total: IntCounterVec,
    heartbeat_misses_total: IntCounterVec,
    reconciliation_pulls_total: IntCounter,
    cluster_members: IntGauge,
}

/// Snapshot of selected gauges and counters for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Version of the configuration currently armed on this node.
    pub config_version: i64,
    /// Latest latency (ms) applying a configuration snapshot.
    pub config_apply_latency_ms: i64,
    /// Total aborted apply cycles observed.
    pub config_apply_aborts_total: u64,
    /// Total optimistic-concurrency conflicts observed by the store.
    pub cas_conflicts_total: u64,
    /// Total reconciliation snapshot pulls performed.
    pub reconciliation_pulls_total: u64,
    /// Registered cluster member count.
    pub cluster_members: i64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total HTTP requests received"),
            &["route", "code"],
        )
        .map_err(collector("http_requests_total"))?;
        let config_version = IntGauge::with_opts(Opts::new(
            "config_version",
            "Configuration version currently armed on this node",
        ))
        .map_err(collector("config_version"))?;
        let config_apply_latency_ms = IntGauge::with_opts(Opts::new(
            "config_apply_latency_ms",
            "Time taken to apply a configuration snapshot (ms)",
        ))
        .map_err(collector("config_apply_latency_ms"))?;
        let config_apply_aborts_total = IntCounter::with_opts(Opts::new(
            "config_apply_aborts_total",
            "Apply cycles aborted by a module rejection",
        ))
        .map_err(collector("config_apply_aborts_total"))?;
        let cas_conflicts_total = IntCounter::with_opts(Opts::new(
            "config_cas_conflicts_total",
            "Compare-and-swap version conflicts observed by the store",
        ))
        .map_err(collector("config_cas_conflicts_total"))?;
        let propagation_failures_total = IntCounterVec::new(
            Opts::new(
                "cluster_propagation_failures_total",
                "Broadcast deliveries that failed or timed out, by peer",
            ),
            &["peer"],
        )
        .map_err(collector("cluster_propagation_failures_total"))?;
        let heartbeat_misses_total = IntCounterVec::new(
            Opts::new(
                "cluster_heartbeat_misses_total",
                "Heartbeat deliveries that failed, by peer",
            ),
            &["peer"],
        )
        .map_err(collector("cluster_heartbeat_misses_total"))?;
        let reconciliation_pulls_total = IntCounter::with_opts(Opts::new(
            "cluster_reconciliation_pulls_total",
            "Full snapshots adopted from peers by the reconciliation loop",
        ))
        .map_err(collector("cluster_reconciliation_pulls_total"))?;
        let cluster_members = IntGauge::with_opts(Opts::new(
            "cluster_members",
            "Nodes currently registered in the cluster membership",
        ))
        .map_err(collector("cluster_members"))?;

        register(&registry, "http_requests_total", http_requests_total.clone())?;
        register(&registry, "config_version", config_version.clone())?;
        register(
            &registry,
            "config_apply_latency_ms",
            config_apply_latency_ms.clone(),
        )?;
        register(
            &registry,
            "config_apply_aborts_total",
            config_apply_aborts_total.clone(),
        )?;
        register(&registry, "config_cas_conflicts_total", cas_conflicts_total.clone())?;
        register(
            &registry,
            "cluster_propagation_failures_total",
            propagation_failures_total.clone(),
        )?;
        register(
            &registry,
            "cluster_heartbeat_misses_total",
            heartbeat_misses_total.clone(),
        )?;
        register(
            &registry,
            "cluster_reconciliation_pulls_total",
            reconciliation_pulls_total.clone(),
        )?;
        register(&registry, "cluster_members", cluster_members.clone())?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                http_requests_total,
                config_version,
                config_apply_latency_ms,
                config_apply_aborts_total,
                cas_conflicts_total,
                propagation_failures_total,
                heartbeat_misses_total,
                reconciliation_pulls_total,
                cluster_members,
            }),
        })
    }

    /// Increment the HTTP request counter for the given route and status code.
    pub fn inc_http_request(&self, route: &str, status: u16) {
        self.inner
            .http_requests_total
            .with_label_values(&[route, &status.to_string()])
            .inc();
    }

    /// Set the currently armed configuration version gauge.
    pub fn set_config_version(&self, version: i64) {
        self.inner.config_version.set(version);
    }

    /// Record the observed latency for applying a configuration snapshot.
    pub fn observe_config_apply_latency(&self, duration: Duration) {
        self.inner
            .config_apply_latency_ms
            .set(duration_to_ms(duration));
    }

    /// Increment the aborted apply cycle counter.
    pub fn inc_config_apply_abort(&self) {
        self.inner.config_apply_aborts_total.inc();
    }

    /// Increment the compare-and-swap conflict counter.
    pub fn inc_cas_conflict(&self) {
        self.inner.cas_conflicts_total.inc();
    }

    /// Increment the propagation failure counter for a peer.
    pub fn inc_propagation_failure(&self, peer: &str) {
        self.inner
            .propagation_failures_total
            .with_label_values(&[peer])
            .inc();
    }

    /// Increment the heartbeat miss counter for a peer.
    pub fn inc_heartbeat_miss(&self, peer: &str) {
        self.inner
            .heartbeat_misses_total
            .with_label_values(&[peer])
            .inc();
    }

    /// Increment the reconciliation pull counter.
    pub fn inc_reconciliation_pull(&self) {
        self.inner.reconciliation_pulls_total.inc();
    }

    /// Set the cluster member count gauge.
    pub fn set_cluster_members(&self, count: i64) {
        self.inner.cluster_members.set(count);
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the most relevant gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            config_version: self.inner.config_version.get(),
            config_apply_latency_ms: self.inner.config_apply_latency_ms.get(),
            config_apply_aborts_total: self.inner.config_apply_aborts_total.get(),
            cas_conflicts_total: self.inner.cas_conflicts_total.get(),
            reconciliation_pulls_total: self.inner.reconciliation_pulls_total.get(),
            cluster_members: self.inner.cluster_members.get(),
        }
    }
}

fn register<C>(registry: &Registry, name: &'static str, collector: C) -> Result<()>
where
    C: prometheus::core::Collector + 'static,
{
    registry
        .register(Box::new(collector))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })
}

fn collector(name: &'static str) -> impl FnOnce(prometheus::Error) -> TelemetryError {
    move |source| TelemetryError::MetricsCollector { name, source }
}

fn duration_to_ms(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
