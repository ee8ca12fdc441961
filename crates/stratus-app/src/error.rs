//! Application-level errors for bootstrap and the boot sequence.

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration operations failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: stratus_config::ConfigError,
    },
    /// Cluster synchronization operations failed.
    #[error("cluster synchronization failed")]
    Sync {
        /// Operation identifier.
        operation: &'static str,
        /// Source synchronization error.
        source: stratus_sync::SyncError,
    },
    /// API server operations failed.
    #[error("api server operation failed")]
    ApiServer {
        /// Operation identifier.
        operation: &'static str,
        /// Source API server error.
        source: stratus_api::ApiServerError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: stratus_telemetry::TelemetryError,
    },
    /// Environment configuration values were invalid.
    #[error("invalid environment configuration")]
    InvalidEnv {
        /// Environment variable that failed to parse.
        name: &'static str,
        /// Offending value.
        value: String,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: stratus_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn sync(operation: &'static str, source: stratus_sync::SyncError) -> Self {
        Self::Sync { operation, source }
    }

    pub(crate) const fn api_server(
        operation: &'static str,
        source: stratus_api::ApiServerError,
    ) -> Self {
        Self::ApiServer { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: stratus_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }
}
