//! Error types for cluster synchronization operations.

use thiserror::Error;

use stratus_config::ConfigError;

/// Result alias for synchronization operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors raised by the sync manager and its collaborators.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Referenced project does not exist in the document.
    #[error("project not found")]
    ProjectNotFound {
        /// Project identifier from the request.
        project_id: String,
    },
    /// Optimistic-concurrency retries were exhausted.
    #[error("configuration write conflicted after retries")]
    Conflict {
        /// Number of compare-and-swap rounds attempted.
        attempts: u32,
    },
    /// The submitted payload failed validation.
    #[error("invalid configuration payload")]
    Validation {
        /// Underlying validation failure.
        source: ConfigError,
    },
    /// The configuration store failed to read or flush.
    #[error("configuration store operation failed")]
    Store {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying store error.
        source: ConfigError,
    },
    /// A module rejected the snapshot during the local apply cycle.
    #[error("module apply aborted")]
    ApplyAborted {
        /// Module that rejected the snapshot.
        module: &'static str,
        /// Version of the rejected snapshot.
        version: u64,
        /// Underlying validation failure.
        source: ConfigError,
    },
    /// A received delta was computed against a different version.
    #[error("delta base version mismatch")]
    DeltaBaseMismatch {
        /// Version the delta was computed against.
        base_version: u64,
        /// Version held locally.
        local_version: u64,
    },
    /// An HTTP request to a peer failed outright.
    #[error("peer request failed")]
    PeerHttp {
        /// Operation identifier.
        operation: &'static str,
        /// URL used for the request.
        url: String,
        /// Source HTTP client error.
        source: reqwest::Error,
    },
    /// A peer answered with a non-success status.
    #[error("peer returned error status")]
    PeerStatus {
        /// Operation identifier.
        operation: &'static str,
        /// URL used for the request.
        url: String,
        /// HTTP status code returned by the peer.
        status: u16,
    },
    /// A peer could not be reached through the configured transport.
    #[error("peer unavailable")]
    PeerUnavailable {
        /// Peer address the call targeted.
        address: String,
        /// Transport-specific detail.
        reason: String,
    },
    /// A peer did not acknowledge within the propagation timeout.
    #[error("peer acknowledgement timed out")]
    PropagationTimeout {
        /// Peer address the call targeted.
        address: String,
    },
}

impl From<stratus_modules::ApplyError> for SyncError {
    fn from(err: stratus_modules::ApplyError) -> Self {
        let stratus_modules::ApplyError::Aborted {
            module,
            version,
            source,
        } = err;
        Self::ApplyAborted {
            module,
            version,
            source,
        }
    }
}
