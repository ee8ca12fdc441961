//! Error types for configuration operations.

use std::io;

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Caller presented a missing or invalid admin token.
    #[error("unauthorized")]
    Unauthorized {
        /// Machine-readable reason for the rejection.
        reason: &'static str,
    },
    /// Referenced project does not exist in the document.
    #[error("project not found")]
    ProjectNotFound {
        /// Project identifier from the request path.
        project_id: String,
    },
    /// Field contained an invalid value.
    #[error("invalid configuration field")]
    InvalidField {
        /// Section that failed validation.
        section: &'static str,
        /// Field that failed validation.
        field: String,
        /// Offending value when available.
        value: Option<String>,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// Compare-and-swap lost against a concurrent writer.
    #[error("configuration version conflict")]
    VersionConflict {
        /// Version the caller computed its change against.
        expected: u64,
        /// Version currently held by the store.
        actual: u64,
    },
    /// Persisting the configuration document failed.
    #[error("filesystem operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Source IO error.
        source: io::Error,
    },
    /// Encoding or decoding the configuration document failed.
    #[error("configuration serialization failed")]
    Serde {
        /// Operation identifier.
        operation: &'static str,
        /// Source serde error.
        source: serde_yaml::Error,
    },
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;
