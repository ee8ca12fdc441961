//! HTTP surface for the Stratus gateway: the administrative file-store
//! endpoints, the cluster-internal synchronization endpoints, and the public
//! health and metrics probes.
//!
//! Layout: `state.rs` (shared handler state), `models.rs` (JSON envelopes),
//! `http/` (auth middleware, error mapping, handlers, router).

pub mod http;
pub mod models;
pub mod state;

use std::io;

use thiserror::Error;

pub use http::router::{ApiServer, ApiServerDeps};

/// Errors raised while serving the API.
#[derive(Debug, Error)]
pub enum ApiServerError {
    /// Binding or serving the listener failed.
    #[error("api server failed to serve")]
    Serve {
        /// Source IO error.
        source: io::Error,
    },
}
