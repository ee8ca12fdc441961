#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    rustdoc::broken_intra_doc_links,
    missing_docs
)]

//! Binary entrypoint that wires a Stratus gateway node together and blocks
//! until shutdown.

use stratus_app::{AppResult, run_app};

/// Bootstraps the gateway node and blocks until shutdown.
#[tokio::main]
async fn main() -> AppResult<()> {
    run_app().await
}
