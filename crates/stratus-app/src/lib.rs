#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    rustdoc::broken_intra_doc_links
)]

//! Stratus gateway node bootstrap wiring.
//!
//! Layout: `bootstrap.rs` (environment-driven dependency construction and
//! the boot sequence), `composition.rs` (module assembly in the declared
//! apply order), `error.rs` (application-level error taxonomy).

mod bootstrap;
mod composition;
mod error;

pub use bootstrap::{BootstrapDependencies, run_app};
pub use error::{AppError, AppResult};
