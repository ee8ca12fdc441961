//! Functional gateway modules and the atomic reconfiguration coordinator.
//!
//! Each module holds the sub-configuration it is currently armed with behind
//! a read-write lock, validates a candidate sub-config on apply, and exposes
//! a current-config accessor so operators (and tests) can observe exactly
//! which version each module runs. The [`Coordinator`] pushes a configuration
//! snapshot through every module in a declared dependency order.

pub mod auth;
pub mod coordinator;
pub mod crud;
pub mod eventing;
pub mod filestore;
pub mod functions;
pub mod graphql;
pub mod realtime;
pub mod sink;
pub mod static_hosting;
pub mod userman;

pub use auth::AuthModule;
pub use coordinator::{ApplyError, ApplyOutcome, Coordinator};
pub use crud::{CrudModule, MutationListener};
pub use eventing::EventingModule;
pub use filestore::FileStoreModule;
pub use functions::FunctionsModule;
pub use graphql::GraphqlModule;
pub use realtime::RealtimeModule;
pub use sink::ModuleSink;
pub use static_hosting::StaticModule;
pub use userman::UserManModule;
