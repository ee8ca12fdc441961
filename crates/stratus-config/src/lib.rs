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

//! Versioned project-configuration document shared by every gateway node.
//!
//! Layout: `model.rs` (typed config document and delta types), `validate.rs`
//! (rule-expression parsing and field validation), `store.rs` (`ConfigStore`
//! with compare-and-swap and durable snapshot persistence), `admin.rs`
//! (`AdminGate` bearer-token authorization).

pub mod admin;
pub mod error;
pub mod model;
pub mod store;
pub mod validate;

pub use admin::AdminGate;
pub use error::{ConfigError, ConfigResult};
pub use model::{
    AdminSettings, AdminUser, AuthConfig, CollectionConfig, Config, ConfigDelta, CrudConfig,
    DatabaseConfig, DeltaPayload, EventingConfig, FileOpKind, FileRule, FileStoreConfig,
    FunctionService, FunctionsConfig, ModuleConfigs, Project, RealtimeConfig, SslConfig,
    StaticConfig, StaticRoute, UserManConfig, UserProvider,
};
pub use store::ConfigStore;
pub use validate::{RuleKind, parse_rule_expr, validate_file_rule, validate_file_store};
