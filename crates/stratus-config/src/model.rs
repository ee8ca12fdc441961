//! Typed configuration document and the delta types used for propagation.
//!
//! The root [`Config`] is owned by the [`crate::ConfigStore`]; every other
//! component holds immutable snapshots behind an `Arc`. Project identity is
//! fixed at creation time; administrative operations replace module
//! sub-trees, never the `id`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration document for the whole cluster.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Monotonically increasing document version, bumped by exactly one on
    /// every successful compare-and-swap.
    #[serde(default)]
    pub version: u64,
    /// Tenant projects, ordered, keyed by their unique ids.
    #[serde(default)]
    pub projects: Vec<Project>,
    /// Cluster administration settings (tokens, named users).
    #[serde(default)]
    pub admin: AdminSettings,
    /// Optional TLS material carried for the listener bootstrap.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl: Option<SslConfig>,
    /// Static-hosting settings applied to the static module.
    #[serde(default, rename = "static")]
    pub static_hosting: StaticConfig,
}

impl Config {
    /// Find a project by id.
    #[must_use]
    pub fn project(&self, project_id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == project_id)
    }

    /// Find a project by id, mutably.
    pub fn project_mut(&mut self, project_id: &str) -> Option<&mut Project> {
        self.projects.iter_mut().find(|p| p.id == project_id)
    }
}

/// One tenant's isolated configuration namespace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Unique project identifier, immutable after creation.
    pub id: String,
    /// Signing key used for project-scoped tokens.
    #[serde(default)]
    pub secret: String,
    /// Per-module sub-configurations.
    #[serde(default)]
    pub modules: ModuleConfigs,
}

/// Module sub-configs for a single project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleConfigs {
    /// Data-access sub-config.
    #[serde(default)]
    pub crud: CrudConfig,
    /// Access-rule sub-config.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Functions sub-config.
    #[serde(default)]
    pub functions: FunctionsConfig,
    /// User-management sub-config.
    #[serde(default)]
    pub userman: UserManConfig,
    /// File-storage sub-config.
    #[serde(default, rename = "fileStore")]
    pub file_store: FileStoreConfig,
    /// Eventing sub-config.
    #[serde(default)]
    pub eventing: EventingConfig,
    /// Realtime sub-config.
    #[serde(default)]
    pub realtime: RealtimeConfig,
}

/// Data-access configuration: databases and their collections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrudConfig {
    /// Databases keyed by alias (e.g. `mongo`, `sql-postgres`).
    #[serde(default)]
    pub databases: BTreeMap<String, DatabaseConfig>,
}

impl CrudConfig {
    /// All collection names across enabled databases, used by dependent
    /// modules (auth, realtime) to check collection existence.
    #[must_use]
    pub fn collections(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .databases
            .values()
            .filter(|db| db.enabled)
            .flat_map(|db| db.collections.keys().cloned())
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

/// A single database binding inside the crud module.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Whether the binding participates in the data plane.
    #[serde(default)]
    pub enabled: bool,
    /// Connection string handed to the external data-access engine.
    #[serde(default)]
    pub conn: String,
    /// Collections exposed through this binding.
    #[serde(default)]
    pub collections: BTreeMap<String, CollectionConfig>,
}

/// Per-collection settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Whether realtime subscriptions may attach to this collection.
    #[serde(default, rename = "isRealtimeEnabled")]
    pub realtime_enabled: bool,
    /// Access rules keyed by operation (`create`, `read`, `update`, `delete`).
    #[serde(default)]
    pub rules: BTreeMap<String, String>,
}

/// Auth-rule module configuration: collection-level access expressions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Rules keyed by collection name.
    #[serde(default)]
    pub rules: BTreeMap<String, String>,
}

/// Functions module configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionsConfig {
    /// Whether the functions module is armed for the project.
    #[serde(default)]
    pub enabled: bool,
    /// Broker backing the function invocation fabric.
    #[serde(default)]
    pub broker: String,
    /// Registered services keyed by name.
    #[serde(default)]
    pub services: BTreeMap<String, FunctionService>,
}

/// One registered function service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionService {
    /// Callable functions and their access rules.
    #[serde(default)]
    pub functions: BTreeMap<String, String>,
}

/// User-management module configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserManConfig {
    /// Sign-in providers keyed by name (e.g. `email`).
    #[serde(default)]
    pub providers: BTreeMap<String, UserProvider>,
}

/// A single user-management provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProvider {
    /// Whether sign-ins through this provider are accepted.
    #[serde(default)]
    pub enabled: bool,
    /// Client identifier for third-party providers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Client secret for third-party providers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

/// File-storage module configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileStoreConfig {
    /// Whether the file-storage module is armed for the project.
    #[serde(default)]
    pub enabled: bool,
    /// Backing store kind (`local`, `amazon-s3`, `gcp-storage`).
    #[serde(default, rename = "storeType")]
    pub store_type: String,
    /// Connection string or root path for the backing store.
    #[serde(default)]
    pub conn: String,
    /// Optional bucket for object-store backends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    /// Ordered access rules; rule names are unique within a project.
    #[serde(default)]
    pub rules: Vec<FileRule>,
}

impl FileStoreConfig {
    /// Look up a rule by name.
    #[must_use]
    pub fn rule(&self, name: &str) -> Option<&FileRule> {
        self.rules.iter().find(|r| r.name == name)
    }
}

/// A single file-access rule. Identity is `(project, name)`; a second write
/// with the same name replaces the rule wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileRule {
    /// Unique rule name within the project.
    #[serde(default)]
    pub name: String,
    /// Path prefix pattern the rule applies to (e.g. `/public/*`).
    #[serde(default)]
    pub prefix: String,
    /// Rule expression; see [`crate::validate::parse_rule_expr`].
    #[serde(default)]
    pub rule: String,
    /// Operations the rule applies to; empty means all.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operations: Vec<FileOpKind>,
}

/// File operations a [`FileRule`] may govern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileOpKind {
    /// Uploading a new object.
    Create,
    /// Reading an existing object.
    Read,
    /// Removing an object.
    Delete,
}

/// Eventing module configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventingConfig {
    /// Whether the eventing module is armed for the project.
    #[serde(default)]
    pub enabled: bool,
    /// Database alias used to stage event intents.
    #[serde(default, rename = "dbType")]
    pub db_type: String,
    /// Collection used to stage event intents.
    #[serde(default)]
    pub col: String,
}

/// Realtime module configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Whether realtime subscriptions are accepted for the project.
    #[serde(default)]
    pub enabled: bool,
    /// Broker backing cross-node subscription delivery.
    #[serde(default)]
    pub broker: String,
}

/// Cluster administration settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdminSettings {
    /// Shared cluster-admin secret; also authenticates peer nodes.
    #[serde(default)]
    pub secret: String,
    /// Named admin users with individual keys.
    #[serde(default)]
    pub users: Vec<AdminUser>,
}

/// A named administrator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdminUser {
    /// Display name for audit logs.
    pub name: String,
    /// Bearer key granting cluster-admin access.
    pub key: String,
}

/// TLS material for the secure listener.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SslConfig {
    /// Whether the secure listener should start.
    #[serde(default)]
    pub enabled: bool,
    /// Certificate path.
    #[serde(default)]
    pub crt: String,
    /// Private key path.
    #[serde(default)]
    pub key: String,
}

/// Static-hosting settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaticConfig {
    /// Routes served by the static module.
    #[serde(default)]
    pub routes: Vec<StaticRoute>,
}

/// One static route mapping a URL prefix to a directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaticRoute {
    /// Optional virtual host restriction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// URL prefix the route matches.
    #[serde(default)]
    pub prefix: String,
    /// Directory served under the prefix.
    #[serde(default)]
    pub path: String,
}

/// The unit of cluster propagation: a full snapshot or a scoped project
/// payload, stamped with the version it was computed against. A receiver
/// whose local version does not match `base_version` must reject the delta
/// and reconcile via a full snapshot fetch instead of applying it blindly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigDelta {
    /// Version the delta was computed against.
    pub base_version: u64,
    /// Version the delta produces when applied.
    pub version: u64,
    /// Node that originated the change.
    pub origin: String,
    /// Snapshot or scoped payload.
    pub payload: DeltaPayload,
}

/// Payload carried by a [`ConfigDelta`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeltaPayload {
    /// Complete configuration document.
    Full {
        /// The full document.
        config: Config,
    },
    /// Replacement module sub-tree for a single project.
    Project {
        /// Project the sub-tree belongs to.
        project_id: String,
        /// Replacement module sub-configs.
        modules: Box<ModuleConfigs>,
    },
}
