//! Seam between the coordinator and the functional modules.

use async_trait::async_trait;
use stratus_config::{Config, ConfigResult, Project};

/// A named module that can be re-armed with a configuration snapshot.
///
/// Implementations validate the relevant sub-config and either adopt it or
/// reject the whole apply cycle by returning an error. `apply` is never
/// invoked concurrently on the same node; the coordinator serializes cycles.
#[async_trait]
pub trait ModuleSink: Send + Sync {
    /// Stable module name used in logs and abort reports.
    fn name(&self) -> &'static str;

    /// Validate and adopt the sub-config for `project` out of `config`.
    async fn apply(&self, project: &Project, config: &Config) -> ConfigResult<()>;
}
