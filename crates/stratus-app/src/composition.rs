//! Module assembly in the declared apply order.
//!
//! The dependency order is an explicit list, not an implicit call sequence:
//! admin settings arm first so a secret rotation takes effect before any
//! tenant module, the data-access module precedes everything that consults
//! its collection list, and the query-federation layer comes last.

use std::sync::Arc;

use async_trait::async_trait;

use stratus_config::{AdminGate, Config, ConfigResult, Project};
use stratus_events::EventBus;
use stratus_modules::{
    AuthModule, Coordinator, CrudModule, EventingModule, FileStoreModule, FunctionsModule,
    GraphqlModule, ModuleSink, RealtimeModule, StaticModule, UserManModule,
};

/// Handles to the assembled modules the rest of the node needs.
pub(crate) struct ModuleSet {
    pub(crate) filestore: Arc<FileStoreModule>,
    pub(crate) coordinator: Arc<Coordinator>,
}

/// Re-arms the admin gate from the root document during each apply cycle.
struct GateSink {
    gate: Arc<AdminGate>,
}

#[async_trait]
impl ModuleSink for GateSink {
    fn name(&self) -> &'static str {
        "admin"
    }

    async fn apply(&self, _project: &Project, config: &Config) -> ConfigResult<()> {
        self.gate.set_config(config.admin.clone());
        Ok(())
    }
}

/// Build every functional module, wire the eventing listener into the crud
/// hooks, and stack the coordinator in the declared order.
pub(crate) async fn assemble_modules(
    node_id: &str,
    gate: Arc<AdminGate>,
    bus: &EventBus,
) -> ModuleSet {
    let crud = Arc::new(CrudModule::new());
    let auth = Arc::new(AuthModule::new(Arc::clone(&crud)));
    let functions = Arc::new(FunctionsModule::new());
    let userman = Arc::new(UserManModule::new());
    let filestore = Arc::new(FileStoreModule::new());
    let eventing = Arc::new(EventingModule::new(Arc::clone(&crud), bus.clone()));
    let realtime = Arc::new(RealtimeModule::new(node_id, Arc::clone(&crud), bus.clone()));
    let static_hosting = Arc::new(StaticModule::new());
    let graphql = Arc::new(GraphqlModule::new());

    crud.register_listener(Arc::clone(&eventing)).await;

    let sinks: Vec<Arc<dyn ModuleSink>> = vec![
        Arc::new(GateSink { gate }),
        crud,
        auth,
        functions,
        userman,
        Arc::clone(&filestore),
        eventing,
        realtime,
        static_hosting,
        graphql,
    ];
    let coordinator = Arc::new(Coordinator::new(sinks, bus.clone()));

    ModuleSet {
        filestore,
        coordinator,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratus_config::{AdminSettings, AdminUser};

    #[tokio::test]
    async fn coordinator_stacks_modules_in_the_declared_order() {
        let gate = Arc::new(AdminGate::new(AdminSettings::default()));
        let bus = EventBus::with_capacity(8);
        let set = assemble_modules("node-a", gate, &bus).await;
        assert_eq!(
            set.coordinator.module_order(),
            vec![
                "admin",
                "crud",
                "auth",
                "functions",
                "userman",
                "filestore",
                "eventing",
                "realtime",
                "static",
                "graphql"
            ]
        );
    }

    #[tokio::test]
    async fn apply_cycle_rotates_the_admin_gate() {
        let gate = Arc::new(AdminGate::new(AdminSettings::default()));
        let bus = EventBus::with_capacity(8);
        let set = assemble_modules("node-a", Arc::clone(&gate), &bus).await;

        let config = Arc::new(Config {
            version: 1,
            projects: vec![Project {
                id: "p1".to_string(),
                ..Project::default()
            }],
            admin: AdminSettings {
                secret: "rotated".to_string(),
                users: vec![AdminUser {
                    name: "ops".to_string(),
                    key: "ops-key".to_string(),
                }],
            },
            ssl: None,
            static_hosting: Default::default(),
        });
        set.coordinator.apply(config).await.expect("apply");

        assert!(gate.validate_token(Some("rotated")).is_ok());
        assert!(gate.validate_token(Some("ops-key")).is_ok());
        assert!(gate.validate_token(Some("stale")).is_err());
    }
}
