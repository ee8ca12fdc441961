//! Router construction and server host for the API.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::{MatchedPath, State},
    http::{Method, Request, header::{AUTHORIZATION, CONTENT_TYPE}},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use stratus_config::AdminGate;
use stratus_modules::FileStoreModule;
use stratus_sync::SyncManager;
use stratus_telemetry::Metrics;

use crate::ApiServerError;
use crate::http::auth::require_admin_token;
use crate::http::cluster::{heartbeat, ingest_delta, join, snapshot};
use crate::http::filestore::{
    delete_file_rule, get_file_rules, get_file_state, get_file_store, set_file_rule,
    set_file_store,
};
use crate::http::health::{health, metrics};
use crate::state::ApiState;

/// Dependencies required to assemble an [`ApiServer`].
pub struct ApiServerDeps {
    pub gate: Arc<AdminGate>,
    pub sync: Arc<SyncManager>,
    pub filestore: Arc<FileStoreModule>,
    pub metrics: Metrics,
}

/// Axum router wrapper hosting the gateway's HTTP surface.
pub struct ApiServer {
    router: Router,
}

impl ApiServer {
    /// Construct the server with shared dependencies wired through state.
    #[must_use]
    pub fn new(deps: ApiServerDeps) -> Self {
        let state = ApiState::new(deps.gate, deps.sync, deps.filestore, deps.metrics);

        let cors_layer = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::PUT, Method::POST, Method::DELETE])
            .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

        let router = Self::public_routes()
            .merge(Self::admin_routes(&state))
            .merge(Self::cluster_routes(&state))
            .layer(cors_layer)
            .layer(TraceLayer::new_for_http())
            .layer(middleware::from_fn_with_state(state.clone(), track_request))
            .with_state(state);

        Self { router }
    }

    fn public_routes() -> Router<Arc<ApiState>> {
        Router::new()
            .route("/health", get(health))
            .route("/metrics", get(metrics))
    }

    fn admin_routes(state: &Arc<ApiState>) -> Router<Arc<ApiState>> {
        let require_admin = middleware::from_fn_with_state(state.clone(), require_admin_token);
        Router::new()
            .route(
                "/{project}/file-store/config",
                get(get_file_store).post(set_file_store),
            )
            .route("/{project}/file-store/state", get(get_file_state))
            .route("/{project}/file-store/rule", get(get_file_rules))
            .route(
                "/{project}/file-store/rule/{id}",
                post(set_file_rule)
                    .put(set_file_rule)
                    .delete(delete_file_rule),
            )
            .route_layer(require_admin)
    }

    fn cluster_routes(state: &Arc<ApiState>) -> Router<Arc<ApiState>> {
        let require_admin = middleware::from_fn_with_state(state.clone(), require_admin_token);
        Router::new()
            .route("/v1/cluster/config", post(ingest_delta))
            .route("/v1/cluster/heartbeat", post(heartbeat))
            .route("/v1/cluster/join", post(join))
            .route("/v1/cluster/snapshot", get(snapshot))
            .route_layer(require_admin)
    }

    /// Serve the API on the supplied address.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener fails to bind or the server
    /// terminates unexpectedly.
    pub async fn serve(self, addr: SocketAddr) -> Result<(), ApiServerError> {
        tracing::info!("starting http listener on {addr}");
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ApiServerError::Serve { source })?;
        axum::serve(listener, self.router.into_make_service())
            .await
            .map_err(|source| ApiServerError::Serve { source })?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn router(&self) -> Router {
        self.router.clone()
    }
}

async fn track_request(
    State(state): State<Arc<ApiState>>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| req.uri().path().to_string(), |p| p.as_str().to_string());
    let response = next.run(req).await;
    state
        .metrics
        .inc_http_request(&route, response.status().as_u16());
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use stratus_config::{
        AdminSettings, Config, ConfigStore, FileStoreConfig, ModuleConfigs, Project,
    };
    use stratus_events::EventBus;
    use stratus_modules::{
        AuthModule, Coordinator, CrudModule, EventingModule, FunctionsModule, GraphqlModule,
        ModuleSink, RealtimeModule, StaticModule, UserManModule,
    };
    use stratus_sync::{MemoryCluster, MemoryTransport, SyncManagerDeps};
    use tower::ServiceExt;

    const ADMIN_TOKEN: &str = "cluster-secret";

    struct Harness {
        server: ApiServer,
        sync: Arc<SyncManager>,
    }

    fn harness() -> Harness {
        let bus = EventBus::with_capacity(64);
        let seed = Config {
            version: 0,
            projects: vec![Project {
                id: "p1".to_string(),
                secret: "project-secret".to_string(),
                modules: ModuleConfigs::default(),
            }],
            admin: AdminSettings {
                secret: ADMIN_TOKEN.to_string(),
                users: Vec::new(),
            },
            ssl: None,
            static_hosting: Default::default(),
        };
        let gate = Arc::new(AdminGate::new(seed.admin.clone()));
        let store = Arc::new(ConfigStore::in_memory(seed));

        let crud = Arc::new(CrudModule::new());
        let filestore = Arc::new(stratus_modules::FileStoreModule::new());
        let sinks: Vec<Arc<dyn ModuleSink>> = vec![
            crud.clone(),
            Arc::new(AuthModule::new(crud.clone())),
            Arc::new(FunctionsModule::new()),
            Arc::new(UserManModule::new()),
            filestore.clone(),
            Arc::new(EventingModule::new(crud.clone(), bus.clone())),
            Arc::new(RealtimeModule::new("node-a", crud, bus.clone())),
            Arc::new(StaticModule::new()),
            Arc::new(GraphqlModule::new()),
        ];
        let coordinator = Arc::new(Coordinator::new(sinks, bus.clone()));
        let cluster = MemoryCluster::new();
        let transport = Arc::new(MemoryTransport::new(cluster.clone()));
        let metrics = Metrics::new().expect("metrics");
        let sync = SyncManager::new(SyncManagerDeps {
            node_id: "node-a".to_string(),
            advertise_addr: "mem://a".to_string(),
            bootstrap_peers: Vec::new(),
            store,
            coordinator,
            transport,
            bus,
            metrics: metrics.clone(),
        });
        cluster.register("mem://a", sync.clone());

        let server = ApiServer::new(ApiServerDeps {
            gate,
            sync: sync.clone(),
            filestore,
            metrics,
        });
        Harness { server, sync }
    }

    fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        match body {
            Some(value) => builder
                .header("content-type", "application/json")
                .body(Body::from(value.to_string()))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        }
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    fn store_payload() -> Value {
        json!({
            "enabled": true,
            "storeType": "amazon-s3",
            "conn": "s3://files",
            "bucket": "files",
            "rules": []
        })
    }

    #[tokio::test]
    async fn missing_token_short_circuits_with_401_and_no_version_bump() {
        let harness = harness();
        let response = harness
            .server
            .router()
            .oneshot(request(
                "POST",
                "/p1/file-store/config",
                None,
                Some(store_payload()),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert!(body["error"].is_string());

        let (_, version) = harness.sync.local_snapshot().await;
        assert_eq!(version, 0, "rejected writes must not change the store");
    }

    #[tokio::test]
    async fn invalid_token_is_rejected_on_reads_too() {
        let harness = harness();
        let response = harness
            .server
            .router()
            .oneshot(request(
                "GET",
                "/p1/file-store/config",
                Some("wrong-token"),
                None,
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn set_then_get_round_trips_the_envelope() {
        let harness = harness();
        let router = harness.server.router();

        let response = router
            .clone()
            .oneshot(request(
                "POST",
                "/p1/file-store/config",
                Some(ADMIN_TOKEN),
                Some(store_payload()),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({}));

        let response = router
            .oneshot(request(
                "GET",
                "/p1/file-store/config",
                Some(ADMIN_TOKEN),
                None,
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["result"]["storeType"], "amazon-s3");
    }

    #[tokio::test]
    async fn rule_lifecycle_over_http() {
        let harness = harness();
        let router = harness.server.router();
        let rule = json!({"prefix": "/public/*", "rule": "allow"});

        let response = router
            .clone()
            .oneshot(request(
                "PUT",
                "/p1/file-store/rule/public-read",
                Some(ADMIN_TOKEN),
                Some(rule),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .clone()
            .oneshot(request(
                "GET",
                "/p1/file-store/rule?id=public-read",
                Some(ADMIN_TOKEN),
                None,
            ))
            .await
            .expect("response");
        let body = body_json(response).await;
        assert_eq!(body["result"][0]["name"], "public-read");

        let response = router
            .clone()
            .oneshot(request(
                "DELETE",
                "/p1/file-store/rule/public-read",
                Some(ADMIN_TOKEN),
                None,
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .oneshot(request(
                "GET",
                "/p1/file-store/rule",
                Some(ADMIN_TOKEN),
                None,
            ))
            .await
            .expect("response");
        let body = body_json(response).await;
        assert_eq!(body["result"], json!([]));
    }

    #[tokio::test]
    async fn unknown_project_maps_to_404() {
        let harness = harness();
        let response = harness
            .server
            .router()
            .oneshot(request(
                "GET",
                "/ghost/file-store/config",
                Some(ADMIN_TOKEN),
                None,
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn state_probe_reports_failure_in_the_body() {
        let harness = harness();
        let response = harness
            .server
            .router()
            .oneshot(request(
                "GET",
                "/p1/file-store/state",
                Some(ADMIN_TOKEN),
                None,
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["result"], json!(false));
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn health_is_public() {
        let harness = harness();
        let response = harness
            .server
            .router()
            .oneshot(request("GET", "/health", None, None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["node_id"], "node-a");
    }
}
