//! Management API.
//!
//! # Routes
//! ```text
//! GET    /v1/status
//! GET    /v1/health/jobs
//! GET    /v1/clusters                    clusters with at least one instance
//! GET    /v1/cluster_ids
//! POST   /v1/cluster                     {name, instances[]}
//! GET    /v1/clusters/{cluster_id}
//! PUT    /v1/clusters/{cluster_id}       {name}
//! DELETE /v1/clusters/{cluster_id}
//! POST   /v1/clusters/{cluster_id}/instance
//! GET    /v1/clusters/{cluster_id}/instance/{instance_id}
//! PUT    /v1/clusters/{cluster_id}/instance/{instance_id}
//! DELETE /v1/clusters/{cluster_id}/instance/{instance_id}
//! GET    /v1/apis?limit&offset           {apis[], total}
//! POST   /v1/apis/api
//! GET    /v1/apis/{api_id}
//! PUT    /v1/apis/{api_id}
//! DELETE /v1/apis/{api_id}
//! GET    /v1/routings?limit&offset       {routings[], total}
//! POST   /v1/routings/routing
//! GET    /v1/routings/{routing_id}
//! PUT    /v1/routings/{routing_id}
//! DELETE /v1/routings/{routing_id}
//! ```
//! Every route requires `Authorization: Bearer <api_key>`.

pub mod auth;
pub mod error;
pub mod handlers;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{MatchedPath, Request},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::catalog::{ApiService, RoutingService};
use crate::cluster::ClusterService;
use crate::config::StoreConfig;
use crate::health::InstanceTaskRegistry;
use crate::observability::metrics;
use crate::store::{ConfigStore, KeyLayout};

use self::auth::admin_auth_middleware;
use self::handlers::*;

pub use self::error::AdminError;

/// Shared state of the management API.
#[derive(Clone)]
pub struct AdminState {
    pub clusters: ClusterService,
    pub apis: ApiService,
    pub routings: RoutingService,
    /// `None` when health checking is disabled.
    pub registry: Option<Arc<InstanceTaskRegistry>>,
    pub api_key: Arc<str>,
}

impl AdminState {
    /// Build the services for every record root in `config` on top of `store`.
    pub fn new(
        store: Arc<dyn ConfigStore>,
        config: &StoreConfig,
        registry: Option<Arc<InstanceTaskRegistry>>,
        api_key: &str,
    ) -> Self {
        Self {
            clusters: ClusterService::new(store.clone(), KeyLayout::from_config(config)),
            apis: ApiService::new(store.clone(), &config.apis_root),
            routings: RoutingService::new(store, &config.routings_root),
            registry,
            api_key: Arc::from(api_key),
        }
    }
}

#[allow(deprecated)]
pub fn setup_admin_router(state: AdminState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/v1/status", get(get_status))
        .route("/v1/health/jobs", get(list_jobs))
        .route("/v1/clusters", get(list_clusters))
        .route("/v1/cluster_ids", get(list_cluster_ids))
        .route("/v1/cluster", post(create_cluster))
        .route(
            "/v1/clusters/{cluster_id}",
            get(get_cluster).put(rename_cluster).delete(delete_cluster),
        )
        .route("/v1/clusters/{cluster_id}/instance", post(add_instance))
        .route(
            "/v1/clusters/{cluster_id}/instance/{instance_id}",
            get(get_instance).put(update_instance).delete(delete_instance),
        )
        .route("/v1/apis", get(list_apis))
        .route("/v1/apis/api", post(create_api))
        .route("/v1/apis/{api_id}", get(get_api).put(update_api).delete(delete_api))
        .route("/v1/routings", get(list_routings))
        .route("/v1/routings/routing", post(create_routing))
        .route(
            "/v1/routings/{routing_id}",
            get(get_routing).put(update_routing).delete(delete_routing),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .route_layer(middleware::from_fn(record_request))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn record_request(request: Request, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let response = next.run(request).await;
    metrics::record_admin_request(&route, response.status().as_u16());
    response
}
