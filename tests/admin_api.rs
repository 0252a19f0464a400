//! Management API routes over the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use gateway_manager::admin::{setup_admin_router, AdminState};
use gateway_manager::config::StoreConfig;
use gateway_manager::health::{InstanceTaskRegistry, ManualClock};
use gateway_manager::MemoryStore;

const API_KEY: &str = "test-key";

fn router(registry: Option<Arc<InstanceTaskRegistry>>) -> Router {
    let store = Arc::new(MemoryStore::new());
    let state = AdminState::new(store, &StoreConfig::default(), registry, API_KEY);
    setup_admin_router(state, Duration::from_secs(5))
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", API_KEY));
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
}

#[tokio::test]
async fn test_requires_bearer_token() {
    let app = router(None);

    let response = app
        .clone()
        .oneshot(Request::get("/v1/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(
            Request::get("/v1/status")
                .header(header::AUTHORIZATION, "Bearer wrong")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_cluster_lifecycle() {
    let app = router(None);

    let (status, created) = call(
        &app,
        Method::POST,
        "/v1/cluster",
        Some(json!({
            "name": "web",
            "instances": [{"name": "a", "addr": "10.0.0.1:80"}]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let cluster_id = created["id"].as_str().unwrap().to_string();

    let (status, ids) = call(&app, Method::GET, "/v1/cluster_ids", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids["cluster_ids"], json!([cluster_id]));

    let (status, created) = call(
        &app,
        Method::POST,
        &format!("/v1/clusters/{}/instance", cluster_id),
        Some(json!({
            "name": "b",
            "addr": "10.0.0.2:80",
            "need_check_health": true,
            "health_check_url": "http://10.0.0.2:80/health"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let instance_id = created["id"].as_str().unwrap().to_string();

    let (status, cluster) = call(&app, Method::GET, &format!("/v1/clusters/{}", cluster_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cluster["name"], "web");
    assert_eq!(cluster["instances"].as_array().unwrap().len(), 2);

    let (status, _) = call(
        &app,
        Method::PUT,
        &format!("/v1/clusters/{}", cluster_id),
        Some(json!({"name": "web-renamed"})),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let instance_uri = format!("/v1/clusters/{}/instance/{}", cluster_id, instance_id);
    let (status, _) = call(
        &app,
        Method::PUT,
        &instance_uri,
        Some(json!({"name": "b2", "addr": "10.0.0.3:80"})),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, instance) = call(&app, Method::GET, &instance_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(instance["name"], "b2");
    assert_eq!(instance["need_check_health"], false);
    assert_eq!(instance["cluster_id"], cluster_id.as_str());

    let (status, clusters) = call(&app, Method::GET, "/v1/clusters", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(clusters[0]["name"], "web-renamed");

    let (status, _) = call(&app, Method::DELETE, &instance_uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(&app, Method::DELETE, &format!("/v1/clusters/{}", cluster_id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, clusters) = call(&app, Method::GET, "/v1/clusters", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(clusters, json!([]));
}

#[tokio::test]
async fn test_error_responses() {
    let app = router(None);

    let (status, body) = call(&app, Method::GET, "/v1/clusters/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("missing"));

    let (status, body) = call(
        &app,
        Method::POST,
        "/v1/clusters/c1/instance",
        Some(json!({"name": "a", "addr": ""})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = call(&app, Method::GET, "/v1/health/jobs", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_status_and_jobs() {
    let registry = Arc::new(InstanceTaskRegistry::new(
        Duration::from_secs(10),
        Arc::new(ManualClock::new()),
    ));
    registry.insert("/clusters/c1/i1", "http://10.0.0.1/health");
    let app = router(Some(registry));

    let (status, body) = call(&app, Method::GET, "/v1/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["jobs"], 1);
    assert_eq!(body["health_checks"], true);

    let (status, jobs) = call(&app, Method::GET, "/v1/health/jobs", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(jobs[0]["instance_key"], "/clusters/c1/i1");
    assert_eq!(jobs[0]["target_url"], "http://10.0.0.1/health");
    assert_eq!(jobs[0]["cadence_ms"], 10_000);
    assert_eq!(jobs[0]["last_check_ms_ago"], Value::Null);
}

#[tokio::test]
async fn test_api_definitions() {
    let app = router(None);

    let (status, page) = call(&app, Method::GET, "/v1/apis", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page, json!({"apis": [], "total": 0}));

    let mut ids = Vec::new();
    for path in ["/a", "/b", "/c"] {
        let (status, created) = call(
            &app,
            Method::POST,
            "/v1/apis/api",
            Some(json!({
                "path": path,
                "method": "GET",
                "target_cluster_id": "c1",
                "rewrite_path": path,
                "api_combination": []
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        ids.push(created["id"].as_str().unwrap().to_string());
    }

    let (status, page) = call(&app, Method::GET, "/v1/apis?limit=2&offset=1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 3);
    assert_eq!(page["apis"].as_array().unwrap().len(), 2);

    let (_, page) = call(&app, Method::GET, "/v1/apis?offset=5", None).await;
    assert_eq!(page, json!({"apis": [], "total": 3}));

    let uri = format!("/v1/apis/{}", ids[0]);
    let (status, _) = call(
        &app,
        Method::PUT,
        &uri,
        Some(json!({
            "path": "/a",
            "method": "POST",
            "target_cluster_id": "c2",
            "rewrite_path": "/internal/a",
            "need_combine": true,
            "api_combination": [{"path": "/p", "field": "profile", "method": "GET", "target_cluster_id": "c3"}]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, api) = call(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(api["idx"], ids[0].as_str());
    assert_eq!(api["method"], "POST");
    assert_eq!(api["api_combination"][0]["field"], "profile");

    let (status, body) = call(
        &app,
        Method::POST,
        "/v1/apis/api",
        Some(json!({"path": "/x", "method": "GET", "target_cluster_id": "", "rewrite_path": "/x"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("target_cluster_id"));

    let (status, _) = call(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_routing_rules() {
    let app = router(None);

    let (status, created) = call(
        &app,
        Method::POST,
        "/v1/routings/routing",
        Some(json!({"prefix": "/shop", "cluster_id": "c1", "need_strip_prefix": true})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let uri = format!("/v1/routings/{}", created["id"].as_str().unwrap());

    let (status, page) = call(&app, Method::GET, "/v1/routings", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["routings"][0]["prefix"], "/shop");
    assert_eq!(page["routings"][0]["need_strip_prefix"], true);

    let (status, _) = call(
        &app,
        Method::PUT,
        &uri,
        Some(json!({"prefix": "/store", "cluster_id": "c2"})),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, rule) = call(&app, Method::GET, &uri, None).await;
    assert_eq!(rule["prefix"], "/store");
    assert_eq!(rule["need_strip_prefix"], false);

    let (status, _) = call(
        &app,
        Method::PUT,
        "/v1/routings/missing",
        Some(json!({"prefix": "/x", "cluster_id": "c1"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, page) = call(&app, Method::GET, "/v1/routings", None).await;
    assert_eq!(page, json!({"routings": [], "total": 0}));
}
