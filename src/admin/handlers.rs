use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::catalog::{ApiDefinition, RoutingRule};
use crate::cluster::{Cluster, InstanceSpec, ServerInstance};
use crate::health::JobSnapshot;

use super::{AdminError, AdminState};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub health_checks: bool,
    pub jobs: usize,
}

#[derive(Debug, Deserialize)]
pub struct CreateCluster {
    pub name: String,
    #[serde(default)]
    pub instances: Vec<InstanceSpec>,
}

#[derive(Debug, Deserialize)]
pub struct RenameCluster {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Created {
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClusterIds {
    pub cluster_ids: Vec<String>,
}

/// `limit`/`offset` paging of catalog listings.
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    10
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiPage {
    pub apis: Vec<ApiDefinition>,
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RoutingPage {
    pub routings: Vec<RoutingRule>,
    pub total: usize,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        health_checks: state.registry.is_some(),
        jobs: state.registry.as_ref().map_or(0, |r| r.len()),
    })
}

pub async fn list_jobs(State(state): State<AdminState>) -> Result<Json<Vec<JobSnapshot>>, AdminError> {
    let registry = state.registry.as_ref().ok_or(AdminError::HealthDisabled)?;
    Ok(Json(registry.snapshot()))
}

pub async fn list_clusters(State(state): State<AdminState>) -> Result<Json<Vec<Cluster>>, AdminError> {
    Ok(Json(state.clusters.list_clusters().await?))
}

pub async fn list_cluster_ids(State(state): State<AdminState>) -> Result<Json<ClusterIds>, AdminError> {
    let cluster_ids = state.clusters.cluster_ids().await?;
    Ok(Json(ClusterIds { cluster_ids }))
}

pub async fn create_cluster(
    State(state): State<AdminState>,
    Json(body): Json<CreateCluster>,
) -> Result<(StatusCode, Json<Created>), AdminError> {
    let id = state.clusters.create_cluster(&body.name, body.instances).await?;
    Ok((StatusCode::CREATED, Json(Created { id })))
}

pub async fn get_cluster(
    State(state): State<AdminState>,
    Path(cluster_id): Path<String>,
) -> Result<Json<Cluster>, AdminError> {
    Ok(Json(state.clusters.get_cluster(&cluster_id).await?))
}

pub async fn rename_cluster(
    State(state): State<AdminState>,
    Path(cluster_id): Path<String>,
    Json(body): Json<RenameCluster>,
) -> Result<StatusCode, AdminError> {
    state.clusters.rename_cluster(&cluster_id, &body.name).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_cluster(
    State(state): State<AdminState>,
    Path(cluster_id): Path<String>,
) -> Result<StatusCode, AdminError> {
    state.clusters.delete_cluster(&cluster_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_instance(
    State(state): State<AdminState>,
    Path(cluster_id): Path<String>,
    Json(spec): Json<InstanceSpec>,
) -> Result<(StatusCode, Json<Created>), AdminError> {
    let id = state.clusters.add_instance(&cluster_id, spec).await?;
    Ok((StatusCode::CREATED, Json(Created { id })))
}

pub async fn get_instance(
    State(state): State<AdminState>,
    Path((cluster_id, instance_id)): Path<(String, String)>,
) -> Result<Json<ServerInstance>, AdminError> {
    Ok(Json(state.clusters.get_instance(&cluster_id, &instance_id).await?))
}

pub async fn update_instance(
    State(state): State<AdminState>,
    Path((cluster_id, instance_id)): Path<(String, String)>,
    Json(spec): Json<InstanceSpec>,
) -> Result<StatusCode, AdminError> {
    state.clusters.update_instance(&cluster_id, &instance_id, spec).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_instance(
    State(state): State<AdminState>,
    Path((cluster_id, instance_id)): Path<(String, String)>,
) -> Result<StatusCode, AdminError> {
    state.clusters.delete_instance(&cluster_id, &instance_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_apis(
    State(state): State<AdminState>,
    Query(page): Query<PageQuery>,
) -> Result<Json<ApiPage>, AdminError> {
    let page = state.apis.list(page.limit, page.offset).await?;
    Ok(Json(ApiPage { apis: page.items, total: page.total }))
}

pub async fn create_api(
    State(state): State<AdminState>,
    Json(api): Json<ApiDefinition>,
) -> Result<(StatusCode, Json<Created>), AdminError> {
    let id = state.apis.create(api).await?;
    Ok((StatusCode::CREATED, Json(Created { id })))
}

pub async fn get_api(
    State(state): State<AdminState>,
    Path(api_id): Path<String>,
) -> Result<Json<ApiDefinition>, AdminError> {
    Ok(Json(state.apis.get(&api_id).await?))
}

pub async fn update_api(
    State(state): State<AdminState>,
    Path(api_id): Path<String>,
    Json(api): Json<ApiDefinition>,
) -> Result<StatusCode, AdminError> {
    state.apis.update(&api_id, api).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_api(
    State(state): State<AdminState>,
    Path(api_id): Path<String>,
) -> Result<StatusCode, AdminError> {
    state.apis.delete(&api_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_routings(
    State(state): State<AdminState>,
    Query(page): Query<PageQuery>,
) -> Result<Json<RoutingPage>, AdminError> {
    let page = state.routings.list(page.limit, page.offset).await?;
    Ok(Json(RoutingPage { routings: page.items, total: page.total }))
}

pub async fn create_routing(
    State(state): State<AdminState>,
    Json(rule): Json<RoutingRule>,
) -> Result<(StatusCode, Json<Created>), AdminError> {
    let id = state.routings.create(rule).await?;
    Ok((StatusCode::CREATED, Json(Created { id })))
}

pub async fn get_routing(
    State(state): State<AdminState>,
    Path(routing_id): Path<String>,
) -> Result<Json<RoutingRule>, AdminError> {
    Ok(Json(state.routings.get(&routing_id).await?))
}

pub async fn update_routing(
    State(state): State<AdminState>,
    Path(routing_id): Path<String>,
    Json(rule): Json<RoutingRule>,
) -> Result<StatusCode, AdminError> {
    state.routings.update(&routing_id, rule).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_routing(
    State(state): State<AdminState>,
    Path(routing_id): Path<String>,
) -> Result<StatusCode, AdminError> {
    state.routings.delete(&routing_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
