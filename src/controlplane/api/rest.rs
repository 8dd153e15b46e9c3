//! REST API Handlers
//!
//! Maps `/v1/...` routes onto resource manager operations. Bodies are the
//! resource records themselves, in camelCase.

use crate::controlplane::ResourceManager;
use crate::domain::model::{
    DeleteRequest, ListRequest, NvmeController, NvmeNamespace, NvmeSubsystem, ScsiController,
    ScsiLun, UpdateRequest, VirtioBlk,
};
use crate::error::{Error, ErrorCode};
use crate::metrics;
use crate::naming::{compose_name, ResourceKind};
use axum::{
    extract::{Json, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

// =============================================================================
// Request/Response Types
// =============================================================================

/// Caller-chosen id on Create; empty lets the bridge generate one
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateQuery {
    #[serde(
        default,
        alias = "subsystemId",
        alias = "controllerId",
        alias = "nvmeControllerId",
        alias = "namespaceId",
        alias = "nvmeNamespaceId",
        alias = "virtioBlkId",
        alias = "scsiControllerId",
        alias = "scsiLunId"
    )]
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(default)]
    pub page_size: i32,
    #[serde(default)]
    pub page_token: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteQuery {
    #[serde(default)]
    pub allow_missing: bool,
}

/// API error response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error) = match self.code() {
            ErrorCode::InvalidArgument => (StatusCode::BAD_REQUEST, "invalid_argument"),
            ErrorCode::NotFound => (StatusCode::NOT_FOUND, "not_found"),
            ErrorCode::Unimplemented => (StatusCode::NOT_IMPLEMENTED, "unimplemented"),
            ErrorCode::Unavailable => (StatusCode::SERVICE_UNAVAILABLE, "engine_unavailable"),
            ErrorCode::EngineDeclined => (StatusCode::BAD_GATEWAY, "engine_error"),
            ErrorCode::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            debug!("Request rejected: {}", self);
        }

        (
            status,
            Json(ApiErrorResponse {
                error: error.into(),
                message: self.to_string(),
            }),
        )
            .into_response()
    }
}

type ApiResult<T> = std::result::Result<T, Error>;

// =============================================================================
// REST Router
// =============================================================================

/// REST API router builder
pub struct RestRouter {
    manager: Arc<ResourceManager>,
}

impl RestRouter {
    pub fn new(manager: Arc<ResourceManager>) -> Self {
        Self { manager }
    }

    /// Build the Axum router
    pub fn build(self) -> Router {
        let state = AppState {
            manager: self.manager,
        };

        Router::new()
            // NVMe subsystems
            .route("/v1/subsystems", get(list_subsystems).post(create_subsystem))
            .route(
                "/v1/subsystems/:sid",
                get(get_subsystem).patch(update_subsystem).delete(delete_subsystem),
            )
            .route("/v1/subsystems/:sid/stats", get(stats_subsystem))
            // NVMe controllers
            .route(
                "/v1/subsystems/:sid/controllers",
                get(list_controllers).post(create_controller),
            )
            .route(
                "/v1/subsystems/:sid/controllers/:id",
                get(get_controller).patch(update_controller).delete(delete_controller),
            )
            .route("/v1/subsystems/:sid/controllers/:id/stats", get(stats_controller))
            // NVMe namespaces
            .route(
                "/v1/subsystems/:sid/namespaces",
                get(list_namespaces).post(create_namespace),
            )
            .route(
                "/v1/subsystems/:sid/namespaces/:id",
                get(get_namespace).patch(update_namespace).delete(delete_namespace),
            )
            .route("/v1/subsystems/:sid/namespaces/:id/stats", get(stats_namespace))
            // virtio-blk
            .route("/v1/virtioBlks", get(list_virtio_blks).post(create_virtio_blk))
            .route(
                "/v1/virtioBlks/:id",
                get(get_virtio_blk).patch(update_virtio_blk).delete(delete_virtio_blk),
            )
            .route("/v1/virtioBlks/:id/stats", get(stats_virtio_blk))
            // virtio-scsi
            .route(
                "/v1/scsiControllers",
                get(list_scsi_controllers).post(create_scsi_controller),
            )
            .route(
                "/v1/scsiControllers/:cid",
                get(get_scsi_controller)
                    .patch(update_scsi_controller)
                    .delete(delete_scsi_controller),
            )
            .route("/v1/scsiControllers/:cid/stats", get(stats_scsi_controller))
            .route(
                "/v1/scsiControllers/:cid/scsiLuns",
                get(list_scsi_luns).post(create_scsi_lun),
            )
            .route(
                "/v1/scsiControllers/:cid/scsiLuns/:id",
                get(get_scsi_lun).patch(update_scsi_lun).delete(delete_scsi_lun),
            )
            .route("/v1/scsiControllers/:cid/scsiLuns/:id/stats", get(stats_scsi_lun))
            // Health and metrics
            .route("/health", get(health_check))
            .route("/ready", get(readiness_check))
            .route("/metrics", get(metrics_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    manager: Arc<ResourceManager>,
}

fn root_name(kind: ResourceKind, id: &str) -> String {
    compose_name(kind, "", id)
}

fn list_request(parent: String, query: ListQuery) -> ListRequest {
    ListRequest::new(parent, query.page_size).with_token(query.page_token)
}

fn delete_request(name: String, query: DeleteQuery) -> DeleteRequest {
    DeleteRequest {
        name,
        allow_missing: query.allow_missing,
    }
}

// =============================================================================
// Subsystem Handlers
// =============================================================================

async fn create_subsystem(
    State(state): State<AppState>,
    Query(query): Query<CreateQuery>,
    Json(subsystem): Json<NvmeSubsystem>,
) -> ApiResult<impl IntoResponse> {
    let created = state.manager.create_nvme_subsystem(subsystem, &query.id).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_subsystems(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<impl IntoResponse> {
    let response = state
        .manager
        .list_nvme_subsystems(list_request(String::new(), query))
        .await?;
    Ok(Json(response))
}

async fn get_subsystem(
    State(state): State<AppState>,
    Path(sid): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let name = root_name(ResourceKind::Subsystem, &sid);
    Ok(Json(state.manager.get_nvme_subsystem(&name).await?))
}

async fn update_subsystem(
    State(state): State<AppState>,
    Path(sid): Path<String>,
    Json(mut request): Json<UpdateRequest<NvmeSubsystem>>,
) -> ApiResult<impl IntoResponse> {
    request.resource.name = root_name(ResourceKind::Subsystem, &sid);
    Ok(Json(state.manager.update_nvme_subsystem(request).await?))
}

async fn delete_subsystem(
    State(state): State<AppState>,
    Path(sid): Path<String>,
    Query(query): Query<DeleteQuery>,
) -> ApiResult<impl IntoResponse> {
    let name = root_name(ResourceKind::Subsystem, &sid);
    state.manager.delete_nvme_subsystem(delete_request(name, query)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn stats_subsystem(
    State(state): State<AppState>,
    Path(sid): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let name = root_name(ResourceKind::Subsystem, &sid);
    Ok(Json(state.manager.stats_nvme_subsystem(&name).await?))
}

// =============================================================================
// Controller Handlers
// =============================================================================

async fn create_controller(
    State(state): State<AppState>,
    Path(sid): Path<String>,
    Query(query): Query<CreateQuery>,
    Json(controller): Json<NvmeController>,
) -> ApiResult<impl IntoResponse> {
    let parent = root_name(ResourceKind::Subsystem, &sid);
    let created = state
        .manager
        .create_nvme_controller(&parent, controller, &query.id)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_controllers(
    State(state): State<AppState>,
    Path(sid): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<impl IntoResponse> {
    let parent = root_name(ResourceKind::Subsystem, &sid);
    Ok(Json(state.manager.list_nvme_controllers(list_request(parent, query)).await?))
}

async fn get_controller(
    State(state): State<AppState>,
    Path((sid, id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let name = compose_name(ResourceKind::Controller, &sid, &id);
    Ok(Json(state.manager.get_nvme_controller(&name).await?))
}

async fn update_controller(
    State(state): State<AppState>,
    Path((sid, id)): Path<(String, String)>,
    Json(mut request): Json<UpdateRequest<NvmeController>>,
) -> ApiResult<impl IntoResponse> {
    request.resource.name = compose_name(ResourceKind::Controller, &sid, &id);
    Ok(Json(state.manager.update_nvme_controller(request).await?))
}

async fn delete_controller(
    State(state): State<AppState>,
    Path((sid, id)): Path<(String, String)>,
    Query(query): Query<DeleteQuery>,
) -> ApiResult<impl IntoResponse> {
    let name = compose_name(ResourceKind::Controller, &sid, &id);
    state.manager.delete_nvme_controller(delete_request(name, query)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn stats_controller(
    State(state): State<AppState>,
    Path((sid, id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let name = compose_name(ResourceKind::Controller, &sid, &id);
    Ok(Json(state.manager.stats_nvme_controller(&name).await?))
}

// =============================================================================
// Namespace Handlers
// =============================================================================

async fn create_namespace(
    State(state): State<AppState>,
    Path(sid): Path<String>,
    Query(query): Query<CreateQuery>,
    Json(namespace): Json<NvmeNamespace>,
) -> ApiResult<impl IntoResponse> {
    let parent = root_name(ResourceKind::Subsystem, &sid);
    let created = state
        .manager
        .create_nvme_namespace(&parent, namespace, &query.id)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_namespaces(
    State(state): State<AppState>,
    Path(sid): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<impl IntoResponse> {
    let parent = root_name(ResourceKind::Subsystem, &sid);
    Ok(Json(state.manager.list_nvme_namespaces(list_request(parent, query)).await?))
}

async fn get_namespace(
    State(state): State<AppState>,
    Path((sid, id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let name = compose_name(ResourceKind::Namespace, &sid, &id);
    Ok(Json(state.manager.get_nvme_namespace(&name).await?))
}

async fn update_namespace(
    State(state): State<AppState>,
    Path((sid, id)): Path<(String, String)>,
    Json(mut request): Json<UpdateRequest<NvmeNamespace>>,
) -> ApiResult<impl IntoResponse> {
    request.resource.name = compose_name(ResourceKind::Namespace, &sid, &id);
    Ok(Json(state.manager.update_nvme_namespace(request).await?))
}

async fn delete_namespace(
    State(state): State<AppState>,
    Path((sid, id)): Path<(String, String)>,
    Query(query): Query<DeleteQuery>,
) -> ApiResult<impl IntoResponse> {
    let name = compose_name(ResourceKind::Namespace, &sid, &id);
    state.manager.delete_nvme_namespace(delete_request(name, query)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn stats_namespace(
    State(state): State<AppState>,
    Path((sid, id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let name = compose_name(ResourceKind::Namespace, &sid, &id);
    Ok(Json(state.manager.stats_nvme_namespace(&name).await?))
}

// =============================================================================
// virtio-blk Handlers
// =============================================================================

async fn create_virtio_blk(
    State(state): State<AppState>,
    Query(query): Query<CreateQuery>,
    Json(device): Json<VirtioBlk>,
) -> ApiResult<impl IntoResponse> {
    let created = state.manager.create_virtio_blk(device, &query.id).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_virtio_blks(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.manager.list_virtio_blks(list_request(String::new(), query)).await?))
}

async fn get_virtio_blk(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let name = root_name(ResourceKind::VirtioBlk, &id);
    Ok(Json(state.manager.get_virtio_blk(&name).await?))
}

async fn update_virtio_blk(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut request): Json<UpdateRequest<VirtioBlk>>,
) -> ApiResult<impl IntoResponse> {
    request.resource.name = root_name(ResourceKind::VirtioBlk, &id);
    Ok(Json(state.manager.update_virtio_blk(request).await?))
}

async fn delete_virtio_blk(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<DeleteQuery>,
) -> ApiResult<impl IntoResponse> {
    let name = root_name(ResourceKind::VirtioBlk, &id);
    state.manager.delete_virtio_blk(delete_request(name, query)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn stats_virtio_blk(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let name = root_name(ResourceKind::VirtioBlk, &id);
    Ok(Json(state.manager.stats_virtio_blk(&name).await?))
}

// =============================================================================
// virtio-scsi Handlers
// =============================================================================

async fn create_scsi_controller(
    State(state): State<AppState>,
    Query(query): Query<CreateQuery>,
    Json(controller): Json<ScsiController>,
) -> ApiResult<impl IntoResponse> {
    let created = state.manager.create_scsi_controller(controller, &query.id).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_scsi_controllers(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(
        state
            .manager
            .list_scsi_controllers(list_request(String::new(), query))
            .await?,
    ))
}

async fn get_scsi_controller(
    State(state): State<AppState>,
    Path(cid): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let name = root_name(ResourceKind::ScsiController, &cid);
    Ok(Json(state.manager.get_scsi_controller(&name).await?))
}

async fn update_scsi_controller(
    State(state): State<AppState>,
    Path(cid): Path<String>,
    Json(mut request): Json<UpdateRequest<ScsiController>>,
) -> ApiResult<impl IntoResponse> {
    request.resource.name = root_name(ResourceKind::ScsiController, &cid);
    Ok(Json(state.manager.update_scsi_controller(request).await?))
}

async fn delete_scsi_controller(
    State(state): State<AppState>,
    Path(cid): Path<String>,
    Query(query): Query<DeleteQuery>,
) -> ApiResult<impl IntoResponse> {
    let name = root_name(ResourceKind::ScsiController, &cid);
    state.manager.delete_scsi_controller(delete_request(name, query)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn stats_scsi_controller(
    State(state): State<AppState>,
    Path(cid): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let name = root_name(ResourceKind::ScsiController, &cid);
    Ok(Json(state.manager.stats_scsi_controller(&name).await?))
}

async fn create_scsi_lun(
    State(state): State<AppState>,
    Path(cid): Path<String>,
    Query(query): Query<CreateQuery>,
    Json(lun): Json<ScsiLun>,
) -> ApiResult<impl IntoResponse> {
    let parent = root_name(ResourceKind::ScsiController, &cid);
    let created = state.manager.create_scsi_lun(&parent, lun, &query.id).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_scsi_luns(
    State(state): State<AppState>,
    Path(cid): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<impl IntoResponse> {
    let parent = root_name(ResourceKind::ScsiController, &cid);
    Ok(Json(state.manager.list_scsi_luns(list_request(parent, query)).await?))
}

async fn get_scsi_lun(
    State(state): State<AppState>,
    Path((cid, id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let name = compose_name(ResourceKind::ScsiLun, &cid, &id);
    Ok(Json(state.manager.get_scsi_lun(&name).await?))
}

async fn update_scsi_lun(
    State(state): State<AppState>,
    Path((cid, id)): Path<(String, String)>,
    Json(mut request): Json<UpdateRequest<ScsiLun>>,
) -> ApiResult<impl IntoResponse> {
    request.resource.name = compose_name(ResourceKind::ScsiLun, &cid, &id);
    Ok(Json(state.manager.update_scsi_lun(request).await?))
}

async fn delete_scsi_lun(
    State(state): State<AppState>,
    Path((cid, id)): Path<(String, String)>,
    Query(query): Query<DeleteQuery>,
) -> ApiResult<impl IntoResponse> {
    let name = compose_name(ResourceKind::ScsiLun, &cid, &id);
    state.manager.delete_scsi_lun(delete_request(name, query)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn stats_scsi_lun(
    State(state): State<AppState>,
    Path((cid, id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let name = compose_name(ResourceKind::ScsiLun, &cid, &id);
    Ok(Json(state.manager.stats_scsi_lun(&name).await?))
}

// =============================================================================
// Health and Metrics
// =============================================================================

/// Health check
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Ready once the engine answers a version request
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.manager.engine_version().await {
        Ok(version) => (StatusCode::OK, format!("ready ({})", version.version)),
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, format!("engine unavailable: {}", e)),
    }
}

async fn metrics_handler() -> ApiResult<impl IntoResponse> {
    let (content_type, body) = metrics::render()?;
    Ok(([(header::CONTENT_TYPE, content_type)], body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransportConfig;
    use crate::engine::simulated::{Injected, SimulatedEngine};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn router() -> (Arc<SimulatedEngine>, Router) {
        let engine = Arc::new(SimulatedEngine::new());
        let manager = ResourceManager::with_engine(engine.clone(), &TransportConfig::default());
        (engine, RestRouter::new(Arc::new(manager)).build())
    }

    async fn send(
        router: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        let request = match body {
            Some(body) => request.body(Body::from(body.to_string())).unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn create(router: &Router, id: &str) -> (StatusCode, Value) {
        let uri = format!("/v1/subsystems?subsystemId={}", id);
        send(router, "POST", &uri, Some(subsystem_body())).await
    }

    fn subsystem_body() -> Value {
        json!({"spec": {"nqn": "nqn.2022-09.io.spdk:opi3", "serialNumber": "sn", "modelNumber": "mn", "maxNamespaces": 8}})
    }

    #[tokio::test]
    async fn test_subsystem_round_trip() {
        let (_engine, router) = router();

        let (status, created) = send(
            &router,
            "POST",
            "/v1/subsystems?subsystemId=subsystem-test",
            Some(subsystem_body()),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["name"], "//storage.bridge.dev/subsystems/subsystem-test");
        assert!(created["status"]["firmwareRevision"].is_string());

        let (status, fetched) = send(&router, "GET", "/v1/subsystems/subsystem-test", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["spec"]["nqn"], "nqn.2022-09.io.spdk:opi3");

        let (status, listed) = send(&router, "GET", "/v1/subsystems?pageSize=1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed["items"].as_array().unwrap().len(), 1);
        assert_eq!(listed["nextPageToken"], "");

        let (status, _) = send(&router, "DELETE", "/v1/subsystems/subsystem-test", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_error_mapping() {
        let (engine, router) = router();

        let (status, body) = send(&router, "GET", "/v1/subsystems/missing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");

        let (status, _) = send(&router, "GET", "/v1/subsystems?pageSize=-1", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&router, "GET", "/v1/scsiControllers/scsi0/stats", None).await;
        assert_eq!(status, StatusCode::NOT_IMPLEMENTED);

        let (status, _) = send(
            &router,
            "DELETE",
            "/v1/subsystems/missing?allowMissing=true",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        engine.inject("nvmf_create_subsystem", Injected::Engine(-17, "File exists".into()));
        let (status, body) = create(&router, "s1").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "engine_error");

        engine.inject("nvmf_create_subsystem", Injected::Transport("broken pipe".into()));
        let (status, _) = create(&router, "s1").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_patch_uses_path_name() {
        let (_engine, router) = router();
        create(&router, "s1").await;

        let (status, updated) = send(
            &router,
            "PATCH",
            "/v1/subsystems/s1",
            Some(json!({
                "resource": {"name": "ignored", "spec": {"nqn": "nqn.2022-09.io.spdk:opi3", "serialNumber": "new"}},
                "updateMask": {"paths": ["spec.serialNumber"]}
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["name"], "//storage.bridge.dev/subsystems/s1");
        assert_eq!(updated["spec"]["serialNumber"], "new");
        assert_eq!(updated["spec"]["modelNumber"], "mn");
    }

    #[tokio::test]
    async fn test_nested_routes() {
        let (_engine, router) = router();
        create(&router, "s1").await;

        let (status, ns) = send(
            &router,
            "POST",
            "/v1/subsystems/s1/namespaces?nvmeNamespaceId=ns0",
            Some(json!({"spec": {"volumeNameRef": "Malloc0"}})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(ns["spec"]["hostNsid"], 1);

        let (status, listed) = send(&router, "GET", "/v1/subsystems/s1/namespaces", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed["items"][0]["name"], "//storage.bridge.dev/subsystems/s1/namespaces/ns0");
    }

    #[tokio::test]
    async fn test_health_ready_metrics() {
        let (engine, router) = router();

        let response = router
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .clone()
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        engine.inject("spdk_get_version", Injected::Transport("refused".into()));
        let response = router
            .clone()
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = router
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
