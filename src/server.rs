use axum::{
    extract::{Path, Query},
    http::{Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Extension, Router,
};
use hyper::Server;
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::error::ReconError;
use crate::pipeline::storage::{DatasetStore, VersionSelector};
use crate::query::{LaunchQuery, QueryService};

type SharedStore = Arc<dyn DatasetStore>;

/// Maps crate errors onto HTTP status codes
struct ApiError(ReconError);

impl From<ReconError> for ApiError {
    fn from(e: ReconError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ReconError::VersionNotFound(_) => StatusCode::NOT_FOUND,
            ReconError::Config(_) | ReconError::InvalidVersion(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            warn!("Query failed: {}", self.0);
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult = std::result::Result<Response, ApiError>;

/// Comma-separated projection for `/launches`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ColumnsParam {
    columns: Option<String>,
}

impl ColumnsParam {
    fn list(&self) -> Vec<String> {
        self.columns
            .as_deref()
            .map(|c| {
                c.split(',')
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

async fn open(store: &SharedStore, tag: &str) -> Result<QueryService, ApiError> {
    Ok(QueryService::open(store.as_ref(), &VersionSelector::parse(tag)).await?)
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "launch_recon",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Prometheus text exposition, when a recorder is installed
async fn metrics() -> Response {
    match crate::metrics::render() {
        Some(body) => body.into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn versions(Extension(store): Extension<SharedStore>) -> ApiResult {
    Ok(Json(store.versions().await?).into_response())
}

async fn launches(
    Extension(store): Extension<SharedStore>,
    Path(tag): Path<String>,
    Query(query): Query<LaunchQuery>,
    Query(columns): Query<ColumnsParam>,
) -> ApiResult {
    let service = open(&store, &tag).await?;
    let rows = service.rows(&query, &columns.list())?;
    Ok(Json(json!({ "version": service.info(), "rows": rows })).into_response())
}

async fn features(
    Extension(store): Extension<SharedStore>,
    Path(tag): Path<String>,
    Query(query): Query<LaunchQuery>,
) -> ApiResult {
    let service = open(&store, &tag).await?;
    Ok(Json(service.feature_matrix(&query)).into_response())
}

async fn sites(
    Extension(store): Extension<SharedStore>,
    Path(tag): Path<String>,
    Query(query): Query<LaunchQuery>,
) -> ApiResult {
    let service = open(&store, &tag).await?;
    Ok(Json(service.site_summary(&query)).into_response())
}

async fn summary(
    Extension(store): Extension<SharedStore>,
    Path(tag): Path<String>,
    Query(query): Query<LaunchQuery>,
) -> ApiResult {
    let service = open(&store, &tag).await?;
    Ok(Json(json!({
        "version": service.info(),
        "launches_per_year": service.launches_per_year(&query),
        "outcomes": service.outcome_counts(&query),
        "variants": service.variant_usage(&query),
        "missing_values": service.missing_value_report(),
        "diagnostics": service.snapshot().diagnostics,
    }))
    .into_response())
}

/// Read-only routes over committed dataset versions. `latest` is accepted as a tag.
pub fn create_server(store: SharedStore) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/versions", get(versions))
        .route("/versions/:tag/launches", get(launches))
        .route("/versions/:tag/features", get(features))
        .route("/versions/:tag/sites", get(sites))
        .route("/versions/:tag/summary", get(summary))
        .layer(Extension(store))
        .layer(ServiceBuilder::new().layer(cors))
}

/// Start the HTTP server on the specified port
pub async fn start_server(store: SharedStore, port: u16) -> anyhow::Result<()> {
    let app = create_server(store);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!("HTTP server running on http://localhost:{}", port);
    info!("Health check: http://localhost:{}/health", port);

    Server::bind(&addr).serve(app.into_make_service()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::storage::test_support::dataset;
    use crate::pipeline::storage::InMemoryDatasetStore;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    async fn app() -> Router {
        let store = InMemoryDatasetStore::new();
        store.commit("v1", dataset(3)).await.unwrap();
        create_server(Arc::new(store))
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get_json(app().await, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_versions_and_latest_launches() {
        let (status, body) = get_json(app().await, "/versions").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["tag"], "v1");

        let (status, body) = get_json(app().await, "/versions/latest/launches?columns=launch_id,outcome").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["rows"].as_array().unwrap().len(), 3);
        assert_eq!(body["rows"][0].as_object().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_version_is_404() {
        let (status, body) = get_json(app().await, "/versions/v9/features").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("v9"));
    }

    #[tokio::test]
    async fn test_unknown_column_is_400() {
        let (status, _) = get_json(app().await, "/versions/v1/launches?columns=thrust").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
