//! API Routes

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::error::Result;
use crate::models::{ApiResponse, RetentionSummary, UploadLatestRequest};
use crate::retention_manager::RetentionReport;
use crate::state::AppState;
use crate::sync_orchestrator::{
    RecentImage, SnapshotKind, SyncReport, SyncStatus, SyncTrigger, UploadedPhoto,
};

/// Create API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(super::health_check))
        // Images
        .route("/api/images", get(list_images))
        .route("/api/images/url", get(image_url))
        // Sync
        .route("/api/sync", post(run_sync))
        .route("/api/sync/status", get(sync_status))
        .route("/api/upload-latest", post(upload_latest))
        .route("/api/retention", post(run_retention))
        .with_state(state)
}

async fn list_images(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<RecentImage>>>> {
    let images = state.orchestrator.list_recent_images().await?;
    Ok(Json(ApiResponse::success(images)))
}

#[derive(Debug, Deserialize)]
struct ImageUrlQuery {
    key: String,
}

async fn image_url(
    State(state): State<AppState>,
    Query(query): Query<ImageUrlQuery>,
) -> Result<Json<ApiResponse<String>>> {
    let url = state.orchestrator.image_url(&query.key).await?;
    Ok(Json(ApiResponse::success(url)))
}

async fn run_sync(State(state): State<AppState>) -> Result<Json<ApiResponse<SyncReport>>> {
    let report = state.sync.run_cycle(SyncTrigger::Manual).await?;
    Ok(Json(ApiResponse::success(report)))
}

async fn sync_status(State(state): State<AppState>) -> Json<ApiResponse<SyncStatus>> {
    Json(ApiResponse::success(state.sync.status().await))
}

async fn upload_latest(
    State(state): State<AppState>,
    body: Option<Json<UploadLatestRequest>>,
) -> Result<Json<ApiResponse<UploadedPhoto>>> {
    let kind = body
        .and_then(|Json(req)| req.kind)
        .unwrap_or(SnapshotKind::Manual);
    let uploaded = state.sync.upload_most_recent(kind).await?;
    Ok(Json(ApiResponse::success(uploaded)))
}

async fn run_retention(State(state): State<AppState>) -> Result<Json<ApiResponse<RetentionSummary>>> {
    let report = state.sync.enforce_retention().await?;
    Ok(Json(ApiResponse::success(summarize(report))))
}

fn summarize(report: RetentionReport) -> RetentionSummary {
    RetentionSummary {
        retained: report.retained_urls(),
        deleted: report.deleted,
        failed: report.failed.into_iter().map(|f| f.key).collect(),
    }
}
