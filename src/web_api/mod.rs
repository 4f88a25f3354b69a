//! WebAPI - REST API Endpoints
//!
//! ## Responsibilities
//!
//! - Image listing and URL lookup for the viewer UI
//! - Manual refresh, snapshot upload and retention triggers
//! - Sync worker status

mod routes;

pub use routes::create_router;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::models::HealthResponse;
use crate::state::AppState;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let synced_count = match &state.dedup {
        Some(dedup) => match dedup.count().await {
            Ok(count) => Some(count),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to count synced photos");
                None
            }
        },
        None => None,
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        camera_url: state.config.camera_url.clone(),
        synced_count,
    })
}
