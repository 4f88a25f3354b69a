//! Shared API models

use serde::{Deserialize, Serialize};

/// Standard API response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub camera_url: String,
    /// Photos marked as synced, if the dedup store is persistent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synced_count: Option<i64>,
}

/// Summary of a retention pass for the UI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionSummary {
    /// Retained URLs, newest first
    pub retained: Vec<String>,
    pub deleted: Vec<String>,
    pub failed: Vec<String>,
}

/// Body of `POST /api/upload-latest`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadLatestRequest {
    /// `manual` (default) or `startup`
    #[serde(default)]
    pub kind: Option<crate::sync_orchestrator::SnapshotKind>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_response_skips_empty_fields() {
        let json = serde_json::to_value(ApiResponse::success(1)).unwrap();
        assert_eq!(json, serde_json::json!({"ok": true, "data": 1}));
    }
}
