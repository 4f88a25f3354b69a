//! Error handling for the GR uploader

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Camera did not answer the readiness probe within the retry budget
    #[error("Camera unreachable at {url} after {attempts} attempts")]
    ServerUnreachable { url: String, attempts: u32 },

    /// Camera reported an error inside the listing payload (or the listing call failed)
    #[error("Listing error {code}: {message}")]
    Listing { code: i64, message: String },

    /// Single photo download failed
    #[error("Download failed for {identity}: {message}")]
    Download { identity: String, message: String },

    /// Upload to the remote store failed
    #[error("Upload failed for {key}: {message}")]
    Upload { key: String, message: String },

    /// Deleting an excess remote object failed (non-fatal)
    #[error("Failed to delete remote object {key}: {message}")]
    RetentionDelete { key: String, message: String },

    /// Remote store error (listing, url lookup)
    #[error("Remote store error: {0}")]
    RemoteStore(String),

    /// Dedup store error
    #[error("Dedup store error: {0}")]
    DedupStore(String),

    /// Not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Sync worker queue is full
    #[error("Busy: {0}")]
    Busy(String),

    /// Operation was cancelled
    #[error("Cancelled")]
    Cancelled,

    /// Config error
    #[error("Config error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// SQLx database error
    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

impl Error {
    /// Errors that stop a whole cycle before any photo is processed
    pub fn is_fatal_for_cycle(&self) -> bool {
        matches!(
            self,
            Error::ServerUnreachable { .. } | Error::Listing { .. } | Error::Cancelled
        )
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self {
            Error::ServerUnreachable { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVER_UNREACHABLE")
            }
            Error::Listing { .. } => (StatusCode::BAD_GATEWAY, "LISTING_ERROR"),
            Error::Download { .. } => (StatusCode::BAD_GATEWAY, "DOWNLOAD_ERROR"),
            Error::Upload { .. } => (StatusCode::BAD_GATEWAY, "UPLOAD_ERROR"),
            Error::RetentionDelete { .. } => (StatusCode::BAD_GATEWAY, "RETENTION_DELETE_ERROR"),
            Error::RemoteStore(_) => (StatusCode::BAD_GATEWAY, "REMOTE_STORE_ERROR"),
            Error::DedupStore(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DEDUP_STORE_ERROR"),
            Error::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Error::Busy(_) => (StatusCode::CONFLICT, "BUSY"),
            Error::Cancelled => (StatusCode::SERVICE_UNAVAILABLE, "CANCELLED"),
            Error::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
            Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            Error::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
            Error::Sqlx(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
        };
        let message = self.to_string();

        tracing::error!(
            status = %status,
            error_code = %error_code,
            message = %message,
            "Request error"
        );

        let body = Json(json!({
            "ok": false,
            "error_code": error_code,
            "error": message
        }));

        (status, body).into_response()
    }
}
