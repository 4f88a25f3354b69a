//! Camera API type definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Success code the camera embeds in its listing payload
pub const CAMERA_OK_CODE: i64 = 200;

/// Readiness probe retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbePolicy {
    /// Maximum number of probe requests
    pub attempts: u32,
    /// Per-attempt request timeout
    pub timeout: Duration,
    /// Fixed delay between attempts
    pub delay: Duration,
}

impl Default for ProbePolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            timeout: Duration::from_secs(1),
            delay: Duration::from_secs(1),
        }
    }
}

/// Camera connection settings
#[derive(Debug, Clone)]
pub struct CameraConfig {
    /// Base URL of the camera HTTP API (e.g., http://192.168.0.1)
    pub base_url: String,
    pub probe: ProbePolicy,
    /// Timeout for GET /v1/photos (the camera may take a while on large cards)
    pub list_timeout: Duration,
    /// Timeout for a single photo download
    pub download_timeout: Duration,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            base_url: "http://192.168.0.1".to_string(),
            probe: ProbePolicy::default(),
            list_timeout: Duration::from_secs(120),
            download_timeout: Duration::from_secs(60),
        }
    }
}

/// One camera-side folder and its files, in camera order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoDirectory {
    pub name: String,
    #[serde(default)]
    pub files: Vec<String>,
}

/// Raw GET /v1/photos payload
///
/// Firmware emits `errCode`/`errMsg`; the documented names are accepted too.
#[derive(Debug, Clone, Deserialize)]
pub struct PhotoListing {
    #[serde(rename = "errorCode", alias = "errCode")]
    pub error_code: i64,
    #[serde(rename = "errorMessage", alias = "errMsg", default)]
    pub error_message: String,
    #[serde(default)]
    pub dirs: Vec<PhotoDirectory>,
}

impl PhotoListing {
    pub fn is_success(&self) -> bool {
        self.error_code == CAMERA_OK_CODE
    }
}

/// Stable identity of one photo: `{directory}/{file}`
///
/// Used both as the dedup key and as the remote object key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PhotoIdentity {
    pub directory: String,
    pub file_name: String,
}

impl PhotoIdentity {
    pub fn new(directory: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            file_name: file_name.into(),
        }
    }

    /// Key used for the dedup store and the remote object name
    pub fn key(&self) -> String {
        format!("{}/{}", self.directory, self.file_name)
    }
}

impl fmt::Display for PhotoIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.directory, self.file_name)
    }
}
