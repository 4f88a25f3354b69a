//! CameraClient - Ricoh GR WiFi HTTP API
//!
//! ## Responsibilities
//!
//! - Readiness probe (GET /v1/props) with bounded retry
//! - Directory/file listing (GET /v1/photos) with in-band error detection
//! - Single photo download (GET /v1/photos/{dir}/{file})
//!
//! Retry/timeout policy lives here so callers only see `Ok`/`Err`.
//! Only the probe retries; listing and download are single attempts.

mod types;

pub use types::*;

use crate::error::{Error, Result};
use reqwest::StatusCode;
use tokio::time::sleep;

/// CameraClient instance
pub struct CameraClient {
    client: reqwest::Client,
    base_url: String,
    config: CameraConfig,
}

impl CameraClient {
    /// Create new CameraClient
    pub fn new(config: CameraConfig) -> Result<Self> {
        // Timeouts are set per request; the camera needs very different budgets
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        let base_url = config.base_url.trim_end_matches('/').to_string();

        Ok(Self {
            client,
            base_url,
            config,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Poll GET /v1/props until the camera answers with 2xx
    ///
    /// Returns the number of attempts it took. Fails with `ServerUnreachable`
    /// once the probe policy is exhausted (10 x 1s timeout + 1s delay by default).
    pub async fn wait_for_server(&self) -> Result<u32> {
        let url = format!("{}/v1/props", self.base_url);
        let policy = self.config.probe;

        for attempt in 1..=policy.attempts {
            match self.client.get(&url).timeout(policy.timeout).send().await {
                Ok(resp) if resp.status().is_success() => {
                    tracing::debug!(url = %url, attempt = attempt, "Camera is ready");
                    return Ok(attempt);
                }
                Ok(resp) => {
                    tracing::warn!(
                        url = %url,
                        status = %resp.status(),
                        attempt = attempt,
                        max_attempts = policy.attempts,
                        "Camera probe rejected"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        url = %url,
                        error = %e,
                        attempt = attempt,
                        max_attempts = policy.attempts,
                        "Camera probe failed"
                    );
                }
            }

            if attempt < policy.attempts {
                sleep(policy.delay).await;
            }
        }

        Err(Error::ServerUnreachable {
            url,
            attempts: policy.attempts,
        })
    }

    /// Fetch the full directory/file listing
    ///
    /// The camera reports failures inside an HTTP 200 body, so the payload's
    /// own error code is checked as well as the transport status.
    pub async fn list_photos(&self) -> Result<Vec<PhotoDirectory>> {
        let url = format!("{}/v1/photos", self.base_url);

        let resp = self
            .client
            .get(&url)
            .timeout(self.config.list_timeout)
            .send()
            .await
            .map_err(|e| Error::Listing {
                code: 0,
                message: format!("Failed to GET {}: {}", url, e),
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Listing {
                code: i64::from(status.as_u16()),
                message: format!("Failed to GET {}, HTTP {}", url, status),
            });
        }

        let listing: PhotoListing = resp.json().await.map_err(|e| Error::Listing {
            code: i64::from(status.as_u16()),
            message: format!("Invalid listing payload from {}: {}", url, e),
        })?;

        if !listing.is_success() {
            tracing::warn!(
                url = %url,
                error_code = listing.error_code,
                error_message = %listing.error_message,
                "Camera reported listing error"
            );
            return Err(Error::Listing {
                code: listing.error_code,
                message: listing.error_message,
            });
        }

        tracing::debug!(
            url = %url,
            dirs = listing.dirs.len(),
            files = listing.dirs.iter().map(|d| d.files.len()).sum::<usize>(),
            "Camera listing fetched"
        );

        Ok(listing.dirs)
    }

    /// Download the raw bytes of one photo
    pub async fn download_photo(&self, directory: &str, file_name: &str) -> Result<Vec<u8>> {
        let identity = PhotoIdentity::new(directory, file_name);
        let url = format!(
            "{}/v1/photos/{}/{}",
            self.base_url,
            urlencoding::encode(directory),
            urlencoding::encode(file_name)
        );

        let resp = self
            .client
            .get(&url)
            .timeout(self.config.download_timeout)
            .send()
            .await
            .map_err(|e| Error::Download {
                identity: identity.key(),
                message: e.to_string(),
            })?;

        if resp.status() != StatusCode::OK {
            return Err(Error::Download {
                identity: identity.key(),
                message: format!("Failed to GET {}, HTTP {}", url, resp.status()),
            });
        }

        let bytes = resp.bytes().await.map_err(|e| Error::Download {
            identity: identity.key(),
            message: format!("Body read failed: {}", e),
        })?;

        tracing::debug!(identity = %identity, size = bytes.len(), "Photo downloaded");

        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_client(base_url: String) -> CameraClient {
        CameraClient::new(CameraConfig {
            base_url,
            probe: ProbePolicy {
                attempts: 10,
                timeout: Duration::from_millis(200),
                delay: Duration::from_millis(5),
            },
            list_timeout: Duration::from_secs(5),
            download_timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_wait_for_server_immediate() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/props"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"model": "GR III"})))
            .mount(&mock)
            .await;

        let client = fast_client(mock.uri());
        assert_eq!(client.wait_for_server().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_wait_for_server_timeout_counts_as_failure() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/props"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&mock)
            .await;

        let client = CameraClient::new(CameraConfig {
            base_url: mock.uri(),
            probe: ProbePolicy {
                attempts: 2,
                timeout: Duration::from_millis(50),
                delay: Duration::from_millis(5),
            },
            ..CameraConfig::default()
        })
        .unwrap();

        match client.wait_for_server().await {
            Err(Error::ServerUnreachable { attempts, .. }) => assert_eq!(attempts, 2),
            other => panic!("Expected ServerUnreachable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_wait_for_server_spaces_attempts_by_delay() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/props"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock)
            .await;

        let delay = Duration::from_millis(300);
        let client = CameraClient::new(CameraConfig {
            base_url: mock.uri(),
            probe: ProbePolicy {
                attempts: 3,
                timeout: Duration::from_millis(200),
                delay,
            },
            ..CameraConfig::default()
        })
        .unwrap();

        let started = std::time::Instant::now();
        let result = client.wait_for_server().await;
        let elapsed = started.elapsed();

        assert!(matches!(result, Err(Error::ServerUnreachable { attempts: 3, .. })));
        // two gaps between three attempts, no sleep after the last one
        assert!(elapsed >= delay * 2, "elapsed {:?}", elapsed);
        assert!(elapsed < delay * 3 - Duration::from_millis(50), "elapsed {:?}", elapsed);
        assert_eq!(mock.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_list_photos_success() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/photos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errCode": 200,
                "errMsg": "OK",
                "dirs": [
                    {"name": "100RICOH", "files": ["R001.JPG", "R002.JPG"]},
                    {"name": "101RICOH", "files": []}
                ]
            })))
            .mount(&mock)
            .await;

        let dirs = fast_client(mock.uri()).list_photos().await.unwrap();
        assert_eq!(dirs.len(), 2);
        assert_eq!(dirs[0].name, "100RICOH");
        assert_eq!(dirs[0].files, vec!["R001.JPG", "R002.JPG"]);
        assert!(dirs[1].files.is_empty());
    }

    #[tokio::test]
    async fn test_list_photos_http_error() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/photos"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock)
            .await;

        match fast_client(mock.uri()).list_photos().await {
            Err(Error::Listing { code, .. }) => assert_eq!(code, 503),
            other => panic!("Expected Listing error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_list_photos_garbage_body() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/photos"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>captive portal</html>"))
            .mount(&mock)
            .await;

        assert!(matches!(
            fast_client(mock.uri()).list_photos().await,
            Err(Error::Listing { .. })
        ));
    }

    #[tokio::test]
    async fn test_download_photo() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/photos/100RICOH/R001.JPG"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xFF, 0xD8, 0xFF, 0xE0]))
            .mount(&mock)
            .await;

        let data = fast_client(mock.uri())
            .download_photo("100RICOH", "R001.JPG")
            .await
            .unwrap();
        assert_eq!(data, vec![0xFF, 0xD8, 0xFF, 0xE0]);
    }

    #[tokio::test]
    async fn test_download_photo_not_found() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/photos/100RICOH/R404.JPG"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock)
            .await;

        match fast_client(mock.uri())
            .download_photo("100RICOH", "R404.JPG")
            .await
        {
            Err(Error::Download { identity, message }) => {
                assert_eq!(identity, "100RICOH/R404.JPG");
                assert!(message.contains("404"));
            }
            other => panic!("Expected Download error, got {:?}", other),
        }
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = CameraClient::new(CameraConfig {
            base_url: "http://192.168.0.1/".to_string(),
            ..CameraConfig::default()
        })
        .unwrap();
        assert_eq!(client.base_url(), "http://192.168.0.1");
    }
}
