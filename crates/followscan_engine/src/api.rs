use std::time::Duration;

use chrono::{DateTime, Utc};
use followscan_core::{PageType, Platform, UploadReceipt};
use reqwest::header::COOKIE;
use reqwest::{RequestBuilder, Url};
use scan_logging::{scan_debug, scan_info, scan_warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Version reported in upload metadata.
pub const EXTENSION_VERSION: &str = env!("CARGO_PKG_VERSION");

const IMPORT_PATH: &str = "/api/extension/import";
const SESSION_PATH: &str = "/api/auth/session";
const HEALTH_PATH: &str = "/api/health";

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    /// Sent as the `Cookie` header on every call.
    pub session_cookie: Option<String>,
    pub request_timeout: Duration,
    pub health_timeout: Duration,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8888".to_string(),
            session_cookie: None,
            request_timeout: Duration::from_secs(30),
            health_timeout: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    pub platform: Platform,
    pub identifiers: Vec<String>,
    pub metadata: UploadMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadMetadata {
    pub extension_version: String,
    pub scraped_at: DateTime<Utc>,
    pub page_type: PageType,
    pub source_url: Option<String>,
}

/// Logged-in account on the matching service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Session {
    pub did: String,
    pub handle: String,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    data: Option<T>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("invalid api url: {0}")]
    InvalidUrl(String),
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("{body}")]
    Status { status: u16, body: String },
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("upload rejected: {0}")]
    Rejected(String),
}

/// The matching service as seen from the UI context.
#[async_trait::async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, request: &UploadRequest) -> Result<UploadReceipt, ApiError>;

    /// `true` when the service answers 2xx within the health timeout.
    async fn check_health(&self) -> bool;

    /// The current session, or `None` when not logged in or unreachable.
    async fn check_session(&self) -> Option<Session>;
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    settings: ApiSettings,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(settings: ApiSettings) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ApiError::Network(err.to_string()))?;
        Ok(Self { settings, client })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        let base = self.settings.base_url.trim_end_matches('/');
        Url::parse(&format!("{base}{path}")).map_err(|err| ApiError::InvalidUrl(err.to_string()))
    }

    fn with_credentials(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.settings.session_cookie {
            Some(cookie) => builder.header(COOKIE, cookie.as_str()),
            None => builder,
        }
    }
}

#[async_trait::async_trait]
impl Uploader for ApiClient {
    async fn upload(&self, request: &UploadRequest) -> Result<UploadReceipt, ApiError> {
        let url = self.endpoint(IMPORT_PATH)?;
        scan_info!(
            "Uploading {} identifiers platform={}",
            request.identifiers.len(),
            request.platform
        );

        let response = self
            .with_credentials(self.client.post(url).json(request))
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let body = response.text().await.map_err(map_reqwest_error)?;
        if !status.is_success() {
            let body = if body.trim().is_empty() {
                status.to_string()
            } else {
                body
            };
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        decode_envelope::<UploadReceipt>(&body)
    }

    async fn check_health(&self) -> bool {
        let Ok(url) = self.endpoint(HEALTH_PATH) else {
            return false;
        };
        match self
            .client
            .get(url)
            .timeout(self.settings.health_timeout)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                scan_debug!("Health check failed: {}", err);
                false
            }
        }
    }

    async fn check_session(&self) -> Option<Session> {
        let url = self.endpoint(SESSION_PATH).ok()?;
        let response = match self.with_credentials(self.client.get(url)).send().await {
            Ok(response) => response,
            Err(err) => {
                scan_debug!("Session check failed: {}", err);
                return None;
            }
        };
        if !response.status().is_success() {
            return None;
        }
        let body = response.text().await.ok()?;
        match decode_envelope::<Session>(&body) {
            Ok(session) => Some(session),
            Err(err) => {
                scan_warn!("Session response not understood: {}", err);
                None
            }
        }
    }
}

fn decode_envelope<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    let envelope: Envelope<T> =
        serde_json::from_str(body).map_err(|err| ApiError::Decode(err.to_string()))?;
    match (envelope.success, envelope.data) {
        (true, Some(data)) => Ok(data),
        (true, None) => Err(ApiError::Decode("missing data".to_string())),
        (false, _) => Err(ApiError::Rejected(
            envelope.error.unwrap_or_else(|| body.to_string()),
        )),
    }
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::Timeout;
    }
    ApiError::Network(err.to_string())
}
