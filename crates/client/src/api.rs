//! REST client for the generation backend.
//!
//! Wraps the three HTTP endpoints this client talks to using
//! [`reqwest`]:
//!
//! | Method | Path                        | Success body                    |
//! |--------|-----------------------------|---------------------------------|
//! | POST   | `/c/prompt`                 | `{"id": "..."}`                 |
//! | GET    | `/c/prompt?id=...`          | `{"ai_generated_prompt": ...}`  |
//! | GET    | `/c/cloudinary_url?id=...`  | `{"cloudinary_url": ...}`       |
//!
//! The [`GenerationBackend`] trait is the seam the poller and submitter
//! depend on, so they can run against an in-memory backend in tests.

use async_trait::async_trait;
use manimgen_core::types::JobId;
use serde_json::Value;

/// Field carrying the generated scene plan.
pub const PLAN_FIELD: &str = "ai_generated_prompt";

/// Field carrying the rendered video URL.
pub const VIDEO_FIELD: &str = "cloudinary_url";

/// Operations the client needs from the generation backend.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Create a generation job. Returns the raw success body; the caller
    /// decides whether it has the expected shape.
    async fn create_job(&self, prompt: &str) -> Result<Value, ApiError>;

    /// Fetch the scene plan. `Ok(None)` means "not ready".
    async fn fetch_plan(&self, id: &JobId) -> Result<Option<String>, ApiError>;

    /// Fetch the rendered video URL. `Ok(None)` means "not ready".
    async fn fetch_video(&self, id: &JobId) -> Result<Option<String>, ApiError>;
}

/// HTTP client for one backend deployment.
pub struct GenerationApi {
    client: reqwest::Client,
    base_url: String,
}

/// Errors from the REST layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend returned a non-2xx status code.
    #[error("Backend API error ({status}): {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A 2xx response whose body is not valid JSON.
    #[error("Malformed response body: {0}")]
    Decode(String),
}

impl ApiError {
    /// Whether the backend rejected the job identifier itself: 404 for an
    /// unknown job, 400 for an identifier it cannot parse.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::Status { status: 400 | 404, .. })
    }
}

impl GenerationApi {
    /// Create a client for the backend at `base_url`, e.g.
    /// `https://api.example.com`. A trailing slash is ignored.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ---- private helpers ----

    /// GET an endpoint keyed by job id and pull out its terminal field.
    async fn fetch_field(
        &self,
        path: &str,
        id: &JobId,
        field: &str,
    ) -> Result<Option<String>, ApiError> {
        let response = self
            .client
            .get(format!("{}{path}", self.base_url))
            .query(&[("id", id.as_str())])
            .send()
            .await?;

        let body: Value = Self::parse_response(response).await?;
        Ok(terminal_field(&body, field))
    }

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or an [`ApiError::Status`]
    /// containing the status and body text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Read a successful response body as JSON.
    ///
    /// The body is read first and decoded separately so that a transport
    /// failure and a malformed body surface as different errors.
    async fn parse_response(response: reqwest::Response) -> Result<Value, ApiError> {
        let response = Self::ensure_success(response).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl GenerationBackend for GenerationApi {
    async fn create_job(&self, prompt: &str) -> Result<Value, ApiError> {
        let body = serde_json::json!({ "prompt": prompt });

        let response = self
            .client
            .post(format!("{}/c/prompt", self.base_url))
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn fetch_plan(&self, id: &JobId) -> Result<Option<String>, ApiError> {
        self.fetch_field("/c/prompt", id, PLAN_FIELD).await
    }

    async fn fetch_video(&self, id: &JobId) -> Result<Option<String>, ApiError> {
        self.fetch_field("/c/cloudinary_url", id, VIDEO_FIELD).await
    }
}

/// Extract a terminal field from a status body.
///
/// Absent and `null` both mean "not ready". Strings are returned as-is;
/// any other JSON value is returned as its JSON text so that a backend
/// storing the plan as a structured value still reaches the parser.
pub fn terminal_field(body: &Value, field: &str) -> Option<String> {
    match body.get(field)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
