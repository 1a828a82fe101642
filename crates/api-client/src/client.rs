//! API client that replays queued mutations against the Slainte backend.

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde::Deserialize;

use slainte_core::queue::{
    ExecutionError, ExecutionOutcome, ExecutionRequest, MutationType, RemoteExecutor,
};

use crate::error::{is_retryable_status, ApiError, Result};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_LOG_BODY_CHARS: usize = 512;

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    code: String,
    message: String,
}

/// Body of a successful create-type call.
#[derive(Debug, Deserialize)]
struct CreatedResponse {
    id: String,
}

/// HTTP client for the Slainte backend.
///
/// Each mutation type maps to exactly one REST endpoint; the queued payload
/// is forwarded as the request body unchanged.
#[derive(Debug)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    access_token: RwLock<Option<String>>,
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The base URL of the backend API (e.g., "https://api.slainte.app")
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: RwLock::new(None),
        }
    }

    /// Install or clear the bearer token sent with subsequent requests.
    pub fn set_access_token(&self, token: Option<String>) {
        *self.access_token.write().unwrap() = token;
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = self.access_token.read().unwrap().as_deref() {
            let auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ApiError::invalid_request("Invalid access token format"))?;
            headers.insert(AUTHORIZATION, auth_value);
        }

        Ok(headers)
    }

    /// Endpoint for one mutation type. The bool marks whether the queued
    /// payload travels as the request body.
    fn route(&self, mutation_type: MutationType, entity_id: &str) -> (Method, String, bool) {
        let base = &self.base_url;
        match mutation_type {
            MutationType::CreateTasting => {
                (Method::POST, format!("{base}/api/v1/tastings"), true)
            }
            MutationType::UpdateTasting => (
                Method::PATCH,
                format!("{base}/api/v1/tastings/{entity_id}"),
                true,
            ),
            MutationType::DeleteTasting => (
                Method::DELETE,
                format!("{base}/api/v1/tastings/{entity_id}"),
                false,
            ),
            MutationType::ToggleToast => (
                Method::POST,
                format!("{base}/api/v1/tastings/{entity_id}/toasts/toggle"),
                false,
            ),
            MutationType::AddComment => (
                Method::POST,
                format!("{base}/api/v1/tastings/{entity_id}/comments"),
                true,
            ),
            MutationType::FollowUser => (
                Method::POST,
                format!("{base}/api/v1/users/{entity_id}/follow"),
                false,
            ),
            MutationType::UnfollowUser => (
                Method::DELETE,
                format!("{base}/api/v1/users/{entity_id}/follow"),
                false,
            ),
            MutationType::UpdateProfile => {
                (Method::PATCH, format!("{base}/api/v1/profile"), true)
            }
            MutationType::UploadImage => (
                Method::POST,
                format!("{base}/api/v1/tastings/{entity_id}/images"),
                true,
            ),
        }
    }

    fn log_response(status: reqwest::StatusCode, body: &str) {
        if status.is_success() {
            debug!("[ApiClient] Response status: {}", status);
            return;
        }

        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("[ApiClient] Response error ({}): {}", status, preview);
    }

    async fn dispatch(&self, request: &ExecutionRequest<'_>) -> Result<String> {
        let (method, url, has_body) = self.route(request.mutation_type, request.entity_id);
        debug!("[ApiClient] {} {}", method, url);

        let mut builder = self.client.request(method, &url).headers(self.headers()?);
        if has_body {
            builder = builder.body(request.payload.to_string());
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        Self::log_response(status, &body);

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<ApiErrorResponse>(&body) {
                return Err(ApiError::api(
                    status.as_u16(),
                    format!("{}: {}", error.code, error.message),
                ));
            }
            return Err(ApiError::api(
                status.as_u16(),
                format!("Request failed: {}", body),
            ));
        }

        Ok(body)
    }
}

fn to_execution_error(err: ApiError) -> ExecutionError {
    match err {
        ApiError::Http(e) if e.is_timeout() => ExecutionError::Timeout,
        ApiError::Http(e) => ExecutionError::Network(e.to_string()),
        ApiError::Api { status, message } if is_retryable_status(status) => {
            ExecutionError::Server { status, message }
        }
        ApiError::Api { status, message } => ExecutionError::Rejected { status, message },
        ApiError::Json(e) => ExecutionError::Rejected {
            status: 0,
            message: format!("Unparseable response: {}", e),
        },
        ApiError::InvalidRequest(message) => ExecutionError::Rejected { status: 0, message },
    }
}

#[async_trait]
impl RemoteExecutor for ApiClient {
    async fn execute(
        &self,
        request: ExecutionRequest<'_>,
    ) -> std::result::Result<ExecutionOutcome, ExecutionError> {
        let body = self.dispatch(&request).await.map_err(to_execution_error)?;

        if request.mutation_type.creates_entity() {
            let created: CreatedResponse =
                serde_json::from_str(&body).map_err(|e| ExecutionError::Rejected {
                    status: 0,
                    message: format!("Create response carried no id: {}", e),
                })?;
            return Ok(ExecutionOutcome::with_server_id(created.id));
        }

        Ok(ExecutionOutcome::empty())
    }
}
