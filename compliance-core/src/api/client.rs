//! HTTP client for the compliance service.
//!
//! Requests carry the session implicitly: the client keeps a cookie store and
//! can be seeded with a session cookie from the configuration.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, COOKIE};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, warn};
use url::Url;

use super::{BulkTriageRequest, BulkTriageResponse, RequirementsApi};
use crate::config::ConsoleConfig;
use crate::error::{ApiError, ApiResult};
use crate::filters::{ListQuery, REQUIREMENTS_PATH};
use crate::models::{Document, Profile, Requirement, RequirementPage};

/// reqwest-backed [`RequirementsApi`]
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: Url,
}

impl HttpClient {
    /// Create a client for the configured API base URL
    pub fn new(config: &ConsoleConfig) -> ApiResult<Self> {
        let mut base_url = Url::parse(config.api_base_url.trim())
            .map_err(|e| ApiError::network(format!("invalid API base URL: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::network(format!(
                "API base URL cannot carry a path: {}",
                base_url
            )));
        }
        // Url::join and path_segments_mut treat a missing trailing slash as a file name
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(cookie) = config.session_cookie.as_deref() {
            let value = HeaderValue::from_str(cookie)
                .map_err(|e| ApiError::network(format!("invalid session cookie: {}", e)))?;
            headers.insert(COOKIE, value);
        }

        let client = Client::builder()
            .timeout(config.request_timeout())
            .cookie_store(true)
            .default_headers(headers)
            .user_agent(concat!("comply/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::network(e.to_string()))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Base URL extended with percent-encoded path segments
    fn endpoint(&self, segments: &[&str]) -> ApiResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::network(format!("invalid API base URL: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Sends a request and decodes a JSON body, mapping failures to [`ApiError`]
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<T> {
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::network(e.to_string()))?;

        let status = response.status();
        let url = response.url().clone();
        if status.is_success() {
            return response.json::<T>().await.map_err(|e| {
                warn!("Failed to decode response from {}: {}", url, e);
                ApiError::decode(e.to_string())
            });
        }

        let body = response.text().await.unwrap_or_default();
        let payload = serde_json::from_str::<Value>(&body).ok();
        debug!("Request to {} failed with {}", url, status);
        Err(ApiError::from_response(status.as_u16(), payload))
    }
}

#[async_trait(?Send)]
impl RequirementsApi for HttpClient {
    async fn list_requirements(&self, query: &ListQuery) -> ApiResult<RequirementPage> {
        let url = self.endpoint(&[REQUIREMENTS_PATH])?;
        debug!("Fetching {}", query);
        self.send(self.client.get(url).query(&query.to_pairs())).await
    }

    async fn get_requirement(&self, id: &str) -> ApiResult<Requirement> {
        let url = self.endpoint(&[REQUIREMENTS_PATH, id])?;
        self.send(self.client.get(url)).await
    }

    async fn complete_requirement(&self, id: &str, completed_by: &str) -> ApiResult<Requirement> {
        let url = self.endpoint(&[REQUIREMENTS_PATH, id, "complete"])?;
        let body = json!({ "completed_by": completed_by });
        self.send(self.client.post(url).json(&body)).await
    }

    async fn archive_requirement(&self, id: &str, reason: &str) -> ApiResult<Requirement> {
        let url = self.endpoint(&[REQUIREMENTS_PATH, id, "archive"])?;
        let body = json!({ "reason": reason });
        self.send(self.client.post(url).json(&body)).await
    }

    async fn restore_requirement(&self, id: &str) -> ApiResult<Requirement> {
        let url = self.endpoint(&[REQUIREMENTS_PATH, id, "archive", "restore"])?;
        self.send(self.client.post(url).json(&json!({}))).await
    }

    async fn bulk_triage(&self, request: &BulkTriageRequest) -> ApiResult<BulkTriageResponse> {
        let url = self.endpoint(&[REQUIREMENTS_PATH, "triage", "bulk"])?;
        self.send(self.client.post(url).json(request)).await
    }

    async fn current_profile(&self) -> ApiResult<Profile> {
        let url = self.endpoint(&["auth", "me"])?;
        self.send(self.client.get(url)).await
    }

    async fn get_document(&self, id: &str) -> ApiResult<Document> {
        let url = self.endpoint(&["documents", id])?;
        self.send(self.client.get(url)).await
    }
}
