//! HTTP implementation of [`ResourceApi`]

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use log::debug;
use reqwest::{Client as HttpClient, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{ApiResult, ListQuery, Page, ResourceApi};
use crate::error::ApiError;
use crate::resource::ResourceDescriptor;

/// Client-side request budget
const RATE_LIMIT_PER_SECOND: u32 = 10;

/// Request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// REST client for the console backend
pub struct RestClient {
    http: HttpClient,
    base_url: String,
    token: Option<String>,
    rate_limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl RestClient {
    /// Create a client for `base_url`, authenticating with `token` when set
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> ApiResult<Self> {
        let http = HttpClient::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let quota = Quota::per_second(NonZeroU32::new(RATE_LIMIT_PER_SECOND).unwrap_or(NonZeroU32::MIN));

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a request and map non-success statuses to [`ApiError`]
    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&'static str, String)],
        body: Option<&Value>,
    ) -> ApiResult<Response> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);

        let mut request = self.http.request(method, &url).query(query);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(ApiError::from)?;
        check_status(response).await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&'static str, String)],
        body: Option<&Value>,
    ) -> ApiResult<T> {
        let response = self.send(method, path, query, body).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse response: {}", e)))
    }
}

/// Map an HTTP status to the transport error taxonomy
async fn check_status(response: Response) -> ApiResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized),
        StatusCode::FORBIDDEN => Err(ApiError::Forbidden),
        StatusCode::NOT_FOUND => Err(ApiError::NotFound(
            error_message(response, "Resource not found").await,
        )),
        StatusCode::CONFLICT => Err(ApiError::Conflict(
            error_message(response, "Resource already exists").await,
        )),
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            Err(ApiError::RateLimit(Duration::from_secs(retry_after)))
        }
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => Err(ApiError::BadRequest(
            error_message(response, "Bad request").await,
        )),
        status if status.is_server_error() => Err(ApiError::ServerError(
            error_message(response, &format!("Server error: {}", status)).await,
        )),
        status => Err(ApiError::InvalidResponse(format!(
            "Unexpected status code: {}",
            status
        ))),
    }
}

/// Prefer the backend's `message` field, then the raw body, then `fallback`
async fn error_message(response: Response, fallback: &str) -> String {
    let text = match response.text().await {
        Ok(text) if !text.trim().is_empty() => text,
        _ => return fallback.to_string(),
    };

    serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or(text)
}

#[async_trait]
impl ResourceApi for RestClient {
    async fn list(&self, resource: &ResourceDescriptor, query: &ListQuery) -> ApiResult<Page<Value>> {
        self.send_json(Method::GET, resource.path, &query.to_query_params(), None)
            .await
    }

    async fn get_by_id(&self, resource: &ResourceDescriptor, id: &str) -> ApiResult<Value> {
        self.send_json(Method::GET, &resource.item_path(id), &[], None)
            .await
    }

    async fn create(&self, resource: &ResourceDescriptor, payload: &Value) -> ApiResult<Value> {
        self.send_json(Method::POST, resource.path, &[], Some(payload))
            .await
    }

    async fn update(&self, resource: &ResourceDescriptor, id: &str, payload: &Value) -> ApiResult<Value> {
        self.send_json(Method::PUT, &resource.item_path(id), &[], Some(payload))
            .await
    }

    async fn delete(&self, resource: &ResourceDescriptor, id: &str) -> ApiResult<()> {
        self.send(Method::DELETE, &resource.item_path(id), &[], None)
            .await?;
        Ok(())
    }
}
