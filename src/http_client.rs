use std::collections::HashMap;
use std::time::Duration;

use http::Method;
use tracing::{debug, instrument};

use crate::error::{HarnessError, HarnessResult};

/// A fully-built request ready to be put on the wire
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute URL
    pub url: String,
    /// Request headers
    pub headers: HashMap<String, String>,
    /// Optional serialized JSON body
    pub body: Option<String>,
}

/// A response that only holds what the cases inspect
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status code
    status_code: u16,
    /// Response body
    body: String,
}

impl ApiResponse {
    /// Create a new response
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status_code: status,
            body: body.into(),
        }
    }

    /// Get the status code
    pub fn status(&self) -> u16 {
        self.status_code
    }

    /// Get a reference to the response body
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Parse body as JSON
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> HarnessResult<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Trait for HTTP client operations, allowing for mocking
#[async_trait::async_trait]
pub trait HttpClient: Send + Sync {
    /// Send one request; transport failures are errors, any status is a response
    async fn send(&self, request: ApiRequest) -> HarnessResult<ApiResponse>;
}

/// Implementation of HttpClient using reqwest
pub struct ReqwestHttpClient {
    /// Internal reqwest client
    client: reqwest::Client,
    /// Timeout applied to every request
    timeout: Duration,
}

impl ReqwestHttpClient {
    /// Create a new client with a fixed per-request timeout
    pub fn new(timeout: Duration) -> HarnessResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HarnessError::Transport {
                method: "-".to_string(),
                url: "-".to_string(),
                reason: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self { client, timeout })
    }

    /// Create a new client with custom configuration
    pub fn with_client(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait::async_trait]
impl HttpClient for ReqwestHttpClient {
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn send(&self, request: ApiRequest) -> HarnessResult<ApiResponse> {
        if !is_supported(&request.method) {
            return Err(HarnessError::Transport {
                method: request.method.to_string(),
                url: request.url,
                reason: "unsupported HTTP method".to_string(),
            });
        }

        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .timeout(self.timeout);

        // Add headers
        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        // Send request
        let response = builder
            .send()
            .await
            .map_err(|e| HarnessError::from_reqwest(&request.method, &request.url, self.timeout, e))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| HarnessError::from_reqwest(&request.method, &request.url, self.timeout, e))?;

        debug!(status, bytes = body.len(), "Received response");
        Ok(ApiResponse::new(status, body))
    }
}

/// Only the verbs the suites use are allowed on the wire
pub fn is_supported(method: &Method) -> bool {
    *method == Method::GET
        || *method == Method::POST
        || *method == Method::PUT
        || *method == Method::DELETE
}
