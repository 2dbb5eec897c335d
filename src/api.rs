use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{ApiConfig, API_URL_ENV};
use crate::error::{HarnessError, HarnessResult};
use crate::http_client::{ApiRequest, ApiResponse, HttpClient, ReqwestHttpClient};

/// Shared request function every case goes through
///
/// Builds `base_url + path`, always sends `Content-Type: application/json`,
/// adds the bearer header only when a token is supplied, and never retries.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    http: Arc<dyn HttpClient>,
}

impl ApiClient {
    /// Create a client backed by reqwest with the configured timeout
    pub fn new(config: &ApiConfig) -> HarnessResult<Self> {
        let http = ReqwestHttpClient::new(config.request_timeout)?;
        Ok(Self::with_http_client(&config.base_url, Arc::new(http)))
    }

    /// Create a client with an injected HTTP implementation
    pub fn with_http_client(base_url: &str, http: Arc<dyn HttpClient>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a relative path
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Issue exactly one request
    pub async fn request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        token: Option<&str>,
    ) -> HarnessResult<ApiResponse> {
        self.send_to(method, self.url_for(path), body, token).await
    }

    /// Body-less request with percent-encoded query parameters
    pub async fn send_query(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        token: Option<&str>,
    ) -> HarnessResult<ApiResponse> {
        let base = self.url_for(path);
        let url = reqwest::Url::parse_with_params(&base, query).map_err(|e| {
            HarnessError::ConfigInvalid {
                key: API_URL_ENV.to_string(),
                value: base.clone(),
                reason: e.to_string(),
            }
        })?;
        self.send_to::<()>(method, url.to_string(), None, token).await
    }

    async fn send_to<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: String,
        body: Option<&B>,
        token: Option<&str>,
    ) -> HarnessResult<ApiResponse> {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        if let Some(token) = token {
            headers.insert("Authorization".to_string(), format!("Bearer {}", token));
        }

        let body = match body {
            Some(body) => Some(serde_json::to_string(body)?),
            None => None,
        };

        debug!(%method, %url, authenticated = token.is_some(), "Sending request");
        let request = ApiRequest {
            method: method.clone(),
            url: url.clone(),
            headers,
            body,
        };

        match self.http.send(request).await {
            Ok(response) => {
                debug!(%method, %url, status = response.status(), "Request completed");
                Ok(response)
            }
            Err(e) => {
                warn!(%method, %url, error = %e, "Request failed");
                Err(e)
            }
        }
    }

    /// Convenience for body-less requests
    pub async fn send_empty(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
    ) -> HarnessResult<ApiResponse> {
        self.request::<()>(method, path, None, token).await
    }
}
