//! Wire-level request/response types and the HTTP transport.
//!
//! A [`Transport`] performs exactly one HTTP exchange and reports what came
//! back as a [`RawOutcome`]. It never classifies, retries, or touches
//! credentials; that is the dispatcher's and coordinator's job.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error};

use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};

/// Description of a backend call, sufficient to rebuild and resend it.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    /// HTTP method.
    pub method: Method,
    /// Path relative to the API base URL, with a leading `/`.
    pub path: String,
    /// Query string pairs.
    pub query: Vec<(String, String)>,
    /// Optional JSON body.
    pub body: Option<serde_json::Value>,
}

impl RequestSpec {
    /// Creates a request with no query and no body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let path = path.into();
        let path = if path.starts_with('/') { path } else { format!("/{}", path) };
        Self { method, path, query: Vec::new(), body: None }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Adds a query pair.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Sets a JSON body from a raw value.
    #[must_use]
    pub fn json_value(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Sets a JSON body from any serializable value.
    pub fn json<T: Serialize + ?Sized>(self, body: &T) -> GatewayResult<Self> {
        let value = serde_json::to_value(body).map_err(|e| GatewayError::ApiFailure {
            status: 0,
            message: format!("Failed to encode request body: {}", e),
        })?;
        Ok(self.json_value(value))
    }
}

/// Successful backend response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    /// HTTP status (2xx/3xx).
    pub status: u16,
    /// Raw response body.
    pub body: String,
}

impl ApiResponse {
    /// Decodes the body as JSON. An empty body decodes as `null`.
    pub fn json<T: DeserializeOwned>(&self) -> GatewayResult<T> {
        let text = if self.body.trim().is_empty() { "null" } else { self.body.as_str() };
        serde_json::from_str(text).map_err(|e| GatewayError::ApiFailure {
            status: self.status,
            message: format!("Failed to decode response body: {}", e),
        })
    }
}

/// What a single exchange produced, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawOutcome {
    /// The server answered, with any status.
    Response { status: u16, body: String },
    /// No HTTP response: timeout, DNS failure, refused connection, cancellation.
    NoResponse(String),
}

/// A request as handed to the transport, with credentials already resolved.
#[derive(Clone, PartialEq)]
pub struct OutboundRequest {
    pub spec: RequestSpec,
    /// Bearer token to attach, if any.
    pub bearer: Option<String>,
}

impl fmt::Debug for OutboundRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutboundRequest")
            .field("spec", &self.spec)
            .field("authenticated", &self.bearer.is_some())
            .finish()
    }
}

/// Performs a single HTTP exchange.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends the request and reports the raw outcome. Never fails.
    async fn execute(&self, request: OutboundRequest) -> RawOutcome;
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    client: Client,
}

impl HttpTransport {
    /// Creates a transport for the given base URL and per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> GatewayResult<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            error!(error = %e, "Failed to build HTTP client");
            GatewayError::NetworkFailure(format!("Failed to build HTTP client: {}", e))
        })?;
        Ok(Self { base_url: base_url.into().trim_end_matches('/').to_string(), client })
    }

    /// Creates a transport from gateway configuration.
    pub fn from_config(config: &GatewayConfig) -> GatewayResult<Self> {
        Self::new(config.api_url.clone(), config.timeout())
    }

    /// Base URL every path is joined onto.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: OutboundRequest) -> RawOutcome {
        let OutboundRequest { spec, bearer } = request;
        let url = self.url_for(&spec.path);

        let mut builder = self.client.request(spec.method.clone(), &url);
        if !spec.query.is_empty() {
            builder = builder.query(&spec.query);
        }
        if let Some(token) = bearer.as_deref() {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &spec.body {
            builder = builder.json(body);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                debug!(method = %spec.method, path = %spec.path, error = %e, "No response from backend");
                return RawOutcome::NoResponse(e.to_string());
            }
        };

        let status = response.status().as_u16();
        match response.text().await {
            Ok(body) => RawOutcome::Response { status, body },
            // Body cut off mid-stream; treated like any other lost response.
            Err(e) => RawOutcome::NoResponse(format!("Failed to read response body: {}", e)),
        }
    }
}
