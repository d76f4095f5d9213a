//! HTTP transport seam.
//!
//! Builders describe a request as an [`ApiRequest`]; a [`Transport`] sends
//! it. [`HttpTransport`] is the `reqwest` implementation used in production.

use async_trait::async_trait;
use bytes::Bytes;
use folio_core::ShimError;
use http::{Method, StatusCode};
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;

use crate::config::ClientConfig;

/// Request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Empty,
    Json(serde_json::Value),
    Bytes { content_type: String, data: Bytes },
}

/// Transport-agnostic description of one HTTP call.
///
/// `segments` are appended to the base URL path one by one, so each is
/// percent-encoded as a single segment.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub segments: Vec<String>,
    pub query: Vec<(String, String)>,
    pub body: Body,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: Method, segments: Vec<String>) -> Self {
        Self {
            method,
            segments,
            query: Vec::new(),
            body: Body::Empty,
        }
    }

    /// `{base}/db/{table}`.
    #[must_use]
    pub fn collection(method: Method, table: &str) -> Self {
        Self::new(method, vec!["db".to_string(), table.to_string()])
    }

    /// `{base}/db/{table}/{id}`.
    #[must_use]
    pub fn row(method: Method, table: &str, id: &str) -> Self {
        Self::new(
            method,
            vec!["db".to_string(), table.to_string(), id.to_string()],
        )
    }

    #[must_use]
    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    #[must_use]
    pub fn with_json(mut self, body: serde_json::Value) -> Self {
        self.body = Body::Json(body);
        self
    }

    #[must_use]
    pub fn with_bytes(mut self, content_type: impl Into<String>, data: Bytes) -> Self {
        self.body = Body::Bytes {
            content_type: content_type.into(),
            data,
        };
        self
    }

    /// Path as sent, without percent-encoding. Used for logs.
    #[must_use]
    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }
}

/// Raw response: status and unparsed body.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

/// Sends [`ApiRequest`]s.
///
/// Implementations report only fetch-level failures as `Err`; any HTTP
/// status, including 4xx/5xx, is a successful send.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ShimError>;
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpTransport {
    /// Builds a transport for `config.base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL does not parse or the HTTP client
    /// cannot be constructed.
    pub fn new(config: &ClientConfig) -> anyhow::Result<Self> {
        let base_url = Url::parse(&config.base_url)?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("base URL `{}` cannot carry a path", config.base_url);
        }
        let client = reqwest::Client::builder().build()?;
        Ok(Self { client, base_url })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

/// Appends `segments` to the path of `base`.
///
/// # Errors
///
/// Fails if `base` cannot carry a path (e.g. `mailto:` URLs).
pub fn join_segments<S: AsRef<str>>(base: &Url, segments: &[S]) -> Result<Url, ShimError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| ShimError::transport(format!("base URL `{base}` cannot carry a path")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ShimError> {
        let url = join_segments(&self.base_url, &request.segments)?;
        let mut builder = self.client.request(request.method, url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        builder = match request.body {
            Body::Empty => builder,
            Body::Json(value) => builder.json(&value),
            Body::Bytes { content_type, data } => {
                builder.header(CONTENT_TYPE, content_type).body(data)
            }
        };

        let response = builder.send().await.map_err(ShimError::transport)?;
        let status = response.status();
        let body = response.bytes().await.map_err(ShimError::transport)?;
        Ok(ApiResponse { status, body })
    }
}
