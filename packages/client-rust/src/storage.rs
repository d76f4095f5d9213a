//! Object storage for uploaded media (avatars, project images).
//!
//! Two steps: [`ObjectStorage::upload`] stores the bytes and returns their
//! path; [`ObjectStorage::public_url`] turns a path into a URL that can be
//! used directly as an image source.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use http::Method;
use reqwest::Url;
use serde::Deserialize;

use crate::config::ClientConfig;
use crate::exec::{execute, CallOptions};
use crate::transport::{join_segments, ApiRequest, HttpTransport, Transport};

/// Upload/public-URL contract for media files.
///
/// Used as `Arc<dyn ObjectStorage>`.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Stores `data` under `path` and returns the stored path.
    async fn upload(&self, path: &str, data: Bytes, content_type: &str) -> anyhow::Result<String>;

    /// URL at which the object stored under `path` is served.
    fn public_url(&self, path: &str) -> String;
}

/// Splits an object path into URL segments.
///
/// Empty segments are dropped; `.` and `..` are refused.
fn path_segments(path: &str) -> anyhow::Result<Vec<String>> {
    let segments: Vec<String> = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_owned)
        .collect();
    if segments.is_empty() {
        anyhow::bail!("object path is empty");
    }
    if segments.iter().any(|s| s == "." || s == "..") {
        anyhow::bail!("object path `{path}` must not contain `.` or `..`");
    }
    Ok(segments)
}

#[derive(Deserialize)]
struct Uploaded {
    path: String,
}

/// Storage served by the data endpoint under `/storage/{bucket}/{path}`.
pub struct HttpObjectStorage {
    transport: Arc<dyn Transport>,
    base_url: Url,
    bucket: String,
    opts: CallOptions,
}

impl HttpObjectStorage {
    /// Storage in `bucket` at `config.base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid.
    pub fn new(config: &ClientConfig, bucket: impl Into<String>) -> anyhow::Result<Self> {
        let transport = Arc::new(HttpTransport::new(config)?);
        Self::with_transport(transport, config, bucket)
    }

    /// Storage over a caller-supplied transport.
    ///
    /// # Errors
    ///
    /// Returns an error if `config.base_url` is not a valid base URL.
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        config: &ClientConfig,
        bucket: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .with_context(|| format!("invalid base URL `{}`", config.base_url))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("base URL `{}` cannot carry a path", config.base_url);
        }
        Ok(Self {
            transport,
            base_url,
            bucket: bucket.into(),
            opts: CallOptions {
                timeout: config.request_timeout,
                cancel: None,
                retries: 0,
                backoff: config.retry_backoff,
            },
        })
    }

    fn object_segments(&self, segments: Vec<String>) -> Vec<String> {
        let mut all = vec!["storage".to_string(), self.bucket.clone()];
        all.extend(segments);
        all
    }
}

#[async_trait]
impl ObjectStorage for HttpObjectStorage {
    async fn upload(&self, path: &str, data: Bytes, content_type: &str) -> anyhow::Result<String> {
        let segments = self.object_segments(path_segments(path)?);
        let request = ApiRequest::new(Method::POST, segments).with_bytes(content_type, data);
        let body = execute(self.transport.as_ref(), request, &self.opts)
            .await
            .with_context(|| format!("upload of `{path}` failed"))?;
        match body.data {
            Some(data) => {
                let uploaded: Uploaded =
                    serde_json::from_value(data).context("upload response has no path")?;
                Ok(uploaded.path)
            }
            None => Ok(path.to_owned()),
        }
    }

    fn public_url(&self, path: &str) -> String {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut all = vec!["storage", self.bucket.as_str()];
        all.extend(segments);
        join_segments(&self.base_url, &all).map_or_else(|_| self.base_url.to_string(), String::from)
    }
}

/// In-process storage, for tests and offline use.
pub struct MemoryObjectStorage {
    bucket: String,
    objects: DashMap<String, (String, Bytes)>,
}

impl MemoryObjectStorage {
    #[must_use]
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: DashMap::new(),
        }
    }

    /// Stored bytes and content type for `path`.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<(String, Bytes)> {
        self.objects.get(path).map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl ObjectStorage for MemoryObjectStorage {
    async fn upload(&self, path: &str, data: Bytes, content_type: &str) -> anyhow::Result<String> {
        let path = path_segments(path)?.join("/");
        self.objects
            .insert(path.clone(), (content_type.to_owned(), data));
        Ok(path)
    }

    fn public_url(&self, path: &str) -> String {
        format!("memory://{}/{}", self.bucket, path.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;
    use serde_json::json;

    use super::*;
    use crate::testing::MockTransport;
    use crate::transport::Body;

    fn storage(mock: &Arc<MockTransport>) -> HttpObjectStorage {
        HttpObjectStorage::with_transport(
            mock.clone(),
            &ClientConfig::new("http://api.test/"),
            "avatars",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn upload_posts_bytes_and_returns_path() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(StatusCode::CREATED, json!({ "data": { "path": "me/avatar.png" } }));
        let storage = storage(&mock);

        let path = storage
            .upload("me/avatar.png", Bytes::from_static(b"\x89PNG"), "image/png")
            .await
            .unwrap();

        assert_eq!(path, "me/avatar.png");
        let request = mock.last_request().unwrap();
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.path(), "/storage/avatars/me/avatar.png");
        assert_eq!(
            request.body,
            Body::Bytes {
                content_type: "image/png".into(),
                data: Bytes::from_static(b"\x89PNG"),
            }
        );
    }

    #[tokio::test]
    async fn failed_upload_carries_server_message() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(StatusCode::PAYLOAD_TOO_LARGE, json!({ "error": "too large" }));
        let err = storage(&mock)
            .upload("big.png", Bytes::new(), "image/png")
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("too large"));
    }

    #[tokio::test]
    async fn traversal_paths_are_refused_locally() {
        let mock = Arc::new(MockTransport::new());
        let storage = storage(&mock);
        assert!(storage.upload("../etc/passwd", Bytes::new(), "text/plain").await.is_err());
        assert!(storage.upload("//", Bytes::new(), "text/plain").await.is_err());
        assert_eq!(mock.request_count(), 0);
    }

    #[test]
    fn public_url_is_usable_as_image_source() {
        let mock = Arc::new(MockTransport::new());
        assert_eq!(
            storage(&mock).public_url("me/my avatar.png"),
            "http://api.test/storage/avatars/me/my%20avatar.png"
        );
    }

    #[tokio::test]
    async fn memory_storage_round_trips_bytes() {
        let storage = MemoryObjectStorage::new("avatars");
        let path = storage
            .upload("/me.png", Bytes::from_static(b"img"), "image/png")
            .await
            .unwrap();
        assert_eq!(path, "me.png");
        assert_eq!(
            storage.get("me.png"),
            Some(("image/png".to_string(), Bytes::from_static(b"img")))
        );
        assert_eq!(storage.public_url(&path), "memory://avatars/me.png");
    }
}
