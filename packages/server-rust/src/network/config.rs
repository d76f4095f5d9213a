//! Network configuration for the data endpoint.

use std::time::Duration;

/// Bind address, HTTP limits and shutdown behaviour.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Bind address for the server.
    pub host: String,
    /// Port to listen on. 0 means OS-assigned.
    pub port: u16,
    /// Allowed CORS origins. `"*"` allows any.
    pub cors_origins: Vec<String>,
    /// Maximum time to wait for a request to complete.
    pub request_timeout: Duration,
    /// How long shutdown waits for in-flight requests.
    pub drain_timeout: Duration,
    /// Largest accepted request body, uploads included.
    pub max_body_bytes: usize,
    /// Absolute prefix for storage URLs returned by uploads. Relative URLs
    /// are returned when unset.
    pub public_base_url: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 0,
            cors_origins: vec!["*".to_string()],
            request_timeout: Duration::from_secs(30),
            drain_timeout: Duration::from_secs(30),
            max_body_bytes: 10 * 1024 * 1024,
            public_base_url: None,
        }
    }
}

impl NetworkConfig {
    /// URL at which `bucket/path` is served.
    #[must_use]
    pub fn object_url(&self, bucket: &str, path: &str) -> String {
        let base = self
            .public_base_url
            .as_deref()
            .unwrap_or("")
            .trim_end_matches('/');
        format!("{base}/storage/{bucket}/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_config_defaults() {
        let config = NetworkConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 0);
        assert_eq!(config.cors_origins, vec!["*"]);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.drain_timeout, Duration::from_secs(30));
        assert_eq!(config.max_body_bytes, 10_485_760);
        assert!(config.public_base_url.is_none());
    }

    #[test]
    fn object_url_is_relative_without_public_base() {
        let config = NetworkConfig::default();
        assert_eq!(config.object_url("avatars", "me.png"), "/storage/avatars/me.png");

        let config = NetworkConfig {
            public_base_url: Some("https://cdn.example.com/".into()),
            ..NetworkConfig::default()
        };
        assert_eq!(
            config.object_url("avatars", "me.png"),
            "https://cdn.example.com/storage/avatars/me.png"
        );
    }
}
