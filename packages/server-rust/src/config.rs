//! Command-line and environment configuration for `folio-server`.

use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::network::NetworkConfig;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8787;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_DRAIN_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "folio-server", version, about = "Reference REST data endpoint for Folio", long_about = None)]
pub struct ServerConfig {
    #[arg(long, env = "FOLIO_HOST", default_value = DEFAULT_HOST, help = "Host to bind to")]
    pub host: String,

    #[arg(short, long, env = "FOLIO_PORT", default_value_t = DEFAULT_PORT, help = "Port to bind to (0 picks one)")]
    pub port: u16,

    #[arg(
        long = "cors-origin",
        env = "FOLIO_CORS_ORIGINS",
        value_delimiter = ',',
        default_value = "*",
        help = "Allowed CORS origins, comma separated"
    )]
    pub cors_origins: Vec<String>,

    #[arg(long, env = "FOLIO_REQUEST_TIMEOUT_MS", default_value_t = DEFAULT_REQUEST_TIMEOUT_MS)]
    pub request_timeout_ms: u64,

    #[arg(long, env = "FOLIO_DRAIN_TIMEOUT_MS", default_value_t = DEFAULT_DRAIN_TIMEOUT_MS)]
    pub drain_timeout_ms: u64,

    #[arg(long, env = "FOLIO_MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: usize,

    #[arg(
        long,
        env = "FOLIO_PUBLIC_URL",
        help = "Absolute prefix for storage URLs returned by uploads"
    )]
    pub public_base_url: Option<String>,

    #[arg(long, value_enum, env = "FOLIO_LOG_FORMAT", default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            cors_origins: vec!["*".to_string()],
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            drain_timeout_ms: DEFAULT_DRAIN_TIMEOUT_MS,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            public_base_url: None,
            log_format: LogFormat::Text,
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn network_config(&self) -> NetworkConfig {
        NetworkConfig {
            host: self.host.clone(),
            port: self.port,
            cors_origins: self.cors_origins.clone(),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            drain_timeout: Duration::from_millis(self.drain_timeout_ms),
            max_body_bytes: self.max_body_bytes,
            public_base_url: self.public_base_url.clone(),
        }
    }
}
