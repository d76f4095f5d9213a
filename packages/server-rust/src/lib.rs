//! Folio Server: reference REST data endpoint: in-memory tables under
//! `/db`, uploaded objects under `/storage`, health probes and graceful
//! shutdown.

pub mod config;
pub mod error;
pub mod network;
pub mod store;

pub use config::{LogFormat, ServerConfig};
pub use error::ApiError;
pub use network::{NetworkConfig, NetworkModule, ShutdownController};
pub use store::{Blob, BlobStore, ListQuery, Row, StoreError, TableStore};
