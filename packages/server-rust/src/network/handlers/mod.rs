//! Route handlers and the state they share.

pub mod db;
pub mod health;
pub mod storage;

pub use db::{delete_row, insert_row, list_rows, update_row};
pub use health::{health_handler, liveness_handler, readiness_handler};
pub use storage::{download_object, upload_object};

use std::sync::Arc;
use std::time::Instant;

use super::{NetworkConfig, ShutdownController};
use crate::store::{BlobStore, TableStore};

/// State carried through axum's `State` extractor. Cloning only bumps
/// reference counts.
#[derive(Clone)]
pub struct AppState {
    pub tables: Arc<TableStore>,
    pub blobs: Arc<BlobStore>,
    pub shutdown: Arc<ShutdownController>,
    pub config: Arc<NetworkConfig>,
    /// Used for uptime.
    pub start_time: Instant,
}

impl AppState {
    /// Fresh stores and a `Starting` controller.
    #[must_use]
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            tables: Arc::new(TableStore::new()),
            blobs: Arc::new(BlobStore::new()),
            shutdown: Arc::new(ShutdownController::new()),
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }
}
