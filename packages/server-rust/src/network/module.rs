//! Server lifecycle with deferred startup.
//!
//! `new()` allocates the stores and shutdown controller, `start()` binds
//! the listener, `serve()` accepts connections. Callers can seed or inspect
//! the stores between `start()` and `serve()`.

use std::future::Future;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, put};
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::NetworkConfig;
use super::handlers::{
    delete_row, download_object, health_handler, insert_row, list_rows, liveness_handler,
    readiness_handler, update_row, upload_object, AppState,
};
use super::middleware::{build_http_layers, track_in_flight};
use super::shutdown::ShutdownController;
use crate::store::{BlobStore, TableStore};

/// Owns the listener and the state shared with every handler.
pub struct NetworkModule {
    state: AppState,
    listener: Option<TcpListener>,
}

impl NetworkModule {
    /// Creates the module without binding any port.
    #[must_use]
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            state: AppState::new(config),
            listener: None,
        }
    }

    #[must_use]
    pub fn tables(&self) -> Arc<TableStore> {
        Arc::clone(&self.state.tables)
    }

    #[must_use]
    pub fn blobs(&self) -> Arc<BlobStore> {
        Arc::clone(&self.state.blobs)
    }

    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.state.shutdown)
    }

    /// Assembles the router.
    ///
    /// - `GET /health`, `/health/live`, `/health/ready`
    /// - `GET|POST /db/{table}`
    /// - `PUT|DELETE /db/{table}/{id}`
    /// - `GET|POST /storage/{bucket}/{*path}`
    ///
    /// Data routes are refused with 503 once shutdown begins; probes keep
    /// answering.
    pub fn build_router(&self) -> Router {
        router(self.state.clone())
    }

    /// Binds the listener and returns the bound port, which differs from
    /// the configured one when that is 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let config = &self.state.config;
        let addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();
        info!(host = %config.host, port, "listener bound");
        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves until `shutdown` resolves, then drains in-flight requests for
    /// up to `drain_timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called first or the server
    /// hits a fatal I/O error.
    pub async fn serve(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let listener = self
            .listener
            .ok_or_else(|| anyhow::anyhow!("start() must be called before serve()"))?;
        let controller = Arc::clone(&self.state.shutdown);
        let drain_timeout = self.state.config.drain_timeout;
        let router = router(self.state);

        controller.set_ready();
        info!("serving");

        let signal_controller = Arc::clone(&controller);
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown.await;
                signal_controller.trigger_shutdown();
            })
            .await?;

        if controller.wait_for_drain(drain_timeout).await {
            info!("all requests drained");
        } else {
            warn!(
                in_flight = controller.in_flight_count(),
                "drain timeout expired with requests in flight"
            );
        }
        Ok(())
    }
}

fn router(state: AppState) -> Router {
    let layers = build_http_layers(&state.config);
    let admission =
        axum::middleware::from_fn_with_state(Arc::clone(&state.shutdown), track_in_flight);

    let data = Router::new()
        .route("/db/{table}", get(list_rows).post(insert_row))
        .route("/db/{table}/{id}", put(update_row).delete(delete_row))
        .route(
            "/storage/{bucket}/{*path}",
            get(download_object).post(upload_object),
        )
        .route_layer(admission);

    Router::new()
        .route("/health", get(health_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .merge(data)
        .layer(DefaultBodyLimit::disable())
        .layer(layers)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;

    fn module() -> NetworkModule {
        NetworkModule::new(NetworkConfig {
            host: "127.0.0.1".into(),
            ..NetworkConfig::default()
        })
    }

    #[test]
    fn accessors_share_state() {
        let module = module();
        assert!(module.listener.is_none());
        assert!(Arc::ptr_eq(&module.tables(), &module.tables()));
        assert!(Arc::ptr_eq(&module.blobs(), &module.blobs()));
        assert!(Arc::ptr_eq(
            &module.shutdown_controller(),
            &module.shutdown_controller()
        ));
    }

    #[tokio::test]
    async fn start_binds_to_os_assigned_port() {
        let mut module = module();
        let port = module.start().await.unwrap();
        assert!(port > 0);
        assert!(module.listener.is_some());
    }

    #[tokio::test]
    async fn serve_without_start_is_an_error() {
        let err = module()
            .serve(std::future::pending::<()>())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("start()"));
    }

    #[tokio::test]
    async fn router_serves_rows_and_request_ids() {
        let module = module();
        module
            .tables()
            .insert("skills", serde_json::json!({ "name": "Rust" }))
            .unwrap();
        let response = module
            .build_router()
            .oneshot(
                Request::builder()
                    .uri("/db/skills?name=Rust")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["data"][0]["name"], "Rust");
    }

    #[tokio::test]
    async fn oversized_bodies_are_rejected() {
        let module = NetworkModule::new(NetworkConfig {
            max_body_bytes: 8,
            ..NetworkConfig::default()
        });
        let response = module
            .build_router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/storage/b/big.bin")
                    .header("content-length", "64")
                    .body(Body::from(vec![0_u8; 64]))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn probes_answer_while_draining() {
        let module = module();
        let controller = module.shutdown_controller();
        controller.set_ready();
        controller.trigger_shutdown();
        let router = module.build_router();

        let ready = router
            .clone()
            .oneshot(Request::builder().uri("/health/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(ready.status(), StatusCode::SERVICE_UNAVAILABLE);

        let live = router
            .clone()
            .oneshot(Request::builder().uri("/health/live").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(live.status(), StatusCode::OK);

        let data = router
            .oneshot(Request::builder().uri("/db/skills").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(data.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
