//! Network module with deferred startup lifecycle.
//!
//! `new()` wires shared state, `start()` binds the TCP listener, and
//! `serve()` accepts connections until the shutdown future resolves.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::NetworkConfig;
use super::handlers::{
    clear_resource_handler, health_handler, list_operations_handler, liveness_handler,
    readiness_handler, reset_handler, resource_handler, resource_info_handler,
    run_operation_handler, state_handler, AppState,
};
use super::middleware::apply_http_layers;
use super::shutdown::ShutdownController;
use crate::bridge::Bridge;

/// Upper bound on how long `serve()` waits for in-flight requests after
/// the shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Owns the HTTP server lifecycle for a single [`Bridge`].
pub struct NetworkModule {
    config: NetworkConfig,
    listener: Option<TcpListener>,
    bridge: Arc<Bridge>,
    shutdown: Arc<ShutdownController>,
}

impl NetworkModule {
    /// Creates a network module without binding any port.
    #[must_use]
    pub fn new(config: NetworkConfig, bridge: Arc<Bridge>) -> Self {
        Self {
            config,
            listener: None,
            bridge,
            shutdown: Arc::new(ShutdownController::new()),
        }
    }

    #[must_use]
    pub fn bridge(&self) -> Arc<Bridge> {
        Arc::clone(&self.bridge)
    }

    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// Assembles the router.
    ///
    /// Admin routes live under the configured prefix (default `/__mock`):
    /// - `GET  /health`, `/health/live`, `/health/ready`
    /// - `GET  /state`
    /// - `POST /state/reset[?resource=name]`
    /// - `GET|DELETE /state/resources/{name}`
    /// - `GET  /operations`
    /// - `POST /operations/{name}`
    ///
    /// Every other path falls through to the resource handler.
    pub fn build_router(&self) -> Router {
        let state = AppState {
            bridge: Arc::clone(&self.bridge),
            shutdown: Arc::clone(&self.shutdown),
            config: Arc::new(self.config.clone()),
            start_time: Instant::now(),
        };

        let admin = Router::new()
            .route("/health", get(health_handler))
            .route("/health/live", get(liveness_handler))
            .route("/health/ready", get(readiness_handler))
            .route("/state", get(state_handler))
            .route("/state/reset", post(reset_handler))
            .route(
                "/state/resources/{name}",
                get(resource_info_handler).delete(clear_resource_handler),
            )
            .route("/operations", get(list_operations_handler))
            .route("/operations/{name}", post(run_operation_handler));

        let router = Router::new()
            .nest(&self.config.admin_prefix(), admin)
            .fallback(resource_handler);

        apply_http_layers(router, &self.config).with_state(state)
    }

    /// Binds the TCP listener and returns the bound port, which differs
    /// from the configured one when port 0 asks for an ephemeral port.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = self.config.bind_address();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        let port = listener.local_addr()?.port();

        info!(host = %self.config.host, port, "TCP listener bound");

        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves requests until `shutdown` resolves, then drains in-flight
    /// requests for up to 30 seconds.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called first or the server
    /// hits a fatal I/O error.
    pub async fn serve(
        mut self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let listener = self
            .listener
            .take()
            .context("start() must be called before serve()")?;
        let router = self.build_router();
        let shutdown_ctrl = Arc::clone(&self.shutdown);

        shutdown_ctrl.set_ready();
        info!(
            resources = self.bridge.store().len(),
            operations = self.bridge.operation_names().len(),
            "serving mock API"
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        shutdown_ctrl.trigger_shutdown();
        if shutdown_ctrl.wait_for_drain(DRAIN_TIMEOUT).await {
            info!("all in-flight requests drained");
        } else {
            warn!(
                in_flight = shutdown_ctrl.in_flight_count(),
                "drain timeout expired with requests still in flight"
            );
        }
        Ok(())
    }
}
