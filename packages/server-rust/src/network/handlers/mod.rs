//! HTTP handlers for mocked resources and admin endpoints.
//!
//! Defines [`AppState`], the shared state carried through axum extractors.

pub mod admin;
pub mod health;
pub mod resources;

pub use admin::{
    clear_resource_handler, list_operations_handler, resource_info_handler, reset_handler,
    run_operation_handler, state_handler,
};
pub use health::{health_handler, liveness_handler, readiness_handler};
pub use resources::resource_handler;

use std::sync::Arc;
use std::time::Instant;

use axum::http::HeaderMap;
use mockgrid_core::RequestContext;

use super::middleware::REQUEST_ID_HEADER;
use super::{NetworkConfig, ShutdownController};
use crate::bridge::Bridge;

/// Shared application state passed to all handlers via `State` extraction.
///
/// Holds `Arc`s so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub bridge: Arc<Bridge>,
    pub shutdown: Arc<ShutdownController>,
    pub config: Arc<NetworkConfig>,
    /// Process start time, used for uptime.
    pub start_time: Instant,
}

impl AppState {
    #[must_use]
    pub fn new(bridge: Arc<Bridge>, config: NetworkConfig) -> Self {
        Self {
            bridge,
            shutdown: Arc::new(ShutdownController::new()),
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }
}

/// Request context whose trace ID is the request's `X-Request-Id`.
pub(crate) fn request_context(headers: &HeaderMap) -> RequestContext {
    let mut ctx = RequestContext::new().with_protocol("http");
    if let Some(id) = headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
    {
        ctx.trace_id = id.to_string();
    }
    ctx
}
