//! Health, liveness and readiness endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use super::AppState;
use crate::network::HealthState;

/// Detailed health JSON. Always 200; the `state` field tells whether the
/// server is actually serving.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let store = state.bridge.store();
    Json(json!({
        "state": state.shutdown.health_state().as_str(),
        "resources": store.len(),
        "operations": state.bridge.operation_names().len(),
        "inFlight": state.shutdown.in_flight_count(),
        "uptimeSecs": state.start_time.elapsed().as_secs(),
    }))
}

/// Always 200 while the process runs.
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// 200 once ready, 503 while starting or draining.
pub async fn readiness_handler(State(state): State<AppState>) -> StatusCode {
    if state.shutdown.health_state() == HealthState::Ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
