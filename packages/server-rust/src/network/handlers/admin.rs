//! Admin endpoints for inspecting and resetting mock state and running
//! custom operations directly.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use mockgrid_core::item::Data;
use mockgrid_core::EngineError;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{request_context, AppState};
use crate::bridge::Action;
use crate::network::response::{error_response, result_response};

#[derive(Debug, Default, Deserialize)]
pub struct ResetQuery {
    pub resource: Option<String>,
}

/// `GET /state`: store overview.
pub async fn state_handler(State(state): State<AppState>) -> Response {
    Json(state.bridge.store().overview()).into_response()
}

/// `GET /state/resources/{name}`.
pub async fn resource_info_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Response {
    match state.bridge.store().resource_info(&name) {
        Some(info) => Json(info).into_response(),
        None => error_response(&EngineError::not_found("resource", name)),
    }
}

/// `POST /state/reset[?resource=name]`: reseeds one or all resources.
pub async fn reset_handler(
    State(state): State<AppState>,
    Query(query): Query<ResetQuery>,
) -> Response {
    let target = query.resource.as_deref().filter(|r| !r.is_empty());
    match state.bridge.store().reset(target) {
        Ok(reset) => Json(json!({ "reset": reset })).into_response(),
        Err(err) => error_response(&err),
    }
}

/// `DELETE /state/resources/{name}`: empties a resource without reseeding.
pub async fn clear_resource_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Response {
    match state.bridge.store().clear_resource(&name) {
        Ok(cleared) => Json(json!({ "resource": name, "cleared": cleared })).into_response(),
        Err(err) => error_response(&err),
    }
}

/// `GET /operations`: registered custom operation names.
pub async fn list_operations_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "operations": state.bridge.operation_names() }))
}

/// `POST /operations/{name}`: runs a custom operation with the JSON body as
/// its input.
pub async fn run_operation_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let _in_flight = state.shutdown.in_flight_guard();
    let input = if body.is_empty() {
        Data::new()
    } else {
        match serde_json::from_slice::<Value>(&body) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                return error_response(&EngineError::validation(
                    "operation input must be a JSON object",
                ))
            }
            Err(e) => return error_response(&EngineError::validation(format!("invalid JSON body: {e}"))),
        }
    };
    let result = state
        .bridge
        .run_operation(&name, input, request_context(&headers));
    result_response(result, Action::Custom)
}
