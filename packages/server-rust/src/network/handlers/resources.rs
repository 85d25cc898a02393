//! Catch-all handler mapping HTTP verbs on resource routes to the bridge.
//!
//! | Method | Collection path | Item path |
//! |--------|-----------------|-----------|
//! | GET    | list            | get       |
//! | POST   | create          | 405       |
//! | PUT    | 405             | update    |
//! | PATCH  | 405             | patch     |
//! | DELETE | 405             | delete    |

use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use mockgrid_core::item::Data;
use mockgrid_core::query::Filter;
use mockgrid_core::EngineError;
use serde_json::{json, Value};

use super::{request_context, AppState};
use crate::bridge::{Action, OperationRequest};
use crate::network::response::{error_response, result_response};

/// Query parameters with a fixed meaning on list requests. All others
/// become exact-match filters.
const RESERVED_PARAMS: [&str; 4] = ["limit", "offset", "sort", "order"];

pub async fn resource_handler(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    let _in_flight = state.shutdown.in_flight_guard();
    let path = uri.path();

    let Some((resource, matched)) = state.bridge.store().match_path(path) else {
        return error_response(&EngineError::not_found("route", path));
    };

    let action = match (&method, matched.item_id.is_some()) {
        (&Method::GET, false) => Action::List,
        (&Method::GET, true) => Action::Get,
        (&Method::POST, false) => Action::Create,
        (&Method::PUT, true) => Action::Update,
        (&Method::PATCH, true) => Action::Patch,
        (&Method::DELETE, true) => Action::Delete,
        _ => return method_not_allowed(&method, path),
    };

    let data = if matches!(action, Action::Create | Action::Update | Action::Patch) {
        match parse_body(&body) {
            Ok(data) => Some(data),
            Err(err) => return error_response(&err),
        }
    } else {
        None
    };

    let request = OperationRequest {
        resource: resource.name().to_string(),
        action,
        resource_id: matched.item_id,
        data,
        params: matched.params,
        filter: (action == Action::List).then(|| list_filter(&query)),
        context: request_context(&headers),
        ..OperationRequest::default()
    };

    result_response(state.bridge.execute(&request), action)
}

/// Builds a list filter from query parameters. Unparseable numbers fall
/// back to the defaults.
fn list_filter(query: &HashMap<String, String>) -> Filter {
    let number = |key: &str| query.get(key).and_then(|v| v.parse::<i64>().ok()).unwrap_or(0);
    Filter {
        limit: number("limit"),
        offset: number("offset"),
        sort: query.get("sort").cloned().unwrap_or_default(),
        order: query.get("order").cloned().unwrap_or_default(),
        filters: query
            .iter()
            .filter(|(k, _)| !RESERVED_PARAMS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        ..Filter::default()
    }
}

/// Empty bodies read as an empty object; anything else must be a JSON object.
fn parse_body(body: &Bytes) -> Result<Data, EngineError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Data::new());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(EngineError::validation("request body must be a JSON object")),
        Err(e) => Err(EngineError::validation(format!("invalid JSON body: {e}"))),
    }
}

fn method_not_allowed(method: &Method, path: &str) -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({
            "error": {
                "code": "METHOD_NOT_ALLOWED",
                "message": format!("{method} is not supported on {path}"),
            }
        })),
    )
        .into_response()
}
