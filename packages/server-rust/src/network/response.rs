//! Rendering of bridge results as HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use mockgrid_core::{EngineError, ErrorKind};
use serde_json::json;

use crate::bridge::{Action, ErrorBody, OperationResult, ResultStatus};

/// HTTP status for an error kind.
#[must_use]
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::ValidationError => StatusCode::BAD_REQUEST,
        ErrorKind::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        ErrorKind::CapacityExceeded => StatusCode::INSUFFICIENT_STORAGE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// `{"error": {"code", "message", "hint"}}` with the mapped status.
#[must_use]
pub fn error_response(err: &EngineError) -> Response {
    (
        status_for(err.kind()),
        Json(json!({ "error": ErrorBody::from(err) })),
    )
        .into_response()
}

/// Renders a bridge result for the action that produced it.
#[must_use]
pub fn result_response(result: OperationResult, action: Action) -> Response {
    if let Some(err) = &result.error {
        return error_response(err);
    }
    if !result.is_success() {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": { "code": "INTERNAL_ERROR", "message": "operation failed" } })),
        )
            .into_response();
    }

    match (action, result) {
        (Action::Delete, _) => StatusCode::NO_CONTENT.into_response(),
        (_, OperationResult { list: Some(page), .. }) => Json(page).into_response(),
        (_, OperationResult { data: Some(data), .. }) => Json(data).into_response(),
        (
            _,
            OperationResult {
                status,
                item: Some(item),
                ..
            },
        ) => {
            let code = if status == ResultStatus::Created {
                StatusCode::CREATED
            } else {
                StatusCode::OK
            };
            (code, Json(item)).into_response()
        }
        _ => StatusCode::NO_CONTENT.into_response(),
    }
}
