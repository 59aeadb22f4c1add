//! Uniform JSON responses
//!
//! Successful calls answer their payload as-is; failures answer
//! `{"error": "<message>"}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;

/// 200 with `payload` as the body
pub fn success<T: Serialize>(payload: T) -> Response {
    success_with_status(payload, StatusCode::OK)
}

/// 201 with `payload` as the body
pub fn created<T: Serialize>(payload: T) -> Response {
    success_with_status(payload, StatusCode::CREATED)
}

pub fn success_with_status<T: Serialize>(payload: T, status: StatusCode) -> Response {
    (status, Json(payload)).into_response()
}

/// Error body with the given status
pub fn failure(message: impl Into<String>, status: StatusCode) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// 404 naming the missing entity
pub fn not_found(entity: &str) -> Response {
    failure(format!("{} not found!", entity), StatusCode::NOT_FOUND)
}
