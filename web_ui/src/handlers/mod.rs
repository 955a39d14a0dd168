use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

pub mod download;
pub mod frames;
pub mod generate;
pub mod index;
pub mod status;
pub mod upload;

/// `{ "error", "detail" }` with the given status.
pub fn error_response(status: StatusCode, error: &str, detail: impl Into<Value>) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        Json(json!({
            "error": error,
            "detail": detail.into(),
        })),
    )
        .into_response()
}

/// Parses an optional JSON body, treating an empty body as `T::default()`.
pub fn optional_json<T>(body: &[u8]) -> Result<T, Response>
where
    T: serde::de::DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }

    serde_json::from_slice(body).map_err(|e| {
        tracing::warn!("invalid request body: {e}");
        error_response(StatusCode::BAD_REQUEST, "Invalid request body", e.to_string())
    })
}
