use axum::extract::FromRequestParts;
use axum::http::header::COOKIE;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

pub const SESSION_COOKIE: &str = "session_id";

/// Value for a `Set-Cookie` header that stores the session id.
pub fn session_cookie(session_id: &str) -> String {
    format!("{SESSION_COOKIE}={session_id}; Path=/; HttpOnly; SameSite=Lax")
}

/// Looks up `name` in the request's `Cookie` headers.
pub fn cookie_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// A fresh, time-ordered session id.
pub fn new_session_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

/// Accepts only what [`new_session_id`] could have produced, in its
/// canonical form. Session ids end up in file paths.
pub fn parse_session_id(value: &str) -> Option<String> {
    match uuid::Uuid::try_parse(value) {
        Ok(id) => Some(id.hyphenated().to_string()),
        Err(_) => {
            tracing::warn!("ignoring malformed session id {:?}", value);
            None
        }
    }
}

fn session_id_cookie(parts: &Parts) -> Option<String> {
    cookie_value(parts, SESSION_COOKIE).and_then(|value| parse_session_id(&value))
}

/// Extracts the session id cookie set by the index page. Rejects requests
/// without one, or with an id that is not a UUID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionId(pub String);

impl<S> FromRequestParts<S> for SessionId
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<Value>);

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        session_id_cookie(parts).map_or_else(
            || {
                tracing::warn!("request without a valid session cookie");
                Err((
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": "Session not found" })),
                ))
            },
            |session_id| Ok(Self(session_id)),
        )
    }
}

/// Session id, if the browser sent a well-formed one. Never rejects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionalSessionId(pub Option<String>);

impl<S> FromRequestParts<S> for OptionalSessionId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(session_id_cookie(parts)))
    }
}
