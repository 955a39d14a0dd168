use axum::extract::State;
use axum::http::header;
use axum::response::{Html, IntoResponse};
use er_axum::session::{session_cookie, OptionalSessionId};

use crate::state::AppContext;

const INDEX_HTML: &str = include_str!("../../templates/index.html");

/// Serves the upload form and makes sure the browser has a session cookie.
pub async fn index_handler(
    State(state): State<AppContext>,
    OptionalSessionId(session_id): OptionalSessionId,
) -> impl IntoResponse {
    let session_id = state.sessions.ensure(session_id).await;
    tracing::info!(%session_id, "index page");

    (
        [(header::SET_COOKIE, session_cookie(&session_id))],
        Html(INDEX_HTML.replace("{{ session_id }}", &session_id)),
    )
}
