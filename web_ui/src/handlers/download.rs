use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use er_axum::session::OptionalSessionId;
use tower::ServiceExt;
use tower_http::services::ServeFile;

use super::error_response;
use crate::state::AppContext;

fn not_found() -> Response {
    error_response(
        StatusCode::NOT_FOUND,
        "No video found for this session",
        "Generate a video first.",
    )
}

/// Streams the session's final (or edited) video as an attachment. Range
/// requests are honoured.
pub async fn download_handler(
    State(state): State<AppContext>,
    OptionalSessionId(session_id): OptionalSessionId,
    request: Request,
) -> Response {
    let Some(session_id) = session_id else {
        return not_found();
    };
    let Some(video) = state
        .sessions
        .get(&session_id)
        .await
        .and_then(|session| session.final_video)
    else {
        return not_found();
    };

    if !matches!(tokio::fs::try_exists(&video).await, Ok(true)) {
        tracing::warn!("final video {} is gone", video.display());
        return not_found();
    }

    let file_name = video
        .file_name()
        .map_or_else(|| "property_video.mp4".into(), |name| name.to_string_lossy());

    let mut response = ServeFile::new(&video)
        .oneshot(request)
        .await
        .unwrap_or_else(|never| match never {})
        .map(Body::new);

    if let Ok(disposition) =
        HeaderValue::from_str(&format!("attachment; filename=\"{file_name}\""))
    {
        response
            .headers_mut()
            .insert(header::CONTENT_DISPOSITION, disposition);
    }

    response
}
