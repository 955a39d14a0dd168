use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use property_video::jobs::{run_generation_job, GenerationRequest};
use property_video::pipeline::validate_options;
use serde_json::json;
use types::GenerationOptions;

use super::optional_json;
use crate::session::ActiveSession;
use crate::state::AppContext;

fn status_error(status: StatusCode, message: &str) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        Json(json!({
            "status": "error",
            "message": message,
        })),
    )
        .into_response()
}

/// Queues a generation run for the session's uploads. The body, if any, is
/// a partial `GenerationOptions`.
pub async fn generate_handler(
    State(state): State<AppContext>,
    ActiveSession(session_id): ActiveSession,
    body: Bytes,
) -> Response {
    let options: GenerationOptions = match optional_json(&body) {
        Ok(options) => options,
        Err(response) => return response,
    };
    if let Err(e) = validate_options(&options) {
        tracing::warn!(%session_id, "rejected generation options: {e}");
        return status_error(StatusCode::BAD_REQUEST, &e.to_string());
    }

    let images = state
        .sessions
        .get(&session_id)
        .await
        .map(|session| session.uploaded_files)
        .unwrap_or_default();
    if images.is_empty() {
        return status_error(
            StatusCode::BAD_REQUEST,
            "No uploaded images found. Please upload images first.",
        );
    }

    let Some(generator) = state.generator.clone() else {
        return status_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "GOOGLE_API_KEY is not set and no demo video is configured. Check your .env file.",
        );
    };

    let request = GenerationRequest {
        session_id: session_id.clone(),
        images,
        output_dir: state.config.output_dir.clone(),
        options,
    };
    let composer = state.composer.clone();
    let storage = state.storage.clone();

    let job_id = state
        .jobs
        .submit(session_id.clone(), move |progress| {
            run_generation_job(generator, composer, storage, request, progress)
        })
        .await;

    state
        .sessions
        .update(&session_id, |session| {
            session.job_id = Some(job_id.clone());
            session.final_video = None;
            session.frames.clear();
        })
        .await;

    tracing::info!(%session_id, %job_id, "generation started");

    (
        StatusCode::ACCEPTED,
        [(header::CONTENT_TYPE, "application/json")],
        Json(json!({
            "status": "started",
            "job_id": job_id,
        })),
    )
        .into_response()
}
