//! Frame editor: pick a still from the finished video, restyle it with the
//! image model and splice the result back in.

use std::path::PathBuf;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use types::FrameInfo;

use super::{error_response, optional_json};
use crate::session::{ActiveSession, SessionData};
use crate::state::AppContext;

const DEFAULT_VARIATION_COUNT: usize = 4;
/// Each variation is a billable image model call.
const MAX_VARIATION_COUNT: usize = 4;

#[derive(Debug, Default, Deserialize)]
pub struct ExtractRequest {
    #[serde(default)]
    pub frame_count: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VariationsRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub count: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApplyRequest {
    /// 1-based, as returned by the variations endpoint.
    #[serde(default)]
    pub variation: usize,
    #[serde(default)]
    pub hold_seconds: Option<f64>,
}

fn ok_json(body: serde_json::Value) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        Json(body),
    )
        .into_response()
}

fn no_video() -> Response {
    error_response(
        StatusCode::BAD_REQUEST,
        "No video found for this session",
        "Generate a video before editing frames.",
    )
}

fn frame_not_found(frame_id: usize) -> Response {
    error_response(
        StatusCode::NOT_FOUND,
        "Frame not found",
        format!("No extracted frame with id {frame_id}"),
    )
}

async fn session_data(state: &AppContext, session_id: &str) -> SessionData {
    state.sessions.get(session_id).await.unwrap_or_default()
}

fn find_frame(session: &SessionData, frame_id: usize) -> Option<&FrameInfo> {
    session.frames.iter().find(|frame| frame.frame_id == frame_id)
}

/// Decodes a `data:<mime>;base64,<payload>` URL.
pub fn decode_data_url(data_url: &str) -> Option<Vec<u8>> {
    let (_, payload) = data_url.strip_prefix("data:")?.split_once(";base64,")?;
    base64::engine::general_purpose::STANDARD.decode(payload).ok()
}

async fn write_file(path: &std::path::Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }
    tokio::fs::write(path, bytes).await
}

pub async fn extract_frames_handler(
    State(state): State<AppContext>,
    ActiveSession(session_id): ActiveSession,
    body: Bytes,
) -> Response {
    let request: ExtractRequest = match optional_json(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let Some(video) = session_data(&state, &session_id).await.final_video else {
        return no_video();
    };

    let count = request
        .frame_count
        .unwrap_or(er_ffmpeg::frames::DEFAULT_FRAME_COUNT);
    let out_dir = state.frames_dir(&session_id);

    let frames = match er_ffmpeg::frames::extract_frames(state.ffmpeg_path(), &video, &out_dir, count).await {
        Ok(frames) => frames,
        Err(e) => {
            tracing::error!("frame extraction failed: {e}");
            let status = if matches!(e, er_ffmpeg::FfmpegError::InvalidInput(_)) {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            return error_response(status, "Frame extraction failed", e.to_string());
        }
    };

    state
        .sessions
        .update(&session_id, |session| session.frames.clone_from(&frames))
        .await;

    ok_json(json!({
        "status": "success",
        "frames": frames,
    }))
}

pub async fn variations_handler(
    State(state): State<AppContext>,
    ActiveSession(session_id): ActiveSession,
    Path(frame_id): Path<usize>,
    body: Bytes,
) -> Response {
    let request: VariationsRequest = match optional_json(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let count = request.count.unwrap_or(DEFAULT_VARIATION_COUNT);
    if !(1..=MAX_VARIATION_COUNT).contains(&count) {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Invalid variation count",
            format!("count must be between 1 and {MAX_VARIATION_COUNT}, got {count}"),
        );
    }

    let session = session_data(&state, &session_id).await;
    let Some(frame) = find_frame(&session, frame_id) else {
        return frame_not_found(frame_id);
    };

    let variations = match state
        .image_editor
        .generate_variations(std::path::Path::new(&frame.path), &request.prompt, count)
        .await
    {
        Ok(variations) => variations,
        Err(e) => {
            tracing::error!("variation request failed: {e}");
            let status = if e.is_quota_exceeded() {
                StatusCode::TOO_MANY_REQUESTS
            } else {
                StatusCode::BAD_GATEWAY
            };
            return error_response(status, "Variation generation failed", e.to_string());
        }
    };

    let mut paths = Vec::with_capacity(variations.len());
    for (i, data_url) in variations.iter().enumerate() {
        let path = state.variation_path(&session_id, frame_id, i + 1);
        let Some(bytes) = decode_data_url(data_url) else {
            tracing::warn!("variation {} is not a base64 data URL", i + 1);
            continue;
        };

        if let Err(e) = write_file(&path, &bytes).await {
            tracing::error!("failed to save {}: {e}", path.display());
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to save variation",
                e.to_string(),
            );
        }
        paths.push(path.display().to_string());
    }

    ok_json(json!({
        "status": "success",
        "frame_id": frame_id,
        "variations": variations,
        "paths": paths,
    }))
}

pub async fn apply_handler(
    State(state): State<AppContext>,
    ActiveSession(session_id): ActiveSession,
    Path(frame_id): Path<usize>,
    body: Bytes,
) -> Response {
    let request: ApplyRequest = match optional_json(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let session = session_data(&state, &session_id).await;
    let Some(video) = session.final_video.clone() else {
        return no_video();
    };
    let Some(frame) = find_frame(&session, frame_id) else {
        return frame_not_found(frame_id);
    };

    let image = state.variation_path(&session_id, frame_id, request.variation);
    if !image.exists() {
        return error_response(
            StatusCode::NOT_FOUND,
            "Variation not found",
            format!("Generate variations for frame {frame_id} first."),
        );
    }

    // ffmpeg cannot overwrite its own input, so render beside it first
    let edited = state.edited_video_path(&session_id);
    let staging: PathBuf = edited.with_extension("partial.mp4");
    let hold = request
        .hold_seconds
        .unwrap_or(er_ffmpeg::splice::DEFAULT_HOLD_SECONDS);

    let spliced = er_ffmpeg::splice::splice_frame(
        state.ffmpeg_path(),
        &video,
        &image,
        frame.seconds,
        hold,
        &staging,
    )
    .await;
    if let Err(e) = spliced {
        tracing::error!("splice failed: {e}");
        let status = if matches!(e, er_ffmpeg::FfmpegError::InvalidInput(_)) {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        return error_response(status, "Failed to apply frame edit", e.to_string());
    }

    if let Err(e) = tokio::fs::rename(&staging, &edited).await {
        tracing::error!("failed to move {}: {e}", staging.display());
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to apply frame edit",
            e.to_string(),
        );
    }

    let final_video = edited.clone();
    state
        .sessions
        .update(&session_id, |session| session.final_video = Some(final_video))
        .await;

    tracing::info!(%session_id, "frame {} replaced, video at {}", frame_id, edited.display());

    ok_json(json!({
        "status": "success",
        "message": format!("Frame {frame_id} updated"),
        "final_video_url": "/download",
    }))
}
