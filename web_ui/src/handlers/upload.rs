use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use types::REQUIRED_IMAGE_COUNT;

use super::error_response;
use crate::session::ActiveSession;
use crate::state::AppContext;

/// Reduces an uploaded file name to `[A-Za-z0-9_.-]`, never a path.
pub fn secure_filename(name: &str) -> String {
    let ascii: String = name
        .chars()
        .filter(char::is_ascii)
        .map(|c| if matches!(c, '/' | '\\') { ' ' } else { c })
        .collect();

    let joined = ascii.split_whitespace().collect::<Vec<_>>().join("_");
    let cleaned: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();

    cleaned.trim_matches(|c| c == '.' || c == '_').to_string()
}

struct UploadedFile {
    file_name: String,
    bytes: Bytes,
}

async fn read_fields(
    multipart: &mut Multipart,
) -> Result<HashMap<String, UploadedFile>, Response> {
    let mut files = HashMap::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("failed to read multipart body: {e}");
                return Err(error_response(e.status(), "Upload failed", e.body_text()));
            }
        };

        let Some(name) = field.name().map(ToString::to_string) else {
            continue;
        };
        let file_name = field.file_name().unwrap_or_default().to_string();

        let bytes = field.bytes().await.map_err(|e| {
            tracing::warn!("failed to read upload {name}: {e}");
            error_response(e.status(), "Upload failed", e.body_text())
        })?;

        files.insert(name, UploadedFile { file_name, bytes });
    }

    Ok(files)
}

/// Saves `image_1..image_3` under `UPLOAD_DIR/<session>/`.
pub async fn upload_handler(
    State(state): State<AppContext>,
    ActiveSession(session_id): ActiveSession,
    mut multipart: Multipart,
) -> Response {
    let files = match read_fields(&mut multipart).await {
        Ok(files) => files,
        Err(response) => return response,
    };

    let upload_dir = state.upload_dir(&session_id);
    if let Err(e) = tokio::fs::create_dir_all(&upload_dir).await {
        tracing::error!("failed to create {}: {e}", upload_dir.display());
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Upload failed", e.to_string());
    }

    let mut uploaded = Vec::with_capacity(REQUIRED_IMAGE_COUNT);
    for i in 1..=REQUIRED_IMAGE_COUNT {
        let key = format!("image_{i}");

        let Some(file) = files.get(&key) else {
            let mut available_keys: Vec<&String> = files.keys().collect();
            available_keys.sort();
            tracing::warn!("missing upload {key}, got {available_keys:?}");

            return (
                StatusCode::BAD_REQUEST,
                [(header::CONTENT_TYPE, "application/json")],
                Json(json!({
                    "error": format!("Missing {key}"),
                    "detail": format!("{key} was not found in the upload."),
                    "available_keys": available_keys,
                })),
            )
                .into_response();
        };

        if file.file_name.is_empty() {
            return error_response(
                StatusCode::BAD_REQUEST,
                &format!("No selected file for {key}"),
                format!("The file name for {key} is empty."),
            );
        }

        let mut file_name = secure_filename(&file.file_name);
        if file_name.is_empty() {
            file_name = key.clone();
        }

        let path = upload_dir.join(file_name);
        if let Err(e) = tokio::fs::write(&path, &file.bytes).await {
            tracing::error!("failed to save {}: {e}", path.display());
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Upload failed", e.to_string());
        }

        tracing::info!("saved {key} to {}", path.display());
        uploaded.push(path);
    }

    let file_list: Vec<String> = uploaded.iter().map(|p| p.display().to_string()).collect();
    state
        .sessions
        .update(&session_id, |session| session.uploaded_files = uploaded)
        .await;

    tracing::info!(%session_id, "uploaded {} files", file_list.len());

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        Json(json!({
            "status": "success",
            "message": "Images uploaded. Press \"Start AI video generation\" to continue.",
            "files": file_list,
        })),
    )
        .into_response()
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::secure_filename;

    #[test]
    fn test_secure_filename() {
        assert_eq!(secure_filename("My cool photo.jpg"), "My_cool_photo.jpg");
        assert_eq!(secure_filename("../../etc/passwd"), "etc_passwd");
        assert_eq!(secure_filename("C:\\photos\\front door.png"), "C_photos_front_door.png");
        assert_eq!(secure_filename("façade.jpg"), "faade.jpg");
        assert_eq!(secure_filename("..."), "");
    }
}
