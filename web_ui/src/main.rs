//! Web front end for the property video generator.
//!
//! Serves the upload form, queues generation jobs in the background and
//! exposes the frame editor endpoints. Sessions and jobs are kept in memory.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;

mod config;
mod handlers;
mod session;
mod state;

use config::Config;
use handlers::download::download_handler;
use handlers::frames::{apply_handler, extract_frames_handler, variations_handler};
use handlers::generate::generate_handler;
use handlers::index::index_handler;
use handlers::status::status_handler;
use handlers::upload::upload_handler;
use state::AppContext;

fn app(state: AppContext) -> Router {
    let max_upload_bytes = state.config.max_upload_bytes;

    let router = Router::new()
        .route("/", get(index_handler))
        .route("/upload", post(upload_handler))
        .route("/generate", post(generate_handler))
        .route("/status", get(status_handler))
        .route("/download", get(download_handler))
        .route("/frames/extract", post(extract_frames_handler))
        .route("/frames/{frame_id}/variations", post(variations_handler))
        .route("/frames/{frame_id}/apply", post(apply_handler))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .with_state(state);

    er_axum::with_standard_layers(router)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let app_context: AppContext = er_app::create_app_context::<AppContext, Config>().await?;
    let bind_address = app_context.config.bind_address.clone();

    tokio::fs::create_dir_all(&app_context.config.upload_dir).await?;
    tokio::fs::create_dir_all(&app_context.config.output_dir).await?;

    er_axum::run_app(app(app_context), &bind_address).await
}

#[cfg(test)]
mod test {
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use er_genai::PassthroughEditor;
    use http_body_util::BodyExt;
    use pretty_assertions::assert_eq;
    use property_video::{ClipComposer, ClipGenerator};
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use types::{FrameInfo, Resolution, TransitionType};

    use super::app;
    use crate::config::Config;
    use crate::state::AppContext;

    const BOUNDARY: &str = "estate-reel-boundary";

    struct WritingGenerator;

    #[async_trait]
    impl ClipGenerator for WritingGenerator {
        async fn generate_clip(
            &self,
            _image: &Path,
            _prompt: &str,
            _clip_duration: u32,
            output: &Path,
        ) -> property_video::Result<PathBuf> {
            tokio::fs::write(output, b"clip").await?;
            Ok(output.to_path_buf())
        }
    }

    struct JoiningComposer;

    #[async_trait]
    impl ClipComposer for JoiningComposer {
        async fn compose(
            &self,
            clips: &[PathBuf],
            output: &Path,
            _transition: TransitionType,
            _transition_duration: f64,
            _resolution: Resolution,
        ) -> property_video::Result<PathBuf> {
            tokio::fs::write(output, b"clip".repeat(clips.len())).await?;
            Ok(output.to_path_buf())
        }
    }

    fn test_state(dir: &Path, with_generator: bool) -> AppContext {
        let config = Config {
            output_dir: dir.join("output"),
            upload_dir: dir.join("uploads"),
            ..Config::default()
        };
        let generator: Option<Arc<dyn ClipGenerator>> =
            with_generator.then(|| Arc::new(WritingGenerator) as Arc<dyn ClipGenerator>);

        AppContext::with_services(
            config,
            generator,
            Arc::new(JoiningComposer),
            Arc::new(PassthroughEditor),
            None,
        )
    }

    fn multipart_body(files: &[(&str, &str)]) -> String {
        let mut body = String::new();
        for (name, file_name) in files {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: image/jpeg\r\n\r\njpeg-bytes\r\n"
            ));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        body
    }

    fn upload_request(session: Option<&str>, files: &[(&str, &str)]) -> Request<Body> {
        let mut builder = Request::post("/upload").header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
        if let Some(session) = session {
            builder = builder.header("cookie", format!("session_id={session}"));
        }
        builder.body(Body::from(multipart_body(files))).unwrap()
    }

    fn post_json(uri: &str, session: &str, body: &Value) -> Request<Body> {
        Request::post(uri)
            .header("cookie", format!("session_id={session}"))
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_with_session(uri: &str, session: &str) -> Request<Body> {
        Request::get(uri)
            .header("cookie", format!("session_id={session}"))
            .body(Body::empty())
            .unwrap()
    }

    /// Opens the index page and returns the session id it hands out.
    async fn new_session(router: &Router) -> String {
        let response = router
            .clone()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let cookie = response.headers()["set-cookie"].to_str().unwrap();
        cookie
            .split(';')
            .next()
            .unwrap()
            .trim_start_matches("session_id=")
            .to_string()
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body.to_vec())
    }

    async fn send_json(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let (status, body) = send(router, request).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    const ALL_IMAGES: [(&str, &str); 3] = [
        ("image_1", "front.jpg"),
        ("image_2", "living room.jpg"),
        ("image_3", "lobby.jpg"),
    ];

    #[tokio::test]
    async fn test_index_sets_session_cookie() {
        let dir = tempfile::tempdir().unwrap();
        let router = app(test_state(dir.path(), true));

        let response = router
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response.headers()["set-cookie"].to_str().unwrap().to_string();
        assert!(cookie.starts_with("session_id="));
        assert!(cookie.contains("HttpOnly"));

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains("image_1"));
        assert!(!html.contains("{{ session_id }}"));
    }

    #[tokio::test]
    async fn test_upload_requires_session() {
        let dir = tempfile::tempdir().unwrap();
        let router = app(test_state(dir.path(), true));

        let (status, body) = send_json(&router, upload_request(None, &ALL_IMAGES)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Session not found");
    }

    #[tokio::test]
    async fn test_upload_reports_missing_image() {
        let dir = tempfile::tempdir().unwrap();
        let router = app(test_state(dir.path(), true));

        let session = new_session(&router).await;

        let (status, body) = send_json(
            &router,
            upload_request(Some(&session), &[("image_1", "a.jpg"), ("image_3", "c.jpg")]),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing image_2");
        assert_eq!(body["available_keys"], json!(["image_1", "image_3"]));
    }

    #[tokio::test]
    async fn test_upload_rejects_empty_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let router = app(test_state(dir.path(), true));

        let session = new_session(&router).await;

        let (status, body) = send_json(
            &router,
            upload_request(
                Some(&session),
                &[("image_1", ""), ("image_2", "b.jpg"), ("image_3", "c.jpg")],
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No selected file for image_1");
    }

    #[tokio::test]
    async fn test_upload_saves_sanitised_files() {
        let dir = tempfile::tempdir().unwrap();
        let router = app(test_state(dir.path(), true));

        let session = new_session(&router).await;

        let (status, body) =
            send_json(&router, upload_request(Some(&session), &ALL_IMAGES)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");

        let saved = dir.path().join("uploads").join(&session).join("living_room.jpg");
        assert_eq!(body["files"][1], saved.display().to_string());
        assert_eq!(std::fs::read(saved).unwrap(), b"jpeg-bytes");
    }

    #[tokio::test]
    async fn test_generate_requires_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let router = app(test_state(dir.path(), true));

        let session = new_session(&router).await;

        let (status, body) =
            send_json(&router, post_json("/generate", &session, &json!({}))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn test_generate_without_credentials_or_demo() {
        let dir = tempfile::tempdir().unwrap();
        let router = app(test_state(dir.path(), false));

        let session = new_session(&router).await;

        send_json(&router, upload_request(Some(&session), &ALL_IMAGES)).await;
        let (status, body) =
            send_json(&router, post_json("/generate", &session, &json!({}))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["message"].as_str().unwrap().contains("GOOGLE_API_KEY"));
    }

    #[tokio::test]
    async fn test_status_and_download_without_a_job() {
        let dir = tempfile::tempdir().unwrap();
        let router = app(test_state(dir.path(), true));

        let (status, body) = send_json(
            &router,
            Request::get("/status").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "IDLE");
        assert_eq!(body["progress_percent"], 0);

        let session = new_session(&router).await;
        let (status, body) = send_json(&router, get_with_session("/download", &session)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "No video found for this session");
    }

    #[tokio::test]
    async fn test_generate_runs_in_background_until_download() {
        let dir = tempfile::tempdir().unwrap();
        let router = app(test_state(dir.path(), true));

        let session = new_session(&router).await;

        send_json(&router, upload_request(Some(&session), &ALL_IMAGES)).await;
        let (status, body) = send_json(
            &router,
            post_json("/generate", &session, &json!({ "transition_type": "wipeleft" })),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["status"], "started");
        assert!(body["job_id"].is_string());

        let mut last = Value::Null;
        for _ in 0..200 {
            let (_, body) = send_json(&router, get_with_session("/status", &session)).await;
            if body["status"] == "COMPLETE" || body["status"] == "ERROR" {
                last = body;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(last["status"], "COMPLETE", "{last}");
        assert_eq!(last["progress_percent"], 100);
        assert_eq!(last["final_video_url"], "/download");

        let response = router
            .clone()
            .oneshot(get_with_session("/download", &session))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "video/mp4");
        assert_eq!(
            response.headers()["content-disposition"],
            "attachment; filename=\"final_property_video.mp4\""
        );
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"clipclipclip");

        let ranged = Request::get("/download")
            .header("cookie", format!("session_id={session}"))
            .header("range", "bytes=0-3")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&router, ranged).await;
        assert_eq!(status, StatusCode::PARTIAL_CONTENT);
        assert_eq!(body, b"clip");
    }

    #[tokio::test]
    async fn test_frame_editor_validation() {
        let dir = tempfile::tempdir().unwrap();
        let router = app(test_state(dir.path(), true));
        let session = new_session(&router).await;

        let (status, _) =
            send_json(&router, post_json("/frames/extract", &session, &json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send_json(
            &router,
            post_json("/frames/9/variations", &session, &json!({ "prompt": "dusk" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Frame not found");

        let (status, _) = send_json(
            &router,
            post_json("/frames/0/apply", &session, &json!({ "variation": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    async fn state_with_frame(dir: &Path) -> (AppContext, String) {
        let state = test_state(dir, true);
        let session = state.sessions.ensure(None).await;

        let frame_path = dir.join("frame_002.png");
        std::fs::write(&frame_path, b"png-bytes").unwrap();
        state
            .sessions
            .update(&session, |data| {
                data.frames.push(FrameInfo {
                    frame_id: 2,
                    path: frame_path.display().to_string(),
                    timestamp: "0:09".to_string(),
                    seconds: 9.5,
                    data_url: None,
                });
            })
            .await;

        (state, session)
    }

    #[tokio::test]
    async fn test_variations_are_saved_per_frame() {
        let dir = tempfile::tempdir().unwrap();
        let (state, session) = state_with_frame(dir.path()).await;

        let router = app(state);
        let (status, body) = send_json(
            &router,
            post_json(
                "/frames/2/variations",
                &session,
                &json!({ "prompt": "dusk", "count": 2 }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["variations"].as_array().unwrap().len(), 2);

        let saved = dir
            .path()
            .join("output")
            .join(&session)
            .join("frames/variations/frame_002_var_2.png");
        assert_eq!(std::fs::read(saved).unwrap(), b"png-bytes");
    }

    #[tokio::test]
    async fn test_variation_count_is_capped() {
        let dir = tempfile::tempdir().unwrap();
        let (state, session) = state_with_frame(dir.path()).await;
        let router = app(state);

        for count in [0, 5, 1_000_000_000] {
            let (status, body) = send_json(
                &router,
                post_json(
                    "/frames/2/variations",
                    &session,
                    &json!({ "prompt": "dusk", "count": count }),
                ),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{count}");
            assert_eq!(body["error"], "Invalid variation count");
        }

        assert!(!dir.path().join("output").join(&session).join("frames").exists());
    }

    #[tokio::test]
    async fn test_traversal_cookie_cannot_pick_the_upload_folder() {
        let dir = tempfile::tempdir().unwrap();
        let router = app(test_state(dir.path(), true));

        let (status, body) =
            send_json(&router, upload_request(Some("../escaped"), &ALL_IMAGES)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Session not found");
        assert!(!dir.path().join("escaped").exists());
        assert!(!dir.path().join("uploads").exists());
    }

    #[tokio::test]
    async fn test_sessions_the_server_never_issued_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let router = app(test_state(dir.path(), true));

        let forged = "0192f0c1-7c3a-7d2e-8a4b-0c1d2e3f4a5b";
        let (status, _) = send_json(&router, upload_request(Some(forged), &ALL_IMAGES)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!dir.path().join("uploads").join(forged).exists());

        let response = router
            .clone()
            .oneshot(
                Request::get("/")
                    .header("cookie", "session_id=../escaped")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let cookie = response.headers()["set-cookie"].to_str().unwrap();
        assert!(!cookie.contains(".."));
    }

    #[tokio::test]
    async fn test_generate_rejects_output_names_outside_the_session() {
        let dir = tempfile::tempdir().unwrap();
        let router = app(test_state(dir.path(), true));
        let session = new_session(&router).await;
        send_json(&router, upload_request(Some(&session), &ALL_IMAGES)).await;

        let absolute = dir.path().join("pwned.mp4");
        for output_name in [absolute.display().to_string(), "../../pwned.mp4".to_string()] {
            let (status, body) = send_json(
                &router,
                post_json("/generate", &session, &json!({ "output_name": output_name })),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{output_name}");
            assert!(body["message"]
                .as_str()
                .unwrap()
                .contains("invalid output name"));
        }

        let (status, body) = send_json(
            &router,
            post_json("/generate", &session, &json!({ "transition_duration": -1.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"]
            .as_str()
            .unwrap()
            .contains("transition duration"));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!absolute.exists());
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let dir = tempfile::tempdir().unwrap();
        let router = app(test_state(dir.path(), true));

        let (status, body) = send_json(
            &router,
            Request::get("/nope").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "not found");
    }
}
