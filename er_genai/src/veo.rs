use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tracing::instrument;

use crate::{BaseUrls, Credentials, GenAiError, Result};

pub const DEFAULT_VEO_MODEL: &str = "veo-3.1-generate-preview";

/// Clip lengths Veo accepts, in seconds.
pub const SUPPORTED_DURATIONS: [u32; 3] = [4, 6, 8];

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
// 10 minutes at the default interval
const DEFAULT_MAX_POLLS: u32 = 120;
const LOG_EVERY_POLLS: u32 = 6;
// covers the clip download, which is the slowest single request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoParams {
    /// `16:9` or `9:16`
    pub aspect_ratio: String,
    /// `720p` or `1080p`
    pub resolution: String,
    pub duration_seconds: u32,
    /// Only honoured by Vertex AI.
    pub generate_audio: bool,
}

impl Default for VideoParams {
    fn default() -> Self {
        Self {
            aspect_ratio: "16:9".to_string(),
            resolution: "720p".to_string(),
            duration_seconds: 8,
            generate_audio: true,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictRequest<'a> {
    instances: Vec<Instance<'a>>,
    parameters: Parameters<'a>,
}

#[derive(Serialize)]
struct Instance<'a> {
    prompt: &'a str,
    image: InlineImage,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineImage {
    bytes_base64_encoded: String,
    mime_type: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Parameters<'a> {
    aspect_ratio: &'a str,
    resolution: &'a str,
    duration_seconds: u32,
    sample_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    generate_audio: Option<bool>,
}

/// A long-running generation job as reported by the API.
#[derive(Debug, Clone, Deserialize)]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub response: Option<Value>,
    #[serde(default)]
    pub error: Option<OperationError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoSource {
    Uri(String),
    Inline(Vec<u8>),
}

/// Finds the generated video in a finished operation's `response`.
///
/// AI Studio nests it under `generateVideoResponse.generatedSamples`, Vertex
/// returns `videos` with either a `gcsUri` or inline bytes, and some SDK
/// surfaces use `generatedVideos`.
///
/// # Errors
/// `NoVideoInResponse` when none of the known shapes match.
pub fn locate_video(response: &Value) -> Result<VideoSource> {
    let uri = response
        .pointer("/generateVideoResponse/generatedSamples/0/video/uri")
        .or_else(|| response.pointer("/videos/0/gcsUri"))
        .or_else(|| response.pointer("/generatedVideos/0/video/uri"))
        .and_then(Value::as_str);

    if let Some(uri) = uri {
        tracing::info!("Found video at {}", uri);
        return Ok(VideoSource::Uri(uri.to_string()));
    }

    if let Some(encoded) = response
        .pointer("/videos/0/bytesBase64Encoded")
        .and_then(Value::as_str)
    {
        tracing::info!("Found inline video bytes");
        let bytes = base64::engine::general_purpose::STANDARD.decode(encoded)?;
        return Ok(VideoSource::Inline(bytes));
    }

    tracing::error!("Could not find video in response: {}", response);
    Err(GenAiError::NoVideoInResponse)
}

/// `gs://bucket/object` becomes `{storage_base}/bucket/object`; anything else
/// is returned unchanged.
pub fn rewrite_gcs_uri(uri: &str, storage_base: &str) -> String {
    uri.strip_prefix("gs://").map_or_else(
        || uri.to_string(),
        |rest| format!("{}/{rest}", storage_base.trim_end_matches('/')),
    )
}

/// Veo image-to-video client.
#[derive(Debug, Clone)]
pub struct VeoClient {
    http: reqwest::Client,
    credentials: Credentials,
    model: String,
    urls: BaseUrls,
    poll_interval: Duration,
    max_polls: u32,
}

impl VeoClient {
    /// # Errors
    /// If the HTTP client cannot be built.
    pub fn new(credentials: Credentials, model: impl Into<String>) -> Result<Self> {
        let model = model.into();
        tracing::info!("Initialized Veo video generator with model: {}", model);

        Ok(Self {
            http: crate::http_client(REQUEST_TIMEOUT)?,
            credentials,
            model,
            urls: BaseUrls::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
        })
    }

    #[must_use]
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    #[must_use]
    pub fn with_base_urls(mut self, urls: BaseUrls) -> Self {
        self.urls = urls;
        self
    }

    #[must_use]
    pub const fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls;
        self
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = self.credentials.apply(request).await?.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenAiError::from_response(status, body));
        }

        Ok(response)
    }

    async fn fetch_operation(&self, name: &str) -> Result<Operation> {
        let request = match &self.credentials {
            Credentials::ApiKey(_) => self
                .http
                .get(format!("{}/v1beta/{name}", self.urls.studio)),
            Credentials::Vertex { .. } => self
                .http
                .post(self.credentials.model_url(
                    &self.urls,
                    &self.model,
                    "fetchPredictOperation",
                ))
                .json(&json!({ "operationName": name })),
        };

        Ok(self.send(request).await?.json().await?)
    }

    /// Submits an image-to-video request and polls until it finishes.
    ///
    /// # Errors
    /// `ImageNotFound` for a missing image, `QuotaExceeded` when the API is
    /// rate limiting, `OperationFailed` if the job reports an error and
    /// `Timeout` once the poll budget is spent.
    #[instrument(skip(self, prompt), fields(model = %self.model))]
    pub async fn generate_video(
        &self,
        image: &Path,
        prompt: &str,
        params: &VideoParams,
    ) -> Result<Operation> {
        if !tokio::fs::try_exists(image).await? {
            return Err(GenAiError::ImageNotFound(image.to_path_buf()));
        }

        tracing::info!("Submitting video generation request");
        tracing::info!("Prompt: {}...", prompt.chars().take(100).collect::<String>());
        tracing::info!(
            "Settings: {}s, {}, {}",
            params.duration_seconds,
            params.aspect_ratio,
            params.resolution
        );

        let bytes = tokio::fs::read(image).await?;
        let body = PredictRequest {
            instances: vec![Instance {
                prompt,
                image: InlineImage {
                    bytes_base64_encoded: base64::engine::general_purpose::STANDARD
                        .encode(bytes),
                    mime_type: types::image_mime_type(image),
                },
            }],
            parameters: Parameters {
                aspect_ratio: &params.aspect_ratio,
                resolution: &params.resolution,
                duration_seconds: params.duration_seconds,
                sample_count: 1,
                generate_audio: self
                    .credentials
                    .is_vertex()
                    .then_some(params.generate_audio),
            },
        };

        let url = self
            .credentials
            .model_url(&self.urls, &self.model, "predictLongRunning");
        let mut operation: Operation =
            self.send(self.http.post(url).json(&body)).await?.json().await?;

        tracing::info!("Video generation started. Operation name: {}", operation.name);

        let mut poll_count = 0;
        while !operation.done {
            if poll_count >= self.max_polls {
                let waited = self.poll_interval.as_secs() * u64::from(self.max_polls);
                tracing::error!("Video generation timed out after {}s", waited);
                return Err(GenAiError::Timeout(waited));
            }

            tokio::time::sleep(self.poll_interval).await;
            poll_count += 1;

            operation = self.fetch_operation(&operation.name).await?;

            if poll_count % LOG_EVERY_POLLS == 0 {
                tracing::info!(
                    "Still generating... ({}s elapsed)",
                    self.poll_interval.as_secs() * u64::from(poll_count)
                );
            }
        }

        if let Some(error) = operation.error.take() {
            tracing::error!("Video generation failed: {}", error.message);
            return Err(GenAiError::from_operation(error.code, error.message));
        }

        tracing::info!("Video generation completed!");
        Ok(operation)
    }

    /// Saves the video produced by a finished operation to `output`.
    ///
    /// # Errors
    /// `OperationPending` for an unfinished operation, `NoVideoInResponse`
    /// if the response carries no video, or any download failure.
    #[instrument(skip(self, operation), fields(operation = %operation.name))]
    pub async fn download_video(&self, operation: &Operation, output: &Path) -> Result<PathBuf> {
        if !operation.done {
            return Err(GenAiError::OperationPending);
        }

        let response = operation
            .response
            .as_ref()
            .ok_or(GenAiError::NoVideoInResponse)?;

        create_parent_dir(output).await?;

        match locate_video(response)? {
            VideoSource::Inline(bytes) => {
                tokio::fs::write(output, &bytes).await?;
                tracing::info!(
                    "Video saved from inline bytes: {} ({} bytes)",
                    output.display(),
                    bytes.len()
                );
                Ok(output.to_path_buf())
            }
            VideoSource::Uri(uri) => self.download_from_uri(&uri, output).await,
        }
    }

    /// Streams `uri` to `output`, authorising the request the same way as
    /// API calls.
    ///
    /// # Errors
    /// Fails on authorisation, HTTP or filesystem errors.
    #[instrument(skip(self))]
    pub async fn download_from_uri(&self, uri: &str, output: &Path) -> Result<PathBuf> {
        let url = rewrite_gcs_uri(uri, &self.urls.storage);
        tracing::info!("Downloading generated video from {}", url);

        create_parent_dir(output).await?;

        let mut response = self.send(self.http.get(&url)).await?;
        let mut file = tokio::fs::File::create(output).await?;
        let mut written = 0usize;

        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len();
        }
        file.flush().await?;

        tracing::info!(
            "Video downloaded successfully: {} ({} bytes)",
            output.display(),
            written
        );

        Ok(output.to_path_buf())
    }

    /// Generate a clip for `image` and save it to `output`.
    ///
    /// # Errors
    /// See [`VeoClient::generate_video`] and [`VeoClient::download_video`].
    pub async fn generate_from_image_file(
        &self,
        image: &Path,
        prompt: &str,
        output: &Path,
        params: &VideoParams,
    ) -> Result<PathBuf> {
        tracing::info!("Starting video generation for {}", image.display());

        let operation = self.generate_video(image, prompt, params).await?;
        let path = self.download_video(&operation, output).await?;

        tracing::info!("Video generation workflow completed: {}", path.display());
        Ok(path)
    }
}

async fn create_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            tokio::fs::create_dir_all(dir).await?;
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use axum::extract::{Path as AxumPath, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    use super::{locate_video, rewrite_gcs_uri, VeoClient, VideoParams, VideoSource};
    use crate::{BaseUrls, Credentials, GenAiError, StaticToken};

    #[derive(Default)]
    struct Mock {
        polls: AtomicUsize,
        requests: Mutex<Vec<Value>>,
        headers: Mutex<Vec<(String, String)>>,
    }

    impl Mock {
        fn record_auth(&self, headers: &HeaderMap) {
            let mut seen = self.headers.lock().unwrap();
            for name in ["x-goog-api-key", "authorization"] {
                if let Some(value) = headers.get(name) {
                    seen.push((name.to_string(), value.to_str().unwrap().to_string()));
                }
            }
        }
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}")
    }

    fn image_fixture(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let image = dir.path().join("exterior.jpg");
        std::fs::write(&image, b"jpeg bytes").unwrap();
        image
    }

    fn fast(client: VeoClient) -> VeoClient {
        client.with_polling(Duration::from_millis(5), 10)
    }

    async fn studio_server(mock: Arc<Mock>) -> String {
        let app = Router::new()
            .route(
                "/v1beta/models/{call}",
                post(
                    |State(mock): State<Arc<Mock>>,
                     headers: HeaderMap,
                     Json(body): Json<Value>| async move {
                        mock.record_auth(&headers);
                        mock.requests.lock().unwrap().push(body);
                        Json(json!({ "name": "models/veo/operations/op-1" }))
                    },
                ),
            )
            .route(
                "/v1beta/models/veo/operations/{id}",
                get(|State(mock): State<Arc<Mock>>, headers: HeaderMap| async move {
                    mock.record_auth(&headers);
                    let polls = mock.polls.fetch_add(1, Ordering::SeqCst) + 1;
                    if polls < 2 {
                        return Json(json!({ "name": "models/veo/operations/op-1" }));
                    }
                    Json(json!({
                        "name": "models/veo/operations/op-1",
                        "done": true,
                        "response": {
                            "generateVideoResponse": {
                                "generatedSamples": [{ "video": { "uri": "FILES/clip.mp4" } }]
                            }
                        }
                    }))
                }),
            )
            .route(
                "/files/{name}",
                get(|State(mock): State<Arc<Mock>>, headers: HeaderMap| async move {
                    mock.record_auth(&headers);
                    "payload"
                }),
            )
            .with_state(mock);

        serve(app).await
    }

    #[test]
    fn test_locate_video_response_shapes() {
        let studio = json!({
            "generateVideoResponse": {
                "generatedSamples": [{ "video": { "uri": "https://example.com/a.mp4" } }]
            }
        });
        assert_eq!(
            locate_video(&studio).unwrap(),
            VideoSource::Uri("https://example.com/a.mp4".to_string())
        );

        let vertex_uri = json!({ "videos": [{ "gcsUri": "gs://bucket/b.mp4" }] });
        assert_eq!(
            locate_video(&vertex_uri).unwrap(),
            VideoSource::Uri("gs://bucket/b.mp4".to_string())
        );

        let vertex_inline = json!({ "videos": [{ "bytesBase64Encoded": "cGF5bG9hZA==" }] });
        assert_eq!(
            locate_video(&vertex_inline).unwrap(),
            VideoSource::Inline(b"payload".to_vec())
        );

        let sdk = json!({ "generatedVideos": [{ "video": { "uri": "files/c" } }] });
        assert_eq!(
            locate_video(&sdk).unwrap(),
            VideoSource::Uri("files/c".to_string())
        );

        assert!(matches!(
            locate_video(&json!({ "raiMediaFilteredCount": 1 })),
            Err(GenAiError::NoVideoInResponse)
        ));
    }

    #[test]
    fn test_rewrite_gcs_uri() {
        assert_eq!(
            rewrite_gcs_uri("gs://bucket/object.mp4", "https://storage.googleapis.com"),
            "https://storage.googleapis.com/bucket/object.mp4"
        );
        assert_eq!(
            rewrite_gcs_uri("https://example.com/video.mp4", "https://storage.googleapis.com"),
            "https://example.com/video.mp4"
        );
    }

    #[tokio::test]
    async fn test_missing_image() {
        let client = VeoClient::new(Credentials::api_key("key"), "veo").unwrap();
        let err = client
            .generate_video(
                std::path::Path::new("/nonexistent/exterior.jpg"),
                "prompt",
                &VideoParams::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GenAiError::ImageNotFound(_)));
    }

    #[tokio::test]
    async fn test_studio_generate_poll_and_download() {
        let mock = Arc::new(Mock::default());
        let base = studio_server(mock.clone()).await;
        let dir = tempfile::tempdir().unwrap();
        let image = image_fixture(&dir);

        let client = fast(VeoClient::new(Credentials::api_key("studio-api-key"), "veo").unwrap())
            .with_base_urls(BaseUrls::single(&base));

        let operation = client
            .generate_video(&image, "walk to the door", &VideoParams::default())
            .await
            .unwrap();
        assert!(operation.done);
        assert_eq!(mock.polls.load(Ordering::SeqCst), 2);

        let request = mock.requests.lock().unwrap()[0].clone();
        assert_eq!(request["instances"][0]["prompt"], "walk to the door");
        assert_eq!(request["instances"][0]["image"]["mimeType"], "image/jpeg");
        assert_eq!(
            request["instances"][0]["image"]["bytesBase64Encoded"],
            "anBlZyBieXRlcw=="
        );
        assert_eq!(request["parameters"]["durationSeconds"], 8);
        assert!(request["parameters"].get("generateAudio").is_none());

        // the sample uri is relative; make it absolute against the mock
        let mut operation = operation;
        operation.response = Some(json!({
            "generateVideoResponse": {
                "generatedSamples": [{ "video": { "uri": format!("{base}/files/clip.mp4") } }]
            }
        }));

        let output = dir.path().join("clips/clip_01.mp4");
        client.download_video(&operation, &output).await.unwrap();
        assert_eq!(std::fs::read(&output).unwrap(), b"payload");

        let headers = mock.headers.lock().unwrap().clone();
        assert!(headers
            .iter()
            .all(|(name, value)| name == "x-goog-api-key" && value == "studio-api-key"));
        assert_eq!(headers.len(), 4);
    }

    #[tokio::test]
    async fn test_vertex_generate_uses_bearer_and_fetch_predict_operation() {
        let mock = Arc::new(Mock::default());
        let app = Router::new()
            .route(
                "/v1/projects/{project}/locations/{location}/publishers/google/models/{call}",
                post(
                    |State(mock): State<Arc<Mock>>,
                     AxumPath((_, _, call)): AxumPath<(String, String, String)>,
                     headers: HeaderMap,
                     Json(body): Json<Value>| async move {
                        mock.record_auth(&headers);
                        mock.requests.lock().unwrap().push(body);
                        if call.ends_with(":predictLongRunning") {
                            return Json(json!({ "name": "projects/p/operations/op-9" }));
                        }
                        Json(json!({
                            "name": "projects/p/operations/op-9",
                            "done": true,
                            "response": { "videos": [{ "bytesBase64Encoded": "cGF5bG9hZA==" }] }
                        }))
                    },
                ),
            )
            .with_state(mock.clone());
        let base = serve(app).await;

        let dir = tempfile::tempdir().unwrap();
        let image = image_fixture(&dir);
        let credentials =
            Credentials::vertex("demo-project", "us-central1", Arc::new(StaticToken::new("vertex-token")));
        let client = fast(VeoClient::new(credentials, "veo").unwrap()).with_base_urls(BaseUrls::single(&base));

        let output = dir.path().join("clip.mp4");
        client
            .generate_from_image_file(&image, "prompt", &output, &VideoParams::default())
            .await
            .unwrap();
        assert_eq!(std::fs::read(&output).unwrap(), b"payload");

        let requests = mock.requests.lock().unwrap().clone();
        assert_eq!(requests[0]["parameters"]["generateAudio"], true);
        assert_eq!(requests[1], json!({ "operationName": "projects/p/operations/op-9" }));

        let headers = mock.headers.lock().unwrap().clone();
        assert!(headers
            .iter()
            .all(|(name, value)| name == "authorization" && value == "Bearer vertex-token"));
    }

    #[tokio::test]
    async fn test_vertex_download_rewrites_gcs_uri() {
        let mock = Arc::new(Mock::default());
        let app = Router::new()
            .route(
                "/bucket/object.mp4",
                get(|State(mock): State<Arc<Mock>>, headers: HeaderMap| async move {
                    mock.record_auth(&headers);
                    "payload"
                }),
            )
            .with_state(mock.clone());
        let base = serve(app).await;

        let credentials = Credentials::vertex("p", "l", Arc::new(StaticToken::new("refreshed-token")));
        let client = VeoClient::new(credentials, "veo").unwrap().with_base_urls(BaseUrls::single(&base));

        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("video.mp4");
        client
            .download_from_uri("gs://bucket/object.mp4", &output)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&output).unwrap(), b"payload");
        assert_eq!(
            mock.headers.lock().unwrap().clone(),
            vec![("authorization".to_string(), "Bearer refreshed-token".to_string())]
        );
    }

    #[tokio::test]
    async fn test_rate_limit_is_reported_as_quota_exceeded() {
        let app = Router::new().route(
            "/v1beta/models/{call}",
            post(|| async {
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(json!({ "error": { "code": 429, "status": "RESOURCE_EXHAUSTED" } })),
                )
            }),
        );
        let base = serve(app).await;

        let dir = tempfile::tempdir().unwrap();
        let image = image_fixture(&dir);
        let client = VeoClient::new(Credentials::api_key("key"), "veo").unwrap()
            .with_base_urls(BaseUrls::single(&base));

        let err = client
            .generate_video(&image, "prompt", &VideoParams::default())
            .await
            .unwrap_err();
        assert!(err.is_quota_exceeded());
    }

    #[tokio::test]
    async fn test_operation_error_timeout_and_pending() {
        let app = Router::new()
            .route(
                "/v1beta/models/{call}",
                post(|Json(body): Json<Value>| async move {
                    if body["instances"][0]["prompt"] == "rejected" {
                        Json(json!({ "name": "operations/op-2" }))
                    } else {
                        Json(json!({ "name": "operations/op-3" }))
                    }
                }),
            )
            .route(
                "/v1beta/operations/{id}",
                get(|AxumPath(id): AxumPath<String>| async move {
                    if id == "op-2" {
                        Json(json!({
                            "name": "operations/op-2",
                            "done": true,
                            "error": { "code": 3, "message": "image rejected by safety filter" }
                        }))
                    } else {
                        Json(json!({ "name": "operations/op-3" }))
                    }
                }),
            );
        let base = serve(app).await;

        let dir = tempfile::tempdir().unwrap();
        let image = image_fixture(&dir);
        let client = fast(VeoClient::new(Credentials::api_key("key"), "veo").unwrap())
            .with_base_urls(BaseUrls::single(&base));

        let err = client
            .generate_video(&image, "rejected", &VideoParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GenAiError::OperationFailed { code: 3, .. }));

        let err = client
            .generate_video(&image, "never finishes", &VideoParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GenAiError::Timeout(_)));

        let operation = super::Operation {
            name: "operations/op-3".to_string(),
            done: false,
            response: None,
            error: None,
        };
        assert!(matches!(
            client.download_video(&operation, &dir.path().join("x.mp4")).await,
            Err(GenAiError::OperationPending)
        ));
    }

    #[tokio::test]
    async fn test_stalled_request_times_out() {
        let app = Router::new().route(
            "/v1beta/models/{call}",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Json(json!({ "name": "operations/late" }))
            }),
        );
        let base = serve(app).await;

        let dir = tempfile::tempdir().unwrap();
        let image = image_fixture(&dir);
        let client = VeoClient::new(Credentials::api_key("key"), "veo")
            .unwrap()
            .with_http_client(crate::http_client(Duration::from_millis(200)).unwrap())
            .with_base_urls(BaseUrls::single(&base));

        let started = std::time::Instant::now();
        let err = client
            .generate_video(&image, "prompt", &VideoParams::default())
            .await
            .unwrap_err();

        assert!(matches!(err, GenAiError::Http(ref e) if e.is_timeout()), "{err:?}");
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
