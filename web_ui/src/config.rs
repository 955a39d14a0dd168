use std::path::PathBuf;
use std::sync::Arc;

use er_genai::{Credentials, GcloudTokenProvider, StaticToken, TokenProvider};
use property_video::storage::StorageConfig;
use redact::Secret;
use serde::Deserialize;

fn default_location() -> String {
    "us-central1".to_string()
}

fn default_veo_model() -> String {
    er_genai::veo::DEFAULT_VEO_MODEL.to_string()
}

fn default_image_model() -> String {
    er_genai::image_edit::DEFAULT_IMAGE_MODEL.to_string()
}

fn default_ffmpeg_path() -> String {
    er_ffmpeg::DEFAULT_FFMPEG_PATH.to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_bind_address() -> String {
    "127.0.0.1:5001".to_string()
}

const fn default_max_upload_bytes() -> usize {
    16 * 1024 * 1024
}

const fn default_max_concurrent_jobs() -> usize {
    1
}

const fn default_job_soft_time_limit_seconds() -> u64 {
    30 * 60
}

const fn default_job_retention_seconds() -> u64 {
    24 * 60 * 60
}

const fn default_session_ttl_seconds() -> u64 {
    24 * 60 * 60
}

/// Read from the environment (and `.env`) at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub google_api_key: Option<Secret<String>>,
    #[serde(default)]
    pub use_vertex_ai: bool,
    #[serde(default)]
    pub google_cloud_project: Option<String>,
    #[serde(default = "default_location")]
    pub google_cloud_location: String,
    /// Skips `gcloud auth print-access-token` when set.
    #[serde(default)]
    pub vertex_access_token: Option<Secret<String>>,

    #[serde(default = "default_veo_model")]
    pub veo_model: String,
    #[serde(default = "default_image_model")]
    pub image_model: String,
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
    #[serde(default = "default_job_soft_time_limit_seconds")]
    pub job_soft_time_limit_seconds: u64,
    /// How long a finished job stays visible to `/status`.
    #[serde(default = "default_job_retention_seconds")]
    pub job_retention_seconds: u64,
    /// Idle time after which a session and its state are forgotten.
    #[serde(default = "default_session_ttl_seconds")]
    pub session_ttl_seconds: u64,

    /// Pre-rendered clip used instead of Veo when no credentials are set.
    #[serde(default)]
    pub demo_video_path: Option<PathBuf>,

    #[serde(flatten)]
    pub storage: StorageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            google_api_key: None,
            use_vertex_ai: false,
            google_cloud_project: None,
            google_cloud_location: default_location(),
            vertex_access_token: None,
            veo_model: default_veo_model(),
            image_model: default_image_model(),
            ffmpeg_path: default_ffmpeg_path(),
            output_dir: default_output_dir(),
            upload_dir: default_upload_dir(),
            bind_address: default_bind_address(),
            max_upload_bytes: default_max_upload_bytes(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            job_soft_time_limit_seconds: default_job_soft_time_limit_seconds(),
            job_retention_seconds: default_job_retention_seconds(),
            session_ttl_seconds: default_session_ttl_seconds(),
            demo_video_path: None,
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Vertex AI when enabled and a project is set, otherwise the AI Studio
    /// key. `None` means demo mode.
    pub fn credentials(&self) -> Option<Credentials> {
        if self.use_vertex_ai {
            let Some(project) = self.google_cloud_project.as_deref() else {
                tracing::warn!("USE_VERTEX_AI is set but GOOGLE_CLOUD_PROJECT is missing");
                return None;
            };

            let tokens: Arc<dyn TokenProvider> = match &self.vertex_access_token {
                Some(token) => Arc::new(StaticToken::new(token.expose_secret().clone())),
                None => Arc::new(GcloudTokenProvider::new("gcloud")),
            };
            return Some(Credentials::vertex(
                project,
                &self.google_cloud_location,
                tokens,
            ));
        }

        self.google_api_key
            .as_ref()
            .map(Secret::expose_secret)
            .filter(|key| !key.is_empty())
            .map(Credentials::api_key)
    }
}
