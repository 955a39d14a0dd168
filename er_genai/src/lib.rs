//! Clients for the Google generative media APIs used to build property
//! videos: Veo image-to-video and Gemini image editing.
//!
//! Both AI Studio (API key) and Vertex AI (OAuth bearer token) are supported
//! through [`auth::Credentials`].

use std::time::Duration;

pub mod auth;
mod error;
pub mod image_edit;
pub mod veo;

pub use auth::{Credentials, GcloudTokenProvider, StaticToken, TokenProvider};
pub use error::{GenAiError, Result, QUOTA_EXCEEDED_HELP};
pub use image_edit::{GeminiImageEditor, ImageEditor, PassthroughEditor};
pub use veo::{VeoClient, VideoParams, VideoSource};

pub const STUDIO_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const STORAGE_BASE_URL: &str = "https://storage.googleapis.com";

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds the HTTP client the API clients share. `timeout` bounds a whole
/// request, body included.
///
/// # Errors
/// If the TLS backend cannot be initialised.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .user_agent(concat!("estate-reel/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(CONNECT_TIMEOUT.min(timeout))
        .timeout(timeout)
        .build()?)
}

/// Where requests are sent. Only tests point these anywhere else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrls {
    pub studio: String,
    /// Defaults to `https://{location}-aiplatform.googleapis.com`.
    pub vertex: Option<String>,
    pub storage: String,
}

impl Default for BaseUrls {
    fn default() -> Self {
        Self {
            studio: STUDIO_BASE_URL.to_string(),
            vertex: None,
            storage: STORAGE_BASE_URL.to_string(),
        }
    }
}

impl BaseUrls {
    /// Every endpoint served from one origin.
    pub fn single(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            studio: base.clone(),
            vertex: Some(base.clone()),
            storage: base,
        }
    }
}
