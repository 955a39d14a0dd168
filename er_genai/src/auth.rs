use std::fmt::Debug;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redact::Secret;
use reqwest::RequestBuilder;
use tokio::process::Command;
use tokio::sync::Mutex;

use crate::{BaseUrls, GenAiError, Result};

/// Access tokens from `gcloud` are valid for an hour; refresh well before.
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(45 * 60);

#[async_trait]
pub trait TokenProvider: Send + Sync + Debug {
    async fn access_token(&self) -> Result<String>;
}

/// A token supplied up front, e.g. through `VERTEX_ACCESS_TOKEN`.
#[derive(Debug, Clone)]
pub struct StaticToken(Secret<String>);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Secret::new(token.into()))
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn access_token(&self) -> Result<String> {
        Ok(self.0.expose_secret().to_string())
    }
}

/// Shells out to `gcloud auth print-access-token` and caches the result.
#[derive(Debug)]
pub struct GcloudTokenProvider {
    program: String,
    lifetime: Duration,
    cached: Mutex<Option<(Secret<String>, Instant)>>,
}

impl Default for GcloudTokenProvider {
    fn default() -> Self {
        Self::new("gcloud")
    }
}

impl GcloudTokenProvider {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            lifetime: DEFAULT_TOKEN_LIFETIME,
            cached: Mutex::new(None),
        }
    }

    #[must_use]
    pub const fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    async fn fetch(&self) -> Result<String> {
        tracing::debug!("Refreshing access token via {}", self.program);

        let output = Command::new(&self.program)
            .args(["auth", "print-access-token"])
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| GenAiError::Auth(format!("failed to run {}: {e}", self.program)))?;

        if !output.status.success() {
            return Err(GenAiError::Auth(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if token.is_empty() {
            return Err(GenAiError::Auth(format!(
                "{} returned an empty token",
                self.program
            )));
        }

        Ok(token)
    }
}

#[async_trait]
impl TokenProvider for GcloudTokenProvider {
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;

        if let Some((token, fetched_at)) = cached.as_ref() {
            if fetched_at.elapsed() < self.lifetime {
                return Ok(token.expose_secret().to_string());
            }
        }

        let token = self.fetch().await?;
        *cached = Some((Secret::new(token.clone()), Instant::now()));

        Ok(token)
    }
}

/// How requests to Google are authorised.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// AI Studio
    ApiKey(Secret<String>),
    Vertex {
        project: String,
        location: String,
        tokens: Arc<dyn TokenProvider>,
    },
}

impl Credentials {
    pub fn api_key(key: impl Into<String>) -> Self {
        Self::ApiKey(Secret::new(key.into()))
    }

    pub fn vertex(
        project: impl Into<String>,
        location: impl Into<String>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        Self::Vertex {
            project: project.into(),
            location: location.into(),
            tokens,
        }
    }

    #[must_use]
    pub const fn is_vertex(&self) -> bool {
        matches!(self, Self::Vertex { .. })
    }

    /// Adds the API key header or a bearer token to `request`.
    ///
    /// # Errors
    /// Vertex mode fails if no access token can be obtained.
    pub async fn apply(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        match self {
            Self::ApiKey(key) => Ok(request.header("x-goog-api-key", key.expose_secret())),
            Self::Vertex { tokens, .. } => {
                let token = tokens.access_token().await?;
                Ok(request.bearer_auth(token))
            }
        }
    }

    /// URL of `model:method`, e.g. `veo-3.1-generate-preview:predictLongRunning`.
    pub fn model_url(&self, urls: &BaseUrls, model: &str, method: &str) -> String {
        match self {
            Self::ApiKey(_) => {
                format!("{}/v1beta/models/{model}:{method}", urls.studio)
            }
            Self::Vertex {
                project, location, ..
            } => {
                let base = urls
                    .vertex
                    .clone()
                    .unwrap_or_else(|| format!("https://{location}-aiplatform.googleapis.com"));
                format!(
                    "{base}/v1/projects/{project}/locations/{location}/publishers/google/models/{model}:{method}"
                )
            }
        }
    }
}
