use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde_json::{json, Value};

use crate::{BaseUrls, Credentials, GenAiError, Result};

pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// 1x1 transparent PNG returned when there is nothing better to show.
pub const PLACEHOLDER_PNG: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg==";

#[async_trait]
pub trait ImageEditor: Send + Sync {
    /// Produce `count` edited versions of `base_image`, as data URLs.
    async fn generate_variations(
        &self,
        base_image: &Path,
        prompt: &str,
        count: usize,
    ) -> Result<Vec<String>>;
}

fn data_url(mime: &str, encoded: &str) -> String {
    format!("data:{mime};base64,{encoded}")
}

/// Hands back the original frame. Used when no image model is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughEditor;

#[async_trait]
impl ImageEditor for PassthroughEditor {
    async fn generate_variations(
        &self,
        base_image: &Path,
        prompt: &str,
        count: usize,
    ) -> Result<Vec<String>> {
        tracing::info!("Generating {} frame variations with prompt: {}", count, prompt);

        let variation = match tokio::fs::read(base_image).await {
            Ok(bytes) => data_url(
                types::image_mime_type(base_image),
                &base64::engine::general_purpose::STANDARD.encode(bytes),
            ),
            Err(e) => {
                tracing::error!("Error reading {}: {}", base_image.display(), e);
                PLACEHOLDER_PNG.to_string()
            }
        };

        Ok(vec![variation; count])
    }
}

/// Edits frames with a Gemini image model through `generateContent`.
#[derive(Debug, Clone)]
pub struct GeminiImageEditor {
    http: reqwest::Client,
    credentials: Credentials,
    model: String,
    urls: BaseUrls,
}

impl GeminiImageEditor {
    /// # Errors
    /// If the HTTP client cannot be built.
    pub fn new(credentials: Credentials, model: impl Into<String>) -> Result<Self> {
        Ok(Self {
            http: crate::http_client(REQUEST_TIMEOUT)?,
            credentials,
            model: model.into(),
            urls: BaseUrls::default(),
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

    async fn edit_once(&self, mime: &str, encoded: &str, prompt: &str) -> Result<String> {
        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "text": prompt },
                    { "inline_data": { "mime_type": mime, "data": encoded } }
                ]
            }],
            "generationConfig": { "responseModalities": ["TEXT", "IMAGE"] }
        });

        let url = self
            .credentials
            .model_url(&self.urls, &self.model, "generateContent");
        let request = self.credentials.apply(self.http.post(url).json(&body)).await?;
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenAiError::from_response(status, body));
        }

        let response: Value = response.json().await?;
        first_inline_image(&response).ok_or(GenAiError::NoImageInResponse)
    }
}

/// The first image part of a `generateContent` response, as a data URL.
pub fn first_inline_image(response: &Value) -> Option<String> {
    response
        .pointer("/candidates/0/content/parts")?
        .as_array()?
        .iter()
        .find_map(|part| {
            let inline = part.get("inlineData").or_else(|| part.get("inline_data"))?;
            let data = inline.get("data")?.as_str()?;
            let mime = inline
                .get("mimeType")
                .or_else(|| inline.get("mime_type"))
                .and_then(Value::as_str)
                .unwrap_or("image/png");
            Some(data_url(mime, data))
        })
}

#[async_trait]
impl ImageEditor for GeminiImageEditor {
    #[tracing::instrument(skip(self))]
    async fn generate_variations(
        &self,
        base_image: &Path,
        prompt: &str,
        count: usize,
    ) -> Result<Vec<String>> {
        if !tokio::fs::try_exists(base_image).await? {
            return Err(GenAiError::ImageNotFound(base_image.to_path_buf()));
        }

        let bytes = tokio::fs::read(base_image).await?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        let mime = types::image_mime_type(base_image);
        let instruction = format!(
            "Edit this frame from a property promotion video: {prompt}. \
             Keep the composition, camera angle and aspect ratio unchanged."
        );

        let mut variations = Vec::with_capacity(count);
        for n in 0..count {
            tracing::info!("Requesting variation {} of {}", n + 1, count);
            variations.push(self.edit_once(mime, &encoded, &instruction).await?);
        }

        tracing::info!("Generated {} variations", variations.len());
        Ok(variations)
    }
}
