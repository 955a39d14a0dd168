use std::path::PathBuf;

use reqwest::StatusCode;

/// Shown to users when the API refuses work because of usage limits.
pub const QUOTA_EXCEEDED_HELP: &str = "API quota exceeded.\n\n\
    The Google AI API usage limit has been reached.\n\n\
    What to do:\n\
    1. Check usage in Google AI Studio (https://ai.dev/usage)\n\
    2. Check your plan and billing details\n\
    3. Rate limit details: https://ai.google.dev/gemini-api/docs/rate-limits\n\
    4. Wait a while and try again (quotas usually reset hourly or daily)\n";

#[derive(Debug, thiserror::Error)]
pub enum GenAiError {
    #[error("Image file not found: {}", .0.display())]
    ImageNotFound(PathBuf),

    #[error("{}", QUOTA_EXCEEDED_HELP)]
    QuotaExceeded { detail: String },

    #[error("API request failed with status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Video generation failed: (code {code}) {message}")]
    OperationFailed { code: i64, message: String },

    #[error("Video generation timed out after {0} seconds")]
    Timeout(u64),

    #[error("Operation is not complete yet")]
    OperationPending,

    #[error("No video file found in operation response")]
    NoVideoInResponse,

    #[error("No image found in model response")]
    NoImageInResponse,

    #[error("failed to obtain access token: {0}")]
    Auth(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Base64(#[from] base64::DecodeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GenAiError>;

const RESOURCE_EXHAUSTED_CODE: i64 = 8;

fn mentions_quota(text: &str) -> bool {
    text.contains("RESOURCE_EXHAUSTED") || text.to_lowercase().contains("quota")
}

impl GenAiError {
    /// Turns an unsuccessful HTTP response into an error, singling out
    /// rate limiting and quota exhaustion.
    pub fn from_response(status: StatusCode, body: String) -> Self {
        if status == StatusCode::TOO_MANY_REQUESTS || mentions_quota(&body) {
            tracing::error!("API quota exceeded: {}", body);
            return Self::QuotaExceeded { detail: body };
        }

        tracing::error!("API request failed with status {}: {}", status, body);
        Self::Api {
            status: status.as_u16(),
            body,
        }
    }

    /// Errors reported inside a finished long-running operation.
    pub fn from_operation(code: i64, message: String) -> Self {
        if code == RESOURCE_EXHAUSTED_CODE || mentions_quota(&message) {
            tracing::error!("API quota exceeded: {}", message);
            return Self::QuotaExceeded { detail: message };
        }

        Self::OperationFailed { code, message }
    }

    #[must_use]
    pub const fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::QuotaExceeded { .. })
    }
}
