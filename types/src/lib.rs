use std::fmt;
use std::path::{Component, Path};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Number of property photos a generation run expects: exterior, interior
/// and common areas, in that order.
pub const REQUIRED_IMAGE_COUNT: usize = 3;

pub const DEFAULT_OUTPUT_NAME: &str = "final_property_video.mp4";

/// Prompts used when the caller does not supply any, one per expected image.
pub const DEFAULT_PROMPTS: [&str; REQUIRED_IMAGE_COUNT] = [
    // exterior
    "Netflix production-style promotion video, luxurious modern apartment building exterior, \
     cinematic camera moving towards the entrance, elegant facade with natural lighting, \
     cool cinematic movement revealing architectural grandeur, no additional images",
    // interior
    "Netflix production-style promotion video, spacious luxury apartment interior, \
     cinematic camera moving towards the living space, elegant modern furnishings, \
     natural light streaming through windows, cool sophisticated movement, no additional images",
    // common areas
    "Netflix production-style promotion video, exclusive luxury building common areas, \
     cinematic camera moving towards the elegant lobby entrance, premium architectural design, \
     marble flooring with sophisticated lighting, cool cinematic movement, no additional images",
];

/// MIME type for an image, judged by extension. Unknown extensions are
/// treated as PNG since that is what frame extraction writes.
pub fn image_mime_type(path: &Path) -> &'static str {
    match path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/png",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unknown transition type: {0}")]
    UnknownTransition(String),

    #[error("invalid resolution {0:?}, expected WIDTHxHEIGHT")]
    InvalidResolution(String),
}

/// Generation options that cannot produce a video.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OptionsError {
    #[error("invalid output name {0:?}, expected a plain file name ending in .mp4")]
    InvalidOutputName(String),

    #[error(
        "transition duration {transition}s must be at least 0 and shorter than the {clip}s clips"
    )]
    InvalidTransitionDuration { transition: f64, clip: u32 },
}

/// True for a bare `name.mp4`: no directories, no `..`, not absolute.
pub fn is_plain_mp4_name(name: &str) -> bool {
    let path = Path::new(name);
    let mut components = path.components();

    let single_component = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(part)), None) if part == path.as_os_str()
    );

    single_component
        && !name.contains(['/', '\\'])
        && path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("mp4"))
}

/// The `xfade` transitions offered to users.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TransitionType {
    #[default]
    Fade,
    WipeLeft,
    WipeRight,
    WipeUp,
    WipeDown,
    SlideLeft,
    SlideRight,
}

impl TransitionType {
    pub const ALL: [Self; 7] = [
        Self::Fade,
        Self::WipeLeft,
        Self::WipeRight,
        Self::WipeUp,
        Self::WipeDown,
        Self::SlideLeft,
        Self::SlideRight,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fade => "fade",
            Self::WipeLeft => "wipeleft",
            Self::WipeRight => "wiperight",
            Self::WipeUp => "wipeup",
            Self::WipeDown => "wipedown",
            Self::SlideLeft => "slideleft",
            Self::SlideRight => "slideright",
        }
    }
}

impl fmt::Display for TransitionType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransitionType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseError::UnknownTransition(s.to_string()))
    }
}

/// Output frame size, written as `1280x720`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::new(1280, 720)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidResolution(s.to_string());

        let (width, height) = s.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
        let width: u32 = width.parse().map_err(|_| invalid())?;
        let height: u32 = height.parse().map_err(|_| invalid())?;

        if width == 0 || height == 0 {
            return Err(invalid());
        }

        Ok(Self { width, height })
    }
}

impl TryFrom<String> for Resolution {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Resolution> for String {
    fn from(value: Resolution) -> Self {
        value.to_string()
    }
}

const fn default_clip_duration() -> u32 {
    8
}

const fn default_transition_duration() -> f64 {
    0.5
}

fn default_output_name() -> String {
    DEFAULT_OUTPUT_NAME.to_string()
}

/// Knobs for a single generation run. Every field has a default so that a
/// partial JSON body from the web form is accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    #[serde(default = "default_clip_duration")]
    pub clip_duration: u32,

    #[serde(default)]
    pub transition_type: TransitionType,

    #[serde(default = "default_transition_duration")]
    pub transition_duration: f64,

    #[serde(default)]
    pub resolution: Resolution,

    #[serde(default = "default_output_name")]
    pub output_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompts: Option<Vec<String>>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            clip_duration: default_clip_duration(),
            transition_type: TransitionType::default(),
            transition_duration: default_transition_duration(),
            resolution: Resolution::default(),
            output_name: default_output_name(),
            prompts: None,
        }
    }
}

impl GenerationOptions {
    /// Checks what can be checked before any clip is generated. The clip
    /// length itself depends on the video model and is checked by the
    /// pipeline.
    ///
    /// # Errors
    /// `InvalidOutputName` unless `output_name` is a plain `.mp4` file name,
    /// `InvalidTransitionDuration` unless the transition fits inside a clip.
    pub fn validate(&self) -> Result<(), OptionsError> {
        if !is_plain_mp4_name(&self.output_name) {
            return Err(OptionsError::InvalidOutputName(self.output_name.clone()));
        }

        let transition = self.transition_duration;
        if !transition.is_finite()
            || transition < 0.0
            || transition >= f64::from(self.clip_duration)
        {
            return Err(OptionsError::InvalidTransitionDuration {
                transition,
                clip: self.clip_duration,
            });
        }

        Ok(())
    }

    /// Length of the final cut once the crossfades have eaten into each clip.
    #[must_use]
    pub fn expected_total_duration(&self, clip_count: usize) -> f64 {
        if clip_count == 0 {
            return 0.0;
        }
        let n = clip_count as f64;
        n * f64::from(self.clip_duration) - (n - 1.0) * self.transition_duration
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStage {
    Queued,
    Starting,
    GeneratingClips,
    Composing,
    Uploading,
    Complete,
    Error,
}

impl JobStage {
    #[must_use]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProgress {
    pub stage: JobStage,
    pub progress: u8,
    pub message: String,
}

impl JobProgress {
    pub fn new(stage: JobStage, progress: u8, message: impl Into<String>) -> Self {
        Self {
            stage,
            progress: progress.min(100),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    pub final_video: String,
    pub session_id: String,
    pub session_dir: String,
    pub clips_generated: usize,
    pub api_calls_used: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameInfo {
    pub frame_id: usize,
    pub path: String,
    /// `M:SS`
    pub timestamp: String,
    pub seconds: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_url: Option<String>,
}
