//! Turns three property photos into a single promotional video.
//!
//! Each photo becomes a short Veo clip; the clips are then joined with
//! crossfades by FFmpeg. [`jobs`] runs the same pipeline in the background
//! for the web UI.

use std::path::PathBuf;

pub mod jobs;
pub mod pipeline;
pub mod storage;

pub use pipeline::{
    ClipComposer, ClipGenerator, DemoClipGenerator, PropertyVideoGenerator,
};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(
        "Exactly {expected} images are required (exterior, interior, common areas), got {actual}"
    )]
    WrongImageCount { expected: usize, actual: usize },

    #[error("Number of prompts ({prompts}) must match number of images ({images})")]
    PromptCountMismatch { prompts: usize, images: usize },

    #[error("Image not found: {}", .0.display())]
    ImageNotFound(PathBuf),

    #[error("Unsupported clip duration {0}s, expected one of 4, 6 or 8")]
    UnsupportedClipDuration(u32),

    #[error(transparent)]
    InvalidOptions(#[from] types::OptionsError),

    #[error(
        "Demo video not found at: {}. Please place your demo video at this location.",
        .0.display()
    )]
    DemoVideoMissing(PathBuf),

    #[error("Generation timed out after {0} seconds")]
    TimedOut(u64),

    #[error(transparent)]
    GenAi(#[from] er_genai::GenAiError),

    #[error(transparent)]
    Ffmpeg(#[from] er_ffmpeg::FfmpegError),

    #[error(transparent)]
    Storage(#[from] storage::StorageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
