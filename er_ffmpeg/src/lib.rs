//! Thin wrappers around the `ffmpeg` command line tool.
//!
//! Everything here builds a [`tokio::process::Command`] and runs it; no media
//! is decoded in-process.

use std::path::PathBuf;
use std::time::Duration;

pub mod compose;
pub mod duration;
pub mod frames;
mod process;
pub mod splice;
pub mod verify;

pub use compose::VideoComposer;

pub const DEFAULT_FFMPEG_PATH: &str = "ffmpeg";

#[derive(Debug, thiserror::Error)]
pub enum FfmpegError {
    #[error(
        "{program} not found. Please install FFmpeg and ensure it's in your PATH (https://ffmpeg.org/download.html)"
    )]
    NotFound { program: String },

    #[error("failed to spawn ffmpeg: {0}")]
    Spawn(std::io::Error),

    #[error("ffmpeg exited with status {status:?}: {stderr}")]
    Failed { status: Option<i32>, stderr: String },

    #[error("ffmpeg timed out after {} seconds", .0.as_secs())]
    Timeout(Duration),

    #[error("input file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("{0}")]
    InvalidInput(String),

    #[error("ffmpeg completed but output file not found: {}", .0.display())]
    MissingOutput(PathBuf),

    #[error("ffmpeg created empty output file: {}", .0.display())]
    EmptyOutput(PathBuf),

    #[error("could not determine video duration for {}", .0.display())]
    DurationUnknown(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FfmpegError>;
