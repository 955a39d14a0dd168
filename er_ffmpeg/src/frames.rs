use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::Engine;
use tokio::process::Command;
use types::FrameInfo;

use crate::{duration, process, FfmpegError, Result};

pub const DEFAULT_FRAME_COUNT: usize = 6;
pub const MAX_FRAME_COUNT: usize = 30;

const EXTRACT_TIMEOUT: Duration = Duration::from_secs(30);

/// Evenly spaced timestamps that skip the very first and last frame.
pub fn frame_timestamps(duration: f64, count: usize) -> Vec<f64> {
    let interval = duration / (count + 1) as f64;
    (0..count).map(|i| interval * (i + 1) as f64).collect()
}

/// Formats as `M:SS`, truncating fractional seconds.
pub fn format_timestamp(seconds: f64) -> String {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let total = seconds.max(0.0) as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

pub fn to_data_url(bytes: &[u8], mime: &str) -> String {
    format!(
        "data:{mime};base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

pub fn frame_file_name(frame_id: usize) -> String {
    format!("frame_{frame_id:03}.png")
}

pub fn build_extract_command(
    ffmpeg_path: &str,
    video: &Path,
    at_seconds: f64,
    output_file: &Path,
) -> Command {
    let mut cmd = Command::new(ffmpeg_path);
    // seeking before -i is fast and accurate enough for stills
    cmd.arg("-ss").arg(at_seconds.to_string());
    cmd.arg("-i").arg(video);
    cmd.arg("-vframes").arg("1");
    cmd.arg("-q:v").arg("2");
    cmd.arg("-y");
    cmd.arg(output_file);

    cmd
}

/// Grab `count` stills spread across the video.
///
/// # Errors
/// Fails if the video is missing, its duration cannot be determined (or is
/// zero), or any single extraction fails.
#[tracing::instrument]
pub async fn extract_frames(
    ffmpeg_path: &str,
    video: &Path,
    out_dir: &Path,
    count: usize,
) -> Result<Vec<FrameInfo>> {
    if !(1..=MAX_FRAME_COUNT).contains(&count) {
        return Err(FfmpegError::InvalidInput(format!(
            "frame count must be between 1 and {MAX_FRAME_COUNT}, got {count}"
        )));
    }

    let duration = duration::probe_duration(ffmpeg_path, video).await?;
    if duration <= 0.0 {
        return Err(FfmpegError::DurationUnknown(video.to_path_buf()));
    }

    tokio::fs::create_dir_all(out_dir).await?;

    let mut frames = Vec::with_capacity(count);
    for (frame_id, seconds) in frame_timestamps(duration, count).into_iter().enumerate() {
        let output_file: PathBuf = out_dir.join(frame_file_name(frame_id));

        let command = build_extract_command(ffmpeg_path, video, seconds, &output_file);
        process::run(command, EXTRACT_TIMEOUT).await?;
        process::verify_output(&output_file).await?;

        let bytes = tokio::fs::read(&output_file).await?;

        tracing::debug!("Extracted frame {} at {:.2}s", frame_id, seconds);

        frames.push(FrameInfo {
            frame_id,
            path: output_file.to_string_lossy().to_string(),
            timestamp: format_timestamp(seconds),
            seconds,
            data_url: Some(to_data_url(&bytes, "image/png")),
        });
    }

    tracing::info!("Extracted {} frames from {}", frames.len(), video.display());

    Ok(frames)
}
