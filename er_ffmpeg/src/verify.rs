use std::time::Duration;

use tokio::process::Command;

use crate::{process, Result};

const VERIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Make sure the ffmpeg binary is installed and runnable.
///
/// # Returns
/// The first line of `ffmpeg -version`, e.g. `ffmpeg version 6.1.1`.
///
/// # Errors
/// `FfmpegError::NotFound` if the binary is missing, `FfmpegError::Failed`
/// if it exits with an error.
pub async fn verify(ffmpeg_path: &str) -> Result<String> {
    let mut command = Command::new(ffmpeg_path);
    command.arg("-version");

    let output = process::run(command, VERIFY_TIMEOUT).await?;

    let version = String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .unwrap_or_default()
        .to_string();

    tracing::info!("FFmpeg found: {}", version);

    Ok(version)
}
