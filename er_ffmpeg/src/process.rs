use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::process::Command;

use crate::{FfmpegError, Result};

/// Spawn `command`, capture its output and wait at most `limit` for it.
///
/// The child is killed if the limit is hit.
pub async fn run(command: Command, limit: Duration) -> Result<Output> {
    let output = output(command, limit).await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        tracing::error!(
            "ffmpeg failed with status: {}",
            output.status.code().unwrap_or(-1)
        );
        tracing::debug!("ffmpeg stderr: {}", stderr);
        return Err(FfmpegError::Failed {
            status: output.status.code(),
            stderr,
        });
    }

    Ok(output)
}

/// Like [`run`], but a non-zero exit status is not an error.
pub async fn output(mut command: Command, limit: Duration) -> Result<Output> {
    tracing::debug!("running {:?}", command.as_std());

    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = command.spawn().map_err(|e| spawn_error(&command, e))?;

    let output = tokio::time::timeout(limit, child.wait_with_output())
        .await
        .map_err(|_| {
            tracing::error!("ffmpeg timed out after {}s", limit.as_secs());
            FfmpegError::Timeout(limit)
        })??;

    Ok(output)
}

pub fn spawn_error(command: &Command, e: std::io::Error) -> FfmpegError {
    if e.kind() == std::io::ErrorKind::NotFound {
        FfmpegError::NotFound {
            program: command.as_std().get_program().to_string_lossy().to_string(),
        }
    } else {
        tracing::error!("Failed to spawn ffmpeg: {}", e);
        FfmpegError::Spawn(e)
    }
}

pub async fn ensure_input(path: &Path) -> Result<()> {
    if tokio::fs::try_exists(path).await? {
        Ok(())
    } else {
        Err(FfmpegError::InputNotFound(path.to_path_buf()))
    }
}

pub async fn ensure_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            tokio::fs::create_dir_all(dir).await?;
        }
        _ => {}
    }
    Ok(())
}

/// Checks that ffmpeg actually produced something and returns its size.
pub async fn verify_output(path: &Path) -> Result<u64> {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(FfmpegError::MissingOutput(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    if metadata.len() == 0 {
        return Err(FfmpegError::EmptyOutput(path.to_path_buf()));
    }

    Ok(metadata.len())
}
