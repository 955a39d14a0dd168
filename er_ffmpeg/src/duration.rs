use std::path::Path;
use std::time::Duration;

use regex::Regex;
use tokio::process::Command;

use crate::{process, FfmpegError, Result};

const DURATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Pulls the container duration out of the banner `ffmpeg -i` prints on
/// stderr, e.g. `  Duration: 00:00:08.04, start: 0.000000, bitrate: 2229 kb/s`.
///
/// # Returns
/// The duration in seconds, or `None` when the line is absent or `N/A`.
pub fn parse_duration_line(stderr: &str) -> Option<f64> {
    let re = match Regex::new(
        r"Duration:\s*(?<hours>\d+):(?<minutes>\d{1,2}):(?<seconds>\d+(\.\d+)?)",
    ) {
        Ok(re) => re,
        Err(e) => {
            tracing::error!("Failed to compile regex: {}", e);
            return None;
        }
    };

    let cap = re.captures(stderr)?;

    let hours = cap["hours"].parse::<f64>().ok()?;
    let minutes = cap["minutes"].parse::<f64>().ok()?;
    let seconds = cap["seconds"].parse::<f64>().ok()?;

    Some(hours.mul_add(3600.0, minutes * 60.0) + seconds)
}

/// Duration of `path` in seconds.
///
/// FFmpeg is tried first. If the binary is missing or its output has no
/// usable `Duration:` line, MP4/MOV files are read directly and the `mvhd`
/// atom is used instead.
///
/// # Errors
/// `InputNotFound` if the file does not exist, `DurationUnknown` if neither
/// strategy produced a value.
#[tracing::instrument]
pub async fn probe_duration(ffmpeg_path: &str, path: &Path) -> Result<f64> {
    process::ensure_input(path).await?;

    if let Some(duration) = probe_with_ffmpeg(ffmpeg_path, path).await {
        tracing::debug!("Duration resolved via FFmpeg: {:.3}s", duration);
        return Ok(duration);
    }

    if let Some(duration) = probe_mp4_atom(path).await {
        tracing::debug!("Duration resolved via MP4 atom parser: {:.3}s", duration);
        return Ok(duration);
    }

    Err(FfmpegError::DurationUnknown(path.to_path_buf()))
}

async fn probe_with_ffmpeg(ffmpeg_path: &str, path: &Path) -> Option<f64> {
    let mut command = Command::new(ffmpeg_path);
    command.arg("-i").arg(path).arg("-hide_banner");

    // `ffmpeg -i` without an output always exits non-zero
    let output = match process::output(command, DURATION_TIMEOUT).await {
        Ok(output) => output,
        Err(FfmpegError::NotFound { .. }) => {
            tracing::warn!("FFmpeg not available. Falling back to MP4 parser.");
            return None;
        }
        Err(e) => {
            tracing::warn!("FFmpeg duration probe failed: {}", e);
            return None;
        }
    };

    let stderr = String::from_utf8_lossy(&output.stderr);
    tracing::trace!("ffmpeg output: {}", stderr);

    parse_duration_line(&stderr)
}

async fn probe_mp4_atom(path: &Path) -> Option<f64> {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())?;
    if !matches!(extension.as_str(), "mp4" | "m4v" | "mov") {
        return None;
    }

    let data = match tokio::fs::read(path).await {
        Ok(data) => data,
        Err(e) => {
            tracing::debug!("Failed to read video file {}: {}", path.display(), e);
            return None;
        }
    };

    mp4::duration(&data)
}

/// Just enough ISO-BMFF walking to find the movie header.
pub mod mp4 {
    const HEADER_SIZE: usize = 8;
    const LARGE_HEADER_SIZE: usize = 16;

    pub fn duration(data: &[u8]) -> Option<f64> {
        find_atom(data, b"mvhd").and_then(parse_mvhd)
    }

    /// Returns the body of the first `target` atom, looking inside `moov`.
    pub fn find_atom<'a>(data: &'a [u8], target: &[u8; 4]) -> Option<&'a [u8]> {
        let mut offset = 0;

        while offset + HEADER_SIZE <= data.len() {
            let mut size = read_u32(data, offset)? as usize;
            let box_type = &data[offset + 4..offset + 8];
            let mut header_size = HEADER_SIZE;

            if size == 1 {
                size = usize::try_from(read_u64(data, offset + 8)?).ok()?;
                header_size = LARGE_HEADER_SIZE;
            } else if size == 0 {
                // atom runs to the end of the file
                size = data.len() - offset;
            }

            if size < header_size {
                return None;
            }
            let end = offset.checked_add(size).filter(|end| *end <= data.len())?;

            let body = &data[offset + header_size..end];

            if box_type == target {
                return Some(body);
            }

            if box_type == b"moov" {
                if let Some(nested) = find_atom(body, target) {
                    return Some(nested);
                }
            }

            offset = end;
        }

        None
    }

    /// Timescale and duration sit at different offsets for version 0
    /// (32-bit times) and version 1 (64-bit times).
    pub fn parse_mvhd(chunk: &[u8]) -> Option<f64> {
        let version = *chunk.first()?;

        let (timescale, duration) = if version == 1 {
            (u64::from(read_u32(chunk, 20)?), read_u64(chunk, 24)?)
        } else {
            (u64::from(read_u32(chunk, 12)?), u64::from(read_u32(chunk, 16)?))
        };

        if timescale == 0 {
            return None;
        }

        #[allow(clippy::cast_precision_loss)]
        Some(duration as f64 / timescale as f64)
    }

    fn read_u32(data: &[u8], at: usize) -> Option<u32> {
        let bytes = data.get(at..at + 4)?;
        Some(u32::from_be_bytes(bytes.try_into().ok()?))
    }

    fn read_u64(data: &[u8], at: usize) -> Option<u64> {
        let bytes = data.get(at..at + 8)?;
        Some(u64::from_be_bytes(bytes.try_into().ok()?))
    }
}
