use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Command;

use crate::{process, FfmpegError, Result};

/// How long an edited still stays on screen when no hold is given.
pub const DEFAULT_HOLD_SECONDS: f64 = 1.0;

const SPLICE_TIMEOUT: Duration = Duration::from_secs(300);

/// Scales the still to the video's frame size and shows it over the video
/// between `at_seconds` and `at_seconds + hold_seconds`.
pub fn build_splice_filter(at_seconds: f64, hold_seconds: f64) -> String {
    let start = at_seconds;
    let end = at_seconds + hold_seconds;

    [
        "[1:v][0:v]scale2ref[img][base]".to_string(),
        format!("[base][img]overlay=shortest=1:enable='between(t,{start},{end})'[outv]"),
    ]
    .join(";")
}

pub fn build_splice_command(
    ffmpeg_path: &str,
    video: &Path,
    image: &Path,
    filter: &str,
    output_file: &Path,
) -> Command {
    let mut cmd = Command::new(ffmpeg_path);
    cmd.arg("-y");
    cmd.arg("-i").arg(video);
    // the still becomes an endless stream; -shortest ends at the video
    cmd.arg("-loop").arg("1");
    cmd.arg("-i").arg(image);
    cmd.arg("-filter_complex").arg(filter);
    cmd.arg("-map").arg("[outv]");
    cmd.arg("-map").arg("0:a?");
    cmd.arg("-c:v").arg("libx264");
    cmd.arg("-preset").arg("medium");
    cmd.arg("-crf").arg("23");
    cmd.arg("-pix_fmt").arg("yuv420p");
    cmd.arg("-c:a").arg("copy");
    cmd.arg("-shortest");
    cmd.arg(output_file);

    cmd
}

/// Put an edited frame back into the video.
///
/// # Errors
/// `InvalidInput` for a negative time or a non-positive hold,
/// `InputNotFound` if either input is missing, plus any ffmpeg failure.
#[tracing::instrument]
pub async fn splice_frame(
    ffmpeg_path: &str,
    video: &Path,
    image: &Path,
    at_seconds: f64,
    hold_seconds: f64,
    output: &Path,
) -> Result<PathBuf> {
    if !at_seconds.is_finite() || at_seconds < 0.0 {
        return Err(FfmpegError::InvalidInput(format!(
            "splice time must be a non-negative number of seconds, got {at_seconds}"
        )));
    }
    if !hold_seconds.is_finite() || hold_seconds <= 0.0 {
        return Err(FfmpegError::InvalidInput(format!(
            "hold duration must be positive, got {hold_seconds}"
        )));
    }

    process::ensure_input(video).await?;
    process::ensure_input(image).await?;
    process::ensure_parent_dir(output).await?;

    let filter = build_splice_filter(at_seconds, hold_seconds);
    let command = build_splice_command(ffmpeg_path, video, image, &filter, output);

    tracing::info!(
        "Splicing {} into {} at {}s for {}s",
        image.display(),
        video.display(),
        at_seconds,
        hold_seconds
    );
    process::run(command, SPLICE_TIMEOUT).await?;

    let file_size = process::verify_output(output).await?;
    tracing::info!("Spliced video written to {} ({} bytes)", output.display(), file_size);

    Ok(output.to_path_buf())
}

#[cfg(test)]
mod test {
    use std::path::Path;

    use pretty_assertions::assert_eq;

    use super::{build_splice_command, build_splice_filter, splice_frame};
    use crate::FfmpegError;

    #[test]
    fn test_splice_filter() {
        assert_eq!(
            build_splice_filter(3.5, 1.0),
            "[1:v][0:v]scale2ref[img][base];[base][img]overlay=shortest=1:enable='between(t,3.5,4.5)'[outv]"
        );
    }

    #[test]
    fn test_splice_command_keeps_audio() {
        let cmd = build_splice_command(
            "/usr/bin/ffmpeg",
            Path::new("final.mp4"),
            Path::new("frames/variations/frame_002_var_1.png"),
            "FILTER",
            Path::new("edited_property_video.mp4"),
        );

        let args = cmd
            .as_std()
            .get_args()
            .map(|x| x.to_string_lossy().to_string())
            .collect::<Vec<_>>()
            .join(" ");

        assert_eq!(cmd.as_std().get_program(), "/usr/bin/ffmpeg");
        assert_eq!(
            args,
            "-y -i final.mp4 -loop 1 -i frames/variations/frame_002_var_1.png -filter_complex FILTER -map [outv] -map 0:a? -c:v libx264 -preset medium -crf 23 -pix_fmt yuv420p -c:a copy -shortest edited_property_video.mp4"
        );
    }

    #[tokio::test]
    async fn test_splice_rejects_bad_times() {
        let video = Path::new("final.mp4");
        let image = Path::new("still.png");
        let out = Path::new("edited.mp4");

        let err = splice_frame("ffmpeg", video, image, -1.0, 1.0, out)
            .await
            .unwrap_err();
        assert!(matches!(err, FfmpegError::InvalidInput(_)));

        let err = splice_frame("ffmpeg", video, image, 2.0, 0.0, out)
            .await
            .unwrap_err();
        assert!(matches!(err, FfmpegError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_splice_requires_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("final.mp4");
        std::fs::write(&video, b"video").unwrap();

        let err = splice_frame(
            "ffmpeg",
            &video,
            &dir.path().join("missing.png"),
            1.0,
            1.0,
            &dir.path().join("out.mp4"),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, FfmpegError::InputNotFound(p) if p.ends_with("missing.png")));
    }
}
