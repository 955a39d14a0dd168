use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Command;
use types::{Resolution, TransitionType};

use crate::{duration, process, FfmpegError, Result};

/// Every clip is resampled to this rate so `xfade` sees matching inputs.
pub const OUTPUT_FRAME_RATE: u32 = 30;

/// Used when a clip's duration cannot be probed; Veo clips are 8 seconds.
pub const DEFAULT_CLIP_SECONDS: f64 = 8.0;

const COMPOSE_TIMEOUT: Duration = Duration::from_secs(300);

fn create_complex_filter(filter_steps: &[String]) -> String {
    filter_steps.join(";")
}

// Letterbox into the target frame without distorting the clip
fn scale_and_pad(resolution: Resolution) -> String {
    format!(
        "scale={width}:{height}:force_original_aspect_ratio=decrease,pad={width}:{height}:(ow-iw)/2:(oh-ih)/2,setsar=1",
        width = resolution.width,
        height = resolution.height
    )
}

fn prepare_input(index: usize, duration: f64, resolution: Resolution) -> String {
    // trimming to the measured duration keeps the xfade offsets honest
    format!(
        "[{index}:v]trim=duration={duration},{scale},fps={OUTPUT_FRAME_RATE}[v{index}]",
        scale = scale_and_pad(resolution)
    )
}

/// Start time of each transition, measured on the output timeline.
///
/// The first transition starts `transition_duration` before the end of the
/// first clip; every later one adds the previous clip minus the overlap.
pub fn transition_offsets(durations: &[f64], transition_duration: f64) -> Vec<f64> {
    let mut offsets = Vec::with_capacity(durations.len().saturating_sub(1));
    let mut accumulated_offset = 0.0;

    for i in 1..durations.len() {
        accumulated_offset += durations[i - 1] - transition_duration;
        offsets.push(accumulated_offset);
    }

    offsets
}

fn transition_chain(
    durations: &[f64],
    transition: TransitionType,
    transition_duration: f64,
) -> Vec<String> {
    let count = durations.len();
    let mut parts = Vec::new();
    let mut current_input = "v0".to_string();

    for (i, offset) in transition_offsets(durations, transition_duration)
        .into_iter()
        .enumerate()
        .map(|(i, offset)| (i + 1, offset))
    {
        let output_label = if i < count - 1 {
            format!("v{i}out")
        } else {
            "outv".to_string()
        };

        tracing::debug!(
            "Transition {}: offset={}s, duration={}s",
            i,
            offset,
            transition_duration
        );

        parts.push(format!(
            "[{current_input}][v{i}]xfade=transition={transition}:duration={transition_duration}:offset={offset}[{output_label}]"
        ));

        current_input = output_label;
    }

    parts
}

/// Filter graph that normalises every input and crossfades them in order.
pub fn build_transition_filter_graph(
    durations: &[f64],
    transition: TransitionType,
    transition_duration: f64,
    resolution: Resolution,
) -> String {
    let mut filter_steps: Vec<String> = durations
        .iter()
        .enumerate()
        .map(|(i, duration)| prepare_input(i, *duration, resolution))
        .collect();

    filter_steps.extend(transition_chain(
        durations,
        transition,
        transition_duration,
    ));

    create_complex_filter(&filter_steps)
}

/// Filter graph for a hard-cut concatenation of `count` inputs.
pub fn build_concat_filter_graph(count: usize, resolution: Resolution) -> String {
    let mut filter_steps: Vec<String> = (0..count)
        .map(|i| format!("[{i}:v]{scale}[v{i}]", scale = scale_and_pad(resolution)))
        .collect();

    let concat_inputs: String = (0..count).map(|i| format!("[v{i}]")).collect();
    filter_steps.push(format!("{concat_inputs}concat=n={count}:v=1:a=0[outv]"));

    create_complex_filter(&filter_steps)
}

/// Output length once each crossfade has overlapped two clips.
pub fn expected_total_duration(durations: &[f64], transition_duration: f64) -> f64 {
    let overlaps = durations.len().saturating_sub(1) as f64;
    durations.iter().sum::<f64>() - overlaps * transition_duration
}

// Builds the final ffmpeg command
pub fn build_compose_command(
    ffmpeg_path: &str,
    inputs: &[PathBuf],
    filter: &str,
    output_file: &Path,
) -> Command {
    // -y to overwrite output file
    let mut cmd = Command::new(ffmpeg_path);
    cmd.arg("-y");

    for input in inputs {
        cmd.arg("-i").arg(input);
    }

    cmd.arg("-filter_complex").arg(filter);
    cmd.arg("-map").arg("[outv]");
    cmd.arg("-c:v").arg("libx264");
    cmd.arg("-preset").arg("medium");
    cmd.arg("-crf").arg("23");
    cmd.arg("-pix_fmt").arg("yuv420p");
    cmd.arg(output_file);

    cmd
}

/// Stitches generated clips into the final video.
#[derive(Debug, Clone)]
pub struct VideoComposer {
    ffmpeg_path: String,
    timeout: Duration,
}

impl Default for VideoComposer {
    fn default() -> Self {
        Self::new(crate::DEFAULT_FFMPEG_PATH)
    }
}

impl VideoComposer {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            timeout: COMPOSE_TIMEOUT,
        }
    }

    /// Like [`VideoComposer::new`], but fails early when ffmpeg is missing.
    ///
    /// # Errors
    /// See [`crate::verify::verify`].
    pub async fn verified(ffmpeg_path: impl Into<String>) -> Result<Self> {
        let composer = Self::new(ffmpeg_path);
        crate::verify::verify(&composer.ffmpeg_path).await?;
        Ok(composer)
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn ffmpeg_path(&self) -> &str {
        &self.ffmpeg_path
    }

    /// Duration of a clip, or [`DEFAULT_CLIP_SECONDS`] if it cannot be read.
    pub async fn video_duration(&self, path: &Path) -> f64 {
        match duration::probe_duration(&self.ffmpeg_path, path).await {
            Ok(duration) => duration,
            Err(e) => {
                tracing::warn!(
                    "Error getting video duration for {}: {}; assuming {}s",
                    path.display(),
                    e,
                    DEFAULT_CLIP_SECONDS
                );
                DEFAULT_CLIP_SECONDS
            }
        }
    }

    /// Compose multiple videos with transition effects.
    ///
    /// # Arguments
    /// * `video_paths` - The clips, in playback order. At least two.
    /// * `output_path` - Where to write the composed video.
    /// * `transition` - The `xfade` transition between each pair of clips.
    /// * `transition_duration` - Overlap between clips, in seconds.
    /// * `resolution` - Output frame size; clips are letterboxed into it.
    ///
    /// # Errors
    /// Returns an error if fewer than two clips are given, a clip is missing,
    /// ffmpeg fails or times out, or the output is missing or empty.
    #[tracing::instrument(skip(self))]
    pub async fn compose_with_transitions(
        &self,
        video_paths: &[PathBuf],
        output_path: &Path,
        transition: TransitionType,
        transition_duration: f64,
        resolution: Resolution,
    ) -> Result<PathBuf> {
        if video_paths.len() < 2 {
            return Err(FfmpegError::InvalidInput(
                "Need at least 2 videos to compose".to_string(),
            ));
        }

        tracing::info!(
            "Composing {} videos with {} transitions",
            video_paths.len(),
            transition
        );

        let mut durations = Vec::with_capacity(video_paths.len());
        for video_path in video_paths {
            process::ensure_input(video_path).await?;
            let duration = self.video_duration(video_path).await;
            tracing::info!("Video {} duration: {}s", video_path.display(), duration);
            durations.push(duration);
        }

        process::ensure_parent_dir(output_path).await?;

        let filter = build_transition_filter_graph(
            &durations,
            transition,
            transition_duration,
            resolution,
        );
        tracing::info!(
            "Expected total video duration: {}s",
            expected_total_duration(&durations, transition_duration)
        );

        let command = build_compose_command(
            &self.ffmpeg_path,
            video_paths,
            &filter,
            output_path,
        );

        tracing::info!("Running FFmpeg composition...");
        process::run(command, self.timeout).await?;

        let file_size = process::verify_output(output_path).await?;
        let final_duration = self.video_duration(output_path).await;

        tracing::info!("Video composition completed: {}", output_path.display());
        tracing::info!("Final video duration: {}s", final_duration);
        tracing::info!("Output file size: {} bytes", file_size);

        Ok(output_path.to_path_buf())
    }

    /// Concatenate videos back to back, without transitions.
    ///
    /// # Errors
    /// Same conditions as [`VideoComposer::compose_with_transitions`].
    #[tracing::instrument(skip(self))]
    pub async fn simple_concatenate(
        &self,
        video_paths: &[PathBuf],
        output_path: &Path,
        resolution: Resolution,
    ) -> Result<PathBuf> {
        if video_paths.len() < 2 {
            return Err(FfmpegError::InvalidInput(
                "Need at least 2 videos to concatenate".to_string(),
            ));
        }

        tracing::info!(
            "Concatenating {} videos without transitions",
            video_paths.len()
        );

        for video_path in video_paths {
            process::ensure_input(video_path).await?;
        }

        process::ensure_parent_dir(output_path).await?;

        let filter = build_concat_filter_graph(video_paths.len(), resolution);
        let command = build_compose_command(
            &self.ffmpeg_path,
            video_paths,
            &filter,
            output_path,
        );

        tracing::info!("Running FFmpeg concatenation...");
        process::run(command, self.timeout).await?;

        let file_size = process::verify_output(output_path).await?;
        tracing::info!("Video concatenation completed: {}", output_path.display());
        tracing::info!("Output file size: {} bytes", file_size);

        Ok(output_path.to_path_buf())
    }
}
