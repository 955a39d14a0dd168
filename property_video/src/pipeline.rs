use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use er_ffmpeg::VideoComposer;
use er_genai::veo::SUPPORTED_DURATIONS;
use er_genai::{VeoClient, VideoParams};
use indicatif::{ProgressBar, ProgressStyle};
use types::{GenerationOptions, Resolution, TransitionType, DEFAULT_PROMPTS, REQUIRED_IMAGE_COUNT};

use crate::{PipelineError, Result};

/// Turns one still image into a video clip.
#[async_trait]
pub trait ClipGenerator: Send + Sync {
    async fn generate_clip(
        &self,
        image: &Path,
        prompt: &str,
        clip_duration: u32,
        output: &Path,
    ) -> Result<PathBuf>;
}

/// Joins clips into the final video.
#[async_trait]
pub trait ClipComposer: Send + Sync {
    async fn compose(
        &self,
        clips: &[PathBuf],
        output: &Path,
        transition: TransitionType,
        transition_duration: f64,
        resolution: Resolution,
    ) -> Result<PathBuf>;
}

#[async_trait]
impl ClipGenerator for VeoClient {
    async fn generate_clip(
        &self,
        image: &Path,
        prompt: &str,
        clip_duration: u32,
        output: &Path,
    ) -> Result<PathBuf> {
        let params = VideoParams {
            duration_seconds: clip_duration,
            ..VideoParams::default()
        };

        Ok(self
            .generate_from_image_file(image, prompt, output, &params)
            .await?)
    }
}

#[async_trait]
impl ClipComposer for VideoComposer {
    async fn compose(
        &self,
        clips: &[PathBuf],
        output: &Path,
        transition: TransitionType,
        transition_duration: f64,
        resolution: Resolution,
    ) -> Result<PathBuf> {
        Ok(self
            .compose_with_transitions(clips, output, transition, transition_duration, resolution)
            .await?)
    }
}

/// Stands in for Veo by copying a pre-rendered clip after a short pause.
#[derive(Debug, Clone)]
pub struct DemoClipGenerator {
    demo_video: PathBuf,
    delay: Duration,
}

impl DemoClipGenerator {
    pub const DEFAULT_DELAY: Duration = Duration::from_secs(7);

    pub fn new(demo_video: impl Into<PathBuf>) -> Self {
        Self {
            demo_video: demo_video.into(),
            delay: Self::DEFAULT_DELAY,
        }
    }

    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl ClipGenerator for DemoClipGenerator {
    async fn generate_clip(
        &self,
        image: &Path,
        prompt: &str,
        _clip_duration: u32,
        output: &Path,
    ) -> Result<PathBuf> {
        tracing::info!("[DEMO MODE] Simulating video generation for {}", image.display());
        tracing::debug!("Prompt: {}", prompt);

        tokio::time::sleep(self.delay).await;

        if !tokio::fs::try_exists(&self.demo_video).await? {
            tracing::error!("Demo video not found: {}", self.demo_video.display());
            return Err(PipelineError::DemoVideoMissing(self.demo_video.clone()));
        }

        if let Some(dir) = output.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::copy(&self.demo_video, output).await?;

        tracing::info!("[DEMO MODE] Copied demo video to {}", output.display());
        Ok(output.to_path_buf())
    }
}

pub fn default_session_name() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

pub fn clip_file_name(index: usize) -> String {
    format!("clip_{:02}.mp4", index + 1)
}

/// Makes every path absolute and checks that it exists, so a background
/// worker with a different working directory can still find them.
///
/// # Errors
/// `ImageNotFound` for the first path that does not exist.
pub fn normalize_image_paths(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    paths
        .iter()
        .map(|path| {
            let absolute = std::path::absolute(path)?;
            if absolute.exists() {
                Ok(absolute)
            } else {
                Err(PipelineError::ImageNotFound(absolute))
            }
        })
        .collect()
}

/// # Errors
/// `UnsupportedClipDuration` unless Veo can produce clips of that length.
pub fn validate_clip_duration(clip_duration: u32) -> Result<()> {
    if SUPPORTED_DURATIONS.contains(&clip_duration) {
        Ok(())
    } else {
        Err(PipelineError::UnsupportedClipDuration(clip_duration))
    }
}

/// Everything about `options` that would otherwise only fail after the
/// billable clips were made.
///
/// # Errors
/// `UnsupportedClipDuration` or `InvalidOptions`.
pub fn validate_options(options: &GenerationOptions) -> Result<()> {
    validate_clip_duration(options.clip_duration)?;
    Ok(options.validate()?)
}

fn progress_bar(len: usize, enabled: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} clips",
    ) {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

/// One generation session: a directory under the output root holding the
/// clips and the final video.
pub struct PropertyVideoGenerator {
    generator: Arc<dyn ClipGenerator>,
    composer: Arc<dyn ClipComposer>,
    session_dir: PathBuf,
    clips_dir: PathBuf,
    show_progress: bool,
}

impl PropertyVideoGenerator {
    /// Creates `output_dir/<session>/clips/`. The session name defaults to
    /// the current local time.
    ///
    /// # Errors
    /// If the session directories cannot be created.
    pub async fn create(
        generator: Arc<dyn ClipGenerator>,
        composer: Arc<dyn ClipComposer>,
        output_dir: &Path,
        session_name: Option<&str>,
    ) -> Result<Self> {
        let session_name = session_name.map_or_else(default_session_name, ToString::to_string);

        let session_dir = output_dir.join(session_name);
        let clips_dir = session_dir.join("clips");
        tokio::fs::create_dir_all(&clips_dir).await?;

        tracing::info!("Session directory: {}", session_dir.display());

        Ok(Self {
            generator,
            composer,
            session_dir,
            clips_dir,
            show_progress: false,
        })
    }

    #[must_use]
    pub const fn with_progress_bar(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    pub fn clips_dir(&self) -> &Path {
        &self.clips_dir
    }

    /// Generates one clip per image, in order, as `clips/clip_NN.mp4`.
    ///
    /// # Errors
    /// Fails before any API call if the image count, prompt count or clip
    /// duration is wrong or an image is missing. Otherwise the first failing
    /// clip aborts the run.
    pub async fn generate_video_clips(
        &self,
        images: &[PathBuf],
        prompts: Option<&[String]>,
        clip_duration: u32,
    ) -> Result<Vec<PathBuf>> {
        if images.len() != REQUIRED_IMAGE_COUNT {
            return Err(PipelineError::WrongImageCount {
                expected: REQUIRED_IMAGE_COUNT,
                actual: images.len(),
            });
        }

        let prompts: Vec<String> = match prompts {
            None => DEFAULT_PROMPTS.iter().map(ToString::to_string).collect(),
            Some(prompts) if prompts.len() != images.len() => {
                return Err(PipelineError::PromptCountMismatch {
                    prompts: prompts.len(),
                    images: images.len(),
                });
            }
            Some(prompts) => prompts.to_vec(),
        };

        validate_clip_duration(clip_duration)?;

        for image in images {
            if !tokio::fs::try_exists(image).await? {
                return Err(PipelineError::ImageNotFound(image.clone()));
            }
        }

        tracing::info!("Generating {} video clips...", images.len());

        let pb = progress_bar(images.len(), self.show_progress);
        let mut clips = Vec::with_capacity(images.len());

        for (i, (image, prompt)) in images.iter().zip(&prompts).enumerate() {
            let output = self.clips_dir.join(clip_file_name(i));

            tracing::info!(
                "Clip {}/{}: {}",
                i + 1,
                images.len(),
                image.file_name().unwrap_or_default().to_string_lossy()
            );
            pb.set_message(format!("clip {}", i + 1));

            match self
                .generator
                .generate_clip(image, prompt, clip_duration, &output)
                .await
            {
                Ok(path) => {
                    tracing::info!("Clip {} completed: {}", i + 1, path.display());
                    clips.push(path);
                }
                Err(e) => {
                    tracing::error!("Failed to generate clip {}: {}", i + 1, e);
                    pb.abandon();
                    return Err(e);
                }
            }

            pb.inc(1);
        }

        pb.finish_and_clear();
        tracing::info!("All {} clips generated successfully!", clips.len());

        Ok(clips)
    }

    /// Writes `<session>/<output_name>`.
    ///
    /// # Errors
    /// `InvalidOptions` for an output name that is not a plain file name,
    /// otherwise whatever the composer reports.
    pub async fn compose_final_video(
        &self,
        clips: &[PathBuf],
        options: &GenerationOptions,
    ) -> Result<PathBuf> {
        options.validate()?;
        let output = self.session_dir.join(&options.output_name);

        tracing::info!("Composing final video with transitions...");

        let final_video = self
            .composer
            .compose(
                clips,
                &output,
                options.transition_type,
                options.transition_duration,
                options.resolution,
            )
            .await
            .inspect_err(|e| tracing::error!("Failed to compose final video: {}", e))?;

        tracing::info!("Final video created: {}", final_video.display());
        Ok(final_video)
    }

    /// Clips, then composition.
    ///
    /// # Errors
    /// See [`Self::generate_video_clips`] and [`Self::compose_final_video`].
    pub async fn generate_complete_property_video(
        &self,
        images: &[PathBuf],
        options: &GenerationOptions,
    ) -> Result<PathBuf> {
        validate_options(options)?;

        tracing::info!("Images: {}", images.len());
        tracing::info!("Clip duration: {}s each", options.clip_duration);
        tracing::info!(
            "Transition: {} ({}s)",
            options.transition_type,
            options.transition_duration
        );
        tracing::info!(
            "Expected total duration: ~{:.1}s",
            options.expected_total_duration(images.len())
        );

        let clips = self
            .generate_video_clips(images, options.prompts.as_deref(), options.clip_duration)
            .await?;
        let final_video = self.compose_final_video(&clips, options).await?;

        tracing::info!("Final video: {}", final_video.display());
        tracing::info!("Session directory: {}", self.session_dir.display());

        Ok(final_video)
    }
}
