//! In-process background queue for generation runs.
//!
//! Jobs live in memory only. A semaphore bounds how many run at once and
//! each run is cut off after a soft time limit.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{RwLock, Semaphore};
use types::{GenerationOptions, JobProgress, JobResult, JobStage};

use crate::pipeline::{
    normalize_image_paths, validate_options, ClipComposer, ClipGenerator, PropertyVideoGenerator,
};
use crate::storage::ObjectStorage;
use crate::{PipelineError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSnapshot {
    pub job_id: String,
    pub session_id: String,
    #[serde(flatten)]
    pub progress: JobProgress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

type JobTable = Arc<RwLock<HashMap<String, JobSnapshot>>>;

/// Handed to a running job so it can publish its stage.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    job_id: String,
    jobs: JobTable,
}

impl ProgressReporter {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub async fn update(&self, stage: JobStage, progress: u8, message: impl Into<String>) {
        let progress = JobProgress::new(stage, progress, message);
        tracing::info!(
            job_id = %self.job_id,
            "{:?} {}% {}",
            progress.stage,
            progress.progress,
            progress.message
        );

        if let Some(job) = self.jobs.write().await.get_mut(&self.job_id) {
            job.progress = progress;
            job.updated_at = Utc::now();
        }
    }

    async fn finish(&self, outcome: Result<JobResult>) {
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs.get_mut(&self.job_id) else {
            return;
        };

        match outcome {
            Ok(result) => {
                tracing::info!(job_id = %self.job_id, "job complete: {}", result.final_video);
                job.progress = JobProgress::new(
                    JobStage::Complete,
                    100,
                    "Property video generated successfully!",
                );
                job.result = Some(result);
            }
            Err(e) => {
                tracing::error!(job_id = %self.job_id, "job failed: {}", e);
                let message = e.to_string();
                // keep the last reported percentage
                job.progress = JobProgress::new(JobStage::Error, job.progress.progress, &message);
                job.error = Some(message);
            }
        }
        job.updated_at = Utc::now();
    }
}

pub const DEFAULT_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

/// Drops finished jobs that are older than `retention` or that a new job for
/// the same session supersedes. Running jobs are never dropped.
fn prune(jobs: &mut HashMap<String, JobSnapshot>, session_id: &str, retention: Duration) {
    let now = Utc::now();
    let before = jobs.len();

    jobs.retain(|_, job| {
        if !job.progress.stage.is_finished() {
            return true;
        }
        let expired = (now - job.updated_at)
            .to_std()
            .is_ok_and(|age| age >= retention);
        !expired && job.session_id != session_id
    });

    if jobs.len() < before {
        tracing::debug!("pruned {} finished jobs", before - jobs.len());
    }
}

#[derive(Debug, Clone)]
pub struct JobQueue {
    jobs: JobTable,
    permits: Arc<Semaphore>,
    soft_time_limit: Duration,
    retention: Duration,
}

impl JobQueue {
    pub fn new(max_concurrent: usize, soft_time_limit: Duration) -> Self {
        Self {
            jobs: Arc::default(),
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            soft_time_limit,
            retention: DEFAULT_RETENTION,
        }
    }

    /// How long a finished job stays readable through [`Self::get`].
    #[must_use]
    pub const fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Registers a job and runs `work` on the tokio runtime once a slot is
    /// free. Returns the new job id immediately.
    pub async fn submit<F, Fut>(&self, session_id: impl Into<String>, work: F) -> String
    where
        F: FnOnce(ProgressReporter) -> Fut + Send + 'static,
        Fut: Future<Output = Result<JobResult>> + Send + 'static,
    {
        let job_id = uuid::Uuid::now_v7().to_string();
        let session_id = session_id.into();
        let now = Utc::now();

        let mut jobs = self.jobs.write().await;
        prune(&mut jobs, &session_id, self.retention);
        jobs.insert(
            job_id.clone(),
            JobSnapshot {
                job_id: job_id.clone(),
                session_id: session_id.clone(),
                progress: JobProgress::new(JobStage::Queued, 5, "Queued background task"),
                result: None,
                error: None,
                created_at: now,
                updated_at: now,
            },
        );
        drop(jobs);
        tracing::info!(%job_id, %session_id, "job queued");

        let reporter = ProgressReporter {
            job_id: job_id.clone(),
            jobs: self.jobs.clone(),
        };
        let permits = self.permits.clone();
        let limit = self.soft_time_limit;

        tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                reporter
                    .finish(Err(PipelineError::Io(std::io::Error::other(
                        "job queue closed",
                    ))))
                    .await;
                return;
            };

            let outcome = match tokio::time::timeout(limit, work(reporter.clone())).await {
                Ok(outcome) => outcome,
                Err(_) => Err(PipelineError::TimedOut(limit.as_secs())),
            };
            reporter.finish(outcome).await;
        });

        job_id
    }

    pub async fn get(&self, job_id: &str) -> Option<JobSnapshot> {
        self.jobs.read().await.get(job_id).cloned()
    }
}

/// Everything a background generation run needs besides its clients.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub session_id: String,
    pub images: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub options: GenerationOptions,
}

/// The standard job body: clips, composition and an optional upload.
///
/// # Errors
/// Any pipeline failure. A failed upload is logged and the local video is
/// still reported.
pub async fn run_generation_job(
    generator: Arc<dyn ClipGenerator>,
    composer: Arc<dyn ClipComposer>,
    storage: Option<Arc<ObjectStorage>>,
    request: GenerationRequest,
    progress: ProgressReporter,
) -> Result<JobResult> {
    validate_options(&request.options)?;
    let images = normalize_image_paths(&request.images)?;
    let api_calls = images.len();

    tracing::warn!(
        "This job will make {} billable video generation API calls",
        api_calls
    );

    progress
        .update(JobStage::Starting, 10, "Initializing video generator...")
        .await;

    let session = PropertyVideoGenerator::create(
        generator,
        composer,
        &request.output_dir,
        Some(&request.session_id),
    )
    .await?;

    progress
        .update(
            JobStage::GeneratingClips,
            50,
            format!("Generating {api_calls} AI video clips (this may take several minutes)..."),
        )
        .await;

    let clips = session
        .generate_video_clips(
            &images,
            request.options.prompts.as_deref(),
            request.options.clip_duration,
        )
        .await?;

    progress
        .update(JobStage::Composing, 80, "Composing final video with transitions...")
        .await;

    let final_video = session
        .compose_final_video(&clips, &request.options)
        .await?;

    let mut public_url = None;
    if let Some(storage) = storage {
        progress
            .update(JobStage::Uploading, 90, "Uploading final video...")
            .await;

        let key = format!("{}/{}", request.session_id, request.options.output_name);
        match storage
            .upload_file(&key, &final_video, "video/mp4", Some("max-age=3600"))
            .await
        {
            Ok(url) => public_url = Some(url),
            Err(e) => tracing::warn!("Keeping local video only, upload failed: {}", e),
        }
    }

    Ok(JobResult {
        final_video: final_video.display().to_string(),
        session_id: request.session_id,
        session_dir: session.session_dir().display().to_string(),
        clips_generated: clips.len(),
        api_calls_used: api_calls,
        public_url,
    })
}
