use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use er_ffmpeg::VideoComposer;
use er_genai::{GeminiImageEditor, ImageEditor, PassthroughEditor, VeoClient};
use property_video::jobs::JobQueue;
use property_video::storage::ObjectStorage;
use property_video::{ClipComposer, ClipGenerator, DemoClipGenerator};

use crate::config::Config;
use crate::session::SessionStore;

#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub sessions: SessionStore,
    pub jobs: JobQueue,
    /// `None` when there are neither credentials nor a demo video.
    pub generator: Option<Arc<dyn ClipGenerator>>,
    pub composer: Arc<dyn ClipComposer>,
    pub image_editor: Arc<dyn ImageEditor>,
    pub storage: Option<Arc<ObjectStorage>>,
}

impl er_app::ContextProvider<Config> for AppContext {
    async fn new(config: Config, aws_config: aws_config::SdkConfig) -> Self {
        let credentials = config.credentials();

        let veo = credentials.clone().and_then(|credentials| {
            VeoClient::new(credentials, &config.veo_model)
                .inspect_err(|e| tracing::error!("Failed to create Veo client: {}", e))
                .ok()
        });
        let generator: Option<Arc<dyn ClipGenerator>> = match (veo, &config.demo_video_path) {
            (Some(veo), _) => {
                tracing::info!("Generating clips with {}", config.veo_model);
                Some(Arc::new(veo))
            }
            (None, Some(demo)) => {
                tracing::warn!("No usable API credentials, running in demo mode with {}", demo.display());
                Some(Arc::new(DemoClipGenerator::new(demo)))
            }
            (None, None) => {
                tracing::warn!("No API credentials and no demo video; generation is disabled");
                None
            }
        };

        let gemini = credentials.and_then(|credentials| {
            GeminiImageEditor::new(credentials, &config.image_model)
                .inspect_err(|e| tracing::error!("Failed to create image editor: {}", e))
                .ok()
        });
        let image_editor: Arc<dyn ImageEditor> = match gemini {
            Some(gemini) => Arc::new(gemini),
            None => Arc::new(PassthroughEditor),
        };

        let composer = Arc::new(VideoComposer::new(&config.ffmpeg_path));
        let storage = ObjectStorage::from_config(&aws_config, &config.storage).map(Arc::new);

        Self::with_services(config, generator, composer, image_editor, storage)
    }
}

impl AppContext {
    pub fn with_services(
        config: Config,
        generator: Option<Arc<dyn ClipGenerator>>,
        composer: Arc<dyn ClipComposer>,
        image_editor: Arc<dyn ImageEditor>,
        storage: Option<Arc<ObjectStorage>>,
    ) -> Self {
        let jobs = JobQueue::new(
            config.max_concurrent_jobs,
            Duration::from_secs(config.job_soft_time_limit_seconds),
        )
        .with_retention(Duration::from_secs(config.job_retention_seconds));
        let sessions = SessionStore::new(Duration::from_secs(config.session_ttl_seconds));

        Self {
            config: Arc::new(config),
            sessions,
            jobs,
            generator,
            composer,
            image_editor,
            storage,
        }
    }

    pub fn session_output_dir(&self, session_id: &str) -> PathBuf {
        self.config.output_dir.join(session_id)
    }

    pub fn frames_dir(&self, session_id: &str) -> PathBuf {
        self.session_output_dir(session_id).join("frames")
    }

    pub fn variation_path(&self, session_id: &str, frame_id: usize, variation: usize) -> PathBuf {
        self.frames_dir(session_id)
            .join("variations")
            .join(format!("frame_{frame_id:03}_var_{variation}.png"))
    }

    pub fn ffmpeg_path(&self) -> &str {
        &self.config.ffmpeg_path
    }

    pub fn upload_dir(&self, session_id: &str) -> PathBuf {
        self.config.upload_dir.join(session_id)
    }

    pub fn edited_video_path(&self, session_id: &str) -> PathBuf {
        self.session_output_dir(session_id).join(EDITED_VIDEO_NAME)
    }
}

pub const EDITED_VIDEO_NAME: &str = "edited_property_video.mp4";
