//! `property-video`: generate a property tour from three photos, or run a
//! single step of the pipeline by hand.

use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use er_app::LogFormat;
use er_ffmpeg::{VideoComposer, DEFAULT_FFMPEG_PATH};
use er_genai::veo::DEFAULT_VEO_MODEL;
use er_genai::{Credentials, GcloudTokenProvider, StaticToken, TokenProvider, VeoClient, VideoParams};
use property_video::pipeline::{validate_clip_duration, validate_options};
use property_video::PropertyVideoGenerator;
use types::{GenerationOptions, Resolution, TransitionType, DEFAULT_OUTPUT_NAME, DEFAULT_PROMPTS};

#[derive(Parser)]
#[command(
    name = "property-video",
    version,
    about = "Generate promotional property videos with Veo and FFmpeg",
    after_help = "EXAMPLES:\n  \
                  property-video generate --images exterior.jpg interior.jpg lobby.jpg\n  \
                  property-video generate --images a.jpg b.jpg c.jpg --transition slideright --resolution 1920x1080\n  \
                  property-video compose clip_01.mp4 clip_02.mp4 --output tour.mp4\n  \
                  property-video frames --video tour.mp4 --count 6"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// FFmpeg executable
    #[arg(long, global = true, env = "FFMPEG_PATH", default_value = DEFAULT_FFMPEG_PATH)]
    ffmpeg_path: String,
}

#[derive(Subcommand)]
enum Command {
    /// Generate clips for three property photos and join them
    Generate(GenerateArgs),
    /// Generate a single clip from one image
    Clip(ClipArgs),
    /// Join existing clips into one video
    Compose(ComposeArgs),
    /// Extract evenly spaced frames from a video
    Frames(FramesArgs),
    /// Overlay an edited still onto a video at a timestamp
    Splice(SpliceArgs),
}

#[derive(Args)]
struct GoogleArgs {
    /// Google AI Studio API key
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Use Vertex AI instead of AI Studio
    #[arg(long, env = "USE_VERTEX_AI")]
    use_vertex_ai: bool,

    /// Google Cloud project (Vertex AI)
    #[arg(long, env = "GOOGLE_CLOUD_PROJECT")]
    project: Option<String>,

    /// Google Cloud location (Vertex AI)
    #[arg(long, env = "GOOGLE_CLOUD_LOCATION", default_value = "us-central1")]
    location: String,

    /// Veo model name
    #[arg(long, env = "VEO_MODEL", default_value = DEFAULT_VEO_MODEL)]
    model: String,
}

#[derive(Args)]
struct GenerateArgs {
    /// Exterior, interior and common area photos, in that order
    #[arg(long, num_args = 3, required = true, value_names = ["EXTERIOR", "INTERIOR", "COMMON_AREA"])]
    images: Vec<PathBuf>,

    #[command(flatten)]
    google: GoogleArgs,

    /// Output file name inside the session folder
    #[arg(long, default_value = DEFAULT_OUTPUT_NAME)]
    output: String,

    #[arg(long, default_value = "output")]
    output_dir: PathBuf,

    /// Defaults to the current date and time
    #[arg(long)]
    session_name: Option<String>,

    #[arg(long, default_value_t = TransitionType::Fade)]
    transition: TransitionType,

    /// Seconds
    #[arg(long, default_value_t = 0.5)]
    transition_duration: f64,

    /// Seconds per clip: 4, 6 or 8
    #[arg(long, default_value_t = 8)]
    clip_duration: u32,

    #[arg(long, default_value_t = Resolution::default())]
    resolution: Resolution,

    /// One prompt per image
    #[arg(long, num_args = 3, value_names = ["P1", "P2", "P3"])]
    prompts: Option<Vec<String>>,
}

#[derive(Args)]
struct ClipArgs {
    #[arg(long)]
    image: PathBuf,

    #[arg(long)]
    output: PathBuf,

    /// Defaults to the exterior prompt
    #[arg(long)]
    prompt: Option<String>,

    #[arg(long, default_value_t = 8)]
    clip_duration: u32,

    #[command(flatten)]
    google: GoogleArgs,
}

#[derive(Args)]
struct ComposeArgs {
    #[arg(required = true, num_args = 2..)]
    videos: Vec<PathBuf>,

    #[arg(long)]
    output: PathBuf,

    #[arg(long, default_value_t = TransitionType::Fade)]
    transition: TransitionType,

    #[arg(long, default_value_t = 0.5)]
    transition_duration: f64,

    #[arg(long, default_value_t = Resolution::default())]
    resolution: Resolution,

    /// Hard cuts instead of crossfades
    #[arg(long)]
    no_transitions: bool,
}

#[derive(Args)]
struct FramesArgs {
    #[arg(long)]
    video: PathBuf,

    #[arg(long, default_value_t = er_ffmpeg::frames::DEFAULT_FRAME_COUNT)]
    count: usize,

    #[arg(long, default_value = "frames")]
    out_dir: PathBuf,
}

#[derive(Args)]
struct SpliceArgs {
    #[arg(long)]
    video: PathBuf,

    #[arg(long)]
    image: PathBuf,

    /// Seconds into the video
    #[arg(long)]
    at: f64,

    /// Seconds the image stays on screen
    #[arg(long, default_value_t = er_ffmpeg::splice::DEFAULT_HOLD_SECONDS)]
    hold: f64,

    #[arg(long)]
    output: PathBuf,
}

impl GoogleArgs {
    fn credentials(&self) -> Result<Credentials, Box<dyn Error>> {
        if self.use_vertex_ai {
            let project = self
                .project
                .clone()
                .ok_or("Vertex AI needs a project. Set GOOGLE_CLOUD_PROJECT or use --project")?;

            let tokens: Arc<dyn TokenProvider> = match std::env::var("VERTEX_ACCESS_TOKEN") {
                Ok(token) if !token.is_empty() => Arc::new(StaticToken::new(token)),
                _ => Arc::new(GcloudTokenProvider::new("gcloud")),
            };

            tracing::info!("Using Vertex AI in {} ({})", project, self.location);
            return Ok(Credentials::vertex(project, self.location.clone(), tokens));
        }

        match self.api_key.as_deref() {
            Some(key) if !key.is_empty() => Ok(Credentials::api_key(key)),
            _ => Err("API key required. Set GOOGLE_API_KEY environment variable or use --api-key".into()),
        }
    }

    fn veo_client(&self) -> Result<VeoClient, Box<dyn Error>> {
        Ok(VeoClient::new(self.credentials()?, &self.model)?)
    }
}

async fn generate(args: GenerateArgs, ffmpeg_path: String) -> Result<(), Box<dyn Error>> {
    let options = GenerationOptions {
        clip_duration: args.clip_duration,
        transition_type: args.transition,
        transition_duration: args.transition_duration,
        resolution: args.resolution,
        output_name: args.output,
        prompts: args.prompts,
    };
    validate_options(&options)?;

    let veo = Arc::new(args.google.veo_client()?);
    let composer = Arc::new(VideoComposer::verified(ffmpeg_path).await?);

    let generator = PropertyVideoGenerator::create(
        veo,
        composer,
        &args.output_dir,
        args.session_name.as_deref(),
    )
    .await?
    .with_progress_bar(true);

    tracing::warn!(
        "This run makes {} billable Veo API calls",
        args.images.len()
    );

    let final_video = generator
        .generate_complete_property_video(&args.images, &options)
        .await?;

    println!("Final video: {}", final_video.display());
    println!("Session folder: {}", generator.session_dir().display());

    Ok(())
}

async fn clip(args: ClipArgs) -> Result<(), Box<dyn Error>> {
    validate_clip_duration(args.clip_duration)?;

    let veo = args.google.veo_client()?;
    let prompt = args
        .prompt
        .unwrap_or_else(|| DEFAULT_PROMPTS[0].to_string());
    let params = VideoParams {
        duration_seconds: args.clip_duration,
        ..VideoParams::default()
    };

    let clip = veo
        .generate_from_image_file(&args.image, &prompt, &args.output, &params)
        .await?;

    println!("{}", clip.display());
    Ok(())
}

async fn compose(args: ComposeArgs, ffmpeg_path: String) -> Result<(), Box<dyn Error>> {
    let composer = VideoComposer::verified(ffmpeg_path).await?;

    let output = if args.no_transitions {
        composer
            .simple_concatenate(&args.videos, &args.output, args.resolution)
            .await?
    } else {
        composer
            .compose_with_transitions(
                &args.videos,
                &args.output,
                args.transition,
                args.transition_duration,
                args.resolution,
            )
            .await?
    };

    println!("{}", output.display());
    Ok(())
}

async fn frames(args: FramesArgs, ffmpeg_path: &str) -> Result<(), Box<dyn Error>> {
    let frames =
        er_ffmpeg::frames::extract_frames(ffmpeg_path, &args.video, &args.out_dir, args.count)
            .await?;

    for frame in frames {
        println!("{}\t{}\t{}", frame.frame_id, frame.timestamp, frame.path);
    }
    Ok(())
}

async fn splice(args: SpliceArgs, ffmpeg_path: &str) -> Result<(), Box<dyn Error>> {
    let output = er_ffmpeg::splice::splice_frame(
        ffmpeg_path,
        &args.video,
        &args.image,
        args.at,
        args.hold,
        &args.output,
    )
    .await?;

    println!("{}", output.display());
    Ok(())
}

async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    match cli.command {
        Command::Generate(args) => generate(args, cli.ffmpeg_path).await,
        Command::Clip(args) => clip(args).await,
        Command::Compose(args) => compose(args, cli.ffmpeg_path).await,
        Command::Frames(args) => frames(args, &cli.ffmpeg_path).await,
        Command::Splice(args) => splice(args, &cli.ffmpeg_path).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    er_app::init_tracing(
        LogFormat::Pretty,
        if cli.verbose { "debug" } else { "info" },
    );

    tokio::select! {
        result = run(cli) => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!("{}", e);
                ExitCode::FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted");
            ExitCode::from(130)
        }
    }
}
