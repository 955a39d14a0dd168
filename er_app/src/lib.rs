use aws_config::{BehaviorVersion, meta::region::RegionProviderChain};
use figment::{Figment, providers::Env};

pub trait ContextProvider<Config> {
    fn new(
        config: Config,
        aws_config: aws_config::SdkConfig,
    ) -> impl Future<Output = Self>;
}

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line, for the long-running web service.
    Json,
    /// Human readable output for the command line.
    Pretty,
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` always wins; `default_directive` is used when it is unset.
pub fn init_tracing(format: LogFormat, default_directive: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));

    match format {
        LogFormat::Json => {
            // span fields already appear in `spans`, and the module path is noise
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_current_span(false)
                .with_ansi(false)
                .with_target(false)
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .init();
        }
    }
}

/// Extract a configuration struct from the environment.
///
/// A `.env` file in the working directory is loaded first, if there is one,
/// so that local runs behave like the deployed service.
///
/// # Errors
/// If the environment does not satisfy the shape of `Config`.
pub fn load_config<Config>() -> Result<Config, figment::Error>
where
    Config: for<'de> serde::Deserialize<'de>,
{
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!("loaded environment from {}", path.display());
    }

    config_figment().extract()
}

fn config_figment() -> Figment {
    Figment::new().merge(Env::raw())
}

/// Sets up JSON logging, reads `Config` from `.env` and the environment, and
/// hands both to `A`.
///
/// AWS settings come from the usual provider chain with a `us-east-1`
/// fallback region. Nothing talks to AWS unless a storage bucket is set.
///
/// # Errors
/// If the environment does not satisfy the shape of `Config`.
pub async fn create_app_context<A, Config>() -> Result<A, figment::Error>
where
    Config: for<'de> serde::Deserialize<'de>,
    A: ContextProvider<Config>,
{
    init_tracing(LogFormat::Json, "info");

    let config: Config = load_config()?;

    let region_provider =
        RegionProviderChain::default_provider().or_else("us-east-1");
    let aws_config = aws_config::defaults(BehaviorVersion::latest())
        .region(region_provider)
        .load()
        .await;

    let context = A::new(config, aws_config).await;

    Ok(context)
}
