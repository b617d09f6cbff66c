//! API Server Binary Entry Point

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vidiolingua_api_server::{start_server, ApiState};
use vidiolingua_pipeline::PipelineConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    "vidiolingua_api_server=info,vidiolingua_pipeline=info,tower_http=debug".into()
                }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Get bind address from environment or use default
    let addr = std::env::var("API_SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string());

    let config = PipelineConfig::from_env();
    std::fs::create_dir_all(&config.jobs_root)?;

    let state = ApiState::new(config);

    tracing::info!("Starting VidioLingua API Server");
    start_server(&addr, state).await?;

    Ok(())
}
