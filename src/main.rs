use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use artforge_proxy::{api, Config, ImageGenerator};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    Config::dotenv_load();
    let config = Config::new()?;
    config.log_summary();

    let generator = ImageGenerator::from_config(&config)?;
    if !generator.has_keyed_credential() {
        tracing::warn!("HUGGINGFACE_API_KEY is not set; text-to-image will use Pollinations and img2img will fail");
    }

    let state = Arc::new(api::AppState { generator });
    let app = api::router(state);

    let socket_address = config.socket_address();
    tracing::info!("Server listening on {}", socket_address);
    axum::Server::bind(&socket_address)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}
