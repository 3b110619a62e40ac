//! Repokeeper binary entry point

use repokeeper::{AppState, config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application entry point
///
/// # Setup
/// 1. Load configuration from file and environment
/// 2. Initialize tracing/logging from the `logging` section
/// 3. Initialize metrics
/// 4. Initialize AppState
/// 5. Build Axum router
/// 6. Start HTTP server
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration
    let config = config::AppConfig::load()?;

    // 2. Initialize tracing/logging; RUST_LOG still wins over logging.level
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.default_filter().into());

    if config.logging.is_json() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }

    tracing::info!("Starting Repokeeper...");
    tracing::info!(
        public_url = %config.server.public_url,
        frontend = %config.frontend.url,
        "Configuration loaded"
    );
    if !config.should_use_secure_cookies() {
        tracing::warn!(
            public_url = %config.server.public_url,
            "Using insecure OAuth state cookies for local development"
        );
    }

    // 3. Initialize metrics
    repokeeper::metrics::init_metrics();

    // 4. Initialize application state
    let state = AppState::new(config.clone())?;

    // 5. Build Axum router
    let app = repokeeper::build_router(state);

    // 6. Start HTTP server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("OAuth callback URL: {}", config.oauth_callback_url());

    axum::serve(listener, app).await?;

    Ok(())
}
