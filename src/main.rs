/// Main application entry point
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use weather_gateway::build_app;
use weather_gateway::config::AppConfig;

const DEFAULT_LOG_FILTER: &str = "weather_gateway=info,tower_http=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration (also reads .env, which may carry RUST_LOG)
    let config = AppConfig::from_env()?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
    info!("Configuration loaded successfully");

    // Build router
    let app = build_app(&config)?;

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("weather_gateway listening on {}", config.bind_addr);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
