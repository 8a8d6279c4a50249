use std::net::SocketAddr;
use std::sync::Arc;

use streamrent_backend::api::AppState;
use streamrent_backend::payments::providers::PaystackProvider;
use streamrent_backend::{app, config, database};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "streamrent_backend=info,tower_http=info".into()),
        )
        .init();

    // Load configuration
    let config = config::Config::from_env()?;

    tracing::info!("Starting StreamRent Backend");
    tracing::info!("Environment: {}", config.server.environment);
    tracing::info!(
        "Platform commission rate: {}",
        config.settlement.platform_commission_rate
    );

    // Payment provider; a missing secret key fails startup here
    let provider = Arc::new(PaystackProvider::from_env()?);

    // Database pool
    let pool_config = database::PoolConfig {
        max_connections: config.database.max_connections,
        ..Default::default()
    };
    let pool = database::init_pool(&config.database.url, Some(pool_config)).await?;

    let state = AppState::new(config.clone(), pool, provider);
    let app = app(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
