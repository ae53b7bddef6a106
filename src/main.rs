use anyhow::Result;
use axum::Router;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use doctrans::config::Config;
use doctrans::routes;
use doctrans::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "doctrans=debug,tower_http=debug".to_string()),
        )
        .init();

    // Load configuration - try multiple paths, fall back to defaults
    let config_paths: Vec<String> = [
        std::env::var("CONFIG_PATH").ok(),
        Some("config.yaml".to_string()),
        Some("config/config.yaml".to_string()),
    ]
    .into_iter()
    .flatten()
    .collect();

    let mut config = None;
    for path in &config_paths {
        match Config::load(path) {
            Ok(cfg) => {
                info!("Loaded configuration from: {}", path);
                config = Some(cfg);
                break;
            }
            Err(e) => {
                tracing::debug!("Failed to load config from {}: {}", path, e);
                continue;
            }
        }
    }
    let config = config.unwrap_or_else(|| {
        warn!("No config file found, using defaults. Tried: {:?}", config_paths);
        let mut cfg = Config::default();
        cfg.apply_env_overrides();
        cfg
    });

    // Ensure directories exist
    let system_config = &config.system_config;
    std::fs::create_dir_all(&system_config.upload_dir)?;
    std::fs::create_dir_all(&system_config.processed_dir)?;
    info!("Initialized directories");

    // Initialize app state
    let app_state = AppState::new(config.clone());

    // Build application
    let app = Router::new()
        .merge(routes::create_routes(&app_state))
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let addr: SocketAddr = format!(
        "{}:{}",
        config.system_config.host, config.system_config.port
    )
    .parse()?;
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
