//! services/desk/src/bin/desk.rs

use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderValue, Method,
};
use desk_lib::{
    adapters::{DownloadDir, FileTokenStore, HttpRepository},
    config::Config,
    error::DeskServiceError,
    web::{self, state::{AppState, StagedUploads}},
};
use docdesk_core::DocumentDesk;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), DeskServiceError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting coordinator...");

    // --- 2. Initialize Adapters ---
    let repository = Arc::new(HttpRepository::new(
        config.api_base_url.clone(),
        config.request_timeout,
    )?);
    let tokens = Arc::new(FileTokenStore::new(config.token_path.clone()));
    let downloads = Arc::new(DownloadDir::new(config.download_dir.clone()));
    info!(api = %config.api_base_url, "Using document repository");

    // --- 3. Build the Desk & Resume Any Stored Session ---
    let desk = Arc::new(DocumentDesk::new(repository, tokens, downloads));
    if let Err(e) = desk.load_persisted().await {
        warn!("Stored session could not be resumed: {}", e);
    }

    let app_state = Arc::new(AppState::new(desk, StagedUploads::new()));

    // --- 4. Create the Web Router ---
    let origin = config.ui_origin.parse::<HeaderValue>().map_err(|e| {
        DeskServiceError::Internal(format!("Invalid UI origin '{}': {}", config.ui_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);
    let app = web::router(app_state).layer(cors);

    // --- 5. Start the Server ---
    info!("Listening for the UI on {}", config.bind_address);
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
