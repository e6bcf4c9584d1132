//! Photo Chat - conversational photo assistant
//!
//! A WebSocket chat backend that lets a completion model call local tools
//! to register users and look up their uploaded photos.

mod api;
mod config;
mod db;
mod dialogue;
mod llm;
mod persona;
mod relay;
mod session;
mod store;
#[cfg(test)]
mod testing;
mod tools;

use api::{create_router, AppState, Services};
use config::AppConfig;
use db::Database;
use llm::{CompletionService, LoggingService, OpenAIService};
use relay::BroadcastRelay;
use std::net::SocketAddr;
use std::sync::Arc;
use store::{LocalPhotoStore, MemoryCache};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "photo_chat=info,tower_http=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = AppConfig::from_env();

    // Ensure data directories exist
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::create_dir_all(&config.photo_dir)?;

    tracing::info!(path = %config.db_path.display(), "Opening database");
    let db = Database::open(&config.db_path)?;

    let persona = persona::load(config.persona_file.as_deref())?;

    if config.openai.api_key.is_none() {
        tracing::warn!("No completion API key configured. Set OPENAI_API_KEY.");
    }
    let openai = OpenAIService::new(config.openai.clone())?;
    let completions: Arc<dyn CompletionService> = Arc::new(LoggingService::new(Arc::new(openai)));
    tracing::info!(model = %completions.model_id(), "Completion service initialized");

    let photos = Arc::new(LocalPhotoStore::new(
        db.clone(),
        &config.photo_dir,
        &config.public_url,
    ));

    let services = Services {
        db,
        photos,
        cache: Arc::new(MemoryCache::new()),
        completions,
        relay: BroadcastRelay::new(config.broadcast_capacity),
    };
    let state = AppState::new(services, config.photo_dir.clone(), persona, config.turn);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state)
        .layer(cors)
        .layer(compression)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Photo chat server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
