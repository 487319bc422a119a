use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use dotenvy::dotenv;
use redis::aio::ConnectionManager;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chat_server::config::Config;
use chat_server::extract::PdfExtractor;
use chat_server::history::HistoryStore;
use chat_server::kv::RedisStore;
use chat_server::model::GeminiModel;
use chat_server::{build_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "chat_server=info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let client = redis::Client::open(config.redis_url.clone())?;
    let redis = ConnectionManager::new(client).await?;
    let store = Arc::new(RedisStore::new(redis));

    let gemini = genai::Client::new(genai::GenAiConfig {
        api_key: config.gemini_api_key.clone(),
        model: config.gemini_model.clone(),
        base_url: None,
    })?;
    info!("Model: {} | Region: {}", gemini.model(), config.region);

    let state = AppState {
        history: HistoryStore::new(store.clone()),
        store,
        model: Arc::new(GeminiModel::new(gemini)),
        extractor: Arc::new(PdfExtractor),
        region: config.region.clone(),
        history_ttl_secs: config.history_ttl_secs,
        document_ttl_secs: config.document_ttl_secs,
    };

    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
