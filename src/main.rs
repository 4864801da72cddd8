mod bills;
mod bot;
mod config;
mod llm;
mod platform;
mod prompt;
mod server;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bills::BillStore;
use crate::bot::Dispatcher;
use crate::config::Config;
use crate::llm::{Explainer, LlmClient};
use crate::platform::telegram::TelegramClient;
use crate::platform::Messenger;
use crate::server::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,zakonbot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Model: {} ({})", config.llm.model, config.llm.provider);
    info!("  Bills: {}", config.bills.data_path.display());
    info!("  Admin chat: {}", config.telegram.admin_chat_id);
    info!("  Log chat: {}", config.telegram.log_chat_id);

    let bot_token_set = config.telegram.has_bot_token();
    if !bot_token_set {
        error!("TELEGRAM_TOKEN is not set; webhook calls will be answered with 500");
    }
    if !config.llm.has_api_key() {
        warn!("OPENAI_API_KEY is not set; bills will get a placeholder reply instead of an explanation");
    }

    let store = Arc::new(BillStore::load(&config.bills.data_path));
    if store.is_empty() {
        warn!("Bill dataset is empty; every number will be reported as unknown");
    }
    let explainer: Arc<dyn Explainer> = Arc::new(LlmClient::new(config.llm.clone())?);
    let messenger: Arc<dyn Messenger> = Arc::new(TelegramClient::new(&config.telegram)?);
    let dispatcher = Arc::new(Dispatcher::new(
        store,
        explainer,
        messenger,
        &config.telegram,
    ));

    info!("Bot is starting...");
    server::serve(&config.server, AppState::new(dispatcher, bot_token_set)).await?;

    Ok(())
}
