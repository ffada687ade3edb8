use std::sync::Arc;

use anyhow::{Context, Result};
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

use replybot::bot::{self, AppState};
use replybot::config::BotConfig;
use replybot::db::{self, SqliteStore};
use replybot::delivery::ReplyDelivery;
use replybot::dialogue::AdminDialogueState;
use replybot::llm::{GenerationClient, ReplyGenerator};
use replybot::localization::init_localization;
use replybot::responder::{EngineSettings, EngineStores, ReplyEngine};

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    init_logging();

    info!("Starting Reply Telegram Bot");

    let config = BotConfig::from_env()?;

    init_localization().context("Failed to initialize localization")?;

    info!(database_url = %config.database_url, "Initializing database");
    let pool = db::connect(&config.database_url).await?;
    db::init_database_schema(&pool).await?;
    let store = Arc::new(SqliteStore::new(pool));

    let generator: Option<Arc<dyn ReplyGenerator>> = if config.generation.is_enabled() {
        info!(model = %config.generation.model, "Generation enabled");
        Some(Arc::new(GenerationClient::new(config.generation.clone())?))
    } else {
        info!("LLM_API_KEY not set, generation disabled");
        None
    };

    let engine = ReplyEngine::new(
        EngineSettings::from_config(&config),
        EngineStores::shared(store.clone()),
        generator,
    );
    let loaded = engine.reload().await?;
    info!(mode = ?config.reply_mode, loaded, "Reply engine ready");

    let delivery = ReplyDelivery::new(config.send_failure_policy);
    let bot = Bot::new(config.telegram_token.clone());

    let state = Arc::new(AppState {
        config,
        store,
        engine,
        delivery,
    });

    info!("Bot initialized, starting dispatcher");

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .enter_dialogue::<Message, InMemStorage<AdminDialogueState>, AdminDialogueState>()
                .endpoint(bot::message_handler),
        )
        .branch(
            Update::filter_callback_query()
                .enter_dialogue::<CallbackQuery, InMemStorage<AdminDialogueState>, AdminDialogueState>()
                .endpoint(bot::callback_handler),
        )
        .branch(Update::filter_business_connection().endpoint(bot::business_connection_handler))
        .branch(Update::filter_business_message().endpoint(bot::business_message_handler));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state, InMemStorage::<AdminDialogueState>::new()])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
