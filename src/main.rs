use anyhow::{Context, Result};
use std::sync::Arc;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::prelude::*;
use teloxide::update_listeners::webhooks;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pdf_bot::bot::{self, BotContext, TelegramMessenger};
use pdf_bot::config::BotConfig;
use pdf_bot::dialogue::Session;
use pdf_bot::localization::init_localization_from;
use pdf_bot::pdf::LocalEngine;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pdf_bot=info,warn"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    init_tracing();
    info!("Starting PDF Telegram Bot");

    let config = BotConfig::from_env()?;
    init_localization_from(&config.locales_dir)?;

    if let Some(temp_dir) = &config.temp_dir {
        std::fs::create_dir_all(temp_dir)
            .with_context(|| format!("Failed to create {}", temp_dir.display()))?;
    }

    let bot = Bot::new(config.token.clone());
    let messenger = TelegramMessenger::new(bot.clone(), config.retry.clone())?;
    let ctx = Arc::new(BotContext::new(
        &config,
        Arc::new(LocalEngine::from_config(&config)),
        Arc::new(messenger),
    ));

    let handler = Update::filter_message()
        .enter_dialogue::<Message, InMemStorage<Session>, Session>()
        .endpoint(bot::message_handler);

    let mut dispatcher = Dispatcher::builder(bot.clone(), handler)
        .dependencies(dptree::deps![InMemStorage::<Session>::new(), ctx])
        .enable_ctrlc_handler()
        .build();

    match &config.webhook {
        Some(webhook) => {
            let url: reqwest::Url = format!("{}/{}", webhook.app_url, config.token)
                .parse()
                .context("APP_URL must be a valid URL")?;
            info!(port = webhook.port, "Bot initialized, listening for webhooks");
            let listener =
                webhooks::axum(bot, webhooks::Options::new(webhook.listen_addr(), url)).await?;
            dispatcher
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("An error from the update listener"),
                )
                .await;
        }
        None => {
            info!("Bot initialized, polling for updates");
            dispatcher.dispatch().await;
        }
    }

    Ok(())
}
