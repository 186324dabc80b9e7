//! Registers the admin Telegram chat: send `/start` to the bot and the chat id
//! is stored as the destination for order notifications.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use storefront::{
    config::Config,
    notify::TelegramClient,
    settings::{AdminSetting, TELEGRAM_CHAT_ID},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const POLL_TIMEOUT_SECS: u64 = 30;
const RETRY_DELAY: Duration = Duration::from_secs(5);
const CONFIRMATION: &str = "✅ Ce chat recevra désormais les nouvelles commandes DZ Clothes.";

/// `/start`, optionally addressed as `/start@BotName` in group chats.
fn is_start_command(text: &str) -> bool {
    let command = text.split_whitespace().next().unwrap_or_default();
    let command = command.split_once('@').map_or(command, |(name, _)| name);
    command == "/start"
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().expect("Failed to load configuration");
    let Some(token) = config.telegram_bot_token.clone() else {
        tracing::error!("TELEGRAM_BOT_TOKEN is not set");
        std::process::exit(1);
    };

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to Postgres");

    let client = TelegramClient::new(reqwest::Client::new(), token);
    tracing::info!("Telegram bot polling for /start");

    let mut offset = None;
    loop {
        let updates = match client.get_updates(offset, POLL_TIMEOUT_SECS).await {
            Ok(updates) if updates.ok => updates.result,
            Ok(_) => {
                tracing::warn!("Telegram rejected getUpdates");
                tokio::time::sleep(RETRY_DELAY).await;
                continue;
            }
            Err(e) => {
                tracing::warn!("getUpdates failed: {}", e);
                tokio::time::sleep(RETRY_DELAY).await;
                continue;
            }
        };

        for update in updates {
            offset = Some(update.update_id + 1);

            let Some(message) = update.into_message() else {
                continue;
            };
            if !message
                .text
                .as_deref()
                .is_some_and(is_start_command)
            {
                continue;
            }

            let chat_id = message.chat.id.to_string();
            if let Err(e) = AdminSetting::set(&pool, TELEGRAM_CHAT_ID, Some(&chat_id)).await {
                tracing::error!("Failed to store chat id {}: {}", chat_id, e);
                continue;
            }
            tracing::info!("Admin chat registered: {}", chat_id);

            if let Err(e) = client.send_message(&chat_id, CONFIRMATION, false).await {
                tracing::warn!("Failed to confirm registration to {}: {}", chat_id, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_start_command_registers() {
        assert!(is_start_command("/start"));
        assert!(is_start_command("  /start  "));
        assert!(is_start_command("/start@DzClothesBot"));

        assert!(!is_start_command("/started"));
        assert!(!is_start_command("/startx"));
        assert!(!is_start_command("hello /start"));
        assert!(!is_start_command(""));
    }
}
