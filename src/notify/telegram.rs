use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use crate::{
    AppState,
    settings::{AdminSetting, TELEGRAM_CHAT_ID},
};

const TELEGRAM_API: &str = "https://api.telegram.org";

/// Thin Bot API client.
#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    token: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdatesResponse {
    pub ok: bool,
    #[serde(default)]
    pub result: Vec<Update>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub edited_message: Option<Message>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

impl Update {
    pub fn into_message(self) -> Option<Message> {
        self.message.or(self.edited_message)
    }
}

impl TelegramClient {
    pub fn new(http: reqwest::Client, token: impl Into<String>) -> Self {
        Self {
            http,
            token: token.into(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", TELEGRAM_API, self.token, method)
    }

    pub async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        html: bool,
    ) -> Result<(), reqwest::Error> {
        let mut body = json!({ "chat_id": chat_id, "text": text });
        if html {
            body["parse_mode"] = json!("HTML");
        }

        self.http
            .post(self.method_url("sendMessage"))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }

    /// Long-polls for updates after `offset`.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<UpdatesResponse, reqwest::Error> {
        let mut query = vec![("timeout", timeout_secs.to_string())];
        if let Some(offset) = offset {
            query.push(("offset", offset.to_string()));
        }

        self.http
            .get(self.method_url("getUpdates"))
            .query(&query)
            .timeout(std::time::Duration::from_secs(timeout_secs + 5))
            .send()
            .await?
            .json()
            .await
    }
}

/// Chat receiving admin notifications: the environment wins over the stored setting.
pub async fn admin_chat_id(state: &AppState) -> Option<String> {
    if let Some(chat_id) = &state.config.telegram_admin_chat_id {
        return Some(chat_id.clone());
    }
    state.config.telegram_bot_token.as_ref()?;

    match AdminSetting::get(&state.pool, TELEGRAM_CHAT_ID).await {
        Ok(chat_id) => chat_id.filter(|c| !c.trim().is_empty()),
        Err(e) => {
            tracing::warn!("Failed to read Telegram chat id: {}", e);
            None
        }
    }
}

pub async fn send_telegram_notification(state: &AppState, text: &str) -> bool {
    let Some(token) = state.config.telegram_bot_token.as_deref() else {
        return false;
    };
    let Some(chat_id) = admin_chat_id(state).await else {
        tracing::debug!("No Telegram chat configured, notification skipped");
        return false;
    };

    let client = TelegramClient::new(state.http.clone(), token);
    match client.send_message(&chat_id, text, true).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Telegram notification failed: {}", e);
            false
        }
    }
}

pub fn order_message(order_number: &str, total: Decimal, email: &str, items_summary: &str) -> String {
    format!(
        "🛒 <b>Nouvelle commande DZ Clothes</b>\n\
         Numéro: <code>{}</code>\n\
         Total: {:.2} DA\n\
         Client: {}\n\
         Articles:\n{}",
        order_number,
        total,
        escape_html(email),
        escape_html(items_summary)
    )
}

pub async fn notify_new_order(
    state: &AppState,
    order_number: &str,
    total: Decimal,
    email: &str,
    items_summary: &str,
) -> bool {
    let text = order_message(order_number, total, email, items_summary);
    send_telegram_notification(state, &text).await
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
