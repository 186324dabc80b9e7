//! Outbound notifications: transactional email and the admin Telegram chat.
//!
//! Every sender reports success as a `bool`; failures are logged and never
//! propagated to the request that triggered them.

pub mod mail;
pub mod telegram;

pub use mail::{send_order_confirmation, send_verification_email};
pub use telegram::{TelegramClient, admin_chat_id, notify_new_order, send_telegram_notification};
