//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules for better organization:
//! - `message_handler`: Handles commands, free text and document uploads
//! - `callback_handler`: Handles inline keyboard callback queries
//! - `dialogue_manager`: Handles admin input collected through dialogue state
//! - `referral`: Registration, subscription gate, referral rewards, user menu
//! - `business`: Business connection bookkeeping and replies to customers
//! - `ui_builder`: Creates keyboards and formats messages

pub mod business;
pub mod callback_handler;
pub mod dialogue_manager;
pub mod message_handler;
pub mod referral;
pub mod ui_builder;

use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::config::BotConfig;
use crate::db::SqliteStore;
use crate::delivery::{send_single, DeliveryReport, DeliverySink, ReplyDelivery};
use crate::localization::t_lang;
use crate::responder::{EngineReply, ReplyEngine};

// Re-export main handler functions for use in main.rs
pub use business::{business_connection_handler, business_message_handler};
pub use callback_handler::callback_handler;
pub use message_handler::message_handler;

/// Shared state handed to every handler
pub struct AppState {
    pub config: BotConfig,
    pub store: Arc<SqliteStore>,
    pub engine: ReplyEngine,
    pub delivery: ReplyDelivery,
}

impl AppState {
    pub fn pool(&self) -> &SqlitePool {
        self.store.pool()
    }
}

/// Telegram language code of a user, if any
pub(crate) fn user_language(user: Option<&teloxide::types::User>) -> Option<&str> {
    user.and_then(|u| u.language_code.as_deref())
}

/// Send an engine decision through `sink`.
///
/// Stored responses and notices go out as one message; conversational
/// replies are fragmented and typed. A rate-limited generator is answered
/// with the fallback phrase after the configured backoff.
pub async fn send_engine_reply(
    sink: &dyn DeliverySink,
    delivery: &ReplyDelivery,
    chat_id: i64,
    reply_to: Option<i32>,
    reply: EngineReply,
    language_code: Option<&str>,
) -> DeliveryReport {
    debug!(chat_id, reply = ?reply, "Sending engine reply");
    match reply {
        EngineReply::Direct(text) => send_single(sink, chat_id, &text, reply_to).await,
        EngineReply::Alternatives(matches) => {
            let text = ui_builder::format_alternatives(&matches, language_code);
            send_single(sink, chat_id, &text, reply_to).await
        }
        EngineReply::NoData => {
            send_single(sink, chat_id, &t_lang("no-data", language_code), reply_to).await
        }
        EngineReply::Conversational(text) => {
            delivery.deliver_text(sink, chat_id, &text, reply_to).await
        }
        EngineReply::RateLimited { backoff } => {
            warn!(chat_id, backoff_secs = backoff.as_secs(), "Rate limited, sending fallback phrase");
            if let Err(e) = sink.send_typing_indicator(chat_id).await {
                warn!(chat_id, error = %e, "Failed to send typing indicator");
            }
            tokio::time::sleep(backoff).await;
            send_single(sink, chat_id, &t_lang("rate-limit-fallback", language_code), reply_to).await
        }
        EngineReply::Unavailable => {
            let text = t_lang("generation-unavailable", language_code);
            send_single(sink, chat_id, &text, reply_to).await
        }
        EngineReply::NoAnswer => {
            send_single(sink, chat_id, &t_lang("no-answer", language_code), reply_to).await
        }
    }
}
