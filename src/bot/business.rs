//! Business module: replies sent on behalf of connected business accounts

use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{BusinessConnection, BusinessConnectionId, MessageKind};
use tracing::{debug, error, info, warn};

use crate::delivery::TelegramSink;
use crate::localization::t_lang;
use crate::store::ConnectionStore;

use super::{send_engine_reply, user_language, AppState};

/// Record (or forget) which account owns a business connection
pub async fn business_connection_handler(
    bot: Bot,
    connection: BusinessConnection,
    state: Arc<AppState>,
) -> Result<()> {
    let connection_id = connection.id.0.as_str();
    let owner_id = connection.user.id.0 as i64;
    let language_code = connection.user.language_code.as_deref();

    let key = if connection.is_enabled {
        state.store.set_owner(connection_id, owner_id).await?;
        info!(owner_id, connection_id, "Business connection enabled");
        "business-connected"
    } else {
        let removed = state.store.delete(connection_id).await?;
        info!(owner_id, connection_id, removed, "Business connection disabled");
        "business-disconnected"
    };

    if let Err(e) = bot
        .send_message(connection.user_chat_id, t_lang(key, language_code))
        .await
    {
        warn!(owner_id, error = %e, "Failed to notify business owner");
    }
    Ok(())
}

/// Connection a business message arrived through, if any
pub fn business_connection_id(msg: &Message) -> Option<BusinessConnectionId> {
    match &msg.kind {
        MessageKind::Common(common) => common.business_connection_id.clone(),
        _ => None,
    }
}

/// Answer a customer writing to a connected business account
pub async fn business_message_handler(bot: Bot, msg: Message, state: Arc<AppState>) -> Result<()> {
    let Some(connection_id) = business_connection_id(&msg) else {
        return Ok(());
    };
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let Some(owner_id) = state.store.get_owner(&connection_id.0).await? else {
        debug!(connection_id = %connection_id.0, "Message for an unknown business connection");
        return Ok(());
    };

    let Some(sender) = msg.from.as_ref() else {
        return Ok(());
    };
    // The owner's own messages in the chat are not answered
    if sender.id.0 as i64 == owner_id {
        return Ok(());
    }

    let user_id = sender.id.0 as i64;
    let language_code = user_language(msg.from.as_ref());
    debug!(user_id, owner_id, message_length = text.len(), "Received business message");

    let reply = match state.engine.reply(user_id, text.trim()).await {
        Ok(reply) => reply,
        Err(e) => {
            error!(user_id, owner_id, error = %e, "Failed to build business reply");
            return Ok(());
        }
    };

    let sink = TelegramSink::for_business(bot, connection_id);
    let report = send_engine_reply(
        &sink,
        &state.delivery,
        msg.chat.id.0,
        Some(msg.id.0),
        reply,
        language_code,
    )
    .await;
    debug!(user_id, sent = report.sent, failed = report.failed, aborted = report.aborted, "Business reply delivered");
    Ok(())
}
