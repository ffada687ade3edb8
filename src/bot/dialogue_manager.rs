//! Dialogue Manager module for handling dialogue state transitions

use anyhow::Result;
use teloxide::prelude::*;
use tracing::{debug, info};

use crate::db::{get_settings, update_settings};
use crate::dialogue::{validate_channel_name, AdminDialogue};
use crate::localization::{t_args_lang, t_lang};

use super::ui_builder::{format_settings, settings_keyboard};
use super::AppState;

/// Handle the channel username typed after pressing "Change channel"
pub async fn handle_channel_input(
    bot: &Bot,
    msg: &Message,
    state: &AppState,
    dialogue: AdminDialogue,
    input: &str,
    language_code: Option<&str>,
) -> Result<()> {
    match validate_channel_name(input) {
        Ok(channel) => {
            let settings = get_settings(state.pool()).await?;
            update_settings(state.pool(), &channel, settings.check_subscription).await?;
            info!(user_id = %msg.chat.id, channel = %channel, "Required channel updated");

            bot.send_message(
                msg.chat.id,
                t_args_lang("channel-set", &[("channel", &channel)], language_code),
            )
            .await?;

            dialogue.exit().await?;

            let settings = get_settings(state.pool()).await?;
            bot.send_message(msg.chat.id, format_settings(&settings, language_code))
                .reply_markup(settings_keyboard(&settings, language_code))
                .await?;
        }
        Err(reason) => {
            debug!(user_id = %msg.chat.id, reason, "Rejected channel name");
            let key = match reason {
                "too_long" => "channel-too-long",
                _ => "channel-invalid",
            };
            // Stay in the waiting state so the admin can retry
            bot.send_message(msg.chat.id, t_lang(key, language_code))
                .await?;
        }
    }
    Ok(())
}
