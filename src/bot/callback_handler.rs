//! Callback Handler module for processing inline keyboard callback queries

use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, InlineKeyboardMarkup, MessageId};
use teloxide::{ApiError, RequestError};
use tracing::{debug, info, warn};

use crate::db::{
    decide_withdrawal, get_pending_withdrawal, get_pending_withdrawals, get_settings,
    get_total_balance, get_total_users, update_settings, WithdrawalStatus,
};
use crate::dialogue::{AdminDialogue, AdminDialogueState};
use crate::localization::{t_args_lang, t_lang};

use super::referral::confirm_subscription;
use super::ui_builder::{
    admin_menu_keyboard, format_settings, format_withdrawal, settings_keyboard,
    subscription_toggled_text, withdrawal_action_keyboard, withdrawals_keyboard, CallbackAction,
};
use super::AppState;

/// Replace the text and keyboard of the message the button belongs to
async fn edit_menu(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    text: String,
    keyboard: InlineKeyboardMarkup,
) -> Result<()> {
    match bot
        .edit_message_text(chat_id, message_id, text)
        .reply_markup(keyboard)
        .await
    {
        Ok(_) => Ok(()),
        // Pressing the same button twice leaves the message unchanged
        Err(RequestError::Api(ApiError::MessageNotModified)) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Handle an admin action; returns the notice shown on the button press
async fn handle_admin_action(
    bot: &Bot,
    q: &CallbackQuery,
    state: &AppState,
    dialogue: AdminDialogue,
    action: CallbackAction,
    chat_id: ChatId,
    message_id: MessageId,
) -> Result<Option<String>> {
    let language_code = q.from.language_code.as_deref();

    match action {
        CallbackAction::CheckSubscription => return Ok(None),
        CallbackAction::AdminMenu => {
            edit_menu(
                bot,
                chat_id,
                message_id,
                t_lang("admin-panel", language_code),
                admin_menu_keyboard(language_code),
            )
            .await?;
        }
        CallbackAction::AdminSettings => {
            let settings = get_settings(state.pool()).await?;
            edit_menu(
                bot,
                chat_id,
                message_id,
                format_settings(&settings, language_code),
                settings_keyboard(&settings, language_code),
            )
            .await?;
        }
        CallbackAction::ToggleSubscriptionCheck => {
            let settings = get_settings(state.pool()).await?;
            let enabled = !settings.check_subscription;
            update_settings(state.pool(), &settings.required_channel, enabled).await?;
            info!(user_id = %q.from.id, enabled, "Subscription check toggled");

            let settings = get_settings(state.pool()).await?;
            edit_menu(
                bot,
                chat_id,
                message_id,
                format_settings(&settings, language_code),
                settings_keyboard(&settings, language_code),
            )
            .await?;
            return Ok(Some(subscription_toggled_text(enabled, language_code)));
        }
        CallbackAction::SetChannel => {
            dialogue
                .update(AdminDialogueState::WaitingForChannel {
                    language_code: language_code.map(str::to_string),
                })
                .await?;
            bot.send_message(chat_id, t_lang("channel-prompt", language_code))
                .await?;
        }
        CallbackAction::AdminStats => {
            let users = get_total_users(state.pool()).await?;
            let balance = get_total_balance(state.pool()).await?;
            edit_menu(
                bot,
                chat_id,
                message_id,
                t_args_lang(
                    "stats-text",
                    &[("users", &users.to_string()), ("balance", &balance.to_string())],
                    language_code,
                ),
                admin_menu_keyboard(language_code),
            )
            .await?;
        }
        CallbackAction::AdminWithdrawals => {
            let withdrawals = get_pending_withdrawals(state.pool()).await?;
            let text = if withdrawals.is_empty() {
                t_lang("withdrawals-empty", language_code)
            } else {
                t_lang("withdrawals-title", language_code)
            };
            edit_menu(
                bot,
                chat_id,
                message_id,
                text,
                withdrawals_keyboard(&withdrawals, language_code),
            )
            .await?;
        }
        CallbackAction::WithdrawalDetail(id) => {
            let Some(withdrawal) = get_pending_withdrawal(state.pool(), id).await? else {
                return Ok(Some(t_lang("withdrawal-processed", language_code)));
            };
            edit_menu(
                bot,
                chat_id,
                message_id,
                format_withdrawal(&withdrawal, language_code),
                withdrawal_action_keyboard(id, language_code),
            )
            .await?;
        }
        CallbackAction::ApproveWithdrawal(id) | CallbackAction::RejectWithdrawal(id) => {
            let (status, user_key, notice_key) = match action {
                CallbackAction::ApproveWithdrawal(_) => (
                    WithdrawalStatus::Approved,
                    "withdrawal-approved-user",
                    "withdrawal-approved",
                ),
                _ => (
                    WithdrawalStatus::Rejected,
                    "withdrawal-rejected-user",
                    "withdrawal-rejected",
                ),
            };

            let Some(withdrawal) = decide_withdrawal(state.pool(), id, status).await? else {
                return Ok(Some(t_lang("withdrawal-processed", language_code)));
            };

            let user_notice = t_args_lang(
                user_key,
                &[("amount", &withdrawal.amount.to_string())],
                None,
            );
            if let Err(e) = bot
                .send_message(ChatId(withdrawal.user_id), user_notice)
                .await
            {
                warn!(user_id = withdrawal.user_id, error = %e, "Failed to notify user about withdrawal");
            }

            let withdrawals = get_pending_withdrawals(state.pool()).await?;
            let text = if withdrawals.is_empty() {
                t_lang("withdrawals-empty", language_code)
            } else {
                t_lang("withdrawals-title", language_code)
            };
            edit_menu(
                bot,
                chat_id,
                message_id,
                text,
                withdrawals_keyboard(&withdrawals, language_code),
            )
            .await?;
            return Ok(Some(t_lang(notice_key, language_code)));
        }
    }
    Ok(None)
}

/// Handle callback queries from inline keyboards
pub async fn callback_handler(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
    dialogue: AdminDialogue,
) -> Result<()> {
    debug!(user_id = %q.from.id, data = ?q.data, "Received callback query from user");

    let language_code = q.from.language_code.as_deref();
    let action = q.data.as_deref().and_then(CallbackAction::parse);

    let notice = match action {
        None => None,
        Some(action) if action.requires_admin() && !state.config.is_admin(q.from.id.0) => {
            warn!(user_id = %q.from.id, action = ?action, "Non-admin pressed an admin button");
            Some(t_lang("admin-no-access", language_code))
        }
        Some(CallbackAction::CheckSubscription) => confirm_subscription(&bot, &q, &state).await?,
        Some(action) => match &q.message {
            Some(message) => {
                handle_admin_action(
                    &bot,
                    &q,
                    &state,
                    dialogue,
                    action,
                    message.chat().id,
                    message.id(),
                )
                .await?
            }
            None => None,
        },
    };

    let mut answer = bot.answer_callback_query(q.id.clone());
    if let Some(text) = notice {
        answer = answer.text(text).show_alert(true);
    }
    answer.await?;

    Ok(())
}
