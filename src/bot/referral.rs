//! Referral module: registration, subscription gate, rewards and the user menu

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, Recipient};
use tracing::{debug, info, warn};

use crate::db::{
    add_user, add_withdrawal, get_settings, get_user, has_pending_withdrawal, reward_referrer,
};
use crate::localization::{t_args_lang, t_lang};

use super::ui_builder::{
    format_profile, main_menu_keyboard, referral_link, subscription_keyboard, MenuButton,
};
use super::{user_language, AppState};

/// Whether `user_id` is a member of `channel` (stored as `@name`).
///
/// Any API failure counts as not subscribed.
pub async fn check_subscription(bot: &Bot, channel: &str, user_id: UserId) -> bool {
    match bot
        .get_chat_member(Recipient::ChannelUsername(channel.to_string()), user_id)
        .await
    {
        Ok(member) => member.kind.is_present(),
        Err(e) => {
            warn!(user_id = %user_id, channel, error = %e, "Failed to check subscription");
            false
        }
    }
}

/// Channel the user still has to join, if the gate is enabled
async fn pending_subscription(bot: &Bot, state: &AppState, user_id: UserId) -> Result<Option<String>> {
    let settings = get_settings(state.pool()).await?;
    if !settings.check_subscription || settings.required_channel.is_empty() {
        return Ok(None);
    }
    if check_subscription(bot, &settings.required_channel, user_id).await {
        Ok(None)
    } else {
        Ok(Some(settings.required_channel))
    }
}

/// Credit the stored referrer of `user_id` once and let them know
async fn grant_referral_reward(bot: &Bot, state: &AppState, user_id: i64) -> Result<()> {
    let Some(referrer_id) = get_user(state.pool(), user_id)
        .await?
        .and_then(|user| user.referrer_id)
    else {
        return Ok(());
    };

    let amount = state.config.referral.reward;
    if reward_referrer(state.pool(), user_id, referrer_id, amount).await? {
        let notice = t_args_lang("referral-reward-notice", &[("amount", &amount.to_string())], None);
        if let Err(e) = bot.send_message(ChatId(referrer_id), notice).await {
            warn!(referrer_id, error = %e, "Failed to notify referrer");
        }
    }
    Ok(())
}

/// Referrer id from the `/start` payload; self-referrals are dropped
pub fn parse_referrer(payload: Option<&str>, user_id: i64) -> Option<i64> {
    payload
        .and_then(|p| p.trim().parse::<i64>().ok())
        .filter(|&referrer| referrer != user_id && referrer > 0)
}

/// `/start [referrer_id]`
pub async fn handle_start(
    bot: &Bot,
    msg: &Message,
    state: &AppState,
    payload: Option<&str>,
) -> Result<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let language_code = user_language(msg.from.as_ref());
    let user_id = user.id.0 as i64;

    let referrer_id = parse_referrer(payload, user_id);
    add_user(state.pool(), user_id, user.username.as_deref(), referrer_id).await?;

    if let Some(channel) = pending_subscription(bot, state, user.id).await? {
        debug!(user_id, channel = %channel, "User must subscribe first");
        bot.send_message(msg.chat.id, t_lang("subscribe-required", language_code))
            .reply_markup(subscription_keyboard(&channel, language_code))
            .await?;
        return Ok(());
    }

    grant_referral_reward(bot, state, user_id).await?;

    bot.send_message(
        msg.chat.id,
        t_args_lang("welcome", &[("name", &user.full_name())], language_code),
    )
    .reply_markup(main_menu_keyboard(language_code))
    .await?;
    Ok(())
}

/// `check_sub` button; returns the alert to show when the user stays gated
pub async fn confirm_subscription(
    bot: &Bot,
    q: &CallbackQuery,
    state: &AppState,
) -> Result<Option<String>> {
    let language_code = q.from.language_code.as_deref();
    let settings = get_settings(state.pool()).await?;
    if !settings.check_subscription || settings.required_channel.is_empty() {
        return Ok(Some(t_lang("subscription-not-required", language_code)));
    }

    if !check_subscription(bot, &settings.required_channel, q.from.id).await {
        return Ok(Some(t_lang("subscription-missing", language_code)));
    }

    let user_id = q.from.id.0 as i64;
    grant_referral_reward(bot, state, user_id).await?;
    info!(user_id, "Subscription confirmed");

    if let Some(message) = &q.message {
        if let Err(e) = bot.delete_message(message.chat().id, message.id()).await {
            debug!(user_id, error = %e, "Could not delete subscription prompt");
        }
        bot.send_message(
            message.chat().id,
            t_lang("subscription-confirmed", language_code),
        )
        .reply_markup(main_menu_keyboard(language_code))
        .await?;
    }
    Ok(None)
}

async fn handle_profile(bot: &Bot, msg: &Message, state: &AppState, user_id: i64) -> Result<()> {
    let language_code = user_language(msg.from.as_ref());
    let text = match get_user(state.pool(), user_id).await? {
        Some(user) => format_profile(&user, language_code),
        None => t_lang("profile-not-found", language_code),
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

async fn handle_referral_link(bot: &Bot, msg: &Message, state: &AppState, user_id: UserId) -> Result<()> {
    let language_code = user_language(msg.from.as_ref());
    let me = bot.get_me().await?;
    let link = referral_link(me.username(), user_id.0);
    bot.send_message(
        msg.chat.id,
        t_args_lang(
            "referral-link",
            &[
                ("link", &link),
                ("reward", &state.config.referral.reward.to_string()),
            ],
            language_code,
        ),
    )
    .await?;
    Ok(())
}

async fn handle_withdrawal_request(
    bot: &Bot,
    msg: &Message,
    state: &AppState,
    user_id: i64,
) -> Result<()> {
    let language_code = user_language(msg.from.as_ref());
    let Some(user) = get_user(state.pool(), user_id).await? else {
        bot.send_message(msg.chat.id, t_lang("profile-not-found", language_code))
            .await?;
        return Ok(());
    };

    if has_pending_withdrawal(state.pool(), user_id).await? {
        bot.send_message(msg.chat.id, t_lang("withdraw-pending", language_code))
            .await?;
        return Ok(());
    }

    let min = state.config.referral.min_withdrawal;
    if user.balance < min {
        bot.send_message(
            msg.chat.id,
            t_args_lang(
                "withdraw-too-low",
                &[("min", &min.to_string()), ("balance", &user.balance.to_string())],
                language_code,
            ),
        )
        .await?;
        return Ok(());
    }

    let withdrawal_id = add_withdrawal(state.pool(), user_id, user.balance).await?;
    info!(user_id, withdrawal_id, amount = user.balance, "Withdrawal requested");
    bot.send_message(msg.chat.id, t_lang("withdraw-created", language_code))
        .await?;

    let display_name = user
        .username
        .as_deref()
        .map(|name| format!("@{name}"))
        .unwrap_or_else(|| user_id.to_string());
    let notice = t_args_lang(
        "withdraw-admin-notice",
        &[
            ("user", &display_name),
            ("id", &user_id.to_string()),
            ("amount", &user.balance.to_string()),
        ],
        None,
    );
    for admin_id in &state.config.admin_ids {
        if let Err(e) = bot.send_message(UserId(*admin_id), notice.clone()).await {
            warn!(admin_id, error = %e, "Failed to notify admin about withdrawal");
        }
    }
    Ok(())
}

/// Route a main menu button press
pub async fn handle_menu_button(
    bot: &Bot,
    msg: &Message,
    state: &AppState,
    button: MenuButton,
) -> Result<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    debug!(user_id = %user.id, button = ?button, "Menu button pressed");

    match button {
        MenuButton::Profile => handle_profile(bot, msg, state, user.id.0 as i64).await,
        MenuButton::ReferralLink => handle_referral_link(bot, msg, state, user.id).await,
        MenuButton::Withdraw => handle_withdrawal_request(bot, msg, state, user.id.0 as i64).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_referrer() {
        assert_eq!(parse_referrer(Some("12345"), 1), Some(12345));
        assert_eq!(parse_referrer(Some(" 12345 "), 1), Some(12345));
        assert_eq!(parse_referrer(Some("12345"), 12345), None);
        assert_eq!(parse_referrer(Some("abc"), 1), None);
        assert_eq!(parse_referrer(Some("-5"), 1), None);
        assert_eq!(parse_referrer(None, 1), None);
    }
}
