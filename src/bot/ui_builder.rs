//! UI Builder module for creating keyboards and formatting messages

use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup,
};

use crate::dataset::DatasetStats;
use crate::db::{Settings, User, Withdrawal};
use crate::localization::{t_args_lang, t_lang, DEFAULT_LANGUAGE};
use crate::matching::MatchResult;

/// Languages whose menu labels are recognized
const MENU_LANGUAGES: &[&str] = &[DEFAULT_LANGUAGE, "ru"];

/// Button of the persistent main menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuButton {
    Profile,
    ReferralLink,
    Withdraw,
}

impl MenuButton {
    const ALL: [MenuButton; 3] = [MenuButton::Profile, MenuButton::ReferralLink, MenuButton::Withdraw];

    fn key(&self) -> &'static str {
        match self {
            MenuButton::Profile => "menu-profile",
            MenuButton::ReferralLink => "menu-referral",
            MenuButton::Withdraw => "menu-withdraw",
        }
    }

    /// Match a message text against the labels of every menu language
    pub fn from_text(text: &str) -> Option<Self> {
        let text = text.trim();
        Self::ALL.into_iter().find(|button| {
            MENU_LANGUAGES
                .iter()
                .any(|language| t_lang(button.key(), Some(language)) == text)
        })
    }
}

/// Data carried by inline keyboard buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    CheckSubscription,
    AdminMenu,
    AdminSettings,
    ToggleSubscriptionCheck,
    SetChannel,
    AdminStats,
    AdminWithdrawals,
    WithdrawalDetail(i64),
    ApproveWithdrawal(i64),
    RejectWithdrawal(i64),
}

impl CallbackAction {
    pub fn parse(data: &str) -> Option<Self> {
        let action = match data {
            "check_sub" => CallbackAction::CheckSubscription,
            "admin_back" => CallbackAction::AdminMenu,
            "admin_settings" => CallbackAction::AdminSettings,
            "toggle_sub_check" => CallbackAction::ToggleSubscriptionCheck,
            "set_channel" => CallbackAction::SetChannel,
            "admin_stats" => CallbackAction::AdminStats,
            "admin_withdrawals" => CallbackAction::AdminWithdrawals,
            _ => {
                let (prefix, id) = data.split_once('_')?;
                let id: i64 = id.parse().ok()?;
                match prefix {
                    "withdraw" => CallbackAction::WithdrawalDetail(id),
                    "approve" => CallbackAction::ApproveWithdrawal(id),
                    "reject" => CallbackAction::RejectWithdrawal(id),
                    _ => return None,
                }
            }
        };
        Some(action)
    }

    pub fn data(&self) -> String {
        match self {
            CallbackAction::CheckSubscription => "check_sub".to_string(),
            CallbackAction::AdminMenu => "admin_back".to_string(),
            CallbackAction::AdminSettings => "admin_settings".to_string(),
            CallbackAction::ToggleSubscriptionCheck => "toggle_sub_check".to_string(),
            CallbackAction::SetChannel => "set_channel".to_string(),
            CallbackAction::AdminStats => "admin_stats".to_string(),
            CallbackAction::AdminWithdrawals => "admin_withdrawals".to_string(),
            CallbackAction::WithdrawalDetail(id) => format!("withdraw_{id}"),
            CallbackAction::ApproveWithdrawal(id) => format!("approve_{id}"),
            CallbackAction::RejectWithdrawal(id) => format!("reject_{id}"),
        }
    }

    /// Only admins may trigger this action
    pub fn requires_admin(&self) -> bool {
        !matches!(self, CallbackAction::CheckSubscription)
    }
}

fn callback_button(text: String, action: CallbackAction) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(text, action.data())
}

/// Persistent reply keyboard with the user menu
pub fn main_menu_keyboard(language_code: Option<&str>) -> KeyboardMarkup {
    KeyboardMarkup::new(
        MenuButton::ALL
            .iter()
            .map(|button| vec![KeyboardButton::new(t_lang(button.key(), language_code))]),
    )
    .resize_keyboard()
}

/// `https://t.me/<name>` for a channel stored as `@name`
pub fn channel_url(channel: &str) -> Option<reqwest::Url> {
    let name = channel.trim().trim_start_matches('@');
    if name.is_empty() {
        return None;
    }
    reqwest::Url::parse(&format!("https://t.me/{name}")).ok()
}

/// Subscribe link plus the re-check button
pub fn subscription_keyboard(channel: &str, language_code: Option<&str>) -> InlineKeyboardMarkup {
    let mut rows = Vec::new();
    if let Some(url) = channel_url(channel) {
        rows.push(vec![InlineKeyboardButton::url(
            t_lang("subscribe-button", language_code),
            url,
        )]);
    }
    rows.push(vec![callback_button(
        t_lang("check-subscription-button", language_code),
        CallbackAction::CheckSubscription,
    )]);
    InlineKeyboardMarkup::new(rows)
}

pub fn admin_menu_keyboard(language_code: Option<&str>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![callback_button(
            t_lang("admin-settings-button", language_code),
            CallbackAction::AdminSettings,
        )],
        vec![callback_button(
            t_lang("admin-stats-button", language_code),
            CallbackAction::AdminStats,
        )],
        vec![callback_button(
            t_lang("admin-withdrawals-button", language_code),
            CallbackAction::AdminWithdrawals,
        )],
    ])
}

fn status_text(enabled: bool, language_code: Option<&str>) -> String {
    if enabled {
        t_lang("status-enabled", language_code)
    } else {
        t_lang("status-disabled", language_code)
    }
}

pub fn settings_keyboard(settings: &Settings, language_code: Option<&str>) -> InlineKeyboardMarkup {
    let status = status_text(settings.check_subscription, language_code);
    InlineKeyboardMarkup::new(vec![
        vec![callback_button(
            t_args_lang("toggle-subscription-button", &[("status", &status)], language_code),
            CallbackAction::ToggleSubscriptionCheck,
        )],
        vec![callback_button(
            t_lang("set-channel-button", language_code),
            CallbackAction::SetChannel,
        )],
        vec![callback_button(
            t_lang("back-button", language_code),
            CallbackAction::AdminMenu,
        )],
    ])
}

pub fn format_settings(settings: &Settings, language_code: Option<&str>) -> String {
    let channel = if settings.required_channel.is_empty() {
        t_lang("channel-not-set", language_code)
    } else {
        settings.required_channel.clone()
    };
    let status = status_text(settings.check_subscription, language_code);
    t_args_lang(
        "settings-text",
        &[("channel", &channel), ("status", &status)],
        language_code,
    )
}

pub fn subscription_toggled_text(enabled: bool, language_code: Option<&str>) -> String {
    let status = status_text(enabled, language_code);
    t_args_lang("subscription-toggled", &[("status", &status)], language_code)
}

pub fn withdrawals_keyboard(
    withdrawals: &[Withdrawal],
    language_code: Option<&str>,
) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = withdrawals
        .iter()
        .map(|w| {
            let label = t_args_lang(
                "withdrawal-button",
                &[
                    ("id", &w.id.to_string()),
                    ("amount", &w.amount.to_string()),
                    ("user", &w.user_id.to_string()),
                ],
                language_code,
            );
            vec![callback_button(label, CallbackAction::WithdrawalDetail(w.id))]
        })
        .collect();
    rows.push(vec![callback_button(
        t_lang("back-button", language_code),
        CallbackAction::AdminMenu,
    )]);
    InlineKeyboardMarkup::new(rows)
}

pub fn withdrawal_action_keyboard(id: i64, language_code: Option<&str>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![callback_button(
            t_lang("approve-button", language_code),
            CallbackAction::ApproveWithdrawal(id),
        )],
        vec![callback_button(
            t_lang("reject-button", language_code),
            CallbackAction::RejectWithdrawal(id),
        )],
        vec![callback_button(
            t_lang("back-button", language_code),
            CallbackAction::AdminWithdrawals,
        )],
    ])
}

pub fn format_withdrawal(withdrawal: &Withdrawal, language_code: Option<&str>) -> String {
    t_args_lang(
        "withdrawal-detail",
        &[
            ("id", &withdrawal.id.to_string()),
            ("user", &withdrawal.user_id.to_string()),
            ("amount", &withdrawal.amount.to_string()),
            ("created", &withdrawal.created_at.format("%Y-%m-%d").to_string()),
        ],
        language_code,
    )
}

pub fn format_profile(user: &User, language_code: Option<&str>) -> String {
    t_args_lang(
        "profile",
        &[
            ("balance", &user.balance.to_string()),
            ("referrals", &user.referrals_count.to_string()),
            ("joined", &user.joined_at.format("%Y-%m-%d").to_string()),
        ],
        language_code,
    )
}

pub fn referral_link(bot_username: &str, user_id: u64) -> String {
    format!("https://t.me/{bot_username}?start={user_id}")
}

/// Low-confidence reply: one `- (score) text` line per match
pub fn format_alternatives(matches: &[MatchResult], language_code: Option<&str>) -> String {
    let mut reply = t_lang("alternatives-header", language_code);
    reply.push_str("\n\n");
    for m in matches {
        reply.push_str(&format!("- ({:.2}) {}\n", m.score, m.text));
    }
    reply.push('\n');
    reply.push_str(&t_lang("alternatives-footer", language_code));
    reply
}

pub fn format_dataset_stats(stats: &DatasetStats, language_code: Option<&str>) -> String {
    if stats.is_empty() {
        return t_lang("stats-empty", language_code);
    }
    t_args_lang(
        "stats-summary",
        &[
            ("total", &stats.total.to_string()),
            ("question", &format!("{:.0}", stats.avg_question_len)),
            ("answer", &format!("{:.0}", stats.avg_answer_len)),
        ],
        language_code,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_action_round_trip() {
        for action in [
            CallbackAction::CheckSubscription,
            CallbackAction::AdminMenu,
            CallbackAction::AdminWithdrawals,
            CallbackAction::WithdrawalDetail(42),
            CallbackAction::ApproveWithdrawal(7),
            CallbackAction::RejectWithdrawal(7),
        ] {
            assert_eq!(CallbackAction::parse(&action.data()), Some(action));
        }
        assert_eq!(CallbackAction::parse("approve_x"), None);
        assert_eq!(CallbackAction::parse("unknown"), None);
    }

    #[test]
    fn test_check_subscription_is_public() {
        assert!(!CallbackAction::CheckSubscription.requires_admin());
        assert!(CallbackAction::AdminStats.requires_admin());
    }

    #[test]
    fn test_channel_url() {
        assert_eq!(
            channel_url("@news_room").map(|u| u.to_string()),
            Some("https://t.me/news_room".to_string())
        );
        assert_eq!(channel_url(""), None);
    }

    #[test]
    fn test_referral_link() {
        assert_eq!(referral_link("reply_bot", 12345), "https://t.me/reply_bot?start=12345");
    }
}
