//! Admin dialogue module for multi-step admin input.

use serde::{Deserialize, Serialize};
use teloxide::dispatching::dialogue::{Dialogue, InMemStorage};

/// Longest Telegram public username
pub const MAX_CHANNEL_NAME_LEN: usize = 32;
/// Shortest Telegram public username
pub const MIN_CHANNEL_NAME_LEN: usize = 5;

/// Conversation state for admin input
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub enum AdminDialogueState {
    #[default]
    Start,
    /// Next text message is the required channel's username
    WaitingForChannel { language_code: Option<String> },
}

pub type AdminDialogue = Dialogue<AdminDialogueState, InMemStorage<AdminDialogueState>>;

/// Validate a channel username, returning it normalized as `@name`
pub fn validate_channel_name(input: &str) -> Result<String, &'static str> {
    let trimmed = input.trim();
    let name = trimmed
        .strip_prefix("https://t.me/")
        .or_else(|| trimmed.strip_prefix("t.me/"))
        .unwrap_or(trimmed)
        .trim_start_matches('@');

    if name.is_empty() {
        return Err("empty");
    }

    if name.len() > MAX_CHANNEL_NAME_LEN {
        return Err("too_long");
    }

    let valid_chars = name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    let starts_with_letter = name.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
    if !valid_chars || !starts_with_letter || name.len() < MIN_CHANNEL_NAME_LEN {
        return Err("invalid");
    }

    Ok(format!("@{name}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_name_validation() {
        assert_eq!(validate_channel_name("@my_channel").unwrap(), "@my_channel");
        assert_eq!(validate_channel_name(" my_channel ").unwrap(), "@my_channel");
        assert_eq!(validate_channel_name("https://t.me/newsroom").unwrap(), "@newsroom");

        assert_eq!(validate_channel_name("   "), Err("empty"));
        assert_eq!(validate_channel_name("@"), Err("empty"));
        assert_eq!(validate_channel_name(&"a".repeat(33)), Err("too_long"));
        assert_eq!(validate_channel_name("abc"), Err("invalid"));
        assert_eq!(validate_channel_name("1channel"), Err("invalid"));
        assert_eq!(validate_channel_name("bad-name!"), Err("invalid"));
    }
}
