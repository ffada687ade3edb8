//! # Localization Tests
//!
//! This module contains unit tests for the localization functionality,
//! testing message retrieval and formatting with various edge cases.

use fluent_bundle::{FluentArgs, FluentValue};
use replybot::localization::{t, t_args_lang, t_lang, LocalizationManager};

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_localization() -> LocalizationManager {
        // Create a new localization manager for each test
        LocalizationManager::new().expect("Failed to create localization manager")
    }

    #[test]
    fn test_get_message_existing_key() {
        let manager = setup_localization();

        let message = manager.get_message_in_language("help-text", "en", None);
        assert!(message.contains("/count"));

        let message = manager.get_message_in_language("help-text", "ru", None);
        assert!(message.contains("Команды"));
    }

    #[test]
    fn test_get_message_nonexistent_key() {
        let manager = setup_localization();

        let message = manager.get_message_in_language("does-not-exist", "en", None);
        assert_eq!(message, "Missing translation: does-not-exist");
    }

    #[test]
    fn test_unsupported_language_falls_back_to_english() {
        let manager = setup_localization();
        assert!(!manager.is_language_supported("de"));

        let english = manager.get_message_in_language("admin-panel", "en", None);
        assert_eq!(manager.get_message_in_language("admin-panel", "de", None), english);
        assert_eq!(t_lang("admin-panel", Some("de-DE")), english);
    }

    #[test]
    fn test_message_with_arguments() {
        let manager = setup_localization();

        let mut args = FluentArgs::new();
        args.set("added", FluentValue::from("5"));
        args.set("total", FluentValue::from("12"));
        let message = manager.get_message_in_language("upload-success", "en", Some(&args));
        assert!(message.contains('5'));
        assert!(message.contains("12"));
        // Arguments are inserted without bidi isolation marks
        assert!(!message.contains('\u{2068}'));
    }

    #[test]
    fn test_helpers_use_language_codes() {
        assert_eq!(t("rate-limit-fallback"), t_lang("rate-limit-fallback", None));
        assert_ne!(
            t_lang("rate-limit-fallback", Some("ru-RU")),
            t_lang("rate-limit-fallback", Some("en"))
        );

        let text = t_args_lang("channel-set", &[("channel", "@shop_news")], Some("ru"));
        assert!(text.contains("@shop_news"));
    }
}
