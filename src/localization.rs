//! # Localization Module
//!
//! Fluent bundles for every supported language, embedded at compile time.
//! Lookups fall back to English when the user's language is unknown or the
//! key is missing in that language.

use std::collections::HashMap;
use std::sync::OnceLock;

use anyhow::{anyhow, Result};
use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource, FluentValue};
use tracing::{debug, warn};
use unic_langid::LanguageIdentifier;

pub const DEFAULT_LANGUAGE: &str = "en";

const RESOURCES: &[(&str, &str)] = &[
    ("en", include_str!("../locales/en/main.ftl")),
    ("ru", include_str!("../locales/ru/main.ftl")),
];

/// Localization manager for the bot
pub struct LocalizationManager {
    bundles: HashMap<String, FluentBundle<FluentResource>>,
}

impl LocalizationManager {
    /// Create a manager holding every embedded language
    pub fn new() -> Result<Self> {
        let mut bundles = HashMap::new();
        for (language, source) in RESOURCES {
            let locale: LanguageIdentifier = language.parse()?;
            bundles.insert(language.to_string(), Self::create_bundle(locale, source)?);
        }
        Ok(Self { bundles })
    }

    fn create_bundle(
        locale: LanguageIdentifier,
        source: &str,
    ) -> Result<FluentBundle<FluentResource>> {
        let resource = FluentResource::try_new(source.to_string())
            .map_err(|(_, errors)| anyhow!("Failed to parse {locale} resource: {errors:?}"))?;

        let mut bundle = FluentBundle::new_concurrent(vec![locale.clone()]);
        // Telegram shows the bidi isolation marks as garbage
        bundle.set_use_isolating(false);
        bundle
            .add_resource(resource)
            .map_err(|errors| anyhow!("Failed to add {locale} resource: {errors:?}"))?;
        Ok(bundle)
    }

    pub fn is_language_supported(&self, language: &str) -> bool {
        self.bundles.contains_key(language)
    }

    /// Supported bundle for a Telegram language code such as `ru-RU`
    pub fn resolve_language(&self, language_code: Option<&str>) -> &str {
        language_code
            .and_then(|code| code.split(['-', '_']).next())
            .map(str::to_lowercase)
            .and_then(|code| self.bundles.get_key_value(code.as_str()))
            .map(|(key, _)| key.as_str())
            .unwrap_or(DEFAULT_LANGUAGE)
    }

    /// Get a localized message
    pub fn get_message_in_language(
        &self,
        key: &str,
        language: &str,
        args: Option<&FluentArgs<'_>>,
    ) -> String {
        if let Some(text) = self.format(key, language, args) {
            return text;
        }
        if language != DEFAULT_LANGUAGE {
            debug!(key, language, "Falling back to default language");
            if let Some(text) = self.format(key, DEFAULT_LANGUAGE, args) {
                return text;
            }
        }
        warn!(key, "Missing translation");
        format!("Missing translation: {key}")
    }

    fn format(&self, key: &str, language: &str, args: Option<&FluentArgs<'_>>) -> Option<String> {
        let bundle = self.bundles.get(language)?;
        let pattern = bundle.get_message(key)?.value()?;
        let mut errors = Vec::new();
        let value = bundle.format_pattern(pattern, args, &mut errors);
        if !errors.is_empty() {
            warn!(key, language, ?errors, "Errors while formatting message");
        }
        Some(value.into_owned())
    }
}

static LOCALIZATION_MANAGER: OnceLock<LocalizationManager> = OnceLock::new();

/// Initialize the global localization manager; later calls are no-ops
pub fn init_localization() -> Result<()> {
    if LOCALIZATION_MANAGER.get().is_none() {
        let manager = LocalizationManager::new()?;
        let _ = LOCALIZATION_MANAGER.set(manager);
    }
    Ok(())
}

/// Get the global localization manager, initializing it on first use
pub fn get_localization_manager() -> Option<&'static LocalizationManager> {
    if let Some(manager) = LOCALIZATION_MANAGER.get() {
        return Some(manager);
    }
    match LocalizationManager::new() {
        Ok(manager) => Some(LOCALIZATION_MANAGER.get_or_init(|| manager)),
        Err(e) => {
            warn!(error = %e, "Localization unavailable");
            None
        }
    }
}

/// Localized message for a Telegram language code
pub fn t_lang(key: &str, language_code: Option<&str>) -> String {
    t_args_lang(key, &[], language_code)
}

/// Localized message with arguments for a Telegram language code
pub fn t_args_lang(key: &str, args: &[(&str, &str)], language_code: Option<&str>) -> String {
    let Some(manager) = get_localization_manager() else {
        return format!("Missing translation: {key}");
    };

    let language = manager.resolve_language(language_code);
    if args.is_empty() {
        return manager.get_message_in_language(key, language, None);
    }

    let mut fluent_args = FluentArgs::new();
    for (name, value) in args {
        fluent_args.set(*name, FluentValue::from(*value));
    }
    manager.get_message_in_language(key, language, Some(&fluent_args))
}

/// English message
pub fn t(key: &str) -> String {
    t_lang(key, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_language() {
        let manager = LocalizationManager::new().unwrap();
        assert_eq!(manager.resolve_language(Some("ru-RU")), "ru");
        assert_eq!(manager.resolve_language(Some("EN")), "en");
        assert_eq!(manager.resolve_language(Some("de")), "en");
        assert_eq!(manager.resolve_language(None), "en");
    }

    #[test]
    fn test_every_english_key_exists_in_russian() {
        let manager = LocalizationManager::new().unwrap();
        let english = manager.bundles.get("en").unwrap();
        let russian = manager.bundles.get("ru").unwrap();

        let source = RESOURCES[0].1;
        for line in source.lines() {
            let Some((key, _)) = line.split_once(" =") else {
                continue;
            };
            if key.starts_with([' ', '#', '.']) || key.is_empty() {
                continue;
            }
            assert!(english.has_message(key), "en is missing {key}");
            assert!(russian.has_message(key), "ru is missing {key}");
        }
    }
}
