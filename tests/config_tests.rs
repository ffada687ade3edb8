use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Result;
use replybot::config::{BotConfig, ReplyMode, SendFailurePolicy};

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn test_defaults_with_only_token() -> Result<()> {
    let config = BotConfig::from_lookup(lookup(&[("TELEGRAM_BOT_TOKEN", "123:abc")]))?;

    assert_eq!(config.telegram_token, "123:abc");
    assert_eq!(config.database_url, "sqlite://replybot.db");
    assert!(config.admin_ids.is_empty());
    assert_eq!(config.reply_mode, ReplyMode::Responses);
    assert_eq!(config.thresholds.tfidf, 0.45);
    assert_eq!(config.thresholds.sequence, 0.4);
    assert_eq!(config.top_k, 3);
    assert_eq!(config.history_limit, 10);
    assert_eq!(config.send_failure_policy, SendFailurePolicy::Abort);
    assert_eq!(config.referral.reward, 12);
    assert_eq!(config.referral.min_withdrawal, 600);
    assert_eq!(config.uploads_dir, PathBuf::from("uploads"));
    assert!(!config.generation.is_enabled());
    assert_eq!(config.generation.rate_limit_backoff_secs, 5);
    Ok(())
}

#[test]
fn test_missing_token_is_an_error() {
    assert!(BotConfig::from_lookup(lookup(&[])).is_err());
    assert!(BotConfig::from_lookup(lookup(&[("TELEGRAM_BOT_TOKEN", "  ")])).is_err());
}

#[test]
fn test_overrides() -> Result<()> {
    let config = BotConfig::from_lookup(lookup(&[
        ("TELEGRAM_BOT_TOKEN", "t"),
        ("DATABASE_URL", "sqlite::memory:"),
        ("ADMIN_IDS", "10, 20"),
        ("REPLY_MODE", "assistant"),
        ("SIM_THRESHOLD", "0.3"),
        ("FUZZY_THRESHOLD", "0.5"),
        ("TOP_K", "5"),
        ("HISTORY_LIMIT", "4"),
        ("SEND_FAILURE_POLICY", "continue"),
        ("REFERRAL_REWARD", "20"),
        ("MIN_WITHDRAWAL", "1000"),
        ("UPLOADS_DIR", "/tmp/replybot"),
        ("LLM_API_KEY", "sk-test"),
        ("LLM_MODEL", "local-model"),
        ("RATE_LIMIT_BACKOFF_SECS", "2"),
    ]))?;

    assert_eq!(config.admin_ids, vec![10, 20]);
    assert_eq!(config.reply_mode, ReplyMode::Assistant);
    assert_eq!(config.thresholds.tfidf, 0.3);
    assert_eq!(config.thresholds.sequence, 0.5);
    assert_eq!(config.top_k, 5);
    assert_eq!(config.history_limit, 4);
    assert_eq!(config.send_failure_policy, SendFailurePolicy::Continue);
    assert_eq!(config.referral.reward, 20);
    assert_eq!(config.referral.min_withdrawal, 1000);
    assert_eq!(config.uploads_dir, PathBuf::from("/tmp/replybot"));
    assert!(config.generation.is_enabled());
    assert_eq!(config.generation.model, "local-model");
    assert_eq!(config.generation.rate_limit_backoff_secs, 2);
    Ok(())
}

#[test]
fn test_invalid_numbers_are_errors() {
    let result = BotConfig::from_lookup(lookup(&[
        ("TELEGRAM_BOT_TOKEN", "t"),
        ("TOP_K", "many"),
    ]));
    assert!(result.is_err());
}

#[test]
fn test_admin_check() {
    let open = BotConfig::default();
    assert!(open.is_admin(1));

    let restricted = BotConfig {
        admin_ids: vec![5],
        ..BotConfig::default()
    };
    assert!(restricted.is_admin(5));
    assert!(!restricted.is_admin(6));
}
