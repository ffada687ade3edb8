//! # Bot Configuration Module
//!
//! Everything the bot reads from the environment (after `.env` is loaded).
//! `BotConfig::from_lookup` does the actual parsing against any key lookup,
//! so tests never touch the process environment.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use tracing::warn;

use crate::llm_config::{GenerationConfig, DEFAULT_API_URL, DEFAULT_MODEL};
use crate::selector::{Thresholds, DEFAULT_TOP_N};

pub const DEFAULT_DATABASE_URL: &str = "sqlite://replybot.db";
pub const DEFAULT_HISTORY_LIMIT: usize = 10;
pub const DEFAULT_REFERRAL_REWARD: i64 = 12;
pub const DEFAULT_MIN_WITHDRAWAL: i64 = 600;
pub const DEFAULT_UPLOADS_DIR: &str = "uploads";

/// How free-text messages are answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplyMode {
    /// Pick a stored response by similarity
    #[default]
    Responses,
    /// Answer from the question/answer dataset, generator as fallback
    Dataset,
    /// Always generate, with the dataset answer as context
    Assistant,
}

impl FromStr for ReplyMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "responses" => Ok(ReplyMode::Responses),
            "dataset" => Ok(ReplyMode::Dataset),
            "assistant" => Ok(ReplyMode::Assistant),
            other => Err(anyhow!("Unknown reply mode: {other}")),
        }
    }
}

impl ReplyMode {
    /// Uploads in this mode are question/answer datasets
    pub fn uses_dataset(&self) -> bool {
        matches!(self, ReplyMode::Dataset | ReplyMode::Assistant)
    }
}

/// What to do with the remaining chunks after a failed send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SendFailurePolicy {
    #[default]
    Abort,
    Continue,
}

impl FromStr for SendFailurePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "abort" => Ok(SendFailurePolicy::Abort),
            "continue" => Ok(SendFailurePolicy::Continue),
            other => Err(anyhow!("Unknown send failure policy: {other}")),
        }
    }
}

/// Referral program settings
#[derive(Debug, Clone, PartialEq)]
pub struct ReferralConfig {
    pub reward: i64,
    pub min_withdrawal: i64,
}

impl Default for ReferralConfig {
    fn default() -> Self {
        Self {
            reward: DEFAULT_REFERRAL_REWARD,
            min_withdrawal: DEFAULT_MIN_WITHDRAWAL,
        }
    }
}

/// Complete bot configuration
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub telegram_token: String,
    pub database_url: String,
    /// Empty means every user is an admin
    pub admin_ids: Vec<u64>,
    pub reply_mode: ReplyMode,
    pub thresholds: Thresholds,
    pub top_k: usize,
    pub history_limit: usize,
    pub send_failure_policy: SendFailurePolicy,
    pub referral: ReferralConfig,
    pub uploads_dir: PathBuf,
    pub generation: GenerationConfig,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            telegram_token: String::new(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            admin_ids: Vec::new(),
            reply_mode: ReplyMode::default(),
            thresholds: Thresholds::default(),
            top_k: DEFAULT_TOP_N,
            history_limit: DEFAULT_HISTORY_LIMIT,
            send_failure_policy: SendFailurePolicy::default(),
            referral: ReferralConfig::default(),
            uploads_dir: PathBuf::from(DEFAULT_UPLOADS_DIR),
            generation: GenerationConfig::default(),
        }
    }
}

fn parse_var<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(value) => value
            .parse::<T>()
            .map_err(|e| anyhow!("Invalid value for {key} ({value}): {e}")),
        None => Ok(default),
    }
}

/// Parse a comma separated list of Telegram user ids
pub fn parse_admin_ids(raw: &str) -> Result<Vec<u64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| {
            id.parse::<u64>()
                .with_context(|| format!("Invalid admin id: {id}"))
        })
        .collect()
}

impl BotConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let telegram_token = lookup("TELEGRAM_BOT_TOKEN")
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| anyhow!("TELEGRAM_BOT_TOKEN must be set"))?;

        let admin_ids = parse_admin_ids(&lookup("ADMIN_IDS").unwrap_or_default())?;
        if admin_ids.is_empty() {
            warn!("ADMIN_IDS is empty; every user has admin rights");
        }

        let thresholds = Thresholds {
            tfidf: parse_var(&lookup, "SIM_THRESHOLD", defaults.thresholds.tfidf)?,
            sequence: parse_var(&lookup, "FUZZY_THRESHOLD", defaults.thresholds.sequence)?,
            keyword_overlap: defaults.thresholds.keyword_overlap,
        };

        let generation = GenerationConfig {
            api_url: lookup("LLM_API_URL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            api_key: lookup("LLM_API_KEY").filter(|v| !v.trim().is_empty()),
            model: lookup("LLM_MODEL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            system_prompt: lookup("LLM_SYSTEM_PROMPT")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.generation.system_prompt),
            temperature: parse_var(&lookup, "LLM_TEMPERATURE", defaults.generation.temperature)?,
            max_tokens: parse_var(&lookup, "LLM_MAX_TOKENS", defaults.generation.max_tokens)?,
            rate_limit_backoff_secs: parse_var(
                &lookup,
                "RATE_LIMIT_BACKOFF_SECS",
                defaults.generation.rate_limit_backoff_secs,
            )?,
            recovery: defaults.generation.recovery,
        };

        Ok(Self {
            telegram_token,
            database_url: lookup("DATABASE_URL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.database_url),
            admin_ids,
            reply_mode: parse_var(&lookup, "REPLY_MODE", defaults.reply_mode)?,
            thresholds,
            top_k: parse_var(&lookup, "TOP_K", defaults.top_k)?.max(1),
            history_limit: parse_var(&lookup, "HISTORY_LIMIT", defaults.history_limit)?,
            send_failure_policy: parse_var(
                &lookup,
                "SEND_FAILURE_POLICY",
                defaults.send_failure_policy,
            )?,
            referral: ReferralConfig {
                reward: parse_var(&lookup, "REFERRAL_REWARD", defaults.referral.reward)?,
                min_withdrawal: parse_var(
                    &lookup,
                    "MIN_WITHDRAWAL",
                    defaults.referral.min_withdrawal,
                )?,
            },
            uploads_dir: lookup("UPLOADS_DIR")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.uploads_dir),
            generation,
        })
    }

    /// Whether `user_id` may use admin commands
    pub fn is_admin(&self, user_id: u64) -> bool {
        self.admin_ids.is_empty() || self.admin_ids.contains(&user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_admin_ids() {
        assert_eq!(parse_admin_ids("1, 2,,3").unwrap(), vec![1, 2, 3]);
        assert!(parse_admin_ids("").unwrap().is_empty());
        assert!(parse_admin_ids("abc").is_err());
    }

    #[test]
    fn test_mode_and_policy_parsing() {
        assert_eq!("Dataset".parse::<ReplyMode>().unwrap(), ReplyMode::Dataset);
        assert!("chat".parse::<ReplyMode>().is_err());
        assert_eq!(
            " continue ".parse::<SendFailurePolicy>().unwrap(),
            SendFailurePolicy::Continue
        );
    }
}
