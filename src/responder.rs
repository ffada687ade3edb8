//! # Reply Engine
//!
//! Decides what to answer to a free-text message:
//!
//! - `responses` mode ranks the stored responses and either answers with the
//!   top match or lists the best alternatives
//! - `dataset` mode answers from the question/answer dataset by keyword
//!   overlap and asks the generator when nothing matches
//! - `assistant` mode always asks the generator, passing the best dataset
//!   answer as context
//!
//! Matcher snapshots are rebuilt from the stores by `reload` and swapped in
//! under a lock, so queries never see a half-built index.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::{BotConfig, ReplyMode};
use crate::llm::ReplyGenerator;
use crate::llm_errors::LlmError;
use crate::matching::{overlap_ranking, CandidateIndex, MatchResult, ResponseCandidate};
use crate::selector::{select_ranking, Selection, Thresholds};
use crate::store::{CandidateStore, HistoryStore, QaStore, Role};

/// What the caller should send back
#[derive(Debug, Clone, PartialEq)]
pub enum EngineReply {
    /// Stored response, sent as one message
    Direct(String),
    /// Low confidence; list these matches
    Alternatives(Vec<MatchResult>),
    /// Nothing stored yet
    NoData,
    /// Reply delivered with fragmentation and typing simulation
    Conversational(String),
    /// Generator was rate limited; wait `backoff`, then send the fallback phrase
    RateLimited { backoff: Duration },
    /// Generator failed; ask the user to try later
    Unavailable,
    /// Dataset had no answer and no generator is configured
    NoAnswer,
}

/// Tunables taken from `BotConfig`
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub mode: ReplyMode,
    pub thresholds: Thresholds,
    pub top_k: usize,
    pub history_limit: usize,
    pub rate_limit_backoff: Duration,
}

impl EngineSettings {
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            mode: config.reply_mode,
            thresholds: config.thresholds.clone(),
            top_k: config.top_k,
            history_limit: config.history_limit,
            rate_limit_backoff: Duration::from_secs(config.generation.rate_limit_backoff_secs),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&BotConfig::default())
    }
}

/// Storage the engine reads and writes
#[derive(Clone)]
pub struct EngineStores {
    pub candidates: Arc<dyn CandidateStore>,
    pub qa: Arc<dyn QaStore>,
    pub history: Arc<dyn HistoryStore>,
}

impl EngineStores {
    /// Use one value for every store
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: CandidateStore + QaStore + HistoryStore + 'static,
    {
        Self {
            candidates: store.clone(),
            qa: store.clone(),
            history: store,
        }
    }
}

pub struct ReplyEngine {
    settings: EngineSettings,
    stores: EngineStores,
    generator: Option<Arc<dyn ReplyGenerator>>,
    index: RwLock<CandidateIndex>,
    qa: RwLock<Vec<ResponseCandidate>>,
}

impl ReplyEngine {
    pub fn new(
        settings: EngineSettings,
        stores: EngineStores,
        generator: Option<Arc<dyn ReplyGenerator>>,
    ) -> Self {
        Self {
            settings,
            stores,
            generator,
            index: RwLock::new(CandidateIndex::empty()),
            qa: RwLock::new(Vec::new()),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn mode(&self) -> ReplyMode {
        self.settings.mode
    }

    /// Rebuild matcher snapshots from storage; returns the entry count for
    /// the active mode.
    pub async fn reload(&self) -> Result<usize> {
        if self.settings.mode.uses_dataset() {
            let pairs = self
                .stores
                .qa
                .list_pairs()
                .await
                .context("Failed to load dataset")?;
            let candidates: Vec<ResponseCandidate> =
                pairs.iter().map(|pair| pair.to_candidate()).collect();
            let count = candidates.len();
            *self.qa.write().await = candidates;
            info!(pairs = count, "Dataset loaded");
            Ok(count)
        } else {
            let texts = self
                .stores
                .candidates
                .list_candidates()
                .await
                .context("Failed to load responses")?;
            let index = CandidateIndex::build(texts.into_iter().map(ResponseCandidate::plain).collect());
            let count = index.len();
            *self.index.write().await = index;
            info!(responses = count, "Response index rebuilt");
            Ok(count)
        }
    }

    /// Answer `text` from `user_id`
    pub async fn reply(&self, user_id: i64, text: &str) -> Result<EngineReply> {
        match self.settings.mode {
            ReplyMode::Responses => Ok(self.reply_from_responses(text).await),
            ReplyMode::Dataset => self.reply_from_dataset(user_id, text).await,
            ReplyMode::Assistant => self.reply_as_assistant(user_id, text).await,
        }
    }

    async fn reply_from_responses(&self, text: &str) -> EngineReply {
        let index = self.index.read().await;
        let ranking = index.find_best(text, self.settings.top_k);

        match select_ranking(&ranking, &self.settings.thresholds, self.settings.top_k) {
            Selection::Answer(best) => {
                debug!(matcher = %ranking.kind, score = best.score, "Answering with stored response");
                EngineReply::Direct(best.text)
            }
            Selection::Alternatives(matches) => EngineReply::Alternatives(matches),
            Selection::NoData => EngineReply::NoData,
        }
    }

    /// Best QA answer whose overlap meets the keyword threshold
    async fn best_dataset_answer(&self, text: &str) -> Option<String> {
        let qa = self.qa.read().await;
        let ranking = overlap_ranking(text, &qa, self.settings.top_k);
        match select_ranking(&ranking, &self.settings.thresholds, self.settings.top_k) {
            Selection::Answer(best) if best.score > 0.0 => {
                debug!(score = best.score, "Dataset answer accepted");
                Some(best.text)
            }
            _ => None,
        }
    }

    async fn reply_from_dataset(&self, user_id: i64, text: &str) -> Result<EngineReply> {
        if let Some(answer) = self.best_dataset_answer(text).await {
            debug!(user_id, "Answering from dataset");
            self.remember(user_id, text, &answer).await?;
            return Ok(EngineReply::Conversational(answer));
        }
        debug!(user_id, "No dataset match, asking generator");
        self.generate(user_id, text, None).await
    }

    async fn reply_as_assistant(&self, user_id: i64, text: &str) -> Result<EngineReply> {
        let context = self.best_dataset_answer(text).await;
        self.generate(user_id, text, context.as_deref()).await
    }

    async fn generate(
        &self,
        user_id: i64,
        text: &str,
        context: Option<&str>,
    ) -> Result<EngineReply> {
        let Some(generator) = &self.generator else {
            return Ok(EngineReply::NoAnswer);
        };

        let history = self
            .stores
            .history
            .recent_turns(user_id, self.settings.history_limit)
            .await
            .context("Failed to load conversation history")?;

        match generator.generate(&history, text, context).await {
            Ok(reply) => {
                self.remember(user_id, text, &reply).await?;
                Ok(EngineReply::Conversational(reply))
            }
            Err(LlmError::RateLimited(retry_after)) => {
                warn!(user_id, retry_after = ?retry_after, "Generation rate limited");
                Ok(EngineReply::RateLimited {
                    backoff: self.settings.rate_limit_backoff,
                })
            }
            Err(LlmError::NotConfigured) => Ok(EngineReply::NoAnswer),
            Err(e) => {
                warn!(user_id, error = %e, "Generation failed");
                Ok(EngineReply::Unavailable)
            }
        }
    }

    async fn remember(&self, user_id: i64, question: &str, answer: &str) -> Result<()> {
        self.stores
            .history
            .append_turn(user_id, Role::User, question)
            .await?;
        self.stores
            .history
            .append_turn(user_id, Role::Assistant, answer)
            .await
    }
}
