//! # Storage Interfaces
//!
//! Async traits for everything the bot persists. `crate::db::SqliteStore`
//! implements all of them over one pooled SQLite database; tests may provide
//! in-memory fakes.

use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::matching::ResponseCandidate;

/// Author of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(anyhow::anyhow!("Unknown conversation role: {other}")),
        }
    }
}

/// One message of a user's conversation with the bot
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationTurn {
    pub user_id: i64,
    pub role: Role,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Question/answer row of an uploaded dataset
#[derive(Debug, Clone, PartialEq)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
    pub keywords: Vec<String>,
}

impl QaPair {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        let question = question.into();
        let keywords = crate::matching::extract_keywords(&question);
        Self {
            question,
            answer: answer.into(),
            keywords,
        }
    }

    pub fn to_candidate(&self) -> ResponseCandidate {
        ResponseCandidate {
            text: self.question.clone(),
            answer: Some(self.answer.clone()),
            keywords: self.keywords.clone(),
        }
    }
}

/// Plain response list
#[async_trait]
pub trait CandidateStore: Send + Sync {
    async fn list_candidates(&self) -> Result<Vec<String>>;
    /// Insert trimmed, non-blank texts; returns how many were stored
    async fn append(&self, texts: &[String]) -> Result<usize>;
    async fn clear(&self) -> Result<()>;
    async fn count(&self) -> Result<i64>;
}

/// Question/answer dataset
#[async_trait]
pub trait QaStore: Send + Sync {
    async fn list_pairs(&self) -> Result<Vec<QaPair>>;
    async fn insert_pairs(&self, pairs: &[QaPair]) -> Result<usize>;
    async fn clear_pairs(&self) -> Result<()>;
    async fn count_pairs(&self) -> Result<i64>;
}

/// Per-user conversation history
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append_turn(&self, user_id: i64, role: Role, text: &str) -> Result<()>;
    /// Most recent `limit` turns, oldest first
    async fn recent_turns(&self, user_id: i64, limit: usize) -> Result<Vec<ConversationTurn>>;
}

/// Business connection id → owning user
#[async_trait]
pub trait ConnectionStore: Send + Sync {
    async fn get_owner(&self, connection_id: &str) -> Result<Option<i64>>;
    async fn set_owner(&self, connection_id: &str, owner_id: i64) -> Result<()>;
    async fn delete(&self, connection_id: &str) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_through_str() {
        assert_eq!("user".parse::<Role>().unwrap(), Role::User);
        assert_eq!(Role::Assistant.to_string(), "assistant");
        assert!("system".parse::<Role>().is_err());
    }

    #[test]
    fn test_qa_pair_extracts_keywords_from_question() {
        let pair = QaPair::new("Where is the warehouse?", "In Kazan");
        assert_eq!(pair.keywords, vec!["warehouse"]);
        let candidate = pair.to_candidate();
        assert_eq!(candidate.reply(), "In Kazan");
    }
}
