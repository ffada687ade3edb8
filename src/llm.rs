//! # Reply Generation Module
//!
//! Client for OpenAI-compatible `/chat/completions` endpoints. Requests carry
//! the system prompt, the user's recent conversation history and, when a
//! dataset answer matched, that answer as extra context.
//!
//! Network errors and 5xx responses are retried with exponential backoff and
//! random jitter. Rate limits are returned immediately as
//! `LlmError::RateLimited` so the caller can run its own backoff path.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::circuit_breaker::CircuitBreaker;
use crate::llm_config::{GenerationConfig, RecoveryConfig};
use crate::llm_errors::LlmError;
use crate::store::{ConversationTurn, Role};

/// Source of generated replies
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    /// Generate a reply to `user_text`, given earlier turns (oldest first)
    /// and optional reference text.
    async fn generate(
        &self,
        history: &[ConversationTurn],
        user_text: &str,
        context: Option<&str>,
    ) -> Result<String, LlmError>;
}

/// One message of a chat completion request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    fn new(role: &'static str, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// Assemble the request messages: system prompt, optional context,
/// history in order, then the new user message.
pub fn build_messages(
    system_prompt: &str,
    history: &[ConversationTurn],
    user_text: &str,
    context: Option<&str>,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 3);
    messages.push(ChatMessage::new("system", system_prompt));

    if let Some(context) = context.filter(|c| !c.trim().is_empty()) {
        messages.push(ChatMessage::new(
            "system",
            format!("Relevant information from the knowledge base:\n{context}"),
        ));
    }

    for turn in history {
        let role = match turn.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        messages.push(ChatMessage::new(role, turn.text.clone()));
    }

    messages.push(ChatMessage::new("user", user_text));
    messages
}

/// Delay before retry number `attempt` (0-based): exponential, capped, plus
/// up to 25% random jitter.
pub fn retry_delay<R: Rng + ?Sized>(config: &RecoveryConfig, attempt: u32, rng: &mut R) -> Duration {
    let exponential = config
        .base_retry_delay_ms
        .saturating_mul(1u64 << attempt.min(16))
        .min(config.max_retry_delay_ms);
    let jitter = if exponential >= 4 {
        rng.gen_range(0..=exponential / 4)
    } else {
        0
    };
    Duration::from_millis(exponential + jitter)
}

/// HTTP client for the chat completion API
#[derive(Debug)]
pub struct GenerationClient {
    client: reqwest::Client,
    config: GenerationConfig,
    breaker: CircuitBreaker,
}

impl GenerationClient {
    pub fn new(config: GenerationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.recovery.operation_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        let breaker = CircuitBreaker::new(config.recovery.clone());
        Ok(Self {
            client,
            config,
            breaker,
        })
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    async fn request_once(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let api_key = self.config.api_key.as_deref().ok_or(LlmError::NotConfigured)?;
        let url = format!("{}/chat/completions", self.config.api_url.trim_end_matches('/'));
        let body = ChatRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        debug!(url = %url, model = %self.config.model, messages = messages.len(), "Calling generation API");

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::from_reqwest(&e))?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok());
        let text = response.text().await.map_err(|e| LlmError::from_reqwest(&e))?;

        if !status.is_success() {
            return Err(LlmError::from_status(status.as_u16(), &text, retry_after));
        }

        parse_completion(&text)
    }
}

/// Extract the first choice's text from a completion body
pub fn parse_completion(body: &str) -> Result<String, LlmError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or_else(|| LlmError::InvalidResponse("No reply content in response".to_string()))
}

#[async_trait]
impl ReplyGenerator for GenerationClient {
    async fn generate(
        &self,
        history: &[ConversationTurn],
        user_text: &str,
        context: Option<&str>,
    ) -> Result<String, LlmError> {
        if !self.config.is_enabled() {
            return Err(LlmError::NotConfigured);
        }
        if self.breaker.is_open() {
            warn!("Circuit breaker is open, skipping generation request");
            return Err(LlmError::CircuitOpen);
        }

        let messages = build_messages(&self.config.system_prompt, history, user_text, context);
        let max_attempts = self.config.recovery.max_retries.max(1);

        for attempt in 0..max_attempts {
            match self.request_once(&messages).await {
                Ok(reply) => {
                    self.breaker.record_success();
                    info!(attempt = attempt + 1, chars = reply.chars().count(), "Reply generated");
                    return Ok(reply);
                }
                Err(e) if e.is_retryable() && attempt + 1 < max_attempts => {
                    let delay = retry_delay(&self.config.recovery, attempt, &mut rand::thread_rng());
                    warn!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Generation request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    if e.is_service_failure() {
                        self.breaker.record_failure();
                    }
                    warn!(attempt = attempt + 1, error = %e, "Generation request failed");
                    return Err(e);
                }
            }
        }

        Err(LlmError::InvalidResponse("No attempts made".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn turn(role: Role, text: &str) -> ConversationTurn {
        ConversationTurn {
            user_id: 1,
            role,
            text: text.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_build_messages_order() {
        let history = vec![turn(Role::User, "hi"), turn(Role::Assistant, "hello!")];
        let messages = build_messages("be nice", &history, "price?", Some("Price is 10"));

        let roles: Vec<&str> = messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec!["system", "system", "user", "assistant", "user"]);
        assert!(messages[1].content.contains("Price is 10"));
        assert_eq!(messages[4].content, "price?");
    }

    #[test]
    fn test_blank_context_is_skipped() {
        let messages = build_messages("be nice", &[], "hi", Some("  "));
        assert_eq!(messages.len(), 2);
    }

    #[test]
    fn test_retry_delay_is_capped_with_jitter() {
        let config = RecoveryConfig::default();
        let mut rng = StdRng::seed_from_u64(1);

        let first = retry_delay(&config, 0, &mut rng);
        assert!(first >= Duration::from_millis(1000) && first <= Duration::from_millis(1250));

        let late = retry_delay(&config, 10, &mut rng);
        assert!(late >= Duration::from_millis(10000) && late <= Duration::from_millis(12500));
    }

    #[test]
    fn test_parse_completion() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"  Sure!  "}}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "Sure!");
        assert!(matches!(
            parse_completion(r#"{"choices":[]}"#),
            Err(LlmError::InvalidResponse(_))
        ));
        assert!(matches!(parse_completion("not json"), Err(LlmError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_generate_without_key_is_not_configured() {
        let client = GenerationClient::new(GenerationConfig::default()).unwrap();
        let result = client.generate(&[], "hi", None).await;
        assert_eq!(result, Err(LlmError::NotConfigured));
    }
}
