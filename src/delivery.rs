//! # Delivery Module
//!
//! Sends a fragmented reply chunk by chunk, with typing indicators and
//! pauses taken from a `TypingPlan`:
//!
//! `Idle → InitialDelay → Typing(i) → Sending(i) → [InterChunkPause → Typing(i+1) …] → Idle`
//!
//! Only the first chunk carries the reply-to marker. Typing indicator
//! failures are logged and ignored; a failed text send either aborts the
//! remaining chunks or is skipped, depending on `SendFailurePolicy`.

use anyhow::Result;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use teloxide::prelude::*;
use teloxide::types::{BusinessConnectionId, ChatAction, MessageId, ReplyParameters};
use tracing::{debug, error, trace, warn};

use crate::config::SendFailurePolicy;
use crate::fragmenter::Fragmenter;
use crate::typing::{plan_typing, TypingConfig, TypingPlan};

/// Outbound side of a chat
#[async_trait]
pub trait DeliverySink: Send + Sync {
    async fn send_typing_indicator(&self, chat_id: i64) -> Result<()>;
    async fn send_text(&self, chat_id: i64, text: &str, reply_to: Option<i32>) -> Result<()>;
}

/// Sink backed by the Telegram Bot API.
///
/// With a business connection id set, messages are sent on behalf of the
/// business account that owns the connection.
#[derive(Clone)]
pub struct TelegramSink {
    bot: Bot,
    business_connection_id: Option<BusinessConnectionId>,
}

impl TelegramSink {
    pub fn new(bot: Bot) -> Self {
        Self {
            bot,
            business_connection_id: None,
        }
    }

    pub fn for_business(bot: Bot, connection_id: BusinessConnectionId) -> Self {
        Self {
            bot,
            business_connection_id: Some(connection_id),
        }
    }
}

#[async_trait]
impl DeliverySink for TelegramSink {
    async fn send_typing_indicator(&self, chat_id: i64) -> Result<()> {
        let mut request = self.bot.send_chat_action(ChatId(chat_id), ChatAction::Typing);
        if let Some(connection_id) = &self.business_connection_id {
            request = request.business_connection_id(connection_id.clone());
        }
        request.await?;
        Ok(())
    }

    async fn send_text(&self, chat_id: i64, text: &str, reply_to: Option<i32>) -> Result<()> {
        let mut request = self.bot.send_message(ChatId(chat_id), text);
        if let Some(message_id) = reply_to {
            request = request.reply_parameters(
                ReplyParameters::new(MessageId(message_id)).allow_sending_without_reply(),
            );
        }
        if let Some(connection_id) = &self.business_connection_id {
            request = request.business_connection_id(connection_id.clone());
        }
        request.await?;
        Ok(())
    }
}

/// Step of the per-reply delivery sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    Idle,
    InitialDelay,
    Typing(usize),
    Sending(usize),
    InterChunkPause(usize),
}

/// Outcome of delivering one reply
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub sent: usize,
    pub failed: usize,
    /// Remaining chunks were dropped after a failed send
    pub aborted: bool,
}

impl DeliveryReport {
    pub fn is_complete(&self, chunks: usize) -> bool {
        self.sent == chunks && self.failed == 0
    }
}

fn enter(state: &mut DeliveryState, next: DeliveryState, chat_id: i64) {
    trace!(chat_id, from = ?state, to = ?next, "Delivery state change");
    *state = next;
}

async fn pulse_typing(sink: &dyn DeliverySink, chat_id: i64) {
    if let Err(e) = sink.send_typing_indicator(chat_id).await {
        warn!(chat_id, error = %e, "Failed to send typing indicator");
    }
}

/// Run a typing plan against `sink`
pub async fn deliver(
    sink: &dyn DeliverySink,
    chat_id: i64,
    plan: &TypingPlan,
    reply_to: Option<i32>,
    policy: SendFailurePolicy,
) -> DeliveryReport {
    let mut report = DeliveryReport::default();
    let mut state = DeliveryState::Idle;

    enter(&mut state, DeliveryState::InitialDelay, chat_id);
    tokio::time::sleep(plan.initial_delay).await;

    let total = plan.chunks.len();
    for (index, chunk) in plan.chunks.iter().enumerate() {
        enter(&mut state, DeliveryState::Typing(index), chat_id);
        let spacing = chunk.indicator_spacing();
        for _ in 0..chunk.indicators.max(1) {
            pulse_typing(sink, chat_id).await;
            tokio::time::sleep(spacing).await;
        }

        enter(&mut state, DeliveryState::Sending(index), chat_id);
        let reply_marker = if index == 0 { reply_to } else { None };
        match sink.send_text(chat_id, &chunk.text, reply_marker).await {
            Ok(()) => {
                report.sent += 1;
                debug!(chat_id, chunk = index + 1, total, "Chunk sent");
            }
            Err(e) => {
                report.failed += 1;
                error!(chat_id, chunk = index + 1, total, error = %e, "Failed to send chunk");
                if policy == SendFailurePolicy::Abort {
                    report.aborted = index + 1 < total;
                    break;
                }
            }
        }

        if let Some(pause) = chunk.pause_after {
            enter(&mut state, DeliveryState::InterChunkPause(index), chat_id);
            tokio::time::sleep(pause).await;
        }
    }

    enter(&mut state, DeliveryState::Idle, chat_id);
    debug!(
        chat_id,
        sent = report.sent,
        failed = report.failed,
        aborted = report.aborted,
        "Delivery finished"
    );
    report
}

/// Fragmentation, timing and failure policy for human-like replies
#[derive(Debug, Clone, Default)]
pub struct ReplyDelivery {
    pub fragmenter: Fragmenter,
    pub typing: TypingConfig,
    pub policy: SendFailurePolicy,
}

impl ReplyDelivery {
    pub fn new(policy: SendFailurePolicy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    /// Fragment `text` and plan its timing
    pub fn plan<R: Rng + ?Sized>(&self, text: &str, rng: &mut R) -> TypingPlan {
        let chunks = self.fragmenter.split(text, rng);
        plan_typing(&self.typing, &chunks, rng)
    }

    /// Fragment, plan and deliver `text`
    pub async fn deliver_text(
        &self,
        sink: &dyn DeliverySink,
        chat_id: i64,
        text: &str,
        reply_to: Option<i32>,
    ) -> DeliveryReport {
        let plan = self.plan(text, &mut StdRng::from_entropy());
        debug!(
            chat_id,
            chunks = plan.chunks.len(),
            planned_ms = plan.total_duration().as_millis() as u64,
            "Delivering reply"
        );
        deliver(sink, chat_id, &plan, reply_to, self.policy).await
    }
}

/// Send one message right away, without typing simulation
pub async fn send_single(
    sink: &dyn DeliverySink,
    chat_id: i64,
    text: &str,
    reply_to: Option<i32>,
) -> DeliveryReport {
    pulse_typing(sink, chat_id).await;
    let mut report = DeliveryReport::default();
    match sink.send_text(chat_id, text, reply_to).await {
        Ok(()) => report.sent = 1,
        Err(e) => {
            report.failed = 1;
            error!(chat_id, error = %e, "Failed to send message");
        }
    }
    report
}
