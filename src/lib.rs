//! # Reply Telegram Bot
//!
//! A Telegram bot that answers messages from an uploaded base of phrases or
//! question/answer datasets, falls back to an OpenAI-compatible model, and
//! delivers conversational replies in human-like chunks with typing pauses.
//! It also runs a small referral program with an admin panel and can answer
//! customers on behalf of connected business accounts.

pub mod bot;
pub mod circuit_breaker;
pub mod config;
pub mod dataset;
pub mod db;
pub mod delivery;
pub mod dialogue;
pub mod fragmenter;
pub mod llm;
pub mod llm_config;
pub mod llm_errors;
pub mod localization;
pub mod matching;
pub mod responder;
pub mod selector;
pub mod store;
pub mod typing;
