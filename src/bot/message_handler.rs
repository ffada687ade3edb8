//! Message Handler module for processing incoming Telegram messages

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use teloxide::prelude::*;
use teloxide::types::FileId;
use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn};

use crate::dataset::{parse_qa_dataset, parse_responses, DatasetStats};
use crate::delivery::TelegramSink;
use crate::dialogue::{AdminDialogue, AdminDialogueState};
use crate::localization::{t_args_lang, t_lang};
use crate::store::{CandidateStore, QaStore};

use super::dialogue_manager::handle_channel_input;
use super::referral::{handle_menu_button, handle_start};
use super::ui_builder::{admin_menu_keyboard, format_dataset_stats, MenuButton};
use super::{send_engine_reply, user_language, AppState};

/// Download a Telegram file into a temporary file, removed when dropped
pub async fn download_file(bot: &Bot, file_id: FileId) -> Result<NamedTempFile> {
    let file = bot.get_file(file_id).await?;
    let url = format!(
        "https://api.telegram.org/file/bot{}/{}",
        bot.token(),
        file.path
    );

    let response = reqwest::get(&url).await?.error_for_status()?;
    let bytes = response.bytes().await?;

    let mut temp_file = NamedTempFile::new()?;
    temp_file.as_file_mut().write_all(&bytes)?;
    Ok(temp_file)
}

/// Keep a copy of an upload under `uploads_dir`
async fn archive_upload(uploads_dir: &Path, file_name: &str, source: &Path) -> Result<()> {
    let safe_name = Path::new(file_name)
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "uploaded".to_string());

    tokio::fs::create_dir_all(uploads_dir)
        .await
        .with_context(|| format!("Failed to create {}", uploads_dir.display()))?;
    let destination = uploads_dir.join(safe_name);
    tokio::fs::copy(source, &destination)
        .await
        .with_context(|| format!("Failed to archive upload to {}", destination.display()))?;
    Ok(())
}

/// Split `/command@bot args` into the lowercase command and its arguments
pub fn parse_command(text: &str) -> Option<(String, Option<&str>)> {
    let rest = text.trim().strip_prefix('/')?;
    let (head, args) = match rest.split_once(char::is_whitespace) {
        Some((head, args)) => (head, Some(args.trim()).filter(|a| !a.is_empty())),
        None => (rest, None),
    };
    let command = head.split('@').next().unwrap_or(head);
    if command.is_empty() {
        return None;
    }
    Some((command.to_lowercase(), args))
}

fn sender_id(msg: &Message) -> Option<u64> {
    msg.from.as_ref().map(|user| user.id.0)
}

fn is_admin(state: &AppState, msg: &Message) -> bool {
    sender_id(msg).is_some_and(|id| state.config.is_admin(id))
}

async fn handle_command(
    bot: &Bot,
    msg: &Message,
    state: &AppState,
    command: &str,
    args: Option<&str>,
) -> Result<()> {
    let language_code = user_language(msg.from.as_ref());
    debug!(user_id = %msg.chat.id, command, "Received command");

    match command {
        "start" => handle_start(bot, msg, state, args).await?,
        "help" => {
            bot.send_message(msg.chat.id, t_lang("help-text", language_code))
                .await?;
        }
        "count" => {
            let text = if state.engine.mode().uses_dataset() {
                let count = state.store.count_pairs().await?;
                t_args_lang("count-dataset", &[("count", &count.to_string())], language_code)
            } else {
                let count = CandidateStore::count(state.store.as_ref()).await?;
                t_args_lang("count-responses", &[("count", &count.to_string())], language_code)
            };
            bot.send_message(msg.chat.id, text).await?;
        }
        "clear" => {
            if !is_admin(state, msg) {
                bot.send_message(msg.chat.id, t_lang("admin-only", language_code))
                    .await?;
                return Ok(());
            }
            if state.engine.mode().uses_dataset() {
                state.store.clear_pairs().await?;
            } else {
                CandidateStore::clear(state.store.as_ref()).await?;
            }
            state.engine.reload().await?;
            info!(user_id = %msg.chat.id, "Base cleared by admin");
            bot.send_message(msg.chat.id, t_lang("base-cleared", language_code))
                .await?;
        }
        "stats" => {
            let pairs = state.store.list_pairs().await?;
            let stats = DatasetStats::from_pairs(&pairs);
            bot.send_message(msg.chat.id, format_dataset_stats(&stats, language_code))
                .await?;
        }
        "admin" => {
            if !is_admin(state, msg) {
                bot.send_message(msg.chat.id, t_lang("admin-only", language_code))
                    .await?;
                return Ok(());
            }
            bot.send_message(msg.chat.id, t_lang("admin-panel", language_code))
                .reply_markup(admin_menu_keyboard(language_code))
                .await?;
        }
        other => debug!(user_id = %msg.chat.id, command = other, "Ignoring unknown command"),
    }
    Ok(())
}

async fn handle_free_text(bot: &Bot, msg: &Message, state: &AppState, text: &str) -> Result<()> {
    let language_code = user_language(msg.from.as_ref());
    let text = text.trim();
    if text.is_empty() {
        return Ok(());
    }

    let user_id = sender_id(msg).map(|id| id as i64).unwrap_or(msg.chat.id.0);
    let reply = match state.engine.reply(user_id, text).await {
        Ok(reply) => reply,
        Err(e) => {
            error!(user_id, error = %e, "Failed to build reply");
            bot.send_message(msg.chat.id, t_lang("error-generic", language_code))
                .await?;
            return Ok(());
        }
    };

    let sink = TelegramSink::new(bot.clone());
    let report = send_engine_reply(
        &sink,
        &state.delivery,
        msg.chat.id.0,
        Some(msg.id.0),
        reply,
        language_code,
    )
    .await;
    debug!(user_id, sent = report.sent, failed = report.failed, "Reply delivered");
    Ok(())
}

async fn handle_text_message(
    bot: &Bot,
    msg: &Message,
    state: &AppState,
    dialogue: AdminDialogue,
    text: &str,
) -> Result<()> {
    debug!(user_id = %msg.chat.id, message_length = text.len(), "Received text message from user");

    let language_code = user_language(msg.from.as_ref());

    // Check dialogue state first
    if let Some(AdminDialogueState::WaitingForChannel {
        language_code: dialogue_lang_code,
    }) = dialogue.get().await?
    {
        let effective_language_code = dialogue_lang_code.as_deref().or(language_code);
        return handle_channel_input(bot, msg, state, dialogue, text, effective_language_code)
            .await;
    }

    if let Some((command, args)) = parse_command(text) {
        return handle_command(bot, msg, state, &command, args).await;
    }

    if let Some(button) = MenuButton::from_text(text) {
        return handle_menu_button(bot, msg, state, button).await;
    }

    if msg.chat.is_private() {
        handle_free_text(bot, msg, state, text).await?;
    }
    Ok(())
}

async fn handle_document_message(bot: &Bot, msg: &Message, state: &AppState) -> Result<()> {
    let language_code = user_language(msg.from.as_ref());
    let Some(doc) = msg.document() else {
        return Ok(());
    };
    if !msg.chat.is_private() {
        return Ok(());
    }

    if !is_admin(state, msg) {
        bot.send_message(msg.chat.id, t_lang("upload-admin-only", language_code))
            .await?;
        return Ok(());
    }

    let file_name = doc.file_name.clone().unwrap_or_else(|| "uploaded".to_string());
    debug!(user_id = %msg.chat.id, file_name = %file_name, "Received upload from admin");

    let temp_file = match download_file(bot, doc.file.id.clone()).await {
        Ok(file) => file,
        Err(e) => {
            error!(user_id = %msg.chat.id, error = %e, "Failed to download upload");
            bot.send_message(msg.chat.id, t_lang("upload-download-failed", language_code))
                .await?;
            return Ok(());
        }
    };

    if let Err(e) = archive_upload(&state.config.uploads_dir, &file_name, temp_file.path()).await {
        warn!(error = %e, "Failed to archive upload");
    }

    let bytes = tokio::fs::read(temp_file.path())
        .await
        .context("Failed to read downloaded file")?;
    let content = String::from_utf8_lossy(&bytes);

    let added = if state.engine.mode().uses_dataset() {
        match parse_qa_dataset(&file_name, &content) {
            Ok(pairs) if pairs.is_empty() => None,
            Ok(pairs) => Some(Ok(state.store.insert_pairs(&pairs).await?)),
            Err(e) => Some(Err(e)),
        }
    } else {
        match parse_responses(&file_name, &content) {
            Ok(lines) if lines.is_empty() => None,
            Ok(lines) => Some(Ok(state.store.append(&lines).await?)),
            Err(e) => Some(Err(e)),
        }
    };

    match added {
        None => {
            bot.send_message(msg.chat.id, t_lang("upload-empty", language_code))
                .await?;
        }
        Some(Err(e)) => {
            warn!(user_id = %msg.chat.id, file_name = %file_name, error = %e, "Failed to parse upload");
            bot.send_message(msg.chat.id, t_lang("upload-parse-failed", language_code))
                .await?;
        }
        Some(Ok(added)) => {
            let total = state.engine.reload().await?;
            info!(user_id = %msg.chat.id, added, total, "Upload stored");
            bot.send_message(
                msg.chat.id,
                t_args_lang(
                    "upload-success",
                    &[("added", &added.to_string()), ("total", &total.to_string())],
                    language_code,
                ),
            )
            .await?;
        }
    }
    Ok(())
}

async fn handle_unsupported_message(bot: &Bot, msg: &Message) -> Result<()> {
    debug!(user_id = %msg.chat.id, "Received unsupported message type from user");
    if msg.chat.is_private() {
        let language_code = user_language(msg.from.as_ref());
        bot.send_message(msg.chat.id, t_lang("unsupported-message", language_code))
            .await?;
    }
    Ok(())
}

pub async fn message_handler(
    bot: Bot,
    msg: Message,
    state: Arc<AppState>,
    dialogue: AdminDialogue,
) -> Result<()> {
    if let Some(text) = msg.text() {
        handle_text_message(&bot, &msg, &state, dialogue, text).await?;
    } else if msg.document().is_some() {
        handle_document_message(&bot, &msg, &state).await?;
    } else {
        handle_unsupported_message(&bot, &msg).await?;
    }

    Ok(())
}
