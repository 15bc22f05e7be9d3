//! Telegram update handlers.
//!
//! Each endpoint decodes the teloxide update once (command, text, callback
//! token) into plain ids and hands over to a function that only sees
//! `AppState` and the messaging port.

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{CallbackQuery, Message},
};

use intui_core::{
    command::Command, domain::ChatId, formatting::split_html, messaging::port::MessagingPort,
};

use crate::{core_chat, router::AppState};

mod callback;
mod commands;
mod text;

const TEXT_ONLY: &str = "Я понимаю только текст 🌙 Опиши свой сон словами.";

pub async fn handle_callback(q: CallbackQuery, state: Arc<AppState>) -> ResponseResult<()> {
    callback::handle_callback(q, state).await
}

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    if let Some(text) = msg.text() {
        if let Some(cmd) = Command::parse(text) {
            return commands::handle_command(msg, state, cmd).await;
        }
        return text::handle_text(msg, state).await;
    }

    send_or_log(&state.messenger, core_chat(msg.chat.id), TEXT_ONLY).await;
    Ok(())
}

/// Send `html`, split to the messenger's length limit; failures are logged.
pub(crate) async fn send_or_log(messenger: &Arc<dyn MessagingPort>, chat_id: ChatId, html: &str) {
    let limit = messenger.capabilities().max_message_len;
    for chunk in split_html(html, limit) {
        if let Err(e) = messenger.send_html(chat_id, &chunk).await {
            tracing::error!(chat = chat_id.0, error = %e, "failed to send message");
            return;
        }
    }
}
