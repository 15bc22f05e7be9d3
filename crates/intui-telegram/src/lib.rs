//! Telegram transport for Intui.
//!
//! `TelegramMessenger` is the outbound half (the core `MessagingPort` over the
//! Bot API). `router` and `handlers` are the inbound half.

use std::time::Duration;

use async_trait::async_trait;
use teloxide::{
    prelude::*,
    types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode},
    ApiError, RequestError,
};

pub mod handlers;
pub mod router;

use intui_core::{
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{ChatAction, InlineKeyboard, MessagingCapabilities},
    },
    Result,
};

/// Bot API limit on message text.
pub const MAX_MESSAGE_LEN: usize = 4096;

/// Style buttons per keyboard row.
const MENU_COLUMNS: usize = 2;

/// Longest flood-control pause worth waiting out inside one update.
const MAX_FLOOD_WAIT: Duration = Duration::from_secs(30);

pub(crate) fn core_chat(id: teloxide::types::ChatId) -> ChatId {
    ChatId(id.0)
}

pub(crate) fn message_ref(msg: &Message) -> MessageRef {
    MessageRef {
        chat_id: core_chat(msg.chat.id),
        message_id: MessageId(msg.id.0),
    }
}

fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
    teloxide::types::ChatId(chat_id.0)
}

/// Lay the style menu out in rows of `MENU_COLUMNS`.
fn menu_markup(keyboard: &InlineKeyboard) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(keyboard.buttons.chunks(MENU_COLUMNS).map(|row| {
        row.iter()
            .map(|b| InlineKeyboardButton::callback(b.label.clone(), b.callback_data.clone()))
            .collect::<Vec<_>>()
    }))
}

fn api_error(method: &str, e: RequestError) -> Error {
    Error::External(format!("telegram {method} failed: {e}"))
}

/// Bot API messenger used for user replies, menus and admin notifications.
#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    /// Run `request`, waiting out one short flood-control pause.
    async fn call<T, Fut>(
        &self,
        method: &'static str,
        mut request: impl FnMut() -> Fut,
    ) -> std::result::Result<T, RequestError>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, RequestError>>,
        Fut::IntoFuture: Send,
    {
        match request().await {
            Err(RequestError::RetryAfter(wait)) if wait <= MAX_FLOOD_WAIT => {
                tracing::warn!(method, ?wait, "telegram flood control");
                tokio::time::sleep(wait).await;
                request().await
            }
            other => other,
        }
    }

    async fn send(
        &self,
        chat_id: ChatId,
        html: &str,
        markup: Option<InlineKeyboardMarkup>,
    ) -> Result<MessageRef> {
        let msg = self
            .call("sendMessage", || {
                let req = self
                    .bot
                    .send_message(tg_chat(chat_id), html.to_string())
                    .parse_mode(ParseMode::Html)
                    .disable_web_page_preview(true);
                match markup.clone() {
                    Some(m) => req.reply_markup(m),
                    None => req,
                }
            })
            .await
            .map_err(|e| api_error("sendMessage", e))?;
        Ok(message_ref(&msg))
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            supports_edit: true,
            max_message_len: MAX_MESSAGE_LEN,
        }
    }

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        self.send(chat_id, html, None).await
    }

    async fn edit_html(&self, msg: MessageRef, html: &str) -> Result<()> {
        let edited = self
            .call("editMessageText", || {
                self.bot
                    .edit_message_text(
                        tg_chat(msg.chat_id),
                        teloxide::types::MessageId(msg.message_id.0),
                        html.to_string(),
                    )
                    .parse_mode(ParseMode::Html)
                    .disable_web_page_preview(true)
            })
            .await;
        match edited {
            // Same text twice, e.g. a style re-selected from an old menu.
            Ok(_) | Err(RequestError::Api(ApiError::MessageNotModified)) => Ok(()),
            Err(e) => Err(api_error("editMessageText", e)),
        }
    }

    async fn send_chat_action(&self, chat_id: ChatId, action: ChatAction) -> Result<()> {
        let action = match action {
            ChatAction::Typing => teloxide::types::ChatAction::Typing,
        };
        self.call("sendChatAction", || {
            self.bot.send_chat_action(tg_chat(chat_id), action)
        })
        .await
        .map_err(|e| api_error("sendChatAction", e))?;
        Ok(())
    }

    async fn send_inline_keyboard(
        &self,
        chat_id: ChatId,
        html: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef> {
        self.send(chat_id, html, Some(menu_markup(&keyboard))).await
    }

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        self.call("answerCallbackQuery", || {
            let req = self.bot.answer_callback_query(callback_id.to_string());
            match text {
                Some(t) => req.text(t.to_string()),
                None => req,
            }
        })
        .await
        .map_err(|e| api_error("answerCallbackQuery", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intui_core::persona::PersonaRegistry;
    use teloxide::types::InlineKeyboardButtonKind;

    #[test]
    fn style_menu_is_laid_out_in_pairs() {
        let registry = PersonaRegistry::builtin("Интуи").unwrap();
        let keyboard = InlineKeyboard::style_menu(&registry, Some("Интуи"));
        let markup = menu_markup(&keyboard);

        let rows = &markup.inline_keyboard;
        assert_eq!(rows.len(), registry.len().div_ceil(MENU_COLUMNS));
        assert!(rows.iter().all(|r| !r.is_empty() && r.len() <= MENU_COLUMNS));

        let first = &rows[0][0];
        assert_eq!(first.text, "✓ Интуи");
        assert_eq!(
            first.kind,
            InlineKeyboardButtonKind::CallbackData("style:0".to_string())
        );
        let flat: Vec<_> = rows.iter().flatten().map(|b| b.text.clone()).collect();
        assert_eq!(flat.len(), registry.len());
    }

    #[test]
    fn ids_map_both_ways() {
        let tg = tg_chat(ChatId(-100123));
        assert_eq!(tg, teloxide::types::ChatId(-100123));
        assert_eq!(core_chat(tg), ChatId(-100123));
    }
}
