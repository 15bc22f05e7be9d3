use std::sync::Arc;

use teloxide::prelude::*;

use intui_core::{
    command::CallbackAction,
    domain::{MessageRef, UserId},
    formatting::escape_html,
    messaging::port::MessagingPort,
};

use crate::{message_ref, router::AppState};

const NO_SUCH_STYLE: &str = "Такого стиля нет";

pub async fn handle_callback(q: CallbackQuery, state: Arc<AppState>) -> ResponseResult<()> {
    let menu = q.message.as_ref().map(message_ref);
    let data = q.data.as_deref().unwrap_or_default();
    select_style(&state, &q.id, UserId(q.from.id.0 as i64), data, menu).await;
    Ok(())
}

/// Apply a style-menu press. Every query gets answered so the client stops
/// its spinner, even when the token is unknown.
pub(crate) async fn select_style(
    state: &AppState,
    callback_id: &str,
    user_id: UserId,
    data: &str,
    menu: Option<MessageRef>,
) {
    let messenger = &state.messenger;

    let Some(CallbackAction::SelectStyle(idx)) = CallbackAction::decode(data) else {
        tracing::debug!(%data, "ignoring unknown callback");
        let _ = messenger.answer_callback_query(callback_id, None).await;
        return;
    };

    // Tokens from a menu sent before a restart may point past the list.
    let Some(persona) = state.handler.personas().by_index(idx) else {
        let _ = messenger
            .answer_callback_query(callback_id, Some(NO_SUCH_STYLE))
            .await;
        return;
    };

    state.handler.sessions().set_style(user_id, &persona.name).await;
    tracing::info!(user = user_id.0, style = %persona.name, "style selected");

    if let Some(menu) = menu {
        let html = format!(
            "✨ Стиль толкования: <b>{}</b>\nТеперь расскажи мне свой сон.",
            escape_html(&persona.name)
        );
        if let Err(e) = messenger.edit_html(menu, &html).await {
            tracing::warn!(error = %e, "failed to update style menu");
        }
    }

    let _ = messenger
        .answer_callback_query(callback_id, Some(&format!("Стиль: {}", persona.name)))
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::tests::{state, FixedCompletion, RecordingMessenger, Sent};
    use intui_core::domain::{ChatId, MessageId};

    fn menu() -> Option<MessageRef> {
        Some(MessageRef {
            chat_id: ChatId(10),
            message_id: MessageId(7),
        })
    }

    fn setup() -> (Arc<RecordingMessenger>, AppState) {
        let messenger = Arc::new(RecordingMessenger::new(4096));
        let completion = Arc::new(FixedCompletion::replying("сон"));
        let state = state(&[], &messenger, &completion);
        (messenger, state)
    }

    #[tokio::test]
    async fn index_token_selects_style_and_updates_menu() {
        let (messenger, state) = setup();
        let mystic = state.handler.personas().position("Мистик").unwrap();
        let token = CallbackAction::SelectStyle(mystic).encode();

        select_style(&state, "cb1", UserId(1), &token, menu()).await;

        let session = state.handler.sessions().get_or_create(UserId(1)).await;
        assert_eq!(session.active_style(), "Мистик");
        assert_eq!(
            messenger.sent(),
            vec![
                Sent::Edit {
                    message_id: 7,
                    html: "✨ Стиль толкования: <b>Мистик</b>\nТеперь расскажи мне свой сон."
                        .to_string(),
                },
                Sent::Answer {
                    text: Some("Стиль: Мистик".to_string())
                },
            ]
        );
    }

    #[tokio::test]
    async fn out_of_range_index_keeps_current_style() {
        let (messenger, state) = setup();
        let token = CallbackAction::SelectStyle(99).encode();

        select_style(&state, "cb1", UserId(1), &token, menu()).await;

        let session = state.handler.sessions().get_or_create(UserId(1)).await;
        assert_eq!(session.active_style(), "Интуи");
        assert_eq!(
            messenger.sent(),
            vec![Sent::Answer {
                text: Some(NO_SUCH_STYLE.to_string())
            }]
        );
    }

    #[tokio::test]
    async fn unknown_data_is_answered_silently() {
        let (messenger, state) = setup();

        for data in ["", "style:", "style:-1", "Мистик", "color:1"] {
            select_style(&state, "cb1", UserId(1), data, menu()).await;
        }

        assert!(messenger
            .sent()
            .iter()
            .all(|s| *s == Sent::Answer { text: None }));
        assert_eq!(messenger.sent().len(), 5);
        let session = state.handler.sessions().get_or_create(UserId(1)).await;
        assert_eq!(session.active_style(), "Интуи");
    }
}
