use std::sync::Arc;
use std::time::Duration;

use teloxide::prelude::*;

use intui_core::{
    domain::{ChatId, MessageRef, UserId},
    formatting::split_html,
    handler::OutboundReply,
    messaging::{port::MessagingPort, types::ChatAction},
    ratelimit::RateDecision,
};

use super::send_or_log;
use crate::{core_chat, router::AppState};

const THINKING: &str = "Я думаю над твоим сном...";
const TYPING_EVERY: Duration = Duration::from_secs(4);

pub async fn handle_text(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let (Some(user), Some(text)) = (msg.from(), msg.text()) else {
        return Ok(());
    };
    interpret(&state, UserId(user.id.0 as i64), core_chat(msg.chat.id), text).await;
    Ok(())
}

/// Rate limit, acknowledge, interpret and deliver one dream description.
pub(crate) async fn interpret(state: &AppState, user_id: UserId, chat_id: ChatId, text: &str) {
    let messenger = &state.messenger;

    if text.trim().is_empty() {
        send_or_log(messenger, chat_id, &OutboundReply::EmptyInput.to_html()).await;
        return;
    }

    let decision = state.rate_limiter.lock().await.check(user_id);
    if let RateDecision::Limited { retry_after } = decision {
        tracing::info!(user = user_id.0, ?retry_after, "rate limited");
        let wait = retry_after.as_secs_f64().ceil().max(1.0);
        send_or_log(
            messenger,
            chat_id,
            &format!("⏳ Сны любят тишину. Подожди {wait:.0} сек. и расскажи снова."),
        )
        .await;
        return;
    }

    let ack = match messenger.send_html(chat_id, THINKING).await {
        Ok(r) => Some(r),
        Err(e) => {
            tracing::warn!(error = %e, "failed to send thinking message");
            None
        }
    };

    let (stop_tx, mut stop_rx) = tokio::sync::oneshot::channel::<()>();
    let typing_messenger = messenger.clone();
    let typing_task = tokio::spawn(async move {
        let mut tick = tokio::time::interval(TYPING_EVERY);
        loop {
            tokio::select! {
              _ = tick.tick() => {
                let _ = typing_messenger.send_chat_action(chat_id, ChatAction::Typing).await;
              }
              _ = &mut stop_rx => break,
            }
        }
    });

    let reply = state.handler.handle(user_id, text).await;

    let _ = stop_tx.send(());
    let _ = typing_task.await;

    deliver(messenger, chat_id, ack, &reply.to_html()).await;
}

/// Put the reply where the "thinking" message was, overflow in follow-ups.
///
/// A failed edit falls back to sending the whole reply as new messages.
async fn deliver(
    messenger: &Arc<dyn MessagingPort>,
    chat_id: ChatId,
    ack: Option<MessageRef>,
    html: &str,
) {
    let caps = messenger.capabilities();
    let ack = ack.filter(|_| caps.supports_edit);
    let chunks = split_html(html, caps.max_message_len);

    let rest = match (ack, chunks.split_first()) {
        (Some(ack), Some((first, rest))) => match messenger.edit_html(ack, first).await {
            Ok(()) => rest,
            Err(e) => {
                tracing::warn!(error = %e, "edit failed, sending a new message");
                &chunks[..]
            }
        },
        _ => &chunks[..],
    };

    for chunk in rest {
        if let Err(e) = messenger.send_html(chat_id, chunk).await {
            tracing::error!(chat = chat_id.0, error = %e, "failed to deliver reply");
            return;
        }
    }
}
