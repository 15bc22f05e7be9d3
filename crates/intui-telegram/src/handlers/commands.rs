use std::sync::Arc;

use teloxide::prelude::*;

use intui_core::{
    command::Command,
    domain::{ChatId, UserId},
    formatting::{escape_html, render_history},
    messaging::{port::MessagingPort, types::InlineKeyboard},
};

use super::send_or_log;
use crate::{core_chat, router::AppState};

const HELP: &str = "🌙 <b>Интуи</b> толкует сны.\n\n\
Просто опиши свой сон сообщением, и я расскажу, что он может значить.\n\n\
/style — выбрать стиль толкования\n\
/history — последние толкования\n\
/reset — начать заново\n\
/help — эта подсказка";

const MENU_PROMPT: &str = "🔮 Выбери стиль толкования:";

/// Who sent a command, reduced to what the commands need.
pub(crate) struct Caller {
    pub user_id: UserId,
    pub chat_id: ChatId,
    pub first_name: String,
}

pub async fn handle_command(msg: Message, state: Arc<AppState>, cmd: Command) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let caller = Caller {
        user_id: UserId(user.id.0 as i64),
        chat_id: core_chat(msg.chat.id),
        first_name: user.first_name.clone(),
    };
    run_command(&state, &caller, cmd).await;
    Ok(())
}

pub(crate) async fn run_command(state: &AppState, caller: &Caller, cmd: Command) {
    let sessions = state.handler.sessions();
    let (user_id, chat_id) = (caller.user_id, caller.chat_id);

    tracing::debug!(user = user_id.0, command = ?cmd, "command");

    match cmd {
        Command::Start => {
            let session = sessions.get_or_create(user_id).await;
            let greeting = format!(
                "Привет, <a href=\"tg://user?id={}\">{}</a>! ✨\n\
Я — Интуи, твой проводник по миру снов. Расскажи, что тебе приснилось.",
                user_id.0,
                escape_html(&caller.first_name)
            );
            send_or_log(&state.messenger, chat_id, &greeting).await;
            send_style_menu(state, chat_id, session.active_style()).await;
        }
        Command::Style => {
            let session = sessions.get_or_create(user_id).await;
            send_style_menu(state, chat_id, session.active_style()).await;
        }
        Command::Reset => {
            sessions.reset(user_id).await;
            let html = format!(
                "🔄 Начнём сначала. Стиль: <b>{}</b>, история очищена.",
                escape_html(state.handler.personas().default_style())
            );
            send_or_log(&state.messenger, chat_id, &html).await;
        }
        Command::History => {
            let history = sessions.history(user_id).await;
            send_or_log(&state.messenger, chat_id, &render_history(&history)).await;
        }
        Command::Stats if state.cfg.is_admin(chat_id) => {
            let html = stats_html(state).await;
            send_or_log(&state.messenger, chat_id, &html).await;
        }
        Command::Stats | Command::Help | Command::Unknown(_) => {
            send_or_log(&state.messenger, chat_id, HELP).await;
        }
    }
}

async fn send_style_menu(state: &AppState, chat_id: ChatId, active: &str) {
    let personas = state.handler.personas();
    // Show the persona actually in effect, even if the stored name is stale.
    let active = personas.resolve(active).name.as_str();
    let keyboard = InlineKeyboard::style_menu(personas, Some(active));
    if let Err(e) = state
        .messenger
        .send_inline_keyboard(chat_id, MENU_PROMPT, keyboard)
        .await
    {
        tracing::warn!(error = %e, "failed to send style menu");
    }
}

async fn stats_html(state: &AppState) -> String {
    let usage = state.handler.usage().snapshot().await;
    let failures = state.handler.monitor().recent_failures().await;
    let sessions = state.handler.sessions().len().await;

    format!(
        "📊 <b>Статистика</b> (с {})\n\n\
Сессий: {sessions}\n\
Запросов с учётом токенов: {}\n\
Токены: {} вход / {} выход / {} всего\n\
Ошибок за окно {} мин: {failures}",
        usage.since.format("%Y-%m-%d %H:%M"),
        usage.requests,
        usage.prompt_tokens,
        usage.completion_tokens,
        usage.total_tokens,
        state.cfg.failure_window.as_secs() / 60,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::tests::{state, FixedCompletion, RecordingMessenger, Sent};
    use intui_core::session::Interaction;

    fn caller(chat: i64) -> Caller {
        Caller {
            user_id: UserId(1),
            chat_id: ChatId(chat),
            first_name: "<Аня>".to_string(),
        }
    }

    fn setup(extra: &[(&str, &str)]) -> (Arc<RecordingMessenger>, AppState) {
        let messenger = Arc::new(RecordingMessenger::new(4096));
        let completion = Arc::new(FixedCompletion::replying("сон"));
        let state = state(extra, &messenger, &completion);
        (messenger, state)
    }

    #[tokio::test]
    async fn stats_are_for_admin_chats_only() {
        let (messenger, state) = setup(&[("ADMIN_CHAT_IDS", "99")]);

        run_command(&state, &caller(5), Command::Stats).await;
        run_command(&state, &caller(99), Command::Stats).await;

        assert_eq!(messenger.html_to(5), vec![HELP.to_string()]);
        let admin = messenger.html_to(99);
        assert_eq!(admin.len(), 1);
        assert!(admin[0].contains("Статистика"));
        assert!(admin[0].contains("Ошибок за окно 10 мин: 0"));
    }

    #[tokio::test]
    async fn start_greets_by_name_and_marks_active_style() {
        let (messenger, state) = setup(&[("DEFAULT_STYLE", "Поэт")]);

        run_command(&state, &caller(10), Command::Start).await;

        let sent = messenger.sent();
        assert_eq!(sent.len(), 2);
        let Sent::Html { html, .. } = &sent[0] else {
            panic!("greeting expected first: {sent:?}");
        };
        assert!(html.contains("tg://user?id=1\">&lt;Аня&gt;</a>"));
        let Sent::Menu { html, keyboard } = &sent[1] else {
            panic!("style menu expected second: {sent:?}");
        };
        assert_eq!(html, MENU_PROMPT);
        assert!(keyboard.buttons.iter().any(|b| b.label == "✓ Поэт"));
        assert_eq!(keyboard.buttons.iter().filter(|b| b.label.starts_with('✓')).count(), 1);
    }

    #[tokio::test]
    async fn reset_restores_default_style_and_clears_history() {
        let (messenger, state) = setup(&[]);
        let sessions = state.handler.sessions();
        sessions.set_style(UserId(1), "Мистик").await;
        sessions
            .record_interaction(UserId(1), Interaction::new("сон", "толкование", "Мистик"))
            .await;

        run_command(&state, &caller(10), Command::Reset).await;

        let session = sessions.get_or_create(UserId(1)).await;
        assert_eq!(session.active_style(), "Интуи");
        assert!(session.history().is_empty());
        assert!(messenger.html_to(10)[0].contains("история очищена"));
    }

    #[tokio::test]
    async fn unknown_command_gets_help() {
        let (messenger, state) = setup(&[]);

        run_command(&state, &caller(10), Command::Unknown("dream".to_string())).await;

        assert_eq!(messenger.html_to(10), vec![HELP.to_string()]);
    }
}
