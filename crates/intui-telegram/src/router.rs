use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tokio::sync::Mutex;

use intui_core::{
    completion::CompletionClient,
    config::Config,
    failure::{FailureMonitor, FailureWindow},
    handler::{CompletionParams, InteractionHandler},
    messaging::port::MessagingPort,
    notify::{AdminChatNotifier, LogNotifier, Notifier},
    persona::PersonaRegistry,
    ratelimit::RateLimiter,
    session::SessionStore,
};

use crate::handlers;
use crate::TelegramMessenger;

/// Process-scoped state shared by every update handler.
pub struct AppState {
    pub cfg: Arc<Config>,
    pub handler: Arc<InteractionHandler>,
    pub messenger: Arc<dyn MessagingPort>,
    pub notifier: Arc<dyn Notifier>,
    pub rate_limiter: Mutex<RateLimiter>,
}

impl AppState {
    /// Wire the core around a messenger and a completion client.
    pub fn build(
        cfg: Arc<Config>,
        messenger: Arc<dyn MessagingPort>,
        completion: Arc<dyn CompletionClient>,
    ) -> intui_core::Result<Self> {
        let personas = Arc::new(PersonaRegistry::builtin(&cfg.default_style)?);
        let sessions = Arc::new(SessionStore::new(personas.default_style()));

        let notifier: Arc<dyn Notifier> = if cfg.admin_chat_ids.is_empty() {
            tracing::warn!("ADMIN_CHAT_IDS is empty; failure notifications go to the log only");
            Arc::new(LogNotifier)
        } else {
            Arc::new(AdminChatNotifier::new(
                messenger.clone(),
                cfg.admin_chat_ids.clone(),
            ))
        };

        let monitor = Arc::new(FailureMonitor::new(
            FailureWindow::new(cfg.failure_window, cfg.failure_burst_threshold),
            notifier.clone(),
        ));

        let handler = Arc::new(InteractionHandler::new(
            sessions,
            personas,
            completion,
            monitor,
            CompletionParams::from_config(&cfg),
        ));

        Ok(Self {
            rate_limiter: Mutex::new(RateLimiter::new(
                cfg.rate_limit_enabled,
                cfg.rate_limit_requests,
                cfg.rate_limit_window,
            )),
            cfg,
            handler,
            messenger,
            notifier,
        })
    }
}

pub async fn run_polling(
    cfg: Arc<Config>,
    completion: Arc<dyn CompletionClient>,
) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_token.clone());

    match bot.get_me().await {
        Ok(me) => tracing::info!(username = %me.username(), "intui started"),
        Err(e) => return Err(anyhow::anyhow!("telegram getMe failed: {e}")),
    }

    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let state = Arc::new(AppState::build(cfg.clone(), messenger, completion)?);

    tracing::info!(
        styles = state.handler.personas().len(),
        default_style = %state.handler.personas().default_style(),
        admins = cfg.admin_chat_ids.len(),
        "serving"
    );
    if let Err(e) = state
        .notifier
        .notify("Intui started", &format!("model: {}", cfg.model))
        .await
    {
        tracing::warn!(error = %e, "startup notification failed");
    }

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    Ok(())
}
