//! Operator notifications (admin chat today; the trait is the seam for email).

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    domain::ChatId, errors::Error, formatting::escape_html, messaging::port::MessagingPort,
    Result,
};

/// Best-effort operator notification channel.
///
/// Callers log and swallow errors; they never reach the end user.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, subject: &str, body: &str) -> Result<()>;
}

/// Sends an HTML message to every configured admin chat.
pub struct AdminChatNotifier {
    messenger: Arc<dyn MessagingPort>,
    admins: Vec<ChatId>,
}

impl AdminChatNotifier {
    pub fn new(messenger: Arc<dyn MessagingPort>, admins: Vec<ChatId>) -> Self {
        Self { messenger, admins }
    }
}

#[async_trait]
impl Notifier for AdminChatNotifier {
    async fn notify(&self, subject: &str, body: &str) -> Result<()> {
        let html = format!(
            "🚨 <b>{}</b>\n<pre>{}</pre>",
            escape_html(subject),
            escape_html(body)
        );

        let mut failed = Vec::new();
        for &chat in &self.admins {
            if let Err(e) = self.messenger.send_html(chat, &html).await {
                failed.push(format!("{}: {e}", chat.0));
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(Error::Notification(failed.join("; ")))
        }
    }
}

/// Fallback when no admin chats are configured: the log is the channel.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, subject: &str, body: &str) -> Result<()> {
        tracing::error!(%subject, %body, "operator notification");
        Ok(())
    }
}
