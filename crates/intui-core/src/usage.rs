use chrono::{DateTime, Local};
use tokio::sync::Mutex;

use crate::completion::TokenUsage;

/// Cumulative token usage since process start.
#[derive(Clone, Debug)]
pub struct UsageStats {
    pub since: DateTime<Local>,
    pub requests: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub last: Option<TokenUsage>,
}

/// Observability only: nothing here affects a reply.
pub struct UsageTracker {
    stats: Mutex<UsageStats>,
}

impl Default for UsageTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl UsageTracker {
    pub fn new() -> Self {
        Self {
            stats: Mutex::new(UsageStats {
                since: Local::now(),
                requests: 0,
                prompt_tokens: 0,
                completion_tokens: 0,
                total_tokens: 0,
                last: None,
            }),
        }
    }

    pub async fn record(&self, u: &TokenUsage) {
        let mut st = self.stats.lock().await;
        st.requests += 1;
        st.prompt_tokens += u.prompt_tokens;
        st.completion_tokens += u.completion_tokens;
        // Some providers omit the total.
        st.total_tokens += if u.total_tokens > 0 {
            u.total_tokens
        } else {
            u.prompt_tokens + u.completion_tokens
        };
        st.last = Some(*u);
    }

    pub async fn snapshot(&self) -> UsageStats {
        self.stats.lock().await.clone()
    }
}
