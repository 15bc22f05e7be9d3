use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::UserId;

/// Number of interactions kept per user.
pub const MAX_HISTORY: usize = 3;

/// One completed request/response pair plus the persona used.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Interaction {
    pub input: String,
    pub output: String,
    pub style: String,
}

impl Interaction {
    pub fn new(
        input: impl Into<String>,
        output: impl Into<String>,
        style: impl Into<String>,
    ) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            style: style.into(),
        }
    }
}

/// Per-user state: active persona + bounded history (most recent last).
#[derive(Clone, Debug)]
pub struct Session {
    active_style: String,
    history: VecDeque<Interaction>,
}

impl Session {
    pub fn new(default_style: impl Into<String>) -> Self {
        Self {
            active_style: default_style.into(),
            history: VecDeque::with_capacity(MAX_HISTORY + 1),
        }
    }

    pub fn active_style(&self) -> &str {
        &self.active_style
    }

    /// Not validated here; unknown names fall back to the default persona on resolve.
    pub fn set_style(&mut self, style: impl Into<String>) {
        self.active_style = style.into();
    }

    pub fn record(&mut self, interaction: Interaction) {
        self.history.push_back(interaction);
        while self.history.len() > MAX_HISTORY {
            self.history.pop_front();
        }
    }

    pub fn history(&self) -> Vec<Interaction> {
        self.history.iter().cloned().collect()
    }
}

/// In-memory session store.
///
/// Each user's session sits behind its own mutex: different users never block
/// each other, while messages from the same user are serialized.
pub struct SessionStore {
    default_style: String,
    sessions: Mutex<HashMap<UserId, Arc<Mutex<Session>>>>,
}

impl SessionStore {
    pub fn new(default_style: impl Into<String>) -> Self {
        Self {
            default_style: default_style.into(),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    async fn slot(&self, user_id: UserId) -> Arc<Mutex<Session>> {
        let mut map = self.sessions.lock().await;
        map.entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(Session::new(self.default_style.clone()))))
            .clone()
    }

    /// Exclusive access to a user's session, creating it on first contact.
    ///
    /// The guard may be held across awaits (e.g. the completion call).
    pub async fn lock(&self, user_id: UserId) -> OwnedMutexGuard<Session> {
        self.slot(user_id).await.lock_owned().await
    }

    /// Snapshot of the user's session, creating it with defaults if absent.
    pub async fn get_or_create(&self, user_id: UserId) -> Session {
        self.lock(user_id).await.clone()
    }

    pub async fn set_style(&self, user_id: UserId, style: &str) {
        self.lock(user_id).await.set_style(style);
    }

    pub async fn record_interaction(&self, user_id: UserId, interaction: Interaction) {
        self.lock(user_id).await.record(interaction);
    }

    /// Most-recent-last.
    pub async fn history(&self, user_id: UserId) -> Vec<Interaction> {
        self.lock(user_id).await.history()
    }

    /// Back to the default style with an empty history.
    pub async fn reset(&self, user_id: UserId) {
        *self.lock(user_id).await = Session::new(self.default_style.clone());
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn nth(i: usize) -> Interaction {
        Interaction::new(format!("in-{i}"), format!("out-{i}"), "Интуи")
    }

    #[tokio::test]
    async fn new_session_has_defaults() {
        let store = SessionStore::new("Интуи");
        let s = store.get_or_create(UserId(7)).await;
        assert_eq!(s.active_style(), "Интуи");
        assert!(s.history().is_empty());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn history_keeps_last_entries_in_order() {
        let store = SessionStore::new("Интуи");
        let user = UserId(1);
        for n in 0..10 {
            store.record_interaction(user, nth(n)).await;
            let h = store.history(user).await;
            assert!(h.len() <= MAX_HISTORY);

            let first = (n + 1).saturating_sub(MAX_HISTORY);
            let expected: Vec<Interaction> = (first..=n).map(nth).collect();
            assert_eq!(h, expected);
        }
    }

    #[tokio::test]
    async fn set_style_accepts_any_name_and_reset_restores_defaults() {
        let store = SessionStore::new("Интуи");
        let user = UserId(2);
        store.set_style(user, "не-существует").await;
        store.record_interaction(user, nth(0)).await;
        assert_eq!(
            store.get_or_create(user).await.active_style(),
            "не-существует"
        );

        store.reset(user).await;
        let s = store.get_or_create(user).await;
        assert_eq!(s.active_style(), "Интуи");
        assert!(s.history().is_empty());
    }

    #[tokio::test]
    async fn sessions_are_isolated_per_user() {
        let store = SessionStore::new("Интуи");
        store.record_interaction(UserId(1), nth(1)).await;
        store.set_style(UserId(2), "Поэт").await;

        assert_eq!(store.history(UserId(1)).await, vec![nth(1)]);
        assert!(store.history(UserId(2)).await.is_empty());
        assert_eq!(store.get_or_create(UserId(1)).await.active_style(), "Интуи");
    }

    #[tokio::test]
    async fn held_lock_blocks_same_user_only() {
        let store = Arc::new(SessionStore::new("Интуи"));
        let guard = store.lock(UserId(1)).await;

        // Another user proceeds while user 1 is locked.
        tokio::time::timeout(Duration::from_secs(1), store.history(UserId(2)))
            .await
            .expect("other user must not block");

        let same = {
            let store = store.clone();
            tokio::spawn(async move { store.record_interaction(UserId(1), nth(9)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!same.is_finished());

        drop(guard);
        same.await.unwrap();
        assert_eq!(store.history(UserId(1)).await, vec![nth(9)]);
    }
}
