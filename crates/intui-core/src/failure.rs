use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::seq::SliceRandom;
use tokio::sync::Mutex;

use crate::notify::Notifier;

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(600);
pub const DEFAULT_BURST_THRESHOLD: usize = 3;

/// User-facing replies for a failed interpretation. Never carry error detail.
pub const FALLBACK_REPLIES: &[&str] = &[
    "Извини, возникла ошибка при обращении к ИИ. Попробуй позже.",
    "Сны сегодня особенно туманны... Расскажи мне свой сон чуть позже 🌙",
    "Звёзды на мгновение скрылись за облаками. Давай вернёмся к твоему сну немного позже ✨",
    "Мой внутренний взор затуманился. Дай мне минутку и попробуй ещё раз 🌫",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Normal,
    Escalated,
}

/// Sliding window of failure timestamps.
///
/// Severity is recomputed from scratch on every record; nothing is sticky.
#[derive(Clone, Debug)]
pub struct FailureWindow {
    span: Duration,
    threshold: usize,
    hits: VecDeque<Instant>,
}

impl FailureWindow {
    pub fn new(span: Duration, threshold: usize) -> Self {
        Self {
            span,
            threshold: threshold.max(1),
            hits: VecDeque::new(),
        }
    }

    pub fn record(&mut self) -> Severity {
        self.record_at(Instant::now())
    }

    pub fn record_at(&mut self, now: Instant) -> Severity {
        self.hits.push_back(now);
        self.prune(now);
        if self.hits.len() >= self.threshold {
            Severity::Escalated
        } else {
            Severity::Normal
        }
    }

    /// Failures still inside the window at `now`.
    pub fn count_at(&mut self, now: Instant) -> usize {
        self.prune(now);
        self.hits.len()
    }

    pub fn span(&self) -> Duration {
        self.span
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.hits.front() {
            if now.saturating_duration_since(oldest) > self.span {
                self.hits.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Records completion failures, notifies operators and picks fallback replies.
pub struct FailureMonitor {
    window: Mutex<FailureWindow>,
    notifier: Arc<dyn Notifier>,
}

impl FailureMonitor {
    pub fn new(window: FailureWindow, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            window: Mutex::new(window),
            notifier,
        }
    }

    pub async fn record_failure(&self, message: &str) -> Severity {
        self.record_failure_at(message, Instant::now()).await
    }

    /// Record one failure and send the matching notifications.
    ///
    /// Every failure is notified individually; an escalation additionally
    /// sends one aggregated alert.
    pub async fn record_failure_at(&self, message: &str, now: Instant) -> Severity {
        let (severity, count, span) = {
            let mut w = self.window.lock().await;
            let severity = w.record_at(now);
            (severity, w.count_at(now), w.span())
        };

        tracing::warn!(error = %message, recent_failures = count, "completion failed");
        self.notify_quietly("Interpretation failed", message).await;

        if severity == Severity::Escalated {
            tracing::error!(recent_failures = count, "failure burst detected");
            let body = format!(
                "{count} failures within the last {} min.\nLatest: {message}",
                span.as_secs() / 60
            );
            self.notify_quietly("Failure burst", &body).await;
        }

        severity
    }

    pub async fn recent_failures(&self) -> usize {
        self.window.lock().await.count_at(Instant::now())
    }

    /// Uniformly random; consecutive calls may repeat.
    pub fn pick_fallback(&self) -> String {
        FALLBACK_REPLIES
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(FALLBACK_REPLIES[0])
            .to_string()
    }

    async fn notify_quietly(&self, subject: &str, body: &str) {
        if let Err(e) = self.notifier.notify(subject, body).await {
            tracing::warn!(error = %e, %subject, "notification failed");
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{errors::Error, Result};
    use async_trait::async_trait;

    #[derive(Default)]
    pub(crate) struct RecordingNotifier {
        pub fail: bool,
        pub sent: std::sync::Mutex<Vec<(String, String)>>,
    }

    impl RecordingNotifier {
        pub fn subjects(&self) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|(s, _)| s.clone())
                .collect()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, subject: &str, body: &str) -> Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((subject.to_string(), body.to_string()));
            if self.fail {
                return Err(Error::Notification("smtp down".to_string()));
            }
            Ok(())
        }
    }

    #[test]
    fn third_failure_within_window_escalates() {
        let mut w = FailureWindow::new(DEFAULT_WINDOW, DEFAULT_BURST_THRESHOLD);
        let t0 = Instant::now();
        assert_eq!(w.record_at(t0), Severity::Normal);
        assert_eq!(w.record_at(t0 + Duration::from_secs(300)), Severity::Normal);
        assert_eq!(
            w.record_at(t0 + Duration::from_secs(600)),
            Severity::Escalated
        );
    }

    #[test]
    fn spaced_failures_never_escalate() {
        let mut w = FailureWindow::new(DEFAULT_WINDOW, DEFAULT_BURST_THRESHOLD);
        let t0 = Instant::now();
        for i in 0..10u64 {
            let at = t0 + Duration::from_secs(601 * i);
            assert_eq!(w.record_at(at), Severity::Normal);
            assert_eq!(w.count_at(at), 1);
        }
    }

    #[test]
    fn escalation_is_recomputed_not_sticky() {
        let mut w = FailureWindow::new(DEFAULT_WINDOW, DEFAULT_BURST_THRESHOLD);
        let t0 = Instant::now();
        for s in 0..3 {
            w.record_at(t0 + Duration::from_secs(s));
        }
        assert_eq!(w.count_at(t0 + Duration::from_secs(2)), 3);

        let later = t0 + Duration::from_secs(2000);
        assert_eq!(w.record_at(later), Severity::Normal);
        assert_eq!(w.count_at(later), 1);
    }

    #[tokio::test]
    async fn burst_sends_individual_and_aggregated_notifications() {
        let notifier = Arc::new(RecordingNotifier::default());
        let monitor = FailureMonitor::new(
            FailureWindow::new(DEFAULT_WINDOW, DEFAULT_BURST_THRESHOLD),
            notifier.clone(),
        );
        let t0 = Instant::now();

        let mut severities = Vec::new();
        for m in 0..3u64 {
            let at = t0 + Duration::from_secs(100 * m);
            severities.push(monitor.record_failure_at("timeout", at).await);
        }

        assert_eq!(
            severities,
            vec![Severity::Normal, Severity::Normal, Severity::Escalated]
        );
        let subjects = notifier.subjects();
        assert_eq!(
            subjects
                .iter()
                .filter(|s| *s == "Interpretation failed")
                .count(),
            3
        );
        assert_eq!(subjects.iter().filter(|s| *s == "Failure burst").count(), 1);
    }

    #[tokio::test]
    async fn notification_errors_are_swallowed() {
        let notifier = Arc::new(RecordingNotifier {
            fail: true,
            ..Default::default()
        });
        let monitor = FailureMonitor::new(FailureWindow::new(DEFAULT_WINDOW, 1), notifier.clone());

        assert_eq!(monitor.record_failure("boom").await, Severity::Escalated);
        assert_eq!(notifier.subjects().len(), 2);
    }

    #[test]
    fn fallback_comes_from_the_fixed_set() {
        let monitor = FailureMonitor::new(
            FailureWindow::new(DEFAULT_WINDOW, DEFAULT_BURST_THRESHOLD),
            Arc::new(RecordingNotifier::default()),
        );
        for _ in 0..50 {
            let f = monitor.pick_fallback();
            assert!(FALLBACK_REPLIES.contains(&f.as_str()));
        }
    }
}
