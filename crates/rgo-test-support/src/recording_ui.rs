//! Editor UI fake that records everything shown to the user

use async_trait::async_trait;
use rgo_foundation::{EditorUi, MessageSeverity, ProgressIndicator, ProgressOptions};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::watch;

#[derive(Default)]
struct Record {
    messages: Vec<(MessageSeverity, String)>,
    status_messages: Vec<String>,
    indicators: Vec<IndicatorHandle>,
}

/// [`EditorUi`] implementation for tests
///
/// Cloning shares the underlying record, so a test can keep one clone for
/// assertions while the code under test owns another.
#[derive(Clone, Default)]
pub struct RecordingUi {
    record: Arc<Mutex<Record>>,
}

impl RecordingUi {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self) -> MutexGuard<'_, Record> {
        self.record.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// All messages in the order they were shown
    pub fn messages(&self) -> Vec<(MessageSeverity, String)> {
        self.record().messages.clone()
    }

    /// Messages shown at one severity
    pub fn messages_with(&self, severity: MessageSeverity) -> Vec<String> {
        self.record()
            .messages
            .iter()
            .filter(|(s, _)| *s == severity)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn status_messages(&self) -> Vec<String> {
        self.record().status_messages.clone()
    }

    /// Every indicator ever begun, oldest first
    pub fn indicators(&self) -> Vec<IndicatorHandle> {
        self.record().indicators.clone()
    }

    /// Most recent indicator with the given title
    pub fn indicator(&self, title: &str) -> Option<IndicatorHandle> {
        self.record()
            .indicators
            .iter()
            .rev()
            .find(|i| i.title == title)
            .cloned()
    }

    /// Number of indicators currently on screen
    pub fn open_indicators(&self) -> usize {
        self.record()
            .indicators
            .iter()
            .filter(|i| !i.is_finished())
            .count()
    }
}

impl EditorUi for RecordingUi {
    fn show_message(&self, severity: MessageSeverity, message: &str) {
        self.record().messages.push((severity, message.to_string()));
    }

    fn set_status_message(&self, message: &str, _timeout: Duration) {
        self.record().status_messages.push(message.to_string());
    }

    fn begin_progress(&self, options: ProgressOptions) -> Box<dyn ProgressIndicator> {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (finished_tx, _) = watch::channel(None);
        let handle = IndicatorHandle {
            title: options.title,
            cancellable: options.cancellable,
            started_at: Instant::now(),
            cancel: Arc::new(cancel_tx),
            finished: Arc::new(finished_tx),
        };
        self.record().indicators.push(handle.clone());

        Box::new(RecordingIndicator {
            cancellable: handle.cancellable,
            cancel_rx,
            finished: handle.finished.clone(),
        })
    }
}

/// Test-side view of one indicator
#[derive(Clone)]
pub struct IndicatorHandle {
    pub title: String,
    pub cancellable: bool,
    pub started_at: Instant,
    cancel: Arc<watch::Sender<bool>>,
    finished: Arc<watch::Sender<Option<Instant>>>,
}

impl IndicatorHandle {
    /// Simulate the user dismissing the indicator
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    pub fn is_finished(&self) -> bool {
        self.finished.borrow().is_some()
    }

    pub fn finished_at(&self) -> Option<Instant> {
        *self.finished.borrow()
    }

    /// Wait until the indicator has been disposed, returning when that happened
    pub async fn wait_finished(&self) -> Instant {
        let mut rx = self.finished.subscribe();
        let finished = rx
            .wait_for(Option::is_some)
            .await
            .map(|at| *at)
            .ok()
            .flatten();
        finished.unwrap_or_else(Instant::now)
    }
}

struct RecordingIndicator {
    cancellable: bool,
    cancel_rx: watch::Receiver<bool>,
    finished: Arc<watch::Sender<Option<Instant>>>,
}

#[async_trait]
impl ProgressIndicator for RecordingIndicator {
    async fn cancelled(&mut self) {
        if !self.cancellable {
            return std::future::pending().await;
        }
        let sender_dropped = self.cancel_rx.wait_for(|cancelled| *cancelled).await.is_err();
        if sender_dropped {
            std::future::pending::<()>().await;
        }
    }

    fn finish(self: Box<Self>) {
        self.finished.send_replace(Some(Instant::now()));
    }
}
