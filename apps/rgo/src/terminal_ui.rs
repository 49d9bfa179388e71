//! [`EditorUi`] for a terminal: messages on stderr, spinners for progress

use async_trait::async_trait;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use rgo_foundation::{EditorUi, MessageSeverity, ProgressIndicator, ProgressOptions};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Cancel switches of the indicators on screen, with their titles
type CancelSwitches = Arc<Mutex<Vec<(String, watch::Sender<bool>)>>>;

/// Terminal implementation of the editor surface
///
/// All output goes to stderr so stdout stays free for scripting.
#[derive(Clone)]
pub struct TerminalUi {
    bars: MultiProgress,
    cancel_switches: CancelSwitches,
}

impl TerminalUi {
    pub fn new() -> Self {
        Self {
            bars: MultiProgress::with_draw_target(ProgressDrawTarget::stderr()),
            cancel_switches: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Cancel every cancellable indicator on screen. Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let mut switches = self
            .cancel_switches
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Finished indicators have dropped their receivers
        switches.retain(|(_, switch)| switch.receiver_count() > 0);
        for (title, switch) in switches.iter() {
            tracing::debug!(title = %title, "Cancelling progress indicator");
            switch.send_replace(true);
        }
        switches.len()
    }

    fn print(&self, line: String) {
        if self.bars.println(&line).is_err() {
            eprintln!("{}", line);
        }
    }

    fn spinner(&self, title: &str) -> ProgressBar {
        let bar = self.bars.add(ProgressBar::new_spinner());
        if let Ok(style) = ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}") {
            bar.set_style(style);
        }
        bar.set_message(title.to_string());
        bar.enable_steady_tick(TICK_INTERVAL);
        bar
    }
}

impl Default for TerminalUi {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorUi for TerminalUi {
    fn show_message(&self, severity: MessageSeverity, message: &str) {
        let prefix = match severity {
            MessageSeverity::Info => "info",
            MessageSeverity::Warning => "warning",
            MessageSeverity::Error => "error",
        };
        self.print(format!("[rgo {}] {}", prefix, message));
    }

    // A terminal has no status bar; the line simply stays in the scrollback
    fn set_status_message(&self, message: &str, _timeout: Duration) {
        self.print(format!("[rgo] {}", message));
    }

    fn begin_progress(&self, options: ProgressOptions) -> Box<dyn ProgressIndicator> {
        let bar = self.spinner(&options.title);
        let cancel = options.cancellable.then(|| {
            let (switch, cancel_rx) = watch::channel(false);
            self.cancel_switches
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push((options.title.clone(), switch));
            cancel_rx
        });

        Box::new(SpinnerIndicator { bar, cancel })
    }
}

struct SpinnerIndicator {
    bar: ProgressBar,
    cancel: Option<watch::Receiver<bool>>,
}

#[async_trait]
impl ProgressIndicator for SpinnerIndicator {
    async fn cancelled(&mut self) {
        match self.cancel.as_mut() {
            Some(cancel) => {
                let switch_dropped = cancel.wait_for(|cancelled| *cancelled).await.is_err();
                if switch_dropped {
                    std::future::pending::<()>().await;
                }
            }
            None => std::future::pending::<()>().await,
        }
    }

    fn finish(self: Box<Self>) {
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hidden_ui() -> TerminalUi {
        let ui = TerminalUi::new();
        ui.bars.set_draw_target(ProgressDrawTarget::hidden());
        ui
    }

    #[tokio::test]
    async fn test_cancel_all_resolves_cancellable_indicators() {
        let ui = hidden_ui();
        let mut cancellable = ui.begin_progress(ProgressOptions::cancellable("Indexing"));
        let fixed = ui.begin_progress(ProgressOptions::fixed("Install Rgo Server"));

        assert_eq!(ui.cancel_all(), 1);
        tokio::time::timeout(Duration::from_secs(1), cancellable.cancelled())
            .await
            .expect("cancellation observed");

        cancellable.finish();
        fixed.finish();
        assert_eq!(ui.cancel_all(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_indicator_never_cancels() {
        let ui = hidden_ui();
        let mut fixed = ui.begin_progress(ProgressOptions::fixed("Install Rgo Gopackagesdriver"));

        ui.cancel_all();
        let outcome = tokio::time::timeout(Duration::from_secs(5), fixed.cancelled()).await;

        assert!(outcome.is_err());
        fixed.finish();
    }
}
