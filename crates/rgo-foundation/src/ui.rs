//! Editor UI collaborator
//!
//! The language client never draws anything itself. Every user-visible
//! effect (messages, status bar text, progress indicators) goes through
//! [`EditorUi`], which the host (an editor, or the terminal binary) provides.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Severity of a message shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageSeverity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for MessageSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageSeverity::Info => write!(f, "info"),
            MessageSeverity::Warning => write!(f, "warning"),
            MessageSeverity::Error => write!(f, "error"),
        }
    }
}

/// How a progress indicator should be presented
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressOptions {
    /// Text shown next to the indicator
    pub title: String,
    /// Whether the user may dismiss the indicator
    pub cancellable: bool,
}

impl ProgressOptions {
    pub fn cancellable(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            cancellable: true,
        }
    }

    pub fn fixed(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            cancellable: false,
        }
    }
}

/// A visible, indeterminate progress indicator
#[async_trait]
pub trait ProgressIndicator: Send {
    /// Resolves once the user cancels the indicator.
    ///
    /// Indicators created with `cancellable: false` never resolve.
    async fn cancelled(&mut self);

    /// Remove the indicator from the screen
    fn finish(self: Box<Self>);
}

/// User-facing surface of the host editor
pub trait EditorUi: Send + Sync {
    /// Show a message at the given severity
    fn show_message(&self, severity: MessageSeverity, message: &str);

    /// Show transient status bar text for `timeout`
    fn set_status_message(&self, message: &str, timeout: Duration);

    /// Begin an indeterminate progress indicator
    fn begin_progress(&self, options: ProgressOptions) -> Box<dyn ProgressIndicator>;

    fn show_info(&self, message: &str) {
        self.show_message(MessageSeverity::Info, message);
    }

    fn show_warning(&self, message: &str) {
        self.show_message(MessageSeverity::Warning, message);
    }

    fn show_error(&self, message: &str) {
        self.show_message(MessageSeverity::Error, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_serde() {
        let json = serde_json::to_string(&MessageSeverity::Warning).unwrap();
        assert_eq!(json, "\"warning\"");
        let parsed: MessageSeverity = serde_json::from_str("\"error\"").unwrap();
        assert_eq!(parsed, MessageSeverity::Error);
    }

    #[test]
    fn test_progress_options_constructors() {
        assert!(ProgressOptions::cancellable("Indexing").cancellable);
        assert!(!ProgressOptions::fixed("Install Rgo Server").cancellable);
    }
}
