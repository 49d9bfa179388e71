//! Mock implementations for testing

use async_trait::async_trait;
use mockall::mock;
use rgo_foundation::{
    EditorUi, MessageSeverity, ProgressIndicator, ProgressOptions, RgoResult, TerminalExit,
    TerminalRunner,
};
use std::time::Duration;

mock! {
    pub EditorUi {}

    impl EditorUi for EditorUi {
        fn show_message(&self, severity: MessageSeverity, message: &str);
        fn set_status_message(&self, message: &str, timeout: Duration);
        fn begin_progress(&self, options: ProgressOptions) -> Box<dyn ProgressIndicator>;
    }
}

mock! {
    pub TerminalRunner {}

    #[async_trait]
    impl TerminalRunner for TerminalRunner {
        async fn run(&self, command_line: &str) -> RgoResult<TerminalExit>;
    }
}

/// Indicator that is never cancelled and ignores `finish`
pub struct InertIndicator;

#[async_trait]
impl ProgressIndicator for InertIndicator {
    async fn cancelled(&mut self) {
        std::future::pending::<()>().await
    }

    fn finish(self: Box<Self>) {}
}

/// Create a mock editor UI for testing
pub fn mock_editor_ui() -> MockEditorUi {
    MockEditorUi::new()
}

/// Create a mock terminal runner for testing
pub fn mock_terminal_runner() -> MockTerminalRunner {
    MockTerminalRunner::new()
}
