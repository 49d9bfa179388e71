//! Test support utilities for the rgo language client crates

pub mod helpers;
pub mod mocks;
pub mod recording_ui;

// Re-export commonly used helpers
pub use helpers::{create_test_settings, init_test_tracing};
pub use recording_ui::{IndicatorHandle, RecordingUi};
