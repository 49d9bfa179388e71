//! Test helper functions and utilities

use rgo_config::ClientSettings;
use std::path::Path;
use std::sync::Once;

/// Client settings pointing at a test extension directory, with installs disabled
pub fn create_test_settings(extension_dir: &Path) -> ClientSettings {
    ClientSettings {
        use_language_server: true,
        auto_install: false,
        extension_dir: Some(extension_dir.to_path_buf()),
        ..ClientSettings::default()
    }
}

/// Route `tracing` output through the test harness, once per process
pub fn init_test_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
            )
            .with_test_writer()
            .try_init();
    });
}
