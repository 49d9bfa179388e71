//! Centralized logging initialization with environment variable support

use crate::config::{LogFormat, LoggingConfig};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing subscriber with environment variable support
///
/// Environment variables (in priority order):
/// - `RUST_LOG`: Standard Rust log filter (takes precedence over all)
/// - `LOG_FORMAT`: Override format (json, pretty)
///
/// # Examples
///
/// ```bash
/// # Debug logging for the client core only
/// RUST_LOG=rgo_lsp=debug rgo run
///
/// # JSON logs for an editor that collects stderr
/// LOG_FORMAT=json rgo run
/// ```
pub fn initialize(config: &LoggingConfig) {
    let log_level = config.level.parse().unwrap_or(tracing::Level::INFO);

    // RUST_LOG takes precedence over config
    let env_filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();

    let format = format_override(std::env::var("LOG_FORMAT").ok().as_deref())
        .unwrap_or_else(|| config.format.clone());

    // Always write to stderr: stdout may carry protocol traffic
    let result = match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init(),
    };

    if let Err(e) = result {
        tracing::debug!(error = %e, "Tracing subscriber already installed");
    }
}

fn format_override(value: Option<&str>) -> Option<LogFormat> {
    match value?.to_lowercase().as_str() {
        "json" => Some(LogFormat::Json),
        "pretty" | "human" => Some(LogFormat::Pretty),
        _ => None,
    }
}

/// Span wrapping everything done on behalf of one language server session
pub fn session_span(server: &str) -> tracing::Span {
    tracing::info_span!("lsp_session", server = %server)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_override() {
        assert_eq!(format_override(Some("JSON")), Some(LogFormat::Json));
        assert_eq!(format_override(Some("human")), Some(LogFormat::Pretty));
        assert_eq!(format_override(Some("xml")), None);
        assert_eq!(format_override(None), None);
    }

    #[test]
    fn test_initialize_twice_does_not_panic() {
        let config = LoggingConfig::default();
        initialize(&config);
        initialize(&config);
    }
}
