//! Configuration model and layered loading

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use rgo_foundation::{RgoError, RgoResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default command used to install the language server binary
pub const DEFAULT_LANGUAGE_SERVER_INSTALL: &str =
    "go install github.com/cloudwego-contrib/rgo/cmd/rgo_lsp_server@latest";

/// Default command used to install the packages driver binary
pub const DEFAULT_GOPACKAGESDRIVER_INSTALL: &str =
    "go install github.com/cloudwego-contrib/rgo/cmd/rgopackagesdriver@latest";

/// Config files probed under the workspace root, first match wins
const CONFIG_FILES: [&str; 2] = ["rgo.toml", ".rgo/config.toml"];

/// Prefix for environment overrides, e.g. `RGO__CLIENT__USE_LANGUAGE_SERVER=false`
const ENV_PREFIX: &str = "RGO__";

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RgoConfig {
    /// Language client settings
    #[serde(default)]
    pub client: ClientSettings,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings the language client reads at activation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Gate for the whole language server integration
    pub use_language_server: bool,
    /// Command that installs the language server binary
    pub language_server_install: String,
    /// Command that installs the packages driver binary
    pub gopackagesdriver_install: String,
    /// Install missing binaries during activation
    pub auto_install: bool,
    /// Install directory of the extension; the server binary lives under `bin/`
    pub extension_dir: Option<PathBuf>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            use_language_server: true,
            language_server_install: DEFAULT_LANGUAGE_SERVER_INSTALL.to_string(),
            gopackagesdriver_install: DEFAULT_GOPACKAGESDRIVER_INSTALL.to_string(),
            auto_install: false,
            extension_dir: None,
        }
    }
}

impl ClientSettings {
    /// Resolve the extension directory.
    ///
    /// Falls back to the parent of the directory holding the running
    /// executable, which matches an `<extension>/bin/rgo` install layout.
    pub fn resolve_extension_dir(&self) -> RgoResult<PathBuf> {
        if let Some(dir) = &self.extension_dir {
            return Ok(dir.clone());
        }

        let exe = std::env::current_exe()?;
        exe.parent()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .ok_or_else(|| {
                RgoError::config(format!(
                    "Cannot derive extension directory from executable path {}",
                    exe.display()
                ))
            })
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format for development
    #[default]
    Pretty,
    /// Structured JSON format for machine consumption
    Json,
}

impl RgoConfig {
    /// Load configuration from defaults, config files and the environment
    ///
    /// Priority order (highest to lowest):
    /// 1. Environment variables (`RGO__*`)
    /// 2. `rgo.toml` or `.rgo/config.toml` under `workspace_root`
    /// 3. Default values
    pub fn load_from(workspace_root: &Path) -> RgoResult<Self> {
        let mut figment = Figment::from(Serialized::defaults(RgoConfig::default()));

        if let Some(path) = CONFIG_FILES
            .iter()
            .map(|name| workspace_root.join(name))
            .find(|path| path.exists())
        {
            tracing::info!(path = %path.display(), "Loading TOML configuration");
            figment = figment.merge(Toml::file(path));
        }

        let config: RgoConfig = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| RgoError::config(format!("Failed to load configuration: {}", e)))?;

        config.validate()?;

        tracing::debug!(
            use_language_server = config.client.use_language_server,
            auto_install = config.client.auto_install,
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> RgoResult<()> {
        if self.client.use_language_server && self.client.language_server_install.trim().is_empty()
        {
            return Err(RgoError::config(
                "client.language_server_install must not be empty when the language server is enabled",
            ));
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            other => Err(RgoError::config(format!("Invalid log level '{}'", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = RgoConfig::default();
        assert!(config.client.use_language_server);
        assert!(!config.client.auto_install);
        assert_eq!(
            config.client.language_server_install,
            DEFAULT_LANGUAGE_SERVER_INSTALL
        );
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_load_without_files_uses_defaults() {
        Jail::expect_with(|jail| {
            let config = RgoConfig::load_from(jail.directory()).map_err(|e| e.to_string())?;
            assert_eq!(config, RgoConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_load_from_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "rgo.toml",
                r#"
                [client]
                auto_install = true
                gopackagesdriver_install = "go install example.com/driver@v1.2.0"

                [logging]
                format = "json"
                "#,
            )?;

            let config = RgoConfig::load_from(jail.directory()).map_err(|e| e.to_string())?;
            assert!(config.client.auto_install);
            assert_eq!(
                config.client.gopackagesdriver_install,
                "go install example.com/driver@v1.2.0"
            );
            assert_eq!(config.logging.format, LogFormat::Json);
            // Untouched keys keep their defaults
            assert!(config.client.use_language_server);
            Ok(())
        });
    }

    #[test]
    fn test_dot_dir_config_file() {
        Jail::expect_with(|jail| {
            jail.create_dir(".rgo")?;
            jail.create_file(".rgo/config.toml", "[logging]\nlevel = \"debug\"\n")?;

            let config = RgoConfig::load_from(jail.directory()).map_err(|e| e.to_string())?;
            assert_eq!(config.logging.level, "debug");
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("rgo.toml", "[client]\nuse_language_server = true\n")?;
            jail.set_env("RGO__CLIENT__USE_LANGUAGE_SERVER", "false");

            let config = RgoConfig::load_from(jail.directory()).map_err(|e| e.to_string())?;
            assert!(!config.client.use_language_server);
            Ok(())
        });
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let mut config = RgoConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().unwrap_err().is_config());
    }

    #[test]
    fn test_empty_install_command_rejected_when_enabled() {
        let mut config = RgoConfig::default();
        config.client.language_server_install = "  ".to_string();
        assert!(config.validate().is_err());

        config.client.use_language_server = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_explicit_extension_dir_wins() {
        let settings = ClientSettings {
            extension_dir: Some(PathBuf::from("/opt/rgo")),
            ..Default::default()
        };
        assert_eq!(
            settings.resolve_extension_dir().unwrap(),
            PathBuf::from("/opt/rgo")
        );
    }
}
