//! Installation of Go-built binaries through `go install`

use crate::install_spec::InstallSpec;
use crate::locator::installed_binary_path;
use rgo_foundation::{EditorUi, ProgressOptions, RgoError, RgoResult, TerminalRunner};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How long the completion message stays in the status bar
const STATUS_MESSAGE_TIMEOUT: Duration = Duration::from_secs(3);

/// One install operation and the texts shown while it runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
    /// Command line run in the terminal
    pub command: String,
    /// Title of the progress notification
    pub progress_title: String,
    /// Status bar text shown when the command succeeds
    pub status_message: String,
}

impl InstallRequest {
    /// Install request for the language server binary
    pub fn language_server(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            progress_title: "Install Rgo Server".to_string(),
            status_message: "Installing rgo language server...".to_string(),
        }
    }

    /// Install request for the packages driver binary
    pub fn packages_driver(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            progress_title: "Install Rgo Gopackagesdriver".to_string(),
            status_message: "Installing rgo gopackagesdriver...".to_string(),
        }
    }
}

/// Checks for and installs the binaries the client depends on
#[derive(Clone)]
pub struct BinaryProvisioner {
    ui: Arc<dyn EditorUi>,
    terminal: Arc<dyn TerminalRunner>,
}

impl BinaryProvisioner {
    pub fn new(ui: Arc<dyn EditorUi>, terminal: Arc<dyn TerminalRunner>) -> Self {
        Self { ui, terminal }
    }

    /// Check whether the binary built by `install_command` is present in `$GOPATH/bin`
    ///
    /// A missing `GOPATH` or an unparsable command is shown to the user as an
    /// error and reported as "not installed".
    pub async fn is_installed(&self, install_command: &str) -> bool {
        match self.installed_path(install_command).await {
            Ok(Some(_)) => true,
            Ok(None) => false,
            Err(e) => {
                warn!(command = %install_command, error = %e, "Cannot resolve install location");
                self.ui.show_error(&user_message(&e));
                false
            }
        }
    }

    /// Path of the installed binary, `None` when it has not been installed yet
    async fn installed_path(&self, install_command: &str) -> RgoResult<Option<PathBuf>> {
        let spec = InstallSpec::parse(install_command)?;
        let path = installed_binary_path(&spec)?;
        let installed = tokio::fs::try_exists(&path).await.unwrap_or(false);
        debug!(path = %path.display(), installed, "Checked binary install location");
        Ok(installed.then_some(path))
    }

    /// Run the install command and wait for the process to exit
    ///
    /// Completion is decided by the real exit status. The caller reports errors.
    pub async fn install(&self, request: &InstallRequest) -> RgoResult<()> {
        let command = request.command.trim();
        if command.is_empty() {
            return Err(RgoError::config("Install command is not configured"));
        }

        if let Some(program) = command.split_whitespace().next() {
            if which::which(program).is_err() {
                return Err(RgoError::install(format!(
                    "'{}' was not found in PATH",
                    program
                )));
            }
        }

        info!(command = %command, "Installing binary");
        let indicator = self
            .ui
            .begin_progress(ProgressOptions::fixed(request.progress_title.as_str()));
        let result = self.terminal.run(command).await;
        indicator.finish();

        let exit = result?;
        if !exit.is_success() {
            return Err(RgoError::install(format!(
                "'{}' failed with {}",
                command, exit
            )));
        }

        self.ui
            .set_status_message(&request.status_message, STATUS_MESSAGE_TIMEOUT);
        info!(command = %command, "✅ Install command completed");
        Ok(())
    }

    /// Install the binary unless it is already present
    ///
    /// Returns `true` when an install ran.
    pub async fn ensure_installed(&self, request: &InstallRequest) -> RgoResult<bool> {
        if let Some(path) = self.installed_path(&request.command).await? {
            debug!(path = %path.display(), "Binary already installed");
            return Ok(false);
        }

        self.install(request).await?;
        Ok(true)
    }
}

/// Text shown to the user for a provisioning error
pub fn user_message(error: &RgoError) -> String {
    match error {
        RgoError::Config { message } | RgoError::Install { message } => message.clone(),
        other => other.to_string(),
    }
}
