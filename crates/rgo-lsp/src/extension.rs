//! Activation and deactivation of the rgo client

use crate::commands::{
    command_channel, CommandDispatcher, CommandRegistrar, CommandSender, EditorCommand,
};
use crate::lifecycle::ClientLifecycleController;
use crate::lsp_system::ConnectionFactory;
use crate::notifications::NotificationRouter;
use crate::progress::ProgressRegistry;
use rgo_config::ClientSettings;
use rgo_foundation::{EditorUi, TerminalRunner};
use rgo_lsp_manager::{user_message, BinaryLocator, BinaryProvisioner, InstallRequest};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Services the host environment provides to the client
#[derive(Clone)]
pub struct ExtensionHost {
    pub ui: Arc<dyn EditorUi>,
    pub terminal: Arc<dyn TerminalRunner>,
    pub locator: Arc<dyn BinaryLocator>,
    pub connections: Arc<dyn ConnectionFactory>,
    /// Workspace root for the language server
    pub root_dir: Option<PathBuf>,
}

impl ExtensionHost {
    pub fn new(
        ui: Arc<dyn EditorUi>,
        terminal: Arc<dyn TerminalRunner>,
        locator: Arc<dyn BinaryLocator>,
        connections: Arc<dyn ConnectionFactory>,
    ) -> Self {
        Self {
            ui,
            terminal,
            locator,
            connections,
            root_dir: None,
        }
    }

    pub fn with_root_dir(mut self, root_dir: impl Into<PathBuf>) -> Self {
        self.root_dir = Some(root_dir.into());
        self
    }
}

/// One activation of the client: owns the session and everything wired to it
pub struct Extension {
    progress: ProgressRegistry,
    lifecycle: Arc<ClientLifecycleController>,
    registrar: Arc<CommandRegistrar>,
    commands: CommandSender,
    dispatcher: CommandDispatcher,
}

impl Extension {
    /// Wire up all components and start the language client when enabled
    ///
    /// Install and start failures are reported to the user; activation itself
    /// always succeeds so commands stay available.
    pub async fn activate(settings: ClientSettings, host: ExtensionHost) -> Self {
        let ExtensionHost {
            ui,
            terminal,
            locator,
            connections,
            root_dir,
        } = host;

        let progress = ProgressRegistry::new(ui.clone());
        let (commands, command_rx) = command_channel();
        let router = NotificationRouter::new(progress.clone(), ui.clone(), commands.clone());

        let mut lifecycle = ClientLifecycleController::new(locator, connections, router, ui.clone());
        if let Some(root_dir) = root_dir {
            lifecycle = lifecycle.with_root_dir(root_dir);
        }
        let lifecycle = Arc::new(lifecycle);

        let provisioner = BinaryProvisioner::new(ui.clone(), terminal);
        let registrar = Arc::new(CommandRegistrar::new(
            provisioner.clone(),
            lifecycle.clone(),
            settings.clone(),
            ui.clone(),
        ));
        let dispatcher = registrar.clone().spawn_dispatcher(command_rx);

        let extension = Self {
            progress,
            lifecycle,
            registrar,
            commands,
            dispatcher,
        };

        if !settings.use_language_server {
            info!("Language server disabled by configuration");
            return extension;
        }

        if settings.auto_install {
            let requests = [
                InstallRequest::language_server(settings.language_server_install.as_str()),
                InstallRequest::packages_driver(settings.gopackagesdriver_install.as_str()),
            ];
            for request in requests {
                match provisioner.ensure_installed(&request).await {
                    Ok(installed) => debug!(command = %request.command, installed, "Binary ready"),
                    Err(e) => {
                        warn!(command = %request.command, error = %e, "Automatic install failed");
                        ui.show_error(&user_message(&e));
                    }
                }
            }
        }

        if let Err(e) = extension.lifecycle.start().await {
            warn!(error = %e, "Language client not started during activation");
        }
        extension
    }

    /// Queue handle for commands coming from the user or the server
    pub fn commands(&self) -> CommandSender {
        self.commands.clone()
    }

    /// Run one command directly, bypassing the queue
    pub async fn execute(&self, command: EditorCommand) -> bool {
        self.registrar.execute(command).await
    }

    pub fn lifecycle(&self) -> &Arc<ClientLifecycleController> {
        &self.lifecycle
    }

    pub fn progress(&self) -> &ProgressRegistry {
        &self.progress
    }

    /// Tear the activation down, waiting for the connection to close
    pub async fn deactivate(self) {
        info!("Deactivating rgo client");
        self.dispatcher.shutdown().await;
        self.lifecycle.stop().await;
        // Progress notifications can still arrive during the shutdown handshake
        self.progress.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::tests::{FakeFactory, FakeLocator};
    use crate::lifecycle::{SessionState, SERVER_STARTED_MESSAGE};
    use crate::notifications::{PROGRESS, RESTART_LANGUAGE_SERVER};
    use rgo_foundation::MessageSeverity;
    use rgo_lsp_manager::GOPATH_ENV;
    use rgo_test_support::mocks::mock_terminal_runner;
    use rgo_test_support::{create_test_settings, RecordingUi};
    use serde_json::json;
    use serial_test::serial;
    use std::path::Path;

    fn host(ui: &RecordingUi, factory: Arc<FakeFactory>) -> ExtensionHost {
        let mut terminal = mock_terminal_runner();
        terminal.expect_run().never();
        ExtensionHost::new(
            Arc::new(ui.clone()),
            Arc::new(terminal),
            Arc::new(FakeLocator::found()),
            factory,
        )
    }

    fn settings() -> ClientSettings {
        create_test_settings(Path::new("/opt/rgo"))
    }

    #[tokio::test]
    async fn test_activate_starts_client() {
        let ui = RecordingUi::new();
        let factory = Arc::new(FakeFactory::default());

        let extension = Extension::activate(settings(), host(&ui, factory.clone())).await;

        assert!(extension.lifecycle().is_running());
        assert!(ui
            .messages_with(MessageSeverity::Info)
            .contains(&SERVER_STARTED_MESSAGE.to_string()));
        extension.deactivate().await;
        assert_eq!(factory.shutdowns(), 1);
    }

    #[tokio::test]
    async fn test_disabled_language_server_is_not_started() {
        let ui = RecordingUi::new();
        let factory = Arc::new(FakeFactory::default());
        let mut settings = settings();
        settings.use_language_server = false;

        let extension = Extension::activate(settings, host(&ui, factory.clone())).await;

        assert_eq!(extension.lifecycle().state(), SessionState::Stopped);
        assert_eq!(factory.connects(), 0);
        extension.deactivate().await;
    }

    #[tokio::test]
    #[serial]
    async fn test_auto_install_without_gopath_reports_and_continues() {
        std::env::remove_var(GOPATH_ENV);
        let ui = RecordingUi::new();
        let factory = Arc::new(FakeFactory::default());
        let mut settings = settings();
        settings.auto_install = true;

        let extension = Extension::activate(settings, host(&ui, factory.clone())).await;

        assert_eq!(
            ui.messages_with(MessageSeverity::Error),
            vec![
                "GOPATH is not set in environment variables".to_string(),
                "GOPATH is not set in environment variables".to_string(),
            ]
        );
        assert!(extension.lifecycle().is_running());
        extension.deactivate().await;
    }

    #[tokio::test]
    async fn test_server_restart_notification_restarts_session() {
        let ui = RecordingUi::new();
        let factory = Arc::new(FakeFactory::default());
        let extension = Extension::activate(settings(), host(&ui, factory.clone())).await;
        let mut states = extension.lifecycle().subscribe();

        let router = NotificationRouter::new(
            extension.progress().clone(),
            Arc::new(ui.clone()),
            extension.commands(),
        );
        router.handle(RESTART_LANGUAGE_SERVER, None);

        while factory.connects() < 2 {
            states.changed().await.unwrap();
        }
        assert!(extension.lifecycle().is_running());
        assert_eq!(factory.shutdowns(), 1);
        extension.deactivate().await;
    }

    #[tokio::test]
    async fn test_progress_started_during_shutdown_is_cleared() {
        let ui = RecordingUi::new();
        let factory = Arc::new(FakeFactory::default());
        factory
            .progress_on_shutdown
            .store(true, std::sync::atomic::Ordering::SeqCst);
        let extension = Extension::activate(settings(), host(&ui, factory.clone())).await;
        let progress = extension.progress().clone();

        extension.deactivate().await;
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }

        assert!(ui.indicator("Late task").is_some());
        assert!(progress.is_empty());
        assert_eq!(ui.open_indicators(), 0);
    }

    #[tokio::test]
    async fn test_deactivate_clears_progress_and_stops() {
        let ui = RecordingUi::new();
        let factory = Arc::new(FakeFactory::default());
        let extension = Extension::activate(settings(), host(&ui, factory.clone())).await;

        let router = NotificationRouter::new(
            extension.progress().clone(),
            Arc::new(ui.clone()),
            extension.commands(),
        );
        router.handle(
            PROGRESS,
            Some(json!({"id": "rgo_progress_idl", "message": "RGO fetching idl repos...", "type": "start"})),
        );
        assert_eq!(extension.progress().len(), 1);

        let lifecycle = extension.lifecycle().clone();
        let progress = extension.progress().clone();
        let commands = extension.commands();
        extension.deactivate().await;
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }

        assert_eq!(lifecycle.state(), SessionState::Stopped);
        assert!(progress.is_empty());
        assert_eq!(ui.open_indicators(), 0);
        assert!(!commands.send(EditorCommand::RestartServer));
    }
}
