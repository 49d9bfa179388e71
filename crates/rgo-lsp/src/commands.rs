//! User-invocable commands and their serial dispatcher

use crate::lifecycle::ClientLifecycleController;
use rgo_config::ClientSettings;
use rgo_foundation::EditorUi;
use rgo_lsp_manager::{user_message, BinaryProvisioner, InstallRequest};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Commands exposed to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditorCommand {
    InstallServer,
    RestartServer,
    InstallPackagesDriver,
}

impl EditorCommand {
    pub const ALL: [EditorCommand; 3] = [
        EditorCommand::InstallServer,
        EditorCommand::RestartServer,
        EditorCommand::InstallPackagesDriver,
    ];

    /// Stable command identifier
    pub fn id(self) -> &'static str {
        match self {
            EditorCommand::InstallServer => "rgo.install",
            EditorCommand::RestartServer => "rgo.restart",
            EditorCommand::InstallPackagesDriver => "rgo.gopackagesdriver",
        }
    }
}

impl fmt::Display for EditorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown command '{0}'")]
pub struct UnknownCommand(pub String);

impl FromStr for EditorCommand {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EditorCommand::ALL
            .into_iter()
            .find(|command| command.id() == s)
            .ok_or_else(|| UnknownCommand(s.to_string()))
    }
}

/// Cloneable handle for queueing commands
#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: mpsc::UnboundedSender<EditorCommand>,
}

impl CommandSender {
    /// Queue a command. Returns false once the dispatcher has gone away.
    pub fn send(&self, command: EditorCommand) -> bool {
        match self.tx.send(command) {
            Ok(()) => true,
            Err(_) => {
                warn!(command = %command, "Command dispatcher stopped, dropping command");
                false
            }
        }
    }
}

/// Create the command queue shared by the router and the host
pub fn command_channel() -> (CommandSender, mpsc::UnboundedReceiver<EditorCommand>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (CommandSender { tx }, rx)
}

/// Binds each [`EditorCommand`] to the operation it performs
pub struct CommandRegistrar {
    provisioner: BinaryProvisioner,
    lifecycle: Arc<ClientLifecycleController>,
    settings: ClientSettings,
    ui: Arc<dyn EditorUi>,
}

impl CommandRegistrar {
    pub fn new(
        provisioner: BinaryProvisioner,
        lifecycle: Arc<ClientLifecycleController>,
        settings: ClientSettings,
        ui: Arc<dyn EditorUi>,
    ) -> Self {
        Self {
            provisioner,
            lifecycle,
            settings,
            ui,
        }
    }

    pub fn commands(&self) -> &'static [EditorCommand] {
        &EditorCommand::ALL
    }

    /// Run one command to completion, reporting failures to the user
    ///
    /// Returns whether the command succeeded.
    pub async fn execute(&self, command: EditorCommand) -> bool {
        info!(command = %command, "Executing command");
        match command {
            EditorCommand::InstallServer => {
                self.install(InstallRequest::language_server(
                    self.settings.language_server_install.as_str(),
                ))
                .await
            }
            EditorCommand::InstallPackagesDriver => {
                self.install(InstallRequest::packages_driver(
                    self.settings.gopackagesdriver_install.as_str(),
                ))
                .await
            }
            // The controller reports its own start failures
            EditorCommand::RestartServer => self.lifecycle.restart().await.is_ok(),
        }
    }

    async fn install(&self, request: InstallRequest) -> bool {
        match self.provisioner.install(&request).await {
            Ok(()) => true,
            Err(e) => {
                warn!(command = %request.command, error = %e, "Install failed");
                self.ui
                    .show_error(&format!("Error {}: {}", request.progress_title, user_message(&e)));
                false
            }
        }
    }

    /// Drain `commands` on a background task, one command at a time
    pub fn spawn_dispatcher(
        self: Arc<Self>,
        mut commands: mpsc::UnboundedReceiver<EditorCommand>,
    ) -> CommandDispatcher {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            loop {
                let command = tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    command = commands.recv() => match command {
                        Some(command) => command,
                        None => break,
                    },
                };
                self.execute(command).await;
            }
            debug!("Command dispatcher stopped");
        });

        CommandDispatcher {
            shutdown_tx,
            handle,
        }
    }
}

/// Handle to the running dispatcher task
pub struct CommandDispatcher {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl CommandDispatcher {
    /// Stop taking new commands and wait for the one in flight
    pub async fn shutdown(self) {
        self.shutdown_tx.send_replace(true);
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Command dispatcher task failed");
        }
    }
}
