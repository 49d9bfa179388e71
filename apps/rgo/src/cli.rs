//! CLI command handling for the rgo terminal host

use crate::terminal_ui::TerminalUi;
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use rgo_config::{ClientSettings, RgoConfig};
use rgo_foundation::EditorUi;
use rgo_lsp::{EditorCommand, Extension, ExtensionHost, StdioConnectionFactory};
use rgo_lsp_manager::{BinaryProvisioner, ExtensionLayout, ShellTerminal};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

/// The main CLI struct.
#[derive(Parser, Debug)]
#[command(name = "rgo")]
#[command(about = "Language client for the rgo Go language server")]
#[command(version)]
pub struct Cli {
    /// Extension install directory (the server binary lives in its `bin/`)
    #[arg(long, global = true)]
    pub extension_dir: Option<PathBuf>,

    /// Workspace root handed to the language server
    #[arg(long, global = true)]
    pub workspace: Option<PathBuf>,

    /// The command to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// The available commands.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Start the language client and read commands from stdin
    ///
    /// Lines accepted on stdin:
    ///   rgo.install / rgo.restart / rgo.gopackagesdriver
    ///   cancel  - dismiss all cancellable progress indicators
    ///   status  - print the session state
    ///   quit    - deactivate and exit
    Run,
    /// Install the language server binary (rgo.install)
    Install,
    /// Install the packages driver binary (rgo.gopackagesdriver)
    InstallDriver,
    /// Show binary locations and install state
    Status,
}

impl Cli {
    /// `--workspace`, or the current directory
    pub fn workspace_root(&self) -> std::io::Result<PathBuf> {
        match &self.workspace {
            Some(dir) => Ok(dir.clone()),
            None => std::env::current_dir(),
        }
    }

    /// Configuration layered over the config files of the workspace root
    pub fn load_config(&self) -> anyhow::Result<RgoConfig> {
        let workspace = self.workspace_root()?;
        RgoConfig::load_from(&workspace)
            .with_context(|| format!("Failed to load configuration for {}", workspace.display()))
    }
}

/// One line typed on stdin while running
#[derive(Debug, PartialEq, Eq)]
enum StdinCommand {
    Editor(EditorCommand),
    Cancel,
    Status,
    Quit,
    Empty,
    Unknown(String),
}

fn parse_stdin_command(line: &str) -> StdinCommand {
    match line.trim() {
        "" => StdinCommand::Empty,
        "cancel" => StdinCommand::Cancel,
        "status" => StdinCommand::Status,
        "quit" | "exit" => StdinCommand::Quit,
        other => match other.parse::<EditorCommand>() {
            Ok(command) => StdinCommand::Editor(command),
            Err(_) => StdinCommand::Unknown(other.to_string()),
        },
    }
}

/// Run the parsed command line to completion
pub async fn run(cli: Cli, config: RgoConfig) -> anyhow::Result<()> {
    let workspace = cli.workspace_root()?;
    let mut settings = config.client;
    if let Some(dir) = cli.extension_dir {
        settings.extension_dir = Some(dir);
    }

    let extension_dir = settings
        .resolve_extension_dir()
        .context("Cannot determine the extension directory")?;
    debug!(
        extension_dir = %extension_dir.display(),
        workspace = %workspace.display(),
        "Resolved client directories"
    );

    let ui = TerminalUi::new();
    let host = ExtensionHost::new(
        Arc::new(ui.clone()),
        Arc::new(ShellTerminal::new()),
        Arc::new(ExtensionLayout::new(extension_dir.clone())),
        Arc::new(StdioConnectionFactory::new()),
    )
    .with_root_dir(workspace);

    match cli.command {
        Commands::Run => run_client(settings, host, ui).await,
        Commands::Install => run_once(settings, host, EditorCommand::InstallServer).await,
        Commands::InstallDriver => {
            run_once(settings, host, EditorCommand::InstallPackagesDriver).await
        }
        Commands::Status => {
            print_status(&settings, &extension_dir, host.ui).await;
            Ok(())
        }
    }
}

async fn run_client(settings: ClientSettings, host: ExtensionHost, ui: TerminalUi) -> anyhow::Result<()> {
    let extension = Extension::activate(settings, host).await;
    let commands = extension.commands();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            debug!("stdin closed");
            break;
        };

        match parse_stdin_command(&line) {
            StdinCommand::Editor(command) => {
                commands.send(command);
            }
            StdinCommand::Cancel => {
                let cancelled = ui.cancel_all();
                debug!(cancelled, "Cancelled progress indicators");
            }
            StdinCommand::Status => {
                println!("{}", extension.lifecycle().state());
            }
            StdinCommand::Quit => break,
            StdinCommand::Empty => {}
            StdinCommand::Unknown(other) => {
                ui.show_warning(&format!("Unknown command '{}'", other));
            }
        }
    }

    extension.deactivate().await;
    Ok(())
}

/// Activate without a language server, run one command, deactivate
async fn run_once(
    mut settings: ClientSettings,
    host: ExtensionHost,
    command: EditorCommand,
) -> anyhow::Result<()> {
    settings.use_language_server = false;
    let extension = Extension::activate(settings, host).await;
    let succeeded = extension.execute(command).await;
    extension.deactivate().await;

    if !succeeded {
        bail!("{} failed", command);
    }
    Ok(())
}

async fn print_status(
    settings: &ClientSettings,
    extension_dir: &std::path::Path,
    ui: Arc<dyn EditorUi>,
) {
    let layout = ExtensionLayout::new(extension_dir);
    let server_binary = layout.server_binary_path();
    println!("extension dir:        {}", extension_dir.display());
    println!(
        "server binary:        {} ({})",
        server_binary.display(),
        if server_binary.is_file() { "present" } else { "missing" }
    );
    println!("use language server:  {}", settings.use_language_server);

    let provisioner = BinaryProvisioner::new(ui, Arc::new(ShellTerminal::new()));
    for (name, command) in [
        ("rgo_lsp_server", settings.language_server_install.as_str()),
        ("rgopackagesdriver", settings.gopackagesdriver_install.as_str()),
    ] {
        let installed = provisioner.is_installed(command).await;
        println!(
            "{:<21} {}",
            format!("{} (GOPATH):", name),
            if installed { "installed" } else { "not installed" }
        );
    }
}
