//! rgo language client core
//!
//! Connects an editor to the `rgo_lsp_server` process and relays the server's
//! custom notifications to the editor UI.
//!
//! - [`progress`]: server-announced progress tasks backed by cancellable indicators
//! - [`notifications`]: decoding and dispatch of `custom/rgo/*` notifications
//! - [`lifecycle`]: the start/stop/restart state machine for the session
//! - [`commands`]: `rgo.install`, `rgo.restart` and `rgo.gopackagesdriver`
//! - [`extension`]: activation and deactivation of the whole client
//! - [`lsp_system`]: the connection seam and its stdio implementation

pub mod commands;
pub mod extension;
pub mod lifecycle;
pub mod lsp_system;
pub mod notifications;
pub mod progress;

pub use commands::{command_channel, CommandRegistrar, CommandSender, EditorCommand};
pub use extension::{Extension, ExtensionHost};
pub use lifecycle::{ClientLifecycleController, SessionState};
pub use lsp_system::{
    ConnectionFactory, ConnectionOptions, DocumentFilter, LanguageConnection,
    StdioConnectionFactory,
};
pub use notifications::{NotificationRouter, ServerNotification};
pub use progress::{ProgressEvent, ProgressId, ProgressRegistry, ProgressTask, StopReason};
