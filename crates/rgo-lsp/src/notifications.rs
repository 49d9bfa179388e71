//! Custom server notifications and their dispatch
//!
//! The rgo language server pushes a handful of `custom/rgo/*` notifications
//! next to the standard LSP traffic. [`ServerNotification::decode`] turns a
//! raw `(method, params)` pair into one typed case, and [`NotificationRouter`]
//! applies its effect: a UI message, a progress transition, or a restart
//! request queued on the command channel.

use crate::commands::{CommandSender, EditorCommand};
use crate::progress::{ProgressId, ProgressRegistry};
use rgo_foundation::{EditorUi, MessageSeverity};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

pub const RESTART_LANGUAGE_SERVER: &str = "custom/rgo/restart_language_server";
pub const WINDOW_SHOW_INFO: &str = "custom/rgo/window_show_info";
pub const WINDOW_SHOW_WARN: &str = "custom/rgo/window_show_warn";
pub const WINDOW_SHOW_ERROR: &str = "custom/rgo/window_show_error";
pub const PROGRESS: &str = "custom/rgo/progress";

/// One decoded server notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerNotification {
    Restart,
    ShowMessage {
        severity: MessageSeverity,
        message: String,
    },
    Progress(ProgressNotification),
}

/// Payload of `custom/rgo/progress`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProgressNotification {
    pub id: ProgressId,
    /// Required by the server for `start`, usually omitted for `stop`
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "type")]
    pub kind: ProgressKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressKind {
    Start,
    Stop,
}

/// Why a notification could not be decoded
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unknown notification method '{0}'")]
    UnknownMethod(String),

    #[error("malformed '{method}' payload: {reason}")]
    Malformed { method: String, reason: String },
}

/// Message payloads arrive either as `{message}` or as a bare string
#[derive(Deserialize)]
#[serde(untagged)]
enum MessagePayload {
    Structured { message: String },
    Bare(String),
}

#[derive(Deserialize)]
struct EmbeddedMessage {
    message: String,
}

impl MessagePayload {
    fn into_text(self) -> String {
        match self {
            MessagePayload::Structured { message } => message,
            // Some server paths serialize the object before sending it
            MessagePayload::Bare(text) => match serde_json::from_str::<EmbeddedMessage>(&text) {
                Ok(embedded) => embedded.message,
                Err(_) => text,
            },
        }
    }
}

impl ServerNotification {
    /// Decode a notification against the fixed `custom/rgo/*` schema
    pub fn decode(method: &str, params: Option<Value>) -> Result<Self, DecodeError> {
        let severity = match method {
            RESTART_LANGUAGE_SERVER => return Ok(ServerNotification::Restart),
            PROGRESS => {
                let params = required(method, params)?;
                let progress = serde_json::from_value::<ProgressNotification>(params)
                    .map_err(|e| malformed(method, e))?;
                return Ok(ServerNotification::Progress(progress));
            }
            WINDOW_SHOW_INFO => MessageSeverity::Info,
            WINDOW_SHOW_WARN => MessageSeverity::Warning,
            WINDOW_SHOW_ERROR => MessageSeverity::Error,
            other => return Err(DecodeError::UnknownMethod(other.to_string())),
        };

        let params = required(method, params)?;
        let message = serde_json::from_value::<MessagePayload>(params)
            .map_err(|e| malformed(method, e))?
            .into_text();

        Ok(ServerNotification::ShowMessage { severity, message })
    }
}

fn required(method: &str, params: Option<Value>) -> Result<Value, DecodeError> {
    match params {
        Some(Value::Null) | None => Err(DecodeError::Malformed {
            method: method.to_string(),
            reason: "missing params".to_string(),
        }),
        Some(value) => Ok(value),
    }
}

fn malformed(method: &str, error: serde_json::Error) -> DecodeError {
    DecodeError::Malformed {
        method: method.to_string(),
        reason: error.to_string(),
    }
}

/// Applies decoded server notifications
///
/// Registered on a connection before it reads any traffic. Cloning shares the
/// same registry, UI and command channel.
#[derive(Clone)]
pub struct NotificationRouter {
    progress: ProgressRegistry,
    ui: Arc<dyn EditorUi>,
    commands: CommandSender,
}

impl NotificationRouter {
    pub fn new(progress: ProgressRegistry, ui: Arc<dyn EditorUi>, commands: CommandSender) -> Self {
        Self {
            progress,
            ui,
            commands,
        }
    }

    pub fn progress(&self) -> &ProgressRegistry {
        &self.progress
    }

    /// Handle one inbound notification. Never fails: bad input is logged and dropped.
    pub fn handle(&self, method: &str, params: Option<Value>) {
        match ServerNotification::decode(method, params) {
            Ok(notification) => self.dispatch(notification),
            Err(DecodeError::UnknownMethod(method)) => {
                debug!(method = %method, "Ignoring unhandled server notification");
            }
            Err(e) => {
                warn!(error = %e, "Dropping malformed server notification");
            }
        }
    }

    pub fn dispatch(&self, notification: ServerNotification) {
        match notification {
            ServerNotification::Restart => {
                debug!("Server requested a language client restart");
                self.commands.send(EditorCommand::RestartServer);
            }
            ServerNotification::ShowMessage { severity, message } => {
                debug!(%severity, message = %message, "Server message");
                self.ui.show_message(severity, &message);
            }
            ServerNotification::Progress(ProgressNotification {
                id,
                message,
                kind: ProgressKind::Start,
            }) => {
                let title = message.unwrap_or_else(|| id.to_string());
                self.progress.start_progress(id, title);
            }
            ServerNotification::Progress(ProgressNotification {
                id,
                kind: ProgressKind::Stop,
                ..
            }) => {
                self.progress.stop_progress(&id);
            }
        }
    }
}
