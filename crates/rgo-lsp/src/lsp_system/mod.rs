//! Connection seam between the lifecycle controller and a language server
//!
//! The controller only knows [`ConnectionFactory`] and [`LanguageConnection`].
//! [`client::StdioConnectionFactory`] is the production implementation that
//! spawns the server binary and speaks JSON-RPC over its stdio.

pub mod client;

use crate::notifications::NotificationRouter;
use async_trait::async_trait;
use rgo_foundation::RgoResult;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use client::{StdioConnection, StdioConnectionFactory};

/// Documents a connection is responsible for, as an LSP document filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFilter {
    pub scheme: String,
    pub language: String,
}

impl DocumentFilter {
    /// `{scheme: "file", language: "go"}`
    pub fn go_files() -> Self {
        Self {
            scheme: "file".to_string(),
            language: "go".to_string(),
        }
    }
}

/// Everything needed to open one connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Language server executable
    pub server_binary: PathBuf,
    pub document_selector: Vec<DocumentFilter>,
    /// Workspace root sent in `initialize`, current directory when unset
    pub root_dir: Option<PathBuf>,
}

impl ConnectionOptions {
    pub fn new(server_binary: impl Into<PathBuf>) -> Self {
        Self {
            server_binary: server_binary.into(),
            document_selector: vec![DocumentFilter::go_files()],
            root_dir: None,
        }
    }

    pub fn with_root_dir(mut self, root_dir: Option<PathBuf>) -> Self {
        self.root_dir = root_dir;
        self
    }
}

/// An established language server connection
#[async_trait]
pub trait LanguageConnection: Send + Sync {
    /// Shut the server down and release the connection
    async fn shutdown(self: Box<Self>) -> RgoResult<()>;
}

/// Opens connections to the language server
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    /// Open a connection with `router` registered for server notifications.
    ///
    /// Resolves once the initialize handshake has completed. There is no timeout.
    async fn connect(
        &self,
        options: ConnectionOptions,
        router: NotificationRouter,
    ) -> RgoResult<Box<dyn LanguageConnection>>;
}
