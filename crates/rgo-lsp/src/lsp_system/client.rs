//! Stdio JSON-RPC connection to the rgo language server process

use super::{ConnectionFactory, ConnectionOptions, DocumentFilter, LanguageConnection};
use crate::notifications::NotificationRouter;
use async_trait::async_trait;
use rgo_foundation::{RgoError, RgoResult};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use url::Url;

/// How long shutdown waits for the server to answer and exit
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);
/// Buffer size for the outbound message channel
const CHANNEL_BUFFER_SIZE: usize = 256;
/// Frames larger than this are discarded unread
const MAX_FRAME_LENGTH: usize = 64 * 1024 * 1024;

type PendingRequests = Arc<Mutex<HashMap<i64, oneshot::Sender<Result<Value, String>>>>>;

/// Outbound JSON-RPC messages
#[derive(Debug)]
enum OutboundMessage {
    Request {
        id: i64,
        method: String,
        params: Value,
    },
    Notification {
        method: String,
        params: Value,
    },
    Response {
        id: Value,
        result: Value,
    },
    ErrorResponse {
        id: Value,
        error: Value,
    },
}

impl OutboundMessage {
    fn to_json(&self) -> Value {
        match self {
            OutboundMessage::Request { id, method, params } => json!({
                "jsonrpc": "2.0",
                "id": id,
                "method": method,
                "params": params
            }),
            OutboundMessage::Notification { method, params } => json!({
                "jsonrpc": "2.0",
                "method": method,
                "params": params
            }),
            OutboundMessage::Response { id, result } => json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": result
            }),
            OutboundMessage::ErrorResponse { id, error } => json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": error
            }),
        }
    }
}

/// Spawns the server binary and connects over its stdio
#[derive(Debug, Clone, Default)]
pub struct StdioConnectionFactory;

impl StdioConnectionFactory {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ConnectionFactory for StdioConnectionFactory {
    async fn connect(
        &self,
        options: ConnectionOptions,
        router: NotificationRouter,
    ) -> RgoResult<Box<dyn LanguageConnection>> {
        let connection = StdioConnection::spawn(options, router).await?;
        Ok(Box::new(connection))
    }
}

/// A running language server process and its message pumps
pub struct StdioConnection {
    process: Mutex<Child>,
    message_tx: mpsc::Sender<OutboundMessage>,
    pending_requests: PendingRequests,
    next_id: AtomicI64,
    document_selector: Vec<DocumentFilter>,
    server_binary: PathBuf,
}

impl StdioConnection {
    /// Start the server process, wire `router` onto its notifications and
    /// complete the initialize handshake
    pub async fn spawn(options: ConnectionOptions, router: NotificationRouter) -> RgoResult<Self> {
        let root_dir = match &options.root_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?,
        };
        let root_uri = directory_uri(&root_dir)?;

        debug!(
            binary = %options.server_binary.display(),
            root_dir = %root_dir.display(),
            "Spawning language server"
        );

        let mut child = Command::new(&options.server_binary)
            .current_dir(&root_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                RgoError::handshake(format!(
                    "Failed to spawn {}: {}",
                    options.server_binary.display(),
                    e
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| RgoError::handshake("Failed to get stdin for language server"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RgoError::handshake("Failed to get stdout for language server"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| RgoError::handshake("Failed to get stderr for language server"))?;

        let pending_requests: PendingRequests = Arc::new(Mutex::new(HashMap::new()));
        let (message_tx, message_rx) = mpsc::channel::<OutboundMessage>(CHANNEL_BUFFER_SIZE);

        tokio::spawn(write_messages(stdin, message_rx, pending_requests.clone()));
        tokio::spawn(log_stderr(stderr));
        // The router is attached before the first byte of stdout is read
        tokio::spawn(read_messages(
            stdout,
            pending_requests.clone(),
            message_tx.clone(),
            router,
        ));

        let connection = Self {
            process: Mutex::new(child),
            message_tx,
            pending_requests,
            next_id: AtomicI64::new(1),
            document_selector: options.document_selector,
            server_binary: options.server_binary,
        };

        connection.initialize(&root_uri).await?;
        Ok(connection)
    }

    pub fn document_selector(&self) -> &[DocumentFilter] {
        &self.document_selector
    }

    async fn initialize(&self, root_uri: &Url) -> RgoResult<()> {
        let root_uri = root_uri.as_str();
        let params = json!({
            "processId": std::process::id(),
            "clientInfo": {
                "name": "rgo",
                "version": env!("CARGO_PKG_VERSION")
            },
            "rootUri": root_uri,
            "workspaceFolders": [{
                "uri": root_uri,
                "name": "workspace"
            }],
            "capabilities": {
                "window": { "workDoneProgress": true },
                "workspace": { "configuration": true, "workspaceFolders": true }
            }
        });

        debug!(binary = %self.server_binary.display(), "Sending initialize request");
        let result = self
            .send_request("initialize", params)
            .await
            .map_err(|e| RgoError::handshake(e.to_string()))?;
        debug!(capabilities = ?result.get("capabilities"), "Initialize response received");

        self.send_notification("initialized", json!({}))
            .await
            .map_err(|e| RgoError::handshake(e.to_string()))?;

        info!(binary = %self.server_binary.display(), "Language server initialized");
        Ok(())
    }

    /// Send a request and wait for its response
    pub async fn send_request(&self, method: &str, params: Value) -> RgoResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (response_tx, response_rx) = oneshot::channel();
        self.pending_requests.lock().await.insert(id, response_tx);

        debug!(lsp_method = %method, lsp_request_id = id, "Sending LSP request");

        let message = OutboundMessage::Request {
            id,
            method: method.to_string(),
            params,
        };
        if let Err(e) = self.message_tx.send(message).await {
            self.pending_requests.lock().await.remove(&id);
            return Err(RgoError::transport(format!("Failed to send request: {}", e)));
        }

        match response_rx.await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(error)) => Err(RgoError::transport(format!(
                "'{}' failed: {}",
                method, error
            ))),
            Err(_) => Err(RgoError::transport("Response channel closed")),
        }
    }

    /// Send a notification to the server (no response expected)
    pub async fn send_notification(&self, method: &str, params: Value) -> RgoResult<()> {
        let message = OutboundMessage::Notification {
            method: method.to_string(),
            params,
        };
        self.message_tx
            .send(message)
            .await
            .map_err(|e| RgoError::transport(format!("Failed to send notification: {}", e)))?;
        debug!(lsp_method = %method, "Queued LSP notification");
        Ok(())
    }
}

#[async_trait]
impl LanguageConnection for StdioConnection {
    /// `shutdown` request, `exit` notification, then reap the process
    async fn shutdown(self: Box<Self>) -> RgoResult<()> {
        let pid = self.process.lock().await.id();

        match timeout(SHUTDOWN_TIMEOUT, self.send_request("shutdown", Value::Null)).await {
            Ok(Ok(_)) => debug!(pid = ?pid, "Sent LSP shutdown request"),
            Ok(Err(e)) => warn!(pid = ?pid, error = %e, "LSP shutdown request failed"),
            Err(_) => warn!(pid = ?pid, "LSP shutdown request timed out"),
        }

        if let Err(e) = self.send_notification("exit", Value::Null).await {
            debug!(pid = ?pid, error = %e, "Failed to send LSP exit notification");
        }

        let mut process = self.process.lock().await;
        match timeout(SHUTDOWN_TIMEOUT, process.wait()).await {
            Ok(Ok(status)) => {
                debug!(pid = ?pid, exit_status = ?status, "Language server exited");
                return Ok(());
            }
            Ok(Err(e)) => warn!(pid = ?pid, error = %e, "Failed to wait for language server"),
            Err(_) => warn!(pid = ?pid, "Language server did not exit in time, killing it"),
        }

        process.kill().await.map_err(|e| {
            RgoError::transport(format!("Failed to kill language server process: {}", e))
        })
    }
}

async fn write_messages<W>(
    mut stdin: W,
    mut message_rx: mpsc::Receiver<OutboundMessage>,
    pending_requests: PendingRequests,
) where
    W: tokio::io::AsyncWrite + Unpin,
{
    while let Some(message) = message_rx.recv().await {
        let content = message.to_json().to_string();
        let framed = format!("Content-Length: {}\r\n\r\n{}", content.len(), content);

        let written = match stdin.write_all(framed.as_bytes()).await {
            Ok(()) => stdin.flush().await,
            Err(e) => Err(e),
        };

        if let Err(e) = written {
            error!(error = %e, "Failed to write to language server");
            if let OutboundMessage::Request { id, .. } = message {
                if let Some(sender) = pending_requests.lock().await.remove(&id) {
                    let _ = sender.send(Err(format!("Write error: {}", e)));
                }
            }
            break;
        }
    }
}

async fn log_stderr<R>(stderr: R)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(stderr = %line.trim_end(), "Language server stderr");
    }
}

async fn read_messages<R>(
    stdout: R,
    pending_requests: PendingRequests,
    message_tx: mpsc::Sender<OutboundMessage>,
    router: NotificationRouter,
) where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stdout);
    loop {
        match read_frame(&mut reader).await {
            Ok(Some(body)) => match serde_json::from_slice::<Value>(&body) {
                Ok(message) => {
                    handle_message(message, &pending_requests, &message_tx, &router).await;
                }
                Err(e) => {
                    warn!(error = %e, length = body.len(), "Dropping unparsable frame from language server");
                }
            },
            Ok(None) => {
                debug!("Language server stdout closed");
                break;
            }
            Err(e) => {
                error!(error = %e, "Failed to read from language server");
                break;
            }
        }
    }

    // Nothing can answer outstanding requests any more
    let mut pending = pending_requests.lock().await;
    for (_, sender) in pending.drain() {
        let _ = sender.send(Err("Language server closed the connection".to_string()));
    }
}

/// `file://` URI of a workspace directory, relative paths taken from the cwd
fn directory_uri(dir: &Path) -> RgoResult<Url> {
    let absolute = if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        std::env::current_dir()?.join(dir)
    };
    Url::from_directory_path(&absolute).map_err(|()| {
        RgoError::config(format!(
            "Workspace root {} cannot be expressed as a file URI",
            absolute.display()
        ))
    })
}

/// Parse Content-Length header from a message header line
fn parse_content_length(line: &str) -> Option<usize> {
    line.strip_prefix("Content-Length: ")
        .and_then(|stripped| stripped.trim().parse().ok())
}

/// Read the body of one framed message; `None` at end of stream
///
/// Oversized frames are skipped so the stream stays aligned on the next header.
async fn read_frame<R>(reader: &mut BufReader<R>) -> RgoResult<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut line = String::new();

    loop {
        let mut content_length = None;
        loop {
            line.clear();
            if reader.read_line(&mut line).await? == 0 {
                return Ok(None);
            }
            let header = line.trim();
            if header.is_empty() {
                if content_length.is_some() {
                    break;
                }
                continue;
            }
            if let Some(length) = parse_content_length(header) {
                content_length = Some(length);
            }
        }

        let length = content_length.unwrap_or_default();
        if length > MAX_FRAME_LENGTH {
            warn!(length, limit = MAX_FRAME_LENGTH, "Skipping oversized frame from language server");
            let skipped =
                tokio::io::copy(&mut (&mut *reader).take(length as u64), &mut tokio::io::sink())
                    .await?;
            if skipped < length as u64 {
                return Ok(None);
            }
            continue;
        }

        let mut body = vec![0u8; length];
        reader.read_exact(&mut body).await?;
        return Ok(Some(body));
    }
}

async fn handle_message(
    message: Value,
    pending_requests: &PendingRequests,
    message_tx: &mpsc::Sender<OutboundMessage>,
    router: &NotificationRouter,
) {
    let method = message.get("method").and_then(Value::as_str);
    match (method, message.get("id")) {
        (Some(_), Some(_)) => handle_server_request(&message, message_tx).await,
        (Some(method), None) => router.handle(method, message.get("params").cloned()),
        (None, Some(id)) => {
            let Some(id) = id.as_i64() else {
                warn!(id = %id, "Response with non-numeric id");
                return;
            };
            let Some(sender) = pending_requests.lock().await.remove(&id) else {
                warn!(id, "Received response for unknown request ID");
                return;
            };
            let outcome = if let Some(error) = message.get("error") {
                Err(error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown error")
                    .to_string())
            } else {
                Ok(message.get("result").cloned().unwrap_or(Value::Null))
            };
            let _ = sender.send(outcome);
        }
        (None, None) => warn!(message = %message, "Received unhandled message from language server"),
    }
}

/// Answer server-initiated requests so the server never blocks on the client
async fn handle_server_request(request: &Value, message_tx: &mpsc::Sender<OutboundMessage>) {
    let id = request.get("id").cloned().unwrap_or(Value::Null);
    let method = request.get("method").and_then(Value::as_str);
    debug!(method = ?method, "Handling server request");

    let response = match method {
        Some("workspace/configuration") => {
            // One null per requested item means "use your defaults"
            let items_len = request
                .get("params")
                .and_then(|p| p.get("items"))
                .and_then(Value::as_array)
                .map_or(0, Vec::len);
            OutboundMessage::Response {
                id,
                result: json!(vec![Value::Null; items_len]),
            }
        }
        Some("client/registerCapability") | Some("window/workDoneProgress/create") => {
            OutboundMessage::Response {
                id,
                result: Value::Null,
            }
        }
        _ => {
            warn!(method = ?method, "Received unsupported server request");
            OutboundMessage::ErrorResponse {
                id,
                error: json!({
                    "code": -32601,
                    "message": "Method not found"
                }),
            }
        }
    };

    if let Err(e) = message_tx.send(response).await {
        error!(error = %e, "Failed to send response for server request");
    }
}
