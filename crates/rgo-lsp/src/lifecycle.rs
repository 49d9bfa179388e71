//! Language client session state machine
//!
//! There is exactly one session per activation. Every transition runs inside
//! one async mutex, so `start`, `stop` and `restart` calls coming from user
//! commands and from the server's restart notification queue up in arrival
//! order instead of racing.
//!
//! ```text
//! Stopped --start--> Starting --handshake ok--> Running
//!    ^                  |                          |
//!    |            handshake failed               stop
//!    |                  v                          v
//!    +------------------+---------------------- Stopping
//! ```

use crate::lsp_system::{ConnectionFactory, ConnectionOptions, LanguageConnection};
use crate::notifications::NotificationRouter;
use rgo_config::logging::session_span;
use rgo_foundation::{EditorUi, RgoError, RgoResult};
use rgo_lsp_manager::BinaryLocator;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn, Instrument};

/// Confirmation shown once the handshake completes
pub const SERVER_STARTED_MESSAGE: &str = "Rgo Language Server started";

/// Observable state of the client session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Stopped => "stopped",
            SessionState::Starting => "starting",
            SessionState::Running => "running",
            SessionState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

type Session = Option<Box<dyn LanguageConnection>>;

/// Owns the single connection to the language server
pub struct ClientLifecycleController {
    locator: Arc<dyn BinaryLocator>,
    factory: Arc<dyn ConnectionFactory>,
    router: NotificationRouter,
    ui: Arc<dyn EditorUi>,
    root_dir: Option<PathBuf>,
    session: Mutex<Session>,
    state_tx: watch::Sender<SessionState>,
}

impl ClientLifecycleController {
    pub fn new(
        locator: Arc<dyn BinaryLocator>,
        factory: Arc<dyn ConnectionFactory>,
        router: NotificationRouter,
        ui: Arc<dyn EditorUi>,
    ) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Stopped);
        Self {
            locator,
            factory,
            router,
            ui,
            root_dir: None,
            session: Mutex::new(None),
            state_tx,
        }
    }

    /// Workspace root handed to the server on `initialize`
    pub fn with_root_dir(mut self, root_dir: impl Into<PathBuf>) -> Self {
        self.root_dir = Some(root_dir.into());
        self
    }

    pub fn state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.state() == SessionState::Running
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Connect to the language server.
    ///
    /// Only valid from [`SessionState::Stopped`]; any other state is rejected
    /// with [`RgoError::InvalidState`] and the session is left untouched.
    /// Resolution and handshake failures are shown to the user and leave the
    /// session stopped.
    pub async fn start(&self) -> RgoResult<()> {
        let mut session = self.session.lock().await;
        self.start_locked(&mut session).await
    }

    /// Disconnect from the language server. A no-op when already stopped.
    pub async fn stop(&self) {
        let mut session = self.session.lock().await;
        self.stop_locked(&mut session).await;
    }

    /// Stop then start, with no other transition in between
    pub async fn restart(&self) -> RgoResult<()> {
        let mut session = self.session.lock().await;
        info!(state = %self.state(), "Restarting language client");
        self.stop_locked(&mut session).await;
        self.start_locked(&mut session).await
    }

    async fn start_locked(&self, session: &mut Session) -> RgoResult<()> {
        let state = self.state();
        if state != SessionState::Stopped {
            warn!(%state, "Rejecting start: language client is not stopped");
            return Err(RgoError::invalid_state("start", state));
        }

        self.set_state(SessionState::Starting);
        match self.connect().await {
            Ok(connection) => {
                *session = Some(connection);
                self.set_state(SessionState::Running);
                self.ui.show_info(SERVER_STARTED_MESSAGE);
                Ok(())
            }
            Err(e) => {
                self.set_state(SessionState::Stopped);
                error!(error = %e, "Failed to start language client");
                self.ui
                    .show_error(&format!("Failed to start Rgo Language Server: {}", e));
                Err(e)
            }
        }
    }

    async fn connect(&self) -> RgoResult<Box<dyn LanguageConnection>> {
        let binary = self.locator.server_binary()?;
        let span = session_span(&binary.display().to_string());
        let options = ConnectionOptions::new(binary).with_root_dir(self.root_dir.clone());

        self.factory
            .connect(options, self.router.clone())
            .instrument(span)
            .await
    }

    async fn stop_locked(&self, session: &mut Session) {
        let Some(connection) = session.take() else {
            debug!(state = %self.state(), "Language client already stopped");
            return;
        };

        self.set_state(SessionState::Stopping);
        if let Err(e) = connection.shutdown().await {
            warn!(error = %e, "Language server did not shut down cleanly");
        }
        self.set_state(SessionState::Stopped);
        info!("Language client stopped");
    }

    fn set_state(&self, state: SessionState) {
        let previous = self.state_tx.send_replace(state);
        debug!(from = %previous, to = %state, "Session state changed");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::commands::command_channel;
    use crate::lsp_system::DocumentFilter;
    use crate::notifications::{PROGRESS, WINDOW_SHOW_INFO};
    use crate::progress::ProgressRegistry;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use rgo_foundation::MessageSeverity;
    use rgo_test_support::RecordingUi;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    /// Locator returning a fixed path, or a configuration error
    pub(crate) struct FakeLocator(Option<PathBuf>);

    impl FakeLocator {
        pub(crate) fn found() -> Self {
            Self(Some(PathBuf::from("/opt/rgo/bin/rgo_lsp_server")))
        }

        pub(crate) fn missing() -> Self {
            Self(None)
        }
    }

    impl BinaryLocator for FakeLocator {
        fn server_binary(&self) -> RgoResult<PathBuf> {
            self.0
                .clone()
                .ok_or_else(|| RgoError::config("Language server binary not found"))
        }
    }

    /// Connection factory recording every call in order
    #[derive(Default)]
    pub(crate) struct FakeFactory {
        pub(crate) fail_handshake: AtomicBool,
        pub(crate) fail_shutdown: AtomicBool,
        /// Push a progress start through the router while shutting down
        pub(crate) progress_on_shutdown: AtomicBool,
        connects: AtomicUsize,
        shutdowns: Arc<AtomicUsize>,
        log: Arc<StdMutex<Vec<String>>>,
        options: StdMutex<Vec<ConnectionOptions>>,
    }

    impl FakeFactory {
        pub(crate) fn connects(&self) -> usize {
            self.connects.load(Ordering::SeqCst)
        }

        pub(crate) fn shutdowns(&self) -> usize {
            self.shutdowns.load(Ordering::SeqCst)
        }

        pub(crate) fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    struct FakeConnection {
        fail: bool,
        router: Option<NotificationRouter>,
        shutdowns: Arc<AtomicUsize>,
        log: Arc<StdMutex<Vec<String>>>,
    }

    #[async_trait]
    impl LanguageConnection for FakeConnection {
        async fn shutdown(self: Box<Self>) -> RgoResult<()> {
            self.log.lock().unwrap().push("shutdown:begin".to_string());
            if let Some(router) = &self.router {
                router.handle(
                    PROGRESS,
                    Some(serde_json::json!({"id": "late", "message": "Late task", "type": "start"})),
                );
            }
            tokio::task::yield_now().await;
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
            self.log.lock().unwrap().push("shutdown:end".to_string());
            if self.fail {
                return Err(RgoError::transport("broken pipe"));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ConnectionFactory for FakeFactory {
        async fn connect(
            &self,
            options: ConnectionOptions,
            router: NotificationRouter,
        ) -> RgoResult<Box<dyn LanguageConnection>> {
            self.log.lock().unwrap().push("connect:begin".to_string());
            self.options.lock().unwrap().push(options);
            // Simulated handshake traffic goes through the router handed in
            router.handle(WINDOW_SHOW_INFO, Some(serde_json::json!("handshake")));
            tokio::task::yield_now().await;
            self.log.lock().unwrap().push("connect:end".to_string());

            if self.fail_handshake.load(Ordering::SeqCst) {
                return Err(RgoError::handshake("server exited during initialize"));
            }
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeConnection {
                fail: self.fail_shutdown.load(Ordering::SeqCst),
                router: self
                    .progress_on_shutdown
                    .load(Ordering::SeqCst)
                    .then(|| router.clone()),
                shutdowns: self.shutdowns.clone(),
                log: self.log.clone(),
            }))
        }
    }

    fn controller(
        locator: FakeLocator,
    ) -> (Arc<ClientLifecycleController>, Arc<FakeFactory>, RecordingUi) {
        let ui = RecordingUi::new();
        let shared: Arc<dyn EditorUi> = Arc::new(ui.clone());
        let (commands, _rx) = command_channel();
        let router = NotificationRouter::new(ProgressRegistry::new(shared.clone()), shared.clone(), commands);
        let factory = Arc::new(FakeFactory::default());
        let controller =
            ClientLifecycleController::new(Arc::new(locator), factory.clone(), router, shared)
                .with_root_dir("/work/rgo");
        (Arc::new(controller), factory, ui)
    }

    #[tokio::test]
    async fn test_start_reaches_running_and_confirms() {
        let (controller, factory, ui) = controller(FakeLocator::found());

        controller.start().await.unwrap();

        assert_eq!(controller.state(), SessionState::Running);
        assert!(controller.is_running());
        assert_eq!(
            ui.messages(),
            vec![
                (MessageSeverity::Info, "handshake".to_string()),
                (MessageSeverity::Info, SERVER_STARTED_MESSAGE.to_string()),
            ]
        );

        let options = factory.options.lock().unwrap()[0].clone();
        assert_eq!(options.server_binary, PathBuf::from("/opt/rgo/bin/rgo_lsp_server"));
        assert_eq!(options.document_selector, vec![DocumentFilter::go_files()]);
        assert_eq!(options.root_dir, Some(PathBuf::from("/work/rgo")));
    }

    #[tokio::test]
    async fn test_stop_when_stopped_is_noop() {
        let (controller, factory, ui) = controller(FakeLocator::found());
        let mut states = controller.subscribe();

        controller.stop().await;

        assert_eq!(controller.state(), SessionState::Stopped);
        assert!(!states.has_changed().unwrap());
        assert_eq!(factory.shutdowns(), 0);
        assert!(ui.messages().is_empty());
    }

    #[tokio::test]
    async fn test_start_while_running_is_rejected() {
        let (controller, factory, _ui) = controller(FakeLocator::found());
        controller.start().await.unwrap();

        let err = controller.start().await.unwrap_err();

        assert!(matches!(err, RgoError::InvalidState { .. }));
        assert_eq!(controller.state(), SessionState::Running);
        assert_eq!(factory.connects(), 1);
        assert_eq!(factory.shutdowns(), 0);
    }

    #[tokio::test]
    async fn test_handshake_failure_leaves_stopped() {
        let (controller, factory, ui) = controller(FakeLocator::found());
        factory.fail_handshake.store(true, Ordering::SeqCst);

        let err = controller.start().await.unwrap_err();

        assert!(matches!(err, RgoError::Handshake { .. }));
        assert_eq!(controller.state(), SessionState::Stopped);
        let errors = ui.messages_with(MessageSeverity::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("server exited during initialize"));

        // No automatic retry; the next explicit start is accepted
        factory.fail_handshake.store(false, Ordering::SeqCst);
        controller.start().await.unwrap();
        assert!(controller.is_running());
    }

    #[tokio::test]
    async fn test_missing_binary_leaves_stopped() {
        let (controller, factory, ui) = controller(FakeLocator::missing());

        let err = controller.start().await.unwrap_err();

        assert!(err.is_config());
        assert_eq!(controller.state(), SessionState::Stopped);
        assert_eq!(factory.log(), Vec::<String>::new());
        assert_eq!(ui.messages_with(MessageSeverity::Error).len(), 1);
    }

    #[tokio::test]
    async fn test_stop_passes_through_stopping() {
        let (controller, factory, _ui) = controller(FakeLocator::found());
        controller.start().await.unwrap();
        let mut states = controller.subscribe();

        let observer = tokio::spawn(async move {
            let mut seen = Vec::new();
            while states.changed().await.is_ok() {
                let state = *states.borrow_and_update();
                seen.push(state);
                if state == SessionState::Stopped {
                    break;
                }
            }
            seen
        });

        controller.stop().await;

        assert_eq!(
            observer.await.unwrap(),
            vec![SessionState::Stopping, SessionState::Stopped]
        );
        assert_eq!(factory.shutdowns(), 1);
    }

    #[tokio::test]
    async fn test_unclean_shutdown_still_stops() {
        let (controller, factory, _ui) = controller(FakeLocator::found());
        factory.fail_shutdown.store(true, Ordering::SeqCst);
        controller.start().await.unwrap();

        controller.stop().await;

        assert_eq!(controller.state(), SessionState::Stopped);
        assert_eq!(factory.shutdowns(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_restarts_serialize() {
        let (controller, factory, _ui) = controller(FakeLocator::found());
        controller.start().await.unwrap();

        let (first, second, ()) =
            tokio::join!(controller.restart(), controller.restart(), controller.stop());
        first.unwrap();
        second.unwrap();

        assert_eq!(
            factory.log(),
            vec![
                "connect:begin",
                "connect:end",
                // first restart
                "shutdown:begin",
                "shutdown:end",
                "connect:begin",
                "connect:end",
                // second restart
                "shutdown:begin",
                "shutdown:end",
                "connect:begin",
                "connect:end",
                // stop
                "shutdown:begin",
                "shutdown:end",
            ]
        );
        assert_eq!(controller.state(), SessionState::Stopped);
    }
}
