//! Server-announced progress tasks
//!
//! The language server announces long-running work (fetching IDL repos,
//! generating sources) with `custom/rgo/progress` start/stop notifications.
//! Each announced operation becomes a [`ProgressTask`] backed by a
//! cancellable editor indicator.
//!
//! ## Architecture
//!
//! - `DashMap` holds at most one task per [`ProgressId`]
//! - every task owns a `watch` channel carrying its liveness flag; the
//!   routine driving the indicator waits on that channel instead of polling
//! - `tokio::sync::broadcast` fans out [`ProgressEvent`]s to observers
//!
//! Stopping a task and the user cancelling its indicator converge on the same
//! removal path, so whichever happens first wins and the other is a no-op.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rgo_foundation::{EditorUi, ProgressIndicator, ProgressOptions};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::{debug, trace};

/// Upper bound between a task becoming inactive and its indicator disappearing
pub const LIVENESS_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// Progress identifier (string or integer), as sent by the server
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProgressId {
    String(String),
    Number(i64),
}

impl std::fmt::Display for ProgressId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProgressId::String(s) => write!(f, "{}", s),
            ProgressId::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for ProgressId {
    fn from(value: &str) -> Self {
        ProgressId::String(value.to_string())
    }
}

impl From<String> for ProgressId {
    fn from(value: String) -> Self {
        ProgressId::String(value)
    }
}

impl From<i64> for ProgressId {
    fn from(value: i64) -> Self {
        ProgressId::Number(value)
    }
}

/// Snapshot of one in-flight progress task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressTask {
    pub id: ProgressId,
    pub message: String,
    pub active: bool,
}

/// Why a task left the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The server sent a stop notification
    Server,
    /// The user dismissed the indicator
    Cancelled,
    /// The registry was cleared during deactivation
    Shutdown,
}

/// Change notifications published by [`ProgressRegistry::subscribe`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Started { id: ProgressId, message: String },
    Stopped { id: ProgressId, reason: StopReason },
}

struct TaskEntry {
    message: String,
    /// Distinguishes successive tasks that reuse one id
    generation: u64,
    active: watch::Sender<bool>,
}

/// Owns every active progress task and its editor indicator
///
/// Cloning is cheap and all clones share the same task table.
#[derive(Clone)]
pub struct ProgressRegistry {
    tasks: Arc<DashMap<ProgressId, TaskEntry>>,
    next_generation: Arc<AtomicU64>,
    ui: Arc<dyn EditorUi>,
    updates_tx: broadcast::Sender<ProgressEvent>,
}

impl ProgressRegistry {
    pub fn new(ui: Arc<dyn EditorUi>) -> Self {
        let (updates_tx, _) = broadcast::channel(100);
        Self {
            tasks: Arc::new(DashMap::new()),
            next_generation: Arc::new(AtomicU64::new(0)),
            ui,
            updates_tx,
        }
    }

    /// Start tracking `id` and show an indicator titled `message`
    ///
    /// Does nothing when `id` is already active. Returns whether a task was
    /// created. Must be called from within a tokio runtime.
    pub fn start_progress(&self, id: ProgressId, message: impl Into<String>) -> bool {
        let message = message.into();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);

        let active_rx = match self.tasks.entry(id.clone()) {
            Entry::Occupied(_) => {
                debug!(id = %id, "Progress already active, ignoring start");
                return false;
            }
            Entry::Vacant(slot) => {
                let (active_tx, active_rx) = watch::channel(true);
                slot.insert(TaskEntry {
                    message: message.clone(),
                    generation,
                    active: active_tx,
                });
                active_rx
            }
        };

        debug!(id = %id, message = %message, generation, "Progress started");

        let indicator = self
            .ui
            .begin_progress(ProgressOptions::cancellable(message.as_str()));
        let _ = self.updates_tx.send(ProgressEvent::Started {
            id: id.clone(),
            message,
        });

        tokio::spawn(
            self.clone()
                .drive_indicator(id, generation, active_rx, indicator),
        );
        true
    }

    /// Stop tracking `id`, disposing its indicator
    ///
    /// Does nothing when `id` is not active. Returns whether a task was removed.
    pub fn stop_progress(&self, id: &ProgressId) -> bool {
        self.release(id, None, StopReason::Server)
    }

    /// Stop every task, used when the client shuts down
    pub fn clear(&self) {
        let ids: Vec<ProgressId> = self.tasks.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            self.release(&id, None, StopReason::Shutdown);
        }
    }

    /// Remove a task and flip its liveness flag.
    ///
    /// With `generation` set, only that incarnation of `id` is removed.
    fn release(&self, id: &ProgressId, generation: Option<u64>, reason: StopReason) -> bool {
        let removed = match generation {
            Some(generation) => self
                .tasks
                .remove_if(id, |_, entry| entry.generation == generation),
            None => self.tasks.remove(id),
        };

        let Some((id, entry)) = removed else {
            debug!(id = %id, ?reason, "No active progress to stop");
            return false;
        };

        entry.active.send_replace(false);
        debug!(
            id = %id,
            message = %entry.message,
            generation = entry.generation,
            ?reason,
            "Progress stopped"
        );
        let _ = self.updates_tx.send(ProgressEvent::Stopped { id, reason });
        true
    }

    /// Keep the indicator on screen until the task goes inactive or the user cancels it
    async fn drive_indicator(
        self,
        id: ProgressId,
        generation: u64,
        mut active: watch::Receiver<bool>,
        mut indicator: Box<dyn ProgressIndicator>,
    ) {
        let cancelled = tokio::select! {
            biased;
            _ = wait_inactive(&mut active) => false,
            _ = indicator.cancelled() => true,
        };

        if cancelled {
            debug!(id = %id, "Progress indicator cancelled by user");
            self.release(&id, Some(generation), StopReason::Cancelled);
        }

        indicator.finish();
        trace!(id = %id, generation, "Progress indicator disposed");
    }

    pub fn contains(&self, id: &ProgressId) -> bool {
        self.tasks.contains_key(id)
    }

    /// Gets the current state of a progress task
    pub fn get(&self, id: &ProgressId) -> Option<ProgressTask> {
        self.tasks.get(id).map(|entry| ProgressTask {
            id: entry.key().clone(),
            message: entry.message.clone(),
            active: *entry.active.borrow(),
        })
    }

    /// Gets all active progress tasks
    pub fn active_tasks(&self) -> Vec<ProgressTask> {
        self.tasks
            .iter()
            .map(|entry| ProgressTask {
                id: entry.key().clone(),
                message: entry.message.clone(),
                active: *entry.active.borrow(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Subscribe to progress updates
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.updates_tx.subscribe()
    }
}

/// Resolves once the flag turns false or the registry drops the sender
async fn wait_inactive(active: &mut watch::Receiver<bool>) {
    let _ = active.wait_for(|active| !*active).await;
}
