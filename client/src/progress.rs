//! # Progress Notifications
//!
//! The engine reports every state transition to a [`ProgressSink`] owned by
//! whatever renders the UI. There is no global notification list: the sink
//! is injected, so the engine can be driven without any display at all.
//!
//! Within one submission the [`ProgressTracker`] is the only writer. It
//! dismisses the active notification before raising the next, so at most
//! one progress notification per submission is ever on screen.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Visual category of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Loading,
    Success,
    Error,
}

impl NotificationKind {
    /// Success and error end a submission.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Loading)
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loading => write!(f, "loading"),
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Opaque reference to a notification that is being displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationHandle(pub u64);

/// Receives progress and outcome notifications. Must tolerate concurrent
/// calls from independent submissions.
pub trait ProgressSink: Send + Sync {
    /// Shows a notification and returns its handle.
    fn notify(&self, kind: NotificationKind, message: &str, correlation_id: &str)
        -> NotificationHandle;

    /// Removes a previously shown notification.
    fn dismiss(&self, handle: NotificationHandle);
}

// ---------------------------------------------------------------------------
// ProgressTracker
// ---------------------------------------------------------------------------

/// Per-submission writer that keeps at most one notification active.
pub struct ProgressTracker {
    sink: Arc<dyn ProgressSink>,
    correlation_id: String,
    active: Option<NotificationHandle>,
}

impl ProgressTracker {
    /// Starts tracking a submission.
    pub fn new(sink: Arc<dyn ProgressSink>, correlation_id: impl Into<String>) -> Self {
        Self {
            sink,
            correlation_id: correlation_id.into(),
            active: None,
        }
    }

    /// Correlation id stamped on every notification.
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Replaces the active notification with a loading one.
    pub fn loading(&mut self, message: &str) {
        self.raise(NotificationKind::Loading, message);
    }

    /// Replaces the active notification with the success outcome.
    pub fn success(&mut self, message: &str) {
        self.raise(NotificationKind::Success, message);
    }

    /// Replaces the active notification with the error outcome.
    pub fn error(&mut self, message: &str) {
        self.raise(NotificationKind::Error, message);
    }

    fn raise(&mut self, kind: NotificationKind, message: &str) {
        if let Some(handle) = self.active.take() {
            self.sink.dismiss(handle);
        }
        let handle = self.sink.notify(kind, message, &self.correlation_id);
        self.active = Some(handle);
    }
}

// ---------------------------------------------------------------------------
// RecordingProgressSink
// ---------------------------------------------------------------------------

/// One call observed by [`RecordingProgressSink`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum ProgressEvent {
    Notify {
        handle: NotificationHandle,
        kind: NotificationKind,
        message: String,
        correlation_id: String,
    },
    Dismiss {
        handle: NotificationHandle,
    },
}

#[derive(Default)]
struct Recording {
    events: Vec<ProgressEvent>,
    owners: HashMap<NotificationHandle, String>,
}

/// Thread-safe sink that records every call, in arrival order.
#[derive(Default)]
pub struct RecordingProgressSink {
    next_handle: AtomicU64,
    recording: Mutex<Recording>,
}

impl RecordingProgressSink {
    /// An empty recording.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every event, in arrival order.
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.recording.lock().events.clone()
    }

    /// Notifications (not dismissals) raised for one submission.
    pub fn notifications_for(&self, correlation_id: &str) -> Vec<(NotificationKind, String)> {
        self.recording
            .lock()
            .events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Notify {
                    kind,
                    message,
                    correlation_id: cid,
                    ..
                } if cid == correlation_id => Some((*kind, message.clone())),
                _ => None,
            })
            .collect()
    }

    /// Distinct correlation ids, in order of first appearance.
    pub fn correlation_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for event in &self.recording.lock().events {
            if let ProgressEvent::Notify { correlation_id, .. } = event {
                if !ids.contains(correlation_id) {
                    ids.push(correlation_id.clone());
                }
            }
        }
        ids
    }

    /// Notifications raised but never dismissed, for one submission.
    pub fn active_for(&self, correlation_id: &str) -> Vec<NotificationHandle> {
        let recording = self.recording.lock();
        let mut active: Vec<NotificationHandle> = Vec::new();
        for event in &recording.events {
            match event {
                ProgressEvent::Notify {
                    handle,
                    correlation_id: cid,
                    ..
                } if cid == correlation_id => active.push(*handle),
                ProgressEvent::Dismiss { handle } => active.retain(|h| h != handle),
                _ => {}
            }
        }
        active
    }

    /// Which submission a handle belongs to.
    pub fn owner_of(&self, handle: NotificationHandle) -> Option<String> {
        self.recording.lock().owners.get(&handle).cloned()
    }
}

impl ProgressSink for RecordingProgressSink {
    fn notify(
        &self,
        kind: NotificationKind,
        message: &str,
        correlation_id: &str,
    ) -> NotificationHandle {
        let handle = NotificationHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        let mut recording = self.recording.lock();
        recording.owners.insert(handle, correlation_id.to_string());
        recording.events.push(ProgressEvent::Notify {
            handle,
            kind,
            message: message.to_string(),
            correlation_id: correlation_id.to_string(),
        });
        handle
    }

    fn dismiss(&self, handle: NotificationHandle) {
        self.recording
            .lock()
            .events
            .push(ProgressEvent::Dismiss { handle });
    }
}

// ---------------------------------------------------------------------------
// TracingProgressSink
// ---------------------------------------------------------------------------

/// Sink that writes notifications to the log. Used by the CLI.
#[derive(Default)]
pub struct TracingProgressSink {
    next_handle: AtomicU64,
}

impl TracingProgressSink {
    /// Creates a sink.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressSink for TracingProgressSink {
    fn notify(
        &self,
        kind: NotificationKind,
        message: &str,
        correlation_id: &str,
    ) -> NotificationHandle {
        let handle = NotificationHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        match kind {
            NotificationKind::Error => error!(correlation_id, %kind, "{}", message),
            _ => info!(correlation_id, %kind, "{}", message),
        }
        handle
    }

    fn dismiss(&self, handle: NotificationHandle) {
        tracing::trace!(handle = handle.0, "notification dismissed");
    }
}
