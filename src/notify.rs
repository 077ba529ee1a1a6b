//! Notification collaborator. The engine hands over who to tell and what
//! happened; delivery is somebody else's job.

use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::session::SessionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    SessionClaimed,
    SessionApproved,
    SessionRefused,
    ExchangeApproved,
    ExchangeDenied,
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationKind::SessionClaimed => write!(f, "session_claimed"),
            NotificationKind::SessionApproved => write!(f, "session_approved"),
            NotificationKind::SessionRefused => write!(f, "session_refused"),
            NotificationKind::ExchangeApproved => write!(f, "exchange_approved"),
            NotificationKind::ExchangeDenied => write!(f, "exchange_denied"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Employee or employer to notify
    pub recipient: Uuid,
    pub kind: NotificationKind,
    pub session_id: SessionId,
    /// Free text, e.g. the refusal reason
    pub note: Option<String>,
}

impl Notification {
    pub fn new(recipient: Uuid, kind: NotificationKind, session_id: SessionId) -> Self {
        Self {
            recipient,
            kind,
            session_id,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Fire-and-forget sink. Implementations must not block the caller.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Logs notifications and drops them.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        tracing::info!(
            recipient = %notification.recipient,
            kind = %notification.kind,
            session_id = %notification.session_id,
            "Notification"
        );
    }
}

/// Forwards notifications into a bounded channel for a delivery task.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::Sender<Notification>,
}

impl ChannelNotifier {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<Notification>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        if let Err(e) = self.tx.try_send(notification) {
            tracing::warn!(error = %e, "Notification dropped");
        }
    }
}
