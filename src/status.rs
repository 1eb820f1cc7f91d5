//! Typed status stream between the reconciliation loop and whoever presents it.
//!
//! The stream is a bounded [`tokio::sync::mpsc`] channel. A full buffer makes
//! the producer wait, so the loop cannot run ahead of an unread backlog.
//! Dropping every [`StatusSender`] closes the stream, which is how consumers
//! learn that the loop has terminated.

use crate::error::DdnsError;
use std::fmt;
use tokio::sync::mpsc;

/// Default buffer size of a status stream.
pub const DEFAULT_CAPACITY: usize = 128;

/// Severity of a [`StatusEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Error,
    Fatal,
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusKind::Info => write!(f, "info"),
            StatusKind::Error => write!(f, "error"),
            StatusKind::Fatal => write!(f, "fatal"),
        }
    }
}

/// One observable occurrence in the loop. Never mutated after creation.
#[derive(Debug, Clone)]
pub struct StatusEvent {
    pub kind: StatusKind,
    pub message: String,
    pub error: Option<DdnsError>,
    /// Opaque payload for callers that want to correlate events.
    pub data: Option<serde_json::Value>,
}

impl StatusEvent {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Info,
            message: message.into(),
            error: None,
            data: None,
        }
    }

    /// An error event. The message is rendered as `"{message}: {error}"`.
    pub fn error(message: impl Into<String>, error: DdnsError) -> Self {
        Self::with_error(StatusKind::Error, message.into(), error)
    }

    pub fn fatal(message: impl Into<String>, error: DdnsError) -> Self {
        Self::with_error(StatusKind::Fatal, message.into(), error)
    }

    fn with_error(kind: StatusKind, message: String, error: DdnsError) -> Self {
        Self {
            kind,
            message: format!("{}: {}", message, error),
            error: Some(error),
            data: None,
        }
    }

    /// Attach correlation data.
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn is_fatal(&self) -> bool {
        self.kind == StatusKind::Fatal
    }
}

/// Producer side of a status stream.
#[derive(Debug, Clone)]
pub struct StatusSender {
    tx: mpsc::Sender<StatusEvent>,
}

/// Consumer side of a status stream.
#[derive(Debug)]
pub struct StatusStream {
    rx: mpsc::Receiver<StatusEvent>,
}

/// Create a status stream with the given buffer capacity.
pub fn channel(capacity: usize) -> (StatusSender, StatusStream) {
    let (tx, rx) = mpsc::channel(capacity);
    (StatusSender { tx }, StatusStream { rx })
}

impl StatusSender {
    /// Push an event, waiting while the buffer is full.
    ///
    /// Fatal events must go through [`StatusSender::fatal`].
    pub async fn send(&self, event: StatusEvent) {
        debug_assert!(!event.is_fatal(), "fatal events must use StatusSender::fatal");
        if self.tx.send(event).await.is_err() {
            tracing::debug!("Status stream has no consumer, dropping event");
        }
    }

    pub async fn info(&self, message: impl Into<String>) {
        self.send(StatusEvent::info(message)).await;
    }

    pub async fn error(&self, message: impl Into<String>, error: DdnsError) {
        self.send(StatusEvent::error(message, error)).await;
    }

    /// Emit the single fatal event of a run.
    ///
    /// Consumes this sender. Once the loop's last sender is gone the stream
    /// closes, so nothing can follow a fatal event.
    pub async fn fatal(self, message: impl Into<String>, error: DdnsError) {
        if self.tx.send(StatusEvent::fatal(message, error)).await.is_err() {
            tracing::debug!("Status stream has no consumer, dropping fatal event");
        }
    }
}

impl StatusStream {
    /// Receive the next event, or `None` once the loop has terminated.
    pub async fn recv(&mut self) -> Option<StatusEvent> {
        self.rx.recv().await
    }

    /// Wait for the stream to close, returning every remaining event.
    pub async fn collect(mut self) -> Vec<StatusEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.rx.recv().await {
            events.push(event);
        }
        events
    }
}
