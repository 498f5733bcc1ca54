//! User-facing notifications.

use metastake_core::{ActionKind, FailureReason, TxHash};
use tokio::sync::mpsc;

use crate::client::Notifier;

/// Severity level for display styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Informational message.
    Info,
    /// Operation completed.
    Success,
    /// Warning that doesn't block operation.
    Warning,
    /// Error that blocks the current operation.
    Error,
}

impl Severity {
    /// Get the label for this severity.
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Info => "Info",
            Severity::Success => "Success",
            Severity::Warning => "Warning",
            Severity::Error => "Error",
        }
    }

    /// Get the icon for this severity.
    pub fn icon(&self) -> &'static str {
        match self {
            Severity::Info => "ℹ️",
            Severity::Success => "✅",
            Severity::Warning => "⚠️",
            Severity::Error => "❌",
        }
    }
}

/// A displayable notification/toast message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub severity: Severity,
    pub title: String,
    pub message: String,
}

impl Notification {
    fn new(severity: Severity, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            title: title.into(),
            message: message.into(),
        }
    }

    /// Create an info notification.
    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, title, message)
    }

    /// Create a success notification.
    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Success, title, message)
    }

    /// Create a warning notification.
    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, title, message)
    }

    /// Create an error notification.
    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, title, message)
    }

    /// The wallet broadcast the transaction.
    pub fn submitted(kind: ActionKind, tx_hash: TxHash) -> Self {
        Self::info(
            format!("{} submitted", kind),
            format!("Waiting for confirmation of {}", tx_hash),
        )
    }

    /// The transaction was included.
    pub fn confirmed(kind: ActionKind, block_number: u64) -> Self {
        Self::success(
            format!("{} successful", kind),
            format!("Included in block {}", block_number),
        )
    }

    /// The attempt ended in failure.
    pub fn failed(kind: ActionKind, reason: &FailureReason) -> Self {
        Self::error(format!("{} failed", kind), reason.to_string())
    }
}

/// Forwards notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, n: Notification) {
        match n.severity {
            Severity::Info | Severity::Success => tracing::info!("{}: {}", n.title, n.message),
            Severity::Warning => tracing::warn!("{}: {}", n.title, n.message),
            Severity::Error => tracing::error!("{}: {}", n.title, n.message),
        }
    }
}

/// Forwards notifications over an unbounded channel to whatever renders them.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        // Receiver gone means nobody is rendering toasts any more.
        let _ = self.tx.send(notification);
    }
}
