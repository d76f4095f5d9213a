//! User-facing notifications emitted by the optimistic controller.
//!
//! [`Notifier`] is the seam between the controller and whatever shows
//! transient messages to the user. [`CompositeNotifier`] fans one event out
//! to several sinks.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::Phase;

/// Severity of a [`Notification`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Error,
}

/// One transient message, e.g. a toast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub level: Level,
    /// Entity the message is about, if any.
    pub entity_id: Option<String>,
    pub message: String,
}

impl Notification {
    #[must_use]
    pub fn success(entity_id: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            level: Level::Success,
            entity_id: entity_id.map(str::to_owned),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn error(entity_id: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            entity_id: entity_id.map(str::to_owned),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.level == Level::Error
    }
}

/// Receiver of controller events.
///
/// Called outside the controller's locks; implementations must not block.
/// Used as `Arc<dyn Notifier>`.
pub trait Notifier: Send + Sync {
    /// Called once per user-visible outcome.
    fn notify(&self, notification: &Notification);

    /// Called on every phase transition of a tracked entity.
    fn on_phase_change(&self, _entity_id: &str, _from: Phase, _to: Phase) {}
}

/// Fans every event out to each registered notifier, in order.
#[derive(Default)]
pub struct CompositeNotifier {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl CompositeNotifier {
    #[must_use]
    pub fn new(notifiers: Vec<Arc<dyn Notifier>>) -> Self {
        Self { notifiers }
    }

    pub fn add(&mut self, notifier: Arc<dyn Notifier>) {
        self.notifiers.push(notifier);
    }
}

impl Notifier for CompositeNotifier {
    fn notify(&self, notification: &Notification) {
        for notifier in &self.notifiers {
            notifier.notify(notification);
        }
    }

    fn on_phase_change(&self, entity_id: &str, from: Phase, to: Phase) {
        for notifier in &self.notifiers {
            notifier.on_phase_change(entity_id, from, to);
        }
    }
}

/// Queues notifications on an unbounded channel for a UI to drain.
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    /// Creates the notifier and the receiving end of its queue.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: &Notification) {
        // A dropped receiver means nobody is listening anymore.
        let _ = self.tx.send(notification.clone());
    }
}

/// Writes notifications to the `tracing` log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: &Notification) {
        let entity_id = notification.entity_id.as_deref().unwrap_or("-");
        match notification.level {
            Level::Success => info!(entity_id, message = %notification.message, "notification"),
            Level::Error => warn!(entity_id, message = %notification.message, "notification"),
        }
    }

    fn on_phase_change(&self, entity_id: &str, from: Phase, to: Phase) {
        debug!(entity_id, ?from, ?to, "phase change");
    }
}
