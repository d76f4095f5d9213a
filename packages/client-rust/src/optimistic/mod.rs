//! Optimistic update controller.
//!
//! An edit is shown immediately and reconciled when its write resolves:
//! success adopts the server's row, failure puts back the last confirmed
//! state and emits exactly one error [`Notification`]. Commits on one id run
//! one at a time; different ids never wait on each other.
//!
//! [`OptimisticStore`] holds the state for one collection and is agnostic of
//! where writes go. [`Editor`] binds a store to a [`TableHandle`](crate::TableHandle)
//! and validates rows before anything is sent.

mod editor;
mod notify;
mod store;

use folio_core::ShimError;

pub use editor::Editor;
pub use notify::{ChannelNotifier, CompositeNotifier, Level, Notification, Notifier, TracingNotifier};
pub use store::OptimisticStore;

/// Lifecycle of one tracked entity.
///
/// `Clean -> Pending` on an edit; `Pending -> Reconciling` when a write
/// resolves; `Reconciling -> Clean` once the result is applied, or back to
/// `Pending` if later edits on the same id are still outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Clean,
    Pending,
    Reconciling,
}

/// How a commit ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome<T> {
    /// The write succeeded; the row is now the confirmed state.
    Adopted(T),
    /// A removal succeeded; the row is no longer tracked.
    Removed,
    /// The write failed and the optimistic change was rolled back.
    Failed(ShimError),
    /// The row was rejected before anything was sent.
    Rejected(ShimError),
}

impl<T> CommitOutcome<T> {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Adopted(_) | Self::Removed)
    }

    #[must_use]
    pub fn error(&self) -> Option<&ShimError> {
        match self {
            Self::Failed(err) | Self::Rejected(err) => Some(err),
            Self::Adopted(_) | Self::Removed => None,
        }
    }
}

/// Misuse of the controller, as opposed to a failed write.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControllerError {
    #[error("no row with id `{id}` is tracked")]
    UnknownId { id: String },
    #[error("row has no id")]
    MissingId,
    #[error("no uncommitted edit for `{id}`")]
    NothingPending { id: String },
    #[error("no changes to save for `{id}`")]
    NoChanges { id: String },
    #[error("patch does not fit row `{id}`: {message}")]
    InvalidPatch { id: String, message: String },
}

impl ControllerError {
    fn unknown(id: &str) -> Self {
        Self::UnknownId { id: id.to_owned() }
    }

    fn invalid(id: &str, err: &serde_json::Error) -> Self {
        Self::InvalidPatch {
            id: id.to_owned(),
            message: err.to_string(),
        }
    }
}
