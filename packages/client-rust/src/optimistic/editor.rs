use std::sync::Arc;

use folio_core::{diff, Patch, ShimError, Table, Validate};
use tracing::warn;

use super::notify::{Notification, Notifier};
use super::store::OptimisticStore;
use super::{CommitOutcome, ControllerError};
use crate::builder::SelectQuery;
use crate::db::{Db, TableHandle};

/// Editing surface for one table: validated, optimistic writes through the
/// shim, with outcomes reported to the store's notifier.
pub struct Editor<T> {
    table: TableHandle<T>,
    store: Arc<OptimisticStore<T>>,
}

impl<T: Table + Validate> Editor<T> {
    /// Editor for `T`'s table, using the commit timeout from `db`'s config.
    #[must_use]
    pub fn new(db: &Db, notifier: Arc<dyn Notifier>) -> Self {
        let store = OptimisticStore::new(notifier, db.config().commit_timeout);
        Self {
            table: db.from::<T>(),
            store: Arc::new(store),
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<OptimisticStore<T>> {
        &self.store
    }

    #[must_use]
    pub fn rows(&self) -> Vec<T> {
        self.store.rows()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<T> {
        self.store.get(id)
    }

    /// Reloads every row of the table.
    ///
    /// # Errors
    ///
    /// The read's error, after it has been reported.
    pub async fn refresh(&self) -> Result<usize, ShimError> {
        self.refresh_with(self.table.select()).await
    }

    /// Reloads from a caller-built read, e.g. with an order.
    ///
    /// # Errors
    ///
    /// The read's error, after it has been reported.
    pub async fn refresh_with(&self, query: SelectQuery<T>) -> Result<usize, ShimError> {
        match query.await.into_result() {
            Ok(rows) => Ok(self.store.load(rows.unwrap_or_default())),
            Err(err) => {
                self.report(None, &err);
                Err(err)
            }
        }
    }

    /// Validates and inserts `row`, then tracks the stored row.
    ///
    /// Nothing is shown before the server answers, since the row has no id
    /// yet.
    pub async fn create(&self, row: T) -> CommitOutcome<T> {
        if let Err(err) = row.validate().into_result() {
            self.report(None, &err);
            return CommitOutcome::Rejected(err);
        }
        let stored = match self.table.insert(row).await.into_result() {
            Ok(Some(stored)) => stored,
            Ok(None) => {
                let err = ShimError::decode("insert resolved without a row");
                self.report(None, &err);
                return CommitOutcome::Failed(err);
            }
            Err(err) => {
                self.report(None, &err);
                return CommitOutcome::Failed(err);
            }
        };
        match self.store.adopt(stored.clone()) {
            Ok(()) => self
                .store
                .notifier()
                .notify(&Notification::success(stored.id(), "Created")),
            Err(err) => warn!(table = T::NAME, error = %err, "created row is not tracked"),
        }
        CommitOutcome::Adopted(stored)
    }

    /// Applies `mutate` optimistically and sends only the changed fields.
    ///
    /// # Errors
    ///
    /// [`ControllerError::UnknownId`] if `id` is not shown,
    /// [`ControllerError::NoChanges`] if `mutate` changed nothing.
    pub async fn update(
        &self,
        id: &str,
        mutate: impl FnOnce(&mut T),
    ) -> Result<CommitOutcome<T>, ControllerError> {
        let before = self
            .store
            .get(id)
            .ok_or_else(|| ControllerError::unknown(id))?;
        let mut after = before.clone();
        mutate(&mut after);
        if let Err(err) = after.validate().into_result() {
            self.report(Some(id), &err);
            return Ok(CommitOutcome::Rejected(err));
        }
        let patch = diff(&before, &after).map_err(|err| ControllerError::invalid(id, &err))?;
        if patch.is_empty() {
            return Err(ControllerError::NoChanges { id: id.to_owned() });
        }
        let write = self.table.update(&patch).match_id(id);
        self.store.apply(id, &patch, write).await
    }

    /// Stages field changes for a later [`save`](Self::save).
    ///
    /// # Errors
    ///
    /// [`ControllerError::UnknownId`] if `id` is not tracked.
    pub fn stage(&self, id: &str, patch: Patch) -> Result<(), ControllerError> {
        self.store.stage(id, patch)
    }

    /// Validates the row with its staged changes and saves them as one
    /// update. A row that fails validation keeps its staged changes.
    ///
    /// # Errors
    ///
    /// [`ControllerError::UnknownId`] if `id` is not shown,
    /// [`ControllerError::NoChanges`] if nothing is staged.
    pub async fn save(&self, id: &str) -> Result<CommitOutcome<T>, ControllerError> {
        if self.store.staged(id).is_none() {
            return Err(ControllerError::NoChanges { id: id.to_owned() });
        }
        let preview = self
            .store
            .preview(id)
            .ok_or_else(|| ControllerError::unknown(id))?;
        if let Err(err) = preview.validate().into_result() {
            self.report(Some(id), &err);
            return Ok(CommitOutcome::Rejected(err));
        }
        self.store
            .save(id, |patch| self.table.update(&patch).match_id(id))
            .await
    }

    /// Drops the staged changes of `id`.
    ///
    /// # Errors
    ///
    /// [`ControllerError::UnknownId`] if `id` is not tracked.
    pub fn discard(&self, id: &str) -> Result<Patch, ControllerError> {
        self.store.discard(id)
    }

    /// Hides `id` and deletes it.
    ///
    /// # Errors
    ///
    /// [`ControllerError::UnknownId`] if `id` is not shown.
    pub async fn remove(&self, id: &str) -> Result<CommitOutcome<T>, ControllerError> {
        let write = self.table.delete().match_id(id);
        self.store.remove(id, write).await
    }

    fn report(&self, id: Option<&str>, err: &ShimError) {
        self.store
            .notifier()
            .notify(&Notification::error(id, err.message()));
    }
}
