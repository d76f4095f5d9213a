use std::collections::{HashMap, HashSet, VecDeque};
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use folio_core::{apply_patch, diff, Envelope, Patch, Record, ShimError};
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::notify::{Notification, Notifier};
use super::{CommitOutcome, ControllerError, Phase};
use crate::exec::guarded;

/// What one outstanding edit changes, relative to whatever precedes it.
enum Change {
    Patch(Patch),
    Remove,
}

struct Edit {
    seq: u64,
    change: Change,
    claimed: bool,
}

struct Entry<T> {
    /// Last state the server confirmed.
    confirmed: Option<T>,
    /// Outstanding edits, oldest first.
    edits: VecDeque<Edit>,
    /// Field changes not yet sent.
    staged: Patch,
}

impl<T: Record> Entry<T> {
    fn new(confirmed: Option<T>) -> Self {
        Self {
            confirmed,
            edits: VecDeque::new(),
            staged: Patch::new(),
        }
    }

    /// Confirmed state with every outstanding edit replayed over it.
    fn displayed(&self) -> Option<T> {
        self.edits
            .iter()
            .fold(self.confirmed.clone(), |shown, edit| match &edit.change {
                Change::Remove => None,
                Change::Patch(patch) => shown.map(|row| apply_patch(&row, patch).unwrap_or(row)),
            })
    }

    fn phase(&self) -> Phase {
        if self.edits.is_empty() {
            Phase::Clean
        } else {
            Phase::Pending
        }
    }

    fn is_idle(&self) -> bool {
        self.edits.is_empty() && self.staged.is_empty()
    }

    fn take_edit(&mut self, seq: u64) -> Option<Edit> {
        let index = self.edits.iter().position(|edit| edit.seq == seq)?;
        self.edits.remove(index)
    }
}

struct State<T> {
    entries: HashMap<String, Entry<T>>,
    order: Vec<String>,
    next_seq: u64,
}

impl<T: Record> State<T> {
    fn forget_if_gone(&mut self, id: &str) {
        let gone = self
            .entries
            .get(id)
            .is_some_and(|entry| entry.confirmed.is_none() && entry.is_idle());
        if gone {
            self.entries.remove(id);
            self.order.retain(|tracked| tracked != id);
        }
    }
}

/// Client-side state of one collection, with optimistic edits layered over
/// the last confirmed rows.
///
/// Every [`begin_edit`](Self::begin_edit) or [`begin_remove`](Self::begin_remove)
/// must be followed by a [`commit`](Self::commit) for the same id; the
/// entity stays `Pending` until it is.
pub struct OptimisticStore<T> {
    state: Mutex<State<T>>,
    commit_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
    notifier: Arc<dyn Notifier>,
    commit_timeout: Duration,
}

impl<T: Record> OptimisticStore<T> {
    /// Creates an empty store. A commit whose write has not resolved
    /// within `commit_timeout` fails and is rolled back.
    #[must_use]
    pub fn new(notifier: Arc<dyn Notifier>, commit_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(State {
                entries: HashMap::new(),
                order: Vec::new(),
                next_seq: 0,
            }),
            commit_locks: DashMap::new(),
            notifier,
            commit_timeout,
        }
    }

    #[must_use]
    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    /// Replaces the confirmed rows with a fresh read, in the given order.
    ///
    /// Outstanding edits and staged changes survive. Rows without an id are
    /// skipped. Returns the number of rows loaded.
    pub fn load(&self, rows: Vec<T>) -> usize {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let mut seen = HashSet::with_capacity(rows.len());
        let mut order = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(id) = row.id().map(str::to_owned) else {
                warn!("skipping row without id");
                continue;
            };
            state
                .entries
                .entry(id.clone())
                .or_insert_with(|| Entry::new(None))
                .confirmed = Some(row);
            if seen.insert(id.clone()) {
                order.push(id);
            }
        }
        let loaded = order.len();

        state.entries.retain(|id, entry| {
            if seen.contains(id) {
                return true;
            }
            entry.confirmed = None;
            !entry.is_idle()
        });
        order.extend(
            state
                .order
                .iter()
                .filter(|id| !seen.contains(*id) && state.entries.contains_key(*id))
                .cloned(),
        );
        state.order = order;
        loaded
    }

    /// Records `row` as confirmed server state, e.g. after a create.
    ///
    /// # Errors
    ///
    /// [`ControllerError::MissingId`] if the row has no id.
    pub fn adopt(&self, row: T) -> Result<(), ControllerError> {
        let id = row.id().ok_or(ControllerError::MissingId)?.to_owned();
        let mut guard = self.state.lock();
        let state = &mut *guard;
        match state.entries.get_mut(&id) {
            Some(entry) => entry.confirmed = Some(row),
            None => {
                state.entries.insert(id.clone(), Entry::new(Some(row)));
                state.order.push(id);
            }
        }
        Ok(())
    }

    /// Value currently shown for `id`, staged changes excluded.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<T> {
        self.state
            .lock()
            .entries
            .get(id)
            .and_then(Entry::displayed)
    }

    /// Value shown for `id` with its staged changes applied.
    #[must_use]
    pub fn preview(&self, id: &str) -> Option<T> {
        let state = self.state.lock();
        let entry = state.entries.get(id)?;
        let shown = entry.displayed()?;
        if entry.staged.is_empty() {
            return Some(shown);
        }
        Some(apply_patch(&shown, &entry.staged).unwrap_or(shown))
    }

    /// Every shown row, in load order. Rows pending removal are left out.
    #[must_use]
    pub fn rows(&self) -> Vec<T> {
        let state = self.state.lock();
        state
            .order
            .iter()
            .filter_map(|id| state.entries.get(id).and_then(Entry::displayed))
            .collect()
    }

    /// Untracked ids are `Clean`.
    #[must_use]
    pub fn phase(&self, id: &str) -> Phase {
        self.state
            .lock()
            .entries
            .get(id)
            .map_or(Phase::Clean, Entry::phase)
    }

    /// Staged changes for `id`, if any.
    #[must_use]
    pub fn staged(&self, id: &str) -> Option<Patch> {
        self.state
            .lock()
            .entries
            .get(id)
            .filter(|entry| !entry.staged.is_empty())
            .map(|entry| entry.staged.clone())
    }

    /// Applies `mutate` to a copy of the shown value and shows the result
    /// until the edit is committed.
    ///
    /// # Errors
    ///
    /// [`ControllerError::UnknownId`] if nothing is shown for `id`.
    pub fn begin_edit(&self, id: &str, mutate: impl FnOnce(&mut T)) -> Result<T, ControllerError> {
        let (_, value) = self.push_edit(id, |shown| {
            let mut value = shown.clone();
            mutate(&mut value);
            let patch =
                diff(&shown, &value).map_err(|err| ControllerError::invalid(id, &err))?;
            Ok((Change::Patch(patch), Some(value)))
        })?;
        value.ok_or_else(|| ControllerError::unknown(id))
    }

    /// Like [`begin_edit`](Self::begin_edit), with the change given as a
    /// shallow patch.
    ///
    /// # Errors
    ///
    /// [`ControllerError::UnknownId`] if nothing is shown for `id`,
    /// [`ControllerError::InvalidPatch`] if the patched row does not decode.
    pub fn begin_patch(&self, id: &str, patch: &Patch) -> Result<T, ControllerError> {
        self.begin_patch_seq(id, patch).map(|(_, value)| value)
    }

    /// Hides `id` until the removal is committed.
    ///
    /// # Errors
    ///
    /// [`ControllerError::UnknownId`] if nothing is shown for `id`.
    pub fn begin_remove(&self, id: &str) -> Result<(), ControllerError> {
        self.push_edit(id, |_| Ok((Change::Remove, None))).map(|_| ())
    }

    /// Sends `write` for the oldest uncommitted edit of `id` and reconciles
    /// the result.
    ///
    /// Waits for earlier commits on the same id. The write is given
    /// `commit_timeout` to resolve. A failed write, including a timeout,
    /// rolls the edit back and emits one error notification. Dropping the
    /// returned future before the write resolves counts as a failure with
    /// [`ShimError::Cancelled`].
    ///
    /// # Errors
    ///
    /// [`ControllerError::NothingPending`] if `id` has no uncommitted edit.
    /// Write failures are reported through [`CommitOutcome::Failed`].
    pub async fn commit<W>(&self, id: &str, write: W) -> Result<CommitOutcome<T>, ControllerError>
    where
        W: IntoFuture<Output = Envelope<T>>,
    {
        let seq = self.claim_oldest(id)?;
        Ok(self.run_commit(id, seq, None, write).await)
    }

    /// Shows `patch` applied to `id` and commits `write` for exactly that
    /// edit.
    ///
    /// # Errors
    ///
    /// As [`begin_patch`](Self::begin_patch).
    pub async fn apply<W>(
        &self,
        id: &str,
        patch: &Patch,
        write: W,
    ) -> Result<CommitOutcome<T>, ControllerError>
    where
        W: IntoFuture<Output = Envelope<T>>,
    {
        let (seq, _) = self.begin_patch_seq(id, patch)?;
        self.claim(id, seq);
        Ok(self.run_commit(id, seq, None, write).await)
    }

    /// Hides `id` and commits `write` for that removal.
    ///
    /// # Errors
    ///
    /// [`ControllerError::UnknownId`] if nothing is shown for `id`.
    pub async fn remove<W>(&self, id: &str, write: W) -> Result<CommitOutcome<T>, ControllerError>
    where
        W: IntoFuture<Output = Envelope<T>>,
    {
        let (seq, _) = self.push_edit(id, |_| Ok((Change::Remove, None)))?;
        self.claim(id, seq);
        Ok(self.run_commit(id, seq, None, write).await)
    }

    /// Adds `patch` to the staged changes of `id`. Later values win.
    ///
    /// # Errors
    ///
    /// [`ControllerError::UnknownId`] if `id` is not tracked.
    pub fn stage(&self, id: &str, patch: Patch) -> Result<(), ControllerError> {
        let mut state = self.state.lock();
        let entry = state
            .entries
            .get_mut(id)
            .ok_or_else(|| ControllerError::unknown(id))?;
        entry.staged.extend(patch);
        Ok(())
    }

    /// Drops the staged changes of `id` and returns them.
    ///
    /// # Errors
    ///
    /// [`ControllerError::UnknownId`] if `id` is not tracked.
    pub fn discard(&self, id: &str) -> Result<Patch, ControllerError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let entry = state
            .entries
            .get_mut(id)
            .ok_or_else(|| ControllerError::unknown(id))?;
        let dropped = std::mem::take(&mut entry.staged);
        state.forget_if_gone(id);
        Ok(dropped)
    }

    /// Sends the staged changes of `id` as one write built by `write`.
    ///
    /// The changes are shown optimistically while the write is in flight.
    /// On failure they are staged again, under anything staged since.
    ///
    /// # Errors
    ///
    /// [`ControllerError::NoChanges`] if nothing is staged,
    /// [`ControllerError::UnknownId`] or [`ControllerError::InvalidPatch`]
    /// if the changes cannot be shown.
    pub async fn save<W>(
        &self,
        id: &str,
        write: impl FnOnce(Patch) -> W,
    ) -> Result<CommitOutcome<T>, ControllerError>
    where
        W: IntoFuture<Output = Envelope<T>>,
    {
        let patch = self.take_staged(id)?;
        let seq = match self.begin_patch_seq(id, &patch) {
            Ok((seq, _)) => seq,
            Err(err) => {
                self.restage(id, patch);
                return Err(err);
            }
        };
        let write = write(patch.clone());
        self.claim(id, seq);
        Ok(self.run_commit(id, seq, Some(patch), write).await)
    }

    fn push_edit(
        &self,
        id: &str,
        make: impl FnOnce(T) -> Result<(Change, Option<T>), ControllerError>,
    ) -> Result<(u64, Option<T>), ControllerError> {
        let (seq, value, was) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let entry = state
                .entries
                .get_mut(id)
                .ok_or_else(|| ControllerError::unknown(id))?;
            let shown = entry.displayed().ok_or_else(|| ControllerError::unknown(id))?;
            let (change, value) = make(shown)?;
            let was = entry.phase();
            let seq = state.next_seq;
            state.next_seq += 1;
            entry.edits.push_back(Edit {
                seq,
                change,
                claimed: false,
            });
            (seq, value, was)
        };
        self.phase_changed(id, was, Phase::Pending);
        Ok((seq, value))
    }

    fn begin_patch_seq(&self, id: &str, patch: &Patch) -> Result<(u64, T), ControllerError> {
        let (seq, value) = self.push_edit(id, |shown| {
            let value =
                apply_patch(&shown, patch).map_err(|err| ControllerError::invalid(id, &err))?;
            Ok((Change::Patch(patch.clone()), Some(value)))
        })?;
        let value = value.ok_or_else(|| ControllerError::unknown(id))?;
        Ok((seq, value))
    }

    fn claim_oldest(&self, id: &str) -> Result<u64, ControllerError> {
        let mut state = self.state.lock();
        state
            .entries
            .get_mut(id)
            .and_then(|entry| entry.edits.iter_mut().find(|edit| !edit.claimed))
            .map(|edit| {
                edit.claimed = true;
                edit.seq
            })
            .ok_or_else(|| ControllerError::NothingPending { id: id.to_owned() })
    }

    fn claim(&self, id: &str, seq: u64) {
        let mut state = self.state.lock();
        if let Some(edit) = state
            .entries
            .get_mut(id)
            .and_then(|entry| entry.edits.iter_mut().find(|edit| edit.seq == seq))
        {
            edit.claimed = true;
        }
    }

    fn take_staged(&self, id: &str) -> Result<Patch, ControllerError> {
        let mut state = self.state.lock();
        let entry = state
            .entries
            .get_mut(id)
            .ok_or_else(|| ControllerError::unknown(id))?;
        if entry.staged.is_empty() {
            return Err(ControllerError::NoChanges { id: id.to_owned() });
        }
        Ok(std::mem::take(&mut entry.staged))
    }

    fn restage(&self, id: &str, patch: Patch) {
        let mut state = self.state.lock();
        if let Some(entry) = state.entries.get_mut(id) {
            for (field, value) in patch {
                entry.staged.entry(field).or_insert(value);
            }
        }
    }

    async fn run_commit<W>(
        &self,
        id: &str,
        seq: u64,
        restage: Option<Patch>,
        write: W,
    ) -> CommitOutcome<T>
    where
        W: IntoFuture<Output = Envelope<T>>,
    {
        let mut in_flight = InFlight {
            store: self,
            id,
            seq,
            restage,
            settled: false,
        };
        let lock = self.commit_lock(id);
        let _turn = lock.lock().await;
        let write = async { Ok::<_, ShimError>(write.await) };
        let result = guarded(write, self.commit_timeout, None)
            .await
            .and_then(Envelope::into_result);
        in_flight.settle(result)
    }

    fn commit_lock(&self, id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.commit_locks.entry(id.to_owned()).or_default().clone()
    }

    fn reconcile(
        &self,
        id: &str,
        seq: u64,
        result: Result<Option<T>, ShimError>,
    ) -> CommitOutcome<T> {
        let (outcome, notification, settled) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let entry = state
                .entries
                .entry(id.to_owned())
                .or_insert_with(|| Entry::new(None));
            let change = entry.take_edit(seq).map(|edit| edit.change);

            let (outcome, notification) = match (result, change) {
                (Ok(_), Some(Change::Remove)) => {
                    debug!(id, "removal confirmed");
                    entry.confirmed = None;
                    (CommitOutcome::Removed, Notification::success(Some(id), "Removed"))
                }
                (Ok(echo), change) => {
                    // Without an echo only this edit's own change is known to be stored.
                    let adopted = echo.or_else(|| match (&entry.confirmed, change) {
                        (Some(row), Some(Change::Patch(patch))) => {
                            Some(apply_patch(row, &patch).unwrap_or_else(|_| row.clone()))
                        }
                        (confirmed, _) => confirmed.clone(),
                    });
                    debug!(id, echoed = adopted.is_some(), "edit confirmed");
                    entry.confirmed.clone_from(&adopted);
                    let outcome = adopted.map_or(CommitOutcome::Removed, CommitOutcome::Adopted);
                    (outcome, Notification::success(Some(id), "Saved"))
                }
                (Err(err), _) => {
                    warn!(id, error = %err, "write failed, rolling back");
                    let notification = Notification::error(Some(id), err.message());
                    (CommitOutcome::Failed(err), notification)
                }
            };
            let settled = entry.phase();
            state.forget_if_gone(id);
            (outcome, notification, settled)
        };

        self.phase_changed(id, Phase::Pending, Phase::Reconciling);
        self.notifier.notify(&notification);
        self.phase_changed(id, Phase::Reconciling, settled);
        outcome
    }

    fn phase_changed(&self, id: &str, from: Phase, to: Phase) {
        if from != to {
            self.notifier.on_phase_change(id, from, to);
        }
    }
}

/// A claimed edit whose write has not been reconciled yet.
///
/// Dropped unsettled, it reconciles the edit as [`ShimError::Cancelled`].
struct InFlight<'a, T: Record> {
    store: &'a OptimisticStore<T>,
    id: &'a str,
    seq: u64,
    /// Staged changes to put back if the write fails.
    restage: Option<Patch>,
    settled: bool,
}

impl<T: Record> InFlight<'_, T> {
    fn settle(&mut self, result: Result<Option<T>, ShimError>) -> CommitOutcome<T> {
        self.settled = true;
        let outcome = self.store.reconcile(self.id, self.seq, result);
        if let (CommitOutcome::Failed(_), Some(patch)) = (&outcome, self.restage.take()) {
            self.store.restage(self.id, patch);
        }
        outcome
    }
}

impl<T: Record> Drop for InFlight<'_, T> {
    fn drop(&mut self) {
        if !self.settled {
            warn!(id = self.id, "commit dropped before its write resolved");
            self.settle(Err(ShimError::Cancelled));
        }
        self.store
            .commit_locks
            .remove_if(self.id, |_, lock| Arc::strong_count(lock) == 1);
    }
}
