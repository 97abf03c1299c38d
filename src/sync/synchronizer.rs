//! Optimistic synchronization of the My Day / Pending / Completed lists.
//!
//! Every mutation first applies its end state locally, then asks the server,
//! and puts the original record back if the server says no. The lists live
//! behind a plain mutex that is never held across an `.await`, so readers
//! only ever see settled local steps.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;

use super::client::{Mutation, TaskRemote};
use crate::core::collections::{CollectionKind, TaskLists};
use crate::core::task::{NewTask, Task, TaskId};
use crate::error::SyncError;

/// A dismissable, user-facing failure message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub task_id: Option<TaskId>,
    pub message: String,
}

#[derive(Default)]
struct SyncState {
    lists: TaskLists,
    loading: bool,
    last_error: Option<SyncError>,
    in_flight: HashSet<TaskId>,
    overlays: HashMap<TaskId, Overlay>,
    notices: Vec<Notice>,
    refresh_generation: u64,
    closed: bool,
}

/// Where a task was before its optimistic move, for rollback.
struct Undo {
    from: CollectionKind,
    index: usize,
    original: Task,
}

/// The local end state of a mutation, kept so a refresh that raced with it
/// can be brought back in line.
struct Overlay {
    /// `None` for a delete.
    target: Option<(CollectionKind, Task)>,
    /// Refresh generation current when the server confirmed it.
    confirmed_at: Option<u64>,
}

impl Overlay {
    fn apply(&self, id: TaskId, lists: &mut TaskLists) {
        lists.purge(id);
        if let Some((kind, task)) = &self.target {
            lists.insert(*kind, 0, task.clone());
        }
    }
}

/// Releases a task id's in-flight mark when the operation settles.
struct InFlight<'a> {
    state: &'a Mutex<SyncState>,
    id: TaskId,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.in_flight.remove(&self.id);
        // Dropped mid-flight: the outcome is unknown, stop re-applying it.
        if state.overlays.get(&self.id).is_some_and(|o| o.confirmed_at.is_none()) {
            state.overlays.remove(&self.id);
        }
    }
}

/// Owns the categorized task lists for one screen.
pub struct Synchronizer {
    remote: Arc<dyn TaskRemote>,
    state: Mutex<SyncState>,
}

impl Synchronizer {
    pub fn new(remote: Arc<dyn TaskRemote>) -> Self {
        Self {
            remote,
            state: Mutex::new(SyncState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SyncState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ── Read side ───────────────────────────────────────────────────────

    pub fn snapshot(&self) -> TaskLists {
        self.lock().lists.clone()
    }

    pub fn tasks(&self, kind: CollectionKind) -> Vec<Task> {
        self.lock().lists.get(kind).to_vec()
    }

    pub fn priority_tasks(&self) -> Vec<Task> {
        self.lock().lists.priority_tasks().into_iter().cloned().collect()
    }

    pub fn other_tasks(&self) -> Vec<Task> {
        self.lock().lists.other_tasks().into_iter().cloned().collect()
    }

    pub fn is_loading(&self) -> bool {
        self.lock().loading
    }

    pub fn last_error(&self) -> Option<SyncError> {
        self.lock().last_error.clone()
    }

    pub fn is_in_flight(&self, id: TaskId) -> bool {
        self.lock().in_flight.contains(&id)
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.lock().notices.clone()
    }

    pub fn dismiss_notice(&self, index: usize) -> Option<Notice> {
        let mut state = self.lock();
        (index < state.notices.len()).then(|| state.notices.remove(index))
    }

    pub fn take_notices(&self) -> Vec<Notice> {
        std::mem::take(&mut self.lock().notices)
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Screen teardown. Late completions are dropped from here on.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        state.loading = false;
    }

    // ── Refresh ─────────────────────────────────────────────────────────

    /// Replace every list with the server's view. A failure keeps the old
    /// lists and records the error. When refreshes overlap, only the most
    /// recently started one is applied.
    pub async fn refresh(&self) -> Result<(), SyncError> {
        let generation = {
            let mut state = self.lock();
            if state.closed {
                return Err(SyncError::Closed);
            }
            state.refresh_generation += 1;
            state.loading = true;
            state.last_error = None;
            state.refresh_generation
        };

        let result = self.remote.fetch_all().await;

        let mut state = self.lock();
        if state.closed {
            log::debug!("Dropping refresh result after close");
            return result.map(drop);
        }
        if state.refresh_generation != generation {
            log::debug!("Dropping superseded refresh #{}", generation);
            return result.map(drop);
        }
        state.loading = false;
        match result {
            Ok(mut lists) => {
                let dropped = lists.dedup();
                if dropped > 0 {
                    log::warn!("Server returned {} duplicated task ids", dropped);
                }
                log::info!(
                    "Refreshed: {} my day, {} pending, {} completed",
                    lists.my_day.len(),
                    lists.pending.len(),
                    lists.completed.len()
                );
                // Mutations still in flight, or confirmed after this fetch
                // went out, may be missing from the snapshot.
                let SyncState { overlays, .. } = &*state;
                for (id, overlay) in overlays {
                    if overlay.confirmed_at.is_none_or(|at| at >= generation) {
                        overlay.apply(*id, &mut lists);
                    }
                }
                state.overlays.retain(|_, o| o.confirmed_at.is_none());
                state.lists = lists;
                Ok(())
            }
            Err(e) => {
                log::error!("Refresh failed: {}", e);
                state.overlays.retain(|_, o| o.confirmed_at.is_none());
                state.last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    // ── Mutations ───────────────────────────────────────────────────────

    /// Move a task between lists optimistically, then confirm with the
    /// server. On failure the original record goes back to its old slot.
    pub async fn move_task<F>(
        &self,
        id: TaskId,
        from: CollectionKind,
        to: CollectionKind,
        transform: F,
        mutation: Mutation,
    ) -> Result<(), SyncError>
    where
        F: FnOnce(&mut Task),
    {
        let undo = {
            let mut state = self.lock();
            let index = Self::claim(&mut state, from, id)?;
            let Some((original, _)) = state.lists.remove(from, id) else {
                state.in_flight.remove(&id);
                return Err(SyncError::NotFound(id));
            };
            let mut moved = original.clone();
            transform(&mut moved);
            state.lists.insert(to, 0, moved.clone());
            state.overlays.insert(
                id,
                Overlay {
                    target: Some((to, moved)),
                    confirmed_at: None,
                },
            );
            log::debug!("Task {} moved {} -> {} (pending confirmation)", id, from, to);
            Undo { from, index, original }
        };
        let _guard = InFlight { state: &self.state, id };

        match self.remote.mutate(id, mutation).await {
            Ok(()) => {
                self.confirm(id);
                log::info!("Task {} moved {} -> {}", id, from, to);
                Ok(())
            }
            Err(e) => {
                self.roll_back(id, undo, &e);
                Err(e)
            }
        }
    }

    /// Remove a task from whichever list holds it, then delete it remotely.
    pub async fn delete_task(&self, id: TaskId) -> Result<(), SyncError> {
        let undo = {
            let mut state = self.lock();
            let Some((from, _)) = state.lists.locate(id) else {
                return Self::closed_or(&state, SyncError::NotFound(id));
            };
            Self::claim(&mut state, from, id)?;
            let Some((original, _)) = state.lists.remove(from, id) else {
                state.in_flight.remove(&id);
                return Err(SyncError::NotFound(id));
            };
            state.overlays.insert(
                id,
                Overlay {
                    target: None,
                    confirmed_at: None,
                },
            );
            // Deleted tasks come back at the head of their list.
            Undo { from, index: 0, original }
        };
        let _guard = InFlight { state: &self.state, id };

        match self.remote.mutate(id, Mutation::Delete).await {
            Ok(()) => {
                self.confirm(id);
                log::info!("Task {} deleted", id);
                Ok(())
            }
            Err(e) => {
                self.roll_back(id, undo, &e);
                Err(e)
            }
        }
    }

    /// Complete a My Day or Pending task. `actual_time_min` is what the user
    /// confirmed the task really took.
    pub async fn complete_task(&self, id: TaskId, actual_time_min: u32) -> Result<(), SyncError> {
        let from = {
            let state = self.lock();
            match [CollectionKind::MyDay, CollectionKind::Pending]
                .into_iter()
                .find(|kind| state.lists.position(*kind, id).is_some())
            {
                Some(kind) => kind,
                None => return Self::closed_or(&state, SyncError::NotFound(id)),
            }
        };
        let now = Utc::now();
        self.move_task(
            id,
            from,
            CollectionKind::Completed,
            |task| task.complete(now),
            Mutation::Complete { actual_time_min },
        )
        .await
    }

    /// Move a task into My Day (dated today) or back out to Pending.
    pub async fn toggle_my_day(&self, id: TaskId) -> Result<(), SyncError> {
        let from = {
            let state = self.lock();
            if state.lists.position(CollectionKind::MyDay, id).is_some() {
                CollectionKind::MyDay
            } else if state.lists.position(CollectionKind::Pending, id).is_some() {
                CollectionKind::Pending
            } else {
                return Self::closed_or(&state, SyncError::NotFound(id));
            }
        };
        if from == CollectionKind::MyDay {
            self.move_task(
                id,
                CollectionKind::MyDay,
                CollectionKind::Pending,
                |task| task.category_date = None,
                Mutation::ToggleMyDay,
            )
            .await
        } else {
            let today = chrono::Local::now().date_naive();
            self.move_task(
                id,
                CollectionKind::Pending,
                CollectionKind::MyDay,
                |task| task.category_date = Some(today),
                Mutation::ToggleMyDay,
            )
            .await
        }
    }

    /// Create a task on the server and file the result. Not optimistic: the
    /// id only exists once the server has assigned it.
    pub async fn create_task(&self, new: &NewTask) -> Result<Task, SyncError> {
        if self.is_closed() {
            return Err(SyncError::Closed);
        }
        let task = match self.remote.create_task(new).await {
            Ok(t) => t,
            Err(e) => {
                self.push_notice(None, &e);
                return Err(e);
            }
        };
        let mut state = self.lock();
        if !state.closed {
            let kind = CollectionKind::for_task(&task);
            state.lists.purge(task.id);
            let end = state.lists.get(kind).len();
            state.lists.insert(kind, end, task.clone());
            log::info!("Created task {} in {}", task.id, kind);
        }
        Ok(task)
    }

    /// Fetch one task's full record. Read-only.
    pub async fn task_details(&self, id: TaskId) -> Result<Task, SyncError> {
        self.remote.fetch_task(id).await
    }

    // ── Internals ───────────────────────────────────────────────────────

    /// Check `id` is in `from` and mark it in flight. Returns its index.
    fn claim(state: &mut SyncState, from: CollectionKind, id: TaskId) -> Result<usize, SyncError> {
        if state.closed {
            return Err(SyncError::Closed);
        }
        let index = state
            .lists
            .position(from, id)
            .ok_or(SyncError::NotFound(id))?;
        if !state.in_flight.insert(id) {
            return Err(SyncError::Busy(id));
        }
        Ok(index)
    }

    fn closed_or<T>(state: &SyncState, err: SyncError) -> Result<T, SyncError> {
        if state.closed { Err(SyncError::Closed) } else { Err(err) }
    }

    /// The server accepted the change. Keep the overlay only while a
    /// refresh that may predate it is still out.
    fn confirm(&self, id: TaskId) {
        let mut state = self.lock();
        if state.loading {
            let generation = state.refresh_generation;
            if let Some(overlay) = state.overlays.get_mut(&id) {
                overlay.confirmed_at = Some(generation);
            }
        } else {
            state.overlays.remove(&id);
        }
    }

    fn roll_back(&self, id: TaskId, undo: Undo, err: &SyncError) {
        let mut state = self.lock();
        state.overlays.remove(&id);
        if state.closed {
            log::debug!("Ignoring failure for task {} after close", id);
            return;
        }
        // A refresh may have landed meanwhile; clear every copy first.
        state.lists.purge(id);
        state.lists.insert(undo.from, undo.index, undo.original);
        log::warn!("Rolled back task {} to {}: {}", id, undo.from, err);
        state.notices.push(Notice {
            task_id: Some(id),
            message: err.notice_text(),
        });
    }

    fn push_notice(&self, task_id: Option<TaskId>, err: &SyncError) {
        let mut state = self.lock();
        if !state.closed {
            state.notices.push(Notice {
                task_id,
                message: err.notice_text(),
            });
        }
    }
}
