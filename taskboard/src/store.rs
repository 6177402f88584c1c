//! In-memory task store: the single source of truth for the board.
//!
//! The store keeps tasks in an ordered sequence. Views (board columns, the
//! filtered list) derive their presentation from it without reordering the
//! sequence; only drag-and-drop rewrites the order, via
//! [`TaskStore::reorder_column`] and [`TaskStore::relocate`].
//!
//! Two scalar references sit beside the collection: the task currently in
//! the edit form and the id awaiting delete confirmation.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use taskboard_proto::task::{Task, TaskId, TaskStatus};

/// Handle shared by the reconciler, gateway, and dashboard.
///
/// Never hold the guard across an `.await`.
pub type SharedStore = Arc<Mutex<TaskStore>>;

/// Change notifications delivered to store observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// The whole collection was replaced.
    Replaced { count: usize },
    Added(TaskId),
    Updated(TaskId),
    Removed(TaskId),
    /// A column's relative order changed.
    Reordered(TaskStatus),
    /// A task changed column through a drag.
    Moved {
        id: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    },
}

/// Where [`TaskStore::relocate`] puts a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Placement {
    Before(TaskId),
    After(TaskId),
    End,
}

/// Ordered task collection with edit/delete references and observers.
#[derive(Debug, Default)]
pub struct TaskStore {
    tasks: Vec<Task>,
    editing: Option<Task>,
    pending_deletion: Option<TaskId>,
    revision: u64,
    observers: Vec<mpsc::UnboundedSender<StoreEvent>>,
}

impl TaskStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a new store in a [`SharedStore`] handle.
    #[must_use]
    pub fn shared() -> SharedStore {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Tasks in store order.
    #[must_use]
    pub fn list(&self) -> &[Task] {
        &self.tasks
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Looks a task up by id.
    #[must_use]
    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    /// Position of a task in store order.
    #[must_use]
    pub fn position(&self, id: &TaskId) -> Option<usize> {
        self.tasks.iter().position(|t| &t.id == id)
    }

    /// Incremented on every mutation of the collection.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Replaces the whole collection, typically with a fresh fetch result.
    ///
    /// Later duplicates of an id are dropped so ids stay unique. Drafts and
    /// tasks with a blank title are dropped too.
    pub fn set_all(&mut self, tasks: Vec<Task>) {
        let mut seen = HashSet::with_capacity(tasks.len());
        let before = tasks.len();
        self.tasks = tasks
            .into_iter()
            .filter(|t| storable(t) && seen.insert(t.id.clone()))
            .collect();
        if self.tasks.len() != before {
            tracing::warn!(
                dropped = before - self.tasks.len(),
                "duplicate, draft, or untitled tasks in replacement list"
            );
        }
        let count = self.tasks.len();
        self.touch(StoreEvent::Replaced { count });
    }

    /// Appends a persisted task.
    ///
    /// Adding an id that is already present replaces that task in place;
    /// adding a draft (empty id) or an untitled task is ignored.
    pub fn add(&mut self, task: Task) {
        if task.is_draft() {
            tracing::warn!(title = %task.title, "refusing to store a draft task");
            return;
        }
        if !storable(&task) {
            tracing::warn!(task_id = %task.id, "refusing to store an untitled task");
            return;
        }
        if let Some(slot) = self.tasks.iter_mut().find(|t| t.id == task.id) {
            tracing::warn!(task_id = %task.id, "add with existing id, replacing in place");
            let id = task.id.clone();
            *slot = task;
            self.touch(StoreEvent::Updated(id));
            return;
        }
        let id = task.id.clone();
        self.tasks.push(task);
        self.touch(StoreEvent::Added(id));
    }

    /// Replaces the task with the same id, keeping its position.
    ///
    /// Returns `false` (and changes nothing) if no such task exists or the
    /// replacement has a blank title.
    pub fn update(&mut self, task: Task) -> bool {
        if !storable(&task) {
            tracing::warn!(task_id = %task.id, "refusing update with a blank title");
            return false;
        }
        let Some(slot) = self.tasks.iter_mut().find(|t| t.id == task.id) else {
            tracing::debug!(task_id = %task.id, "update for unknown task ignored");
            return false;
        };
        let id = task.id.clone();
        *slot = task;
        self.touch(StoreEvent::Updated(id));
        true
    }

    /// Removes a task by id, returning it if it was present.
    pub fn remove(&mut self, id: &TaskId) -> Option<Task> {
        let index = self.position(id)?;
        let removed = self.tasks.remove(index);
        self.touch(StoreEvent::Removed(id.clone()));
        Some(removed)
    }

    /// Empties the collection and both references (logout).
    pub fn clear(&mut self) {
        self.editing = None;
        self.pending_deletion = None;
        self.set_all(Vec::new());
    }

    // --- edit / delete references ---

    /// Starts editing a fresh draft.
    pub fn begin_new(&mut self) {
        self.editing = Some(Task::draft());
    }

    /// Starts editing a copy of an existing task.
    pub fn begin_edit(&mut self, task: Task) {
        self.editing = Some(task);
    }

    /// The task in the edit form, if any.
    #[must_use]
    pub const fn editing(&self) -> Option<&Task> {
        self.editing.as_ref()
    }

    /// Mutable access to the task in the edit form.
    pub const fn editing_mut(&mut self) -> Option<&mut Task> {
        self.editing.as_mut()
    }

    pub fn clear_editing(&mut self) {
        self.editing = None;
    }

    /// Marks a task as awaiting delete confirmation.
    pub fn request_delete(&mut self, id: TaskId) {
        self.pending_deletion = Some(id);
    }

    #[must_use]
    pub const fn pending_deletion(&self) -> Option<&TaskId> {
        self.pending_deletion.as_ref()
    }

    pub fn clear_pending_deletion(&mut self) {
        self.pending_deletion = None;
    }

    // --- observers ---

    /// Registers an observer. Dropping the receiver unsubscribes it.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<StoreEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.observers.push(tx);
        rx
    }

    // --- ordering, used by the board reconciler ---

    /// Rewrites the relative order of one column.
    ///
    /// The slots the column occupies in the sequence stay where they are;
    /// they are refilled in `order`. Other columns do not move. Returns
    /// `false` without changing anything unless `order` is a permutation of
    /// the column's ids.
    pub(crate) fn reorder_column(&mut self, status: TaskStatus, order: &[TaskId]) -> bool {
        let slots: Vec<usize> = self
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.status == status)
            .map(|(i, _)| i)
            .collect();
        if slots.len() != order.len() {
            return false;
        }
        let mut column: Vec<Option<Task>> = slots
            .iter()
            .map(|&i| Some(self.tasks[i].clone()))
            .collect();
        let mut reordered = Vec::with_capacity(order.len());
        for id in order {
            let Some(task) = column
                .iter_mut()
                .find(|t| t.as_ref().is_some_and(|t| &t.id == id))
                .and_then(Option::take)
            else {
                return false;
            };
            reordered.push(task);
        }
        for (slot, task) in slots.into_iter().zip(reordered) {
            self.tasks[slot] = task;
        }
        self.touch(StoreEvent::Reordered(status));
        true
    }

    /// Moves a task to `status` and reinserts it at `placement`.
    ///
    /// Anchors are resolved after the task is taken out; an unknown anchor
    /// appends. Returns the task's previous status, or `None` if the id is
    /// unknown.
    pub(crate) fn relocate(
        &mut self,
        id: &TaskId,
        status: TaskStatus,
        placement: &Placement,
    ) -> Option<TaskStatus> {
        let index = self.position(id)?;
        let mut task = self.tasks.remove(index);
        let from = task.status;
        task.status = status;
        let target = match placement {
            Placement::Before(anchor) => self.position(anchor),
            Placement::After(anchor) => self.position(anchor).map(|p| p + 1),
            Placement::End => None,
        }
        .unwrap_or(self.tasks.len());
        self.tasks.insert(target, task);
        self.touch(StoreEvent::Moved {
            id: id.clone(),
            from,
            to: status,
        });
        Some(from)
    }

    fn touch(&mut self, event: StoreEvent) {
        self.revision += 1;
        self.observers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// Persisted and titled.
fn storable(task: &Task) -> bool {
    !task.is_draft() && !task.title.trim().is_empty()
}
