//! Board projection and the drag-and-drop reconciler.
//!
//! A drag gesture moves through `Idle → Dragging → Dropped`. Dropping ends
//! the gesture either cancelled (no target) or valid. A valid drop inside
//! the source column is a local reorder only. A drop into another column
//! changes the task's status in the store immediately and reports
//! [`DropOutcome::Moved`] so the caller can persist it.
//!
//! Columns are shown in title order except for the column a drag has just
//! rearranged, which keeps the dragged order until the store changes for
//! any other reason.

use taskboard_proto::task::{Task, TaskId, TaskStatus};

use crate::store::{Placement, TaskStore};
use crate::view::title_order;

/// Errors from the drag state machine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    /// A drop arrived with no gesture in progress.
    #[error("no drag in progress")]
    NotDragging,
    /// A new drag started before the previous one ended.
    #[error("drag already in progress for task {0}")]
    AlreadyDragging(TaskId),
    /// The dragged task is not in the store.
    #[error("unknown task {0}")]
    UnknownTask(TaskId),
}

/// Where a drag started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragSource {
    pub column: TaskStatus,
    /// Index within the presented column.
    pub index: usize,
    pub task_id: TaskId,
}

/// Where a card was released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropTarget {
    pub column: TaskStatus,
    /// Index within the presented destination column.
    pub index: usize,
}

/// Current state of the gesture.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DragGesture {
    #[default]
    Idle,
    Dragging(DragSource),
}

/// Result of ending a gesture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropOutcome {
    /// Released outside any column.
    Cancelled,
    /// Released where it started.
    Unchanged,
    /// Reordered inside its column. Nothing to persist.
    Reordered { column: TaskStatus, task_id: TaskId },
    /// Moved to another column. `task` already carries the new status.
    Moved {
        task: Task,
        from: TaskStatus,
        to: TaskStatus,
    },
}

/// One presented column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub status: TaskStatus,
    pub tasks: Vec<Task>,
}

/// The three columns, in board order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardView {
    pub columns: Vec<Column>,
}

impl BoardView {
    /// The column for `status`.
    #[must_use]
    pub fn column(&self, status: TaskStatus) -> Option<&Column> {
        self.columns.iter().find(|c| c.status == status)
    }

    /// Titles of a column in presented order.
    #[must_use]
    pub fn titles(&self, status: TaskStatus) -> Vec<&str> {
        self.column(status)
            .map(|c| c.tasks.iter().map(|t| t.title.as_str()).collect())
            .unwrap_or_default()
    }
}

/// Order left behind by the last drop into a column.
#[derive(Debug, Clone)]
struct PinnedOrder {
    column: TaskStatus,
    order: Vec<TaskId>,
    revision: u64,
}

/// Drag state machine plus the bookkeeping for dragged column orders.
#[derive(Debug, Default)]
pub struct BoardReconciler {
    gesture: DragGesture,
    pinned: Option<PinnedOrder>,
}

impl BoardReconciler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn gesture(&self) -> &DragGesture {
        &self.gesture
    }

    /// Projects the store into columns.
    #[must_use]
    pub fn view(&self, store: &TaskStore) -> BoardView {
        let columns = TaskStatus::ALL
            .into_iter()
            .map(|status| Column {
                status,
                tasks: self
                    .column_order(store, status)
                    .iter()
                    .filter_map(|id| store.get(id).cloned())
                    .collect(),
            })
            .collect();
        BoardView { columns }
    }

    /// Picks up a card.
    ///
    /// # Errors
    ///
    /// [`BoardError::AlreadyDragging`] if a gesture is in progress,
    /// [`BoardError::UnknownTask`] if the task is not in the store.
    pub fn begin_drag(&mut self, store: &TaskStore, source: DragSource) -> Result<(), BoardError> {
        if let DragGesture::Dragging(active) = &self.gesture {
            return Err(BoardError::AlreadyDragging(active.task_id.clone()));
        }
        if store.get(&source.task_id).is_none() {
            return Err(BoardError::UnknownTask(source.task_id));
        }
        tracing::debug!(task_id = %source.task_id, column = %source.column, "drag started");
        self.gesture = DragGesture::Dragging(source);
        Ok(())
    }

    /// Abandons the current gesture, if any.
    pub fn cancel(&mut self) {
        self.gesture = DragGesture::Idle;
    }

    /// Releases the card. `None` means it was dropped outside the board.
    ///
    /// The store is updated before this returns; persisting a
    /// [`DropOutcome::Moved`] is the caller's job.
    ///
    /// # Errors
    ///
    /// [`BoardError::NotDragging`] if no gesture is active,
    /// [`BoardError::UnknownTask`] if the task vanished mid-drag. The
    /// gesture returns to idle in both cases.
    pub fn drop_on(
        &mut self,
        store: &mut TaskStore,
        target: Option<DropTarget>,
    ) -> Result<DropOutcome, BoardError> {
        let DragGesture::Dragging(source) = std::mem::take(&mut self.gesture) else {
            return Err(BoardError::NotDragging);
        };
        let Some(target) = target else {
            tracing::debug!(task_id = %source.task_id, "drag cancelled");
            return Ok(DropOutcome::Cancelled);
        };
        let Some(current) = store.get(&source.task_id).map(|t| t.status) else {
            return Err(BoardError::UnknownTask(source.task_id));
        };
        if current == target.column {
            Ok(self.reorder(store, &source, target))
        } else {
            self.move_across(store, &source.task_id, current, target)
        }
    }

    fn reorder(&mut self, store: &mut TaskStore, source: &DragSource, target: DropTarget) -> DropOutcome {
        let mut order = self.column_order(store, target.column);
        let Some(from) = resolve_index(&order, source) else {
            return DropOutcome::Unchanged;
        };
        let to = target.index.min(order.len() - 1);
        if from == to {
            return DropOutcome::Unchanged;
        }
        let id = order.remove(from);
        order.insert(to, id);
        if !store.reorder_column(target.column, &order) {
            return DropOutcome::Unchanged;
        }
        self.pin(store, target.column, order);
        tracing::debug!(task_id = %source.task_id, from, to, "reordered within column");
        DropOutcome::Reordered {
            column: target.column,
            task_id: source.task_id.clone(),
        }
    }

    fn move_across(
        &mut self,
        store: &mut TaskStore,
        id: &TaskId,
        from: TaskStatus,
        target: DropTarget,
    ) -> Result<DropOutcome, BoardError> {
        let mut order = self.column_order(store, target.column);
        let at = target.index.min(order.len());
        let placement = match (order.get(at), order.last()) {
            (Some(next), _) => Placement::Before(next.clone()),
            (None, Some(last)) => Placement::After(last.clone()),
            (None, None) => Placement::End,
        };
        order.insert(at, id.clone());
        if store.relocate(id, target.column, &placement).is_none() {
            return Err(BoardError::UnknownTask(id.clone()));
        }
        self.pin(store, target.column, order);
        let task = store
            .get(id)
            .cloned()
            .ok_or_else(|| BoardError::UnknownTask(id.clone()))?;
        tracing::debug!(task_id = %id, %from, to = %target.column, "moved across columns");
        Ok(DropOutcome::Moved {
            task,
            from,
            to: target.column,
        })
    }

    fn pin(&mut self, store: &TaskStore, column: TaskStatus, order: Vec<TaskId>) {
        self.pinned = Some(PinnedOrder {
            column,
            order,
            revision: store.revision(),
        });
    }

    /// Presented id order of one column.
    fn column_order(&self, store: &TaskStore, status: TaskStatus) -> Vec<TaskId> {
        if let Some(pinned) = &self.pinned
            && pinned.column == status
            && pinned.revision == store.revision()
        {
            return pinned.order.clone();
        }
        let mut tasks: Vec<&Task> = store.list().iter().filter(|t| t.status == status).collect();
        tasks.sort_by(|a, b| title_order(&a.title, &b.title));
        tasks.into_iter().map(|t| t.id.clone()).collect()
    }
}

/// The dragged task's index in `order`. The id wins over a stale index.
fn resolve_index(order: &[TaskId], source: &DragSource) -> Option<usize> {
    if order.get(source.index) == Some(&source.task_id) {
        return Some(source.index);
    }
    let actual = order.iter().position(|id| id == &source.task_id)?;
    tracing::debug!(
        task_id = %source.task_id,
        stale = source.index,
        actual,
        "drag source index out of date"
    );
    Some(actual)
}
