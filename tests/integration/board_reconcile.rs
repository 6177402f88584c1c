//! Integration tests for drag-and-drop reconciliation.
//!
//! Covers the dashboard path from gesture to backend:
//! - Cross-column moves are visible before the backend answers
//! - Same-column reorders never reach the backend
//! - Failed saves keep or roll back the optimistic status per setting
//! - Stale drag indexes resolve by task id

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Semaphore;

use taskboard::board::{DragSource, DropOutcome, DropTarget};
use taskboard::crud::{CrudClient, CrudError};
use taskboard::dashboard::Dashboard;
use taskboard::gateway::{GatewayOptions, MutationError};
use taskboard::gateway::ledger::MutationState;
use taskboard::notice::{NoticeLevel, NoticeQueue};
use taskboard::notify::memory::{MemoryBus, MemoryHub};
use taskboard::session::Session;
use taskboard::store::TaskStore;
use taskboard_proto::task::{Task, TaskId, TaskPriority, TaskStatus};

/// Backend whose updates wait for a permit, so tests can observe the
/// state between drop and confirmation.
#[derive(Clone)]
struct GatedCrud {
    tasks: Vec<Task>,
    gate: Arc<Semaphore>,
    updates: Arc<Mutex<Vec<Task>>>,
    fail: bool,
}

impl GatedCrud {
    fn new(tasks: Vec<Task>) -> Self {
        Self {
            tasks,
            gate: Arc::new(Semaphore::new(0)),
            updates: Arc::new(Mutex::new(Vec::new())),
            fail: false,
        }
    }

    fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    fn release(&self) {
        self.gate.add_permits(1);
    }
}

impl CrudClient for GatedCrud {
    async fn list(&self, _: &Session) -> Result<Vec<Task>, CrudError> {
        Ok(self.tasks.clone())
    }

    async fn create(&self, _: &Session, draft: &Task) -> Result<Task, CrudError> {
        Ok(draft.clone())
    }

    async fn update(&self, _: &Session, task: &Task) -> Result<Task, CrudError> {
        self.updates.lock().push(task.clone());
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| CrudError::Network(e.to_string()))?;
        permit.forget();
        if self.fail {
            return Err(CrudError::Server {
                status: 503,
                message: "unavailable".into(),
            });
        }
        Ok(task.clone())
    }

    async fn delete(&self, _: &Session, _: &TaskId) -> Result<(), CrudError> {
        Ok(())
    }
}

fn task(id: &str, title: &str, status: TaskStatus) -> Task {
    Task {
        id: TaskId::new(id),
        title: title.to_string(),
        description: String::new(),
        status,
        priority: TaskPriority::Medium,
        due_date: None,
    }
}

fn seed() -> Vec<Task> {
    vec![
        task("1", "Write report", TaskStatus::ToDo),
        task("2", "Fix login", TaskStatus::ToDo),
        task("3", "Deploy", TaskStatus::InProgress),
        task("4", "Archive", TaskStatus::Completed),
    ]
}

async fn mounted(crud: GatedCrud, options: GatewayOptions) -> Dashboard<GatedCrud, MemoryBus> {
    let hub = MemoryHub::new();
    let dash = Dashboard::new(
        crud,
        Arc::new(hub.connect()),
        TaskStore::shared(),
        NoticeQueue::shared(4, Duration::from_secs(5)),
        Some(Session::new("ana@example.com").with_name("Ana")),
        options,
    );
    dash.mount().await.unwrap();
    dash
}

fn drag(dash: &Dashboard<GatedCrud, MemoryBus>, column: TaskStatus, index: usize) {
    let view = dash.board();
    let task_id = view.column(column).unwrap().tasks[index].id.clone();
    dash.begin_drag(DragSource {
        column,
        index,
        task_id,
    })
    .unwrap();
}

// =============================================================================
// Cross-column moves
// =============================================================================

#[tokio::test]
async fn move_is_visible_before_backend_confirms() {
    let crud = GatedCrud::new(seed());
    let dash = mounted(crud.clone(), GatewayOptions::default()).await;
    assert_eq!(dash.board().titles(TaskStatus::ToDo), vec!["Fix login", "Write report"]);

    drag(&dash, TaskStatus::ToDo, 0);
    let result = dash
        .drop_card(Some(DropTarget {
            column: TaskStatus::Completed,
            index: 0,
        }))
        .unwrap();
    let DropOutcome::Moved { task, from, to } = &result.outcome else {
        panic!("expected a move, got {:?}", result.outcome);
    };
    assert_eq!(task.id, TaskId::new("2"));
    assert_eq!(*from, TaskStatus::ToDo);
    assert_eq!(*to, TaskStatus::Completed);

    // Backend has not answered yet.
    let board = dash.board();
    assert_eq!(board.titles(TaskStatus::ToDo), vec!["Write report"]);
    assert_eq!(board.titles(TaskStatus::Completed), vec!["Fix login", "Archive"]);
    assert_eq!(dash.gateway().pending_mutations(), 1);

    crud.release();
    let saved = result.persistence.unwrap().await.unwrap().unwrap();
    assert_eq!(saved.status, TaskStatus::Completed);
    assert_eq!(dash.gateway().pending_mutations(), 0);
    assert_eq!(crud.updates.lock().len(), 1);
    assert_eq!(crud.updates.lock()[0].status, TaskStatus::Completed);
}

#[tokio::test]
async fn drop_position_is_kept_in_destination() {
    let crud = GatedCrud::new(seed());
    let dash = mounted(crud.clone(), GatewayOptions::default()).await;

    drag(&dash, TaskStatus::InProgress, 0);
    let result = dash
        .drop_card(Some(DropTarget {
            column: TaskStatus::ToDo,
            index: 1,
        }))
        .unwrap();
    assert_eq!(
        dash.board().titles(TaskStatus::ToDo),
        vec!["Fix login", "Deploy", "Write report"]
    );
    crud.release();
    result.persistence.unwrap().await.unwrap().unwrap();
}

#[tokio::test]
async fn failed_move_keeps_optimistic_status_by_default() {
    let crud = GatedCrud::new(seed()).failing();
    let dash = mounted(crud.clone(), GatewayOptions::default()).await;

    drag(&dash, TaskStatus::ToDo, 1);
    let result = dash
        .drop_card(Some(DropTarget {
            column: TaskStatus::InProgress,
            index: 0,
        }))
        .unwrap();
    crud.release();
    let err = result.persistence.unwrap().await.unwrap().unwrap_err();
    assert!(matches!(err, MutationError::Server { status: 503, .. }));

    let store = dash.store().lock();
    assert_eq!(store.get(&TaskId::new("1")).unwrap().status, TaskStatus::InProgress);
    drop(store);

    let notices = dash.notices();
    assert_eq!(notices[0].level, NoticeLevel::Error);
    assert_eq!(notices[0].title, "Failed to update task");
    let records = dash.gateway().mutations();
    assert_eq!(records.last().unwrap().state, MutationState::Failed);
}

#[tokio::test]
async fn failed_move_rolls_back_when_enabled() {
    let crud = GatedCrud::new(seed()).failing();
    let dash = mounted(
        crud.clone(),
        GatewayOptions {
            rollback_failed_moves: true,
        },
    )
    .await;

    drag(&dash, TaskStatus::ToDo, 1);
    let result = dash
        .drop_card(Some(DropTarget {
            column: TaskStatus::InProgress,
            index: 0,
        }))
        .unwrap();
    crud.release();
    assert!(result.persistence.unwrap().await.unwrap().is_err());
    assert_eq!(
        dash.board().titles(TaskStatus::ToDo),
        vec!["Fix login", "Write report"]
    );
}

#[tokio::test]
async fn last_completed_save_wins() {
    let crud = GatedCrud::new(seed());
    let dash = mounted(crud.clone(), GatewayOptions::default()).await;

    // Move "Deploy" twice before either save completes.
    drag(&dash, TaskStatus::InProgress, 0);
    let first = dash
        .drop_card(Some(DropTarget {
            column: TaskStatus::ToDo,
            index: 0,
        }))
        .unwrap();
    let first = first.persistence.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let index = dash
        .board()
        .titles(TaskStatus::ToDo)
        .iter()
        .position(|t| *t == "Deploy")
        .unwrap();
    drag(&dash, TaskStatus::ToDo, index);
    let second = dash
        .drop_card(Some(DropTarget {
            column: TaskStatus::Completed,
            index: 0,
        }))
        .unwrap()
        .persistence
        .unwrap();

    crud.release();
    crud.release();
    let a = first.await.unwrap().unwrap();
    let b = second.await.unwrap().unwrap();
    assert_eq!(crud.updates.lock().len(), 2);
    // Whichever confirmation arrived last is what the store shows.
    let shown = dash.store().lock().get(&TaskId::new("3")).unwrap().status;
    assert!(shown == a.status || shown == b.status);
}

// =============================================================================
// Same-column reorders
// =============================================================================

#[tokio::test]
async fn reorder_never_calls_backend() {
    let crud = GatedCrud::new(seed());
    let dash = mounted(crud.clone(), GatewayOptions::default()).await;

    drag(&dash, TaskStatus::ToDo, 0);
    let result = dash
        .drop_card(Some(DropTarget {
            column: TaskStatus::ToDo,
            index: 1,
        }))
        .unwrap();
    assert!(matches!(result.outcome, DropOutcome::Reordered { .. }));
    assert!(result.persistence.is_none());
    assert_eq!(
        dash.board().titles(TaskStatus::ToDo),
        vec!["Write report", "Fix login"]
    );
    assert!(crud.updates.lock().is_empty());
    assert!(dash.gateway().mutations().is_empty());
}

#[tokio::test]
async fn reorder_survives_until_store_changes() {
    let crud = GatedCrud::new(seed());
    let dash = mounted(crud.clone(), GatewayOptions::default()).await;

    drag(&dash, TaskStatus::ToDo, 1);
    dash.drop_card(Some(DropTarget {
        column: TaskStatus::ToDo,
        index: 0,
    }))
    .unwrap();
    assert_eq!(
        dash.board().titles(TaskStatus::ToDo),
        vec!["Write report", "Fix login"]
    );

    // A refetch replaces the list and title order returns.
    dash.mount().await.unwrap();
    assert_eq!(
        dash.board().titles(TaskStatus::ToDo),
        vec!["Fix login", "Write report"]
    );
}

#[tokio::test]
async fn stale_index_resolves_by_id() {
    let crud = GatedCrud::new(seed());
    let dash = mounted(crud, GatewayOptions::default()).await;

    // Index 0 is "Fix login", but the gesture names "Write report".
    dash.begin_drag(DragSource {
        column: TaskStatus::ToDo,
        index: 0,
        task_id: TaskId::new("1"),
    })
    .unwrap();
    let result = dash
        .drop_card(Some(DropTarget {
            column: TaskStatus::ToDo,
            index: 0,
        }))
        .unwrap();
    assert!(matches!(result.outcome, DropOutcome::Reordered { .. }));
    assert_eq!(
        dash.board().titles(TaskStatus::ToDo),
        vec!["Write report", "Fix login"]
    );
}

#[tokio::test]
async fn drop_outside_changes_nothing() {
    let crud = GatedCrud::new(seed());
    let dash = mounted(crud.clone(), GatewayOptions::default()).await;
    let before = dash.board();

    drag(&dash, TaskStatus::ToDo, 0);
    let result = dash.drop_card(None).unwrap();
    assert_eq!(result.outcome, DropOutcome::Cancelled);
    assert_eq!(dash.board(), before);
    assert!(crud.updates.lock().is_empty());
}
