//! Integration tests for the mutation gateway.
//!
//! Each test pairs a gateway with a second in-memory bus endpoint standing
//! in for another user's client, and checks:
//! - what reaches the store, and when
//! - what is announced to the other endpoint, and how often
//! - which notices the acting user sees

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use taskboard::crud::{CrudClient, CrudError};
use taskboard::gateway::ledger::{MutationKind, MutationState};
use taskboard::gateway::{MutationError, MutationGateway};
use taskboard::notice::{NoticeLevel, NoticeQueue, SharedNotices};
use taskboard::notify::NotificationBus;
use taskboard::notify::memory::{MemoryBus, MemoryHub};
use taskboard::session::{AuthError, Session};
use taskboard::store::{SharedStore, TaskStore};
use taskboard_proto::event::{EventKind, Notification};
use taskboard_proto::task::{Task, TaskField, TaskId, TaskPriority, TaskStatus};

/// In-memory backend. Assigns ids on create and can be switched to fail.
#[derive(Default)]
struct FakeBackend {
    tasks: Mutex<Vec<Task>>,
    calls: Mutex<Vec<&'static str>>,
    failure: Mutex<Option<CrudError>>,
}

impl FakeBackend {
    fn with(tasks: Vec<Task>) -> Self {
        let backend = Self::default();
        *backend.tasks.lock() = tasks;
        backend
    }

    fn fail_next(&self, err: CrudError) {
        *self.failure.lock() = Some(err);
    }

    fn check(&self, op: &'static str) -> Result<(), CrudError> {
        self.calls.lock().push(op);
        self.failure.lock().take().map_or(Ok(()), Err)
    }
}

/// Handle the gateway owns; the test keeps another to inspect calls.
#[derive(Clone)]
struct Backend(Arc<FakeBackend>);

impl CrudClient for Backend {
    async fn list(&self, _: &Session) -> Result<Vec<Task>, CrudError> {
        self.0.check("list")?;
        Ok(self.0.tasks.lock().clone())
    }

    async fn create(&self, _: &Session, draft: &Task) -> Result<Task, CrudError> {
        self.0.check("create")?;
        let mut tasks = self.0.tasks.lock();
        let mut created = draft.clone();
        created.id = TaskId::new(format!("srv-{}", tasks.len() + 1));
        tasks.push(created.clone());
        Ok(created)
    }

    async fn update(&self, _: &Session, task: &Task) -> Result<Task, CrudError> {
        self.0.check("update")?;
        let mut tasks = self.0.tasks.lock();
        let slot = tasks
            .iter_mut()
            .find(|t| t.id == task.id)
            .ok_or_else(|| CrudError::Server {
                status: 404,
                message: "Task not found".into(),
            })?;
        *slot = task.clone();
        Ok(task.clone())
    }

    async fn delete(&self, _: &Session, id: &TaskId) -> Result<(), CrudError> {
        self.0.check("delete")?;
        self.0.tasks.lock().retain(|t| &t.id != id);
        Ok(())
    }
}

struct Harness {
    backend: Arc<FakeBackend>,
    gateway: MutationGateway<Backend, MemoryBus>,
    store: SharedStore,
    notices: SharedNotices,
    /// Everything another client would receive.
    remote: Arc<Mutex<Vec<Notification>>>,
    _peer: MemoryBus,
}

fn harness(tasks: Vec<Task>, session: Option<Session>) -> Harness {
    let hub = MemoryHub::new();
    let peer = hub.connect();
    let remote = Arc::new(Mutex::new(Vec::new()));
    for kind in EventKind::ALL {
        let sink = Arc::clone(&remote);
        peer.subscribe(kind, Arc::new(move |n: &Notification| sink.lock().push(n.clone())));
    }

    let backend = Arc::new(FakeBackend::with(tasks));
    let store = TaskStore::shared();
    let notices = NoticeQueue::shared(8, Duration::from_secs(30));
    let gateway = MutationGateway::new(
        Backend(Arc::clone(&backend)),
        Arc::new(hub.connect()),
        Arc::clone(&store),
        Arc::clone(&notices),
        session,
    );
    Harness {
        backend,
        gateway,
        store,
        notices,
        remote,
        _peer: peer,
    }
}

fn ana() -> Option<Session> {
    Some(Session::new("ana@example.com").with_name("Ana"))
}

fn task(id: &str, title: &str) -> Task {
    Task {
        id: TaskId::new(id),
        title: title.to_string(),
        description: String::new(),
        status: TaskStatus::ToDo,
        priority: TaskPriority::Low,
        due_date: chrono::NaiveDate::from_ymd_opt(2024, 6, 1),
    }
}

fn ids(store: &SharedStore) -> Vec<String> {
    store
        .lock()
        .list()
        .iter()
        .map(|t| t.id.as_str().to_string())
        .collect()
}

fn latest_notice(h: &Harness) -> (NoticeLevel, String) {
    let active = h.notices.lock().active();
    let n = active.first().expect("no notice shown");
    (n.level, n.title.clone())
}

// =============================================================================
// Delete
// =============================================================================

#[tokio::test]
async fn delete_removes_exactly_one_and_publishes_once() {
    let h = harness(vec![task("a", "A"), task("b", "B"), task("c", "C")], ana());
    h.gateway.fetch_all().await.unwrap();

    h.gateway.delete(&TaskId::new("b")).await.unwrap();

    assert_eq!(ids(&h.store), vec!["a", "c"]);
    let remote = h.remote.lock();
    assert_eq!(remote.len(), 1);
    assert_eq!(remote[0].kind, EventKind::TaskDelete);
    assert_eq!(remote[0].payload.user_name, "Ana");
    drop(remote);
    assert_eq!(latest_notice(&h), (NoticeLevel::Success, "Task deleted".into()));
}

#[tokio::test]
async fn failed_delete_keeps_task_and_stays_quiet() {
    let h = harness(vec![task("a", "A")], ana());
    h.gateway.fetch_all().await.unwrap();
    h.backend.fail_next(CrudError::Network("connection reset".into()));

    let err = h.gateway.delete(&TaskId::new("a")).await.unwrap_err();
    assert_eq!(err, MutationError::Network("connection reset".into()));
    assert_eq!(ids(&h.store), vec!["a"]);
    assert!(h.remote.lock().is_empty());
    assert_eq!(latest_notice(&h), (NoticeLevel::Error, "Failed to delete task".into()));
}

// =============================================================================
// Create
// =============================================================================

#[tokio::test]
async fn create_appends_server_record_and_announces_title() {
    let h = harness(vec![], ana());
    let mut draft = Task::draft();
    draft.title = "Plan sprint".into();
    draft.due_date = chrono::NaiveDate::from_ymd_opt(2024, 7, 1);

    let created = h.gateway.create(draft).await.unwrap();
    assert!(!created.is_draft());
    assert_eq!(ids(&h.store), vec![created.id.as_str().to_string()]);

    let remote = h.remote.lock();
    assert_eq!(remote.len(), 1);
    assert_eq!(remote[0].kind, EventKind::TaskAdd);
    assert_eq!(remote[0].payload.title.as_deref(), Some("Plan sprint"));
}

#[tokio::test]
async fn invalid_draft_never_reaches_backend() {
    let h = harness(vec![], ana());
    let mut draft = Task::draft();
    draft.title = "   ".into();

    let err = h.gateway.create(draft).await.unwrap_err();
    let MutationError::Validation(v) = err else {
        panic!("expected validation error");
    };
    assert!(v.message(TaskField::Title).is_some());
    assert!(v.message(TaskField::DueDate).is_some());
    assert!(h.backend.calls.lock().is_empty());
    assert!(h.remote.lock().is_empty());
    assert!(h.store.lock().is_empty());
    assert_eq!(latest_notice(&h).0, NoticeLevel::Error);
}

#[tokio::test]
async fn signed_out_user_cannot_mutate() {
    let h = harness(vec![task("a", "A")], None);
    assert_eq!(
        h.gateway.delete(&TaskId::new("a")).await,
        Err(MutationError::Auth(AuthError))
    );
    assert!(h.backend.calls.lock().is_empty());
    assert_eq!(
        latest_notice(&h),
        (NoticeLevel::Error, "You need to sign in first".into())
    );
}

// =============================================================================
// Update and status changes
// =============================================================================

#[tokio::test]
async fn update_replaces_in_place() {
    let h = harness(vec![task("a", "A"), task("b", "B")], ana());
    h.gateway.fetch_all().await.unwrap();

    let mut edited = task("a", "A renamed");
    edited.priority = TaskPriority::High;
    h.gateway.update(edited).await.unwrap();

    assert_eq!(ids(&h.store), vec!["a", "b"]);
    let store = h.store.lock();
    let a = store.get(&TaskId::new("a")).unwrap();
    assert_eq!(a.title, "A renamed");
    assert_eq!(a.priority, TaskPriority::High);
    drop(store);
    assert_eq!(
        h.remote.lock()[0].payload.title.as_deref(),
        Some("A renamed")
    );
}

#[tokio::test]
async fn failed_update_leaves_store_and_bus_untouched() {
    let h = harness(vec![task("a", "A")], ana());
    h.gateway.fetch_all().await.unwrap();
    h.backend.fail_next(CrudError::Server {
        status: 500,
        message: "Internal Server Error".into(),
    });

    let err = h.gateway.update(task("a", "B")).await.unwrap_err();
    assert!(matches!(err, MutationError::Server { status: 500, .. }));
    assert_eq!(h.store.lock().get(&TaskId::new("a")).unwrap().title, "A");
    assert!(h.remote.lock().is_empty());
}

#[tokio::test]
async fn status_change_is_not_optimistic() {
    let h = harness(vec![task("a", "A")], ana());
    h.gateway.fetch_all().await.unwrap();
    h.backend.fail_next(CrudError::Network("timeout".into()));

    assert!(h
        .gateway
        .change_status(&TaskId::new("a"), TaskStatus::Completed)
        .await
        .is_err());
    assert_eq!(
        h.store.lock().get(&TaskId::new("a")).unwrap().status,
        TaskStatus::ToDo
    );

    let saved = h
        .gateway
        .change_status(&TaskId::new("a"), TaskStatus::Completed)
        .await
        .unwrap();
    assert_eq!(saved.status, TaskStatus::Completed);
    assert_eq!(
        h.store.lock().get(&TaskId::new("a")).unwrap().status,
        TaskStatus::Completed
    );
}

#[tokio::test]
async fn move_announcement_carries_no_title() {
    let h = harness(vec![task("a", "A")], ana());
    h.gateway.fetch_all().await.unwrap();
    let mut moved = task("a", "A");
    moved.status = TaskStatus::InProgress;
    h.store.lock().update(moved.clone());

    h.gateway.persist_move(moved, TaskStatus::ToDo).await.unwrap();
    let remote = h.remote.lock();
    assert_eq!(remote[0].kind, EventKind::TaskUpdate);
    assert!(remote[0].payload.title.is_none());
}

// =============================================================================
// Edit form and delete confirmation
// =============================================================================

#[tokio::test]
async fn submitting_new_draft_creates() {
    let h = harness(vec![], ana());
    {
        let mut store = h.store.lock();
        store.begin_new();
        let draft = store.editing_mut().unwrap();
        draft.title = "From form".into();
        draft.due_date = chrono::NaiveDate::from_ymd_opt(2024, 8, 1);
    }
    let created = h.gateway.submit_editing().await.unwrap().unwrap();
    assert_eq!(created.title, "From form");
    assert!(h.store.lock().editing().is_none());
    assert_eq!(*h.backend.calls.lock(), vec!["create"]);
}

#[tokio::test]
async fn confirmed_delete_clears_confirmation() {
    let h = harness(vec![task("a", "A"), task("b", "B")], ana());
    h.gateway.fetch_all().await.unwrap();
    h.store.lock().request_delete(TaskId::new("a"));

    let deleted = h.gateway.confirm_delete().await.unwrap();
    assert_eq!(deleted, Some(TaskId::new("a")));
    assert!(h.store.lock().pending_deletion().is_none());
    assert_eq!(ids(&h.store), vec!["b"]);
}

// =============================================================================
// Ledger
// =============================================================================

#[tokio::test]
async fn ledger_records_every_attempt() {
    let h = harness(vec![task("a", "A")], ana());
    h.gateway.fetch_all().await.unwrap();
    h.gateway.update(task("a", "A2")).await.unwrap();
    h.backend.fail_next(CrudError::Network("down".into()));
    let _ = h.gateway.delete(&TaskId::new("a")).await;

    let records = h.gateway.mutations();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].kind, MutationKind::Update);
    assert_eq!(records[0].state, MutationState::Committed);
    assert_eq!(records[1].kind, MutationKind::Delete);
    assert_eq!(records[1].state, MutationState::Failed);
    assert_eq!(h.gateway.pending_mutations(), 0);
}

#[tokio::test]
async fn closed_bus_does_not_fail_committed_change() {
    let hub = MemoryHub::new();
    let bus = Arc::new(hub.connect());
    let backend = Arc::new(FakeBackend::with(vec![task("a", "A")]));
    let store = TaskStore::shared();
    let gateway = MutationGateway::new(
        Backend(Arc::clone(&backend)),
        Arc::clone(&bus),
        Arc::clone(&store),
        NoticeQueue::shared(2, Duration::from_secs(5)),
        ana(),
    );
    gateway.fetch_all().await.unwrap();
    bus.close().await;

    gateway.delete(&TaskId::new("a")).await.unwrap();
    assert!(store.lock().is_empty());
}
