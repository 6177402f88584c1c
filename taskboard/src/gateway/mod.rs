//! The only path from board edits to the backend.
//!
//! [`MutationGateway`] checks preconditions, calls the [`CrudClient`],
//! applies the confirmed result to the store, and announces the change on
//! the [`NotificationBus`]. Outcomes are reported to the user as notices and
//! to the caller as a `Result`.
//!
//! Create, update, and delete touch the store only after the backend
//! confirms. A cross-column move has already been applied by the board when
//! [`MutationGateway::persist_move`] runs; see [`ledger::MutationKind::policy`].

pub mod ledger;

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use taskboard_proto::event::Notification;
use taskboard_proto::task::{Task, TaskId, TaskStatus, ValidationError};

use crate::crud::{CrudClient, CrudError};
use crate::notice::SharedNotices;
use crate::notify::NotificationBus;
use crate::session::{AuthError, Session};
use crate::store::SharedStore;

use ledger::{MutationId, MutationKind, MutationLedger, MutationRecord, MutationState};

/// Why a mutation did not happen.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MutationError {
    /// The task failed field validation. Nothing was sent.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No session. Nothing was sent.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// An update or delete named a task that was never persisted.
    #[error("task has not been saved yet")]
    NotPersisted,

    /// The request did not complete, or its response was unreadable.
    #[error("network error: {0}")]
    Network(String),

    /// The backend rejected the request.
    #[error("server error {status}: {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Body or reason phrase.
        message: String,
    },
}

impl From<CrudError> for MutationError {
    fn from(err: CrudError) -> Self {
        match err {
            CrudError::Network(msg) | CrudError::InvalidResponse(msg) => Self::Network(msg),
            CrudError::Server { status, message } => Self::Server { status, message },
        }
    }
}

/// Gateway behaviour switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GatewayOptions {
    /// Restore the previous status when persisting a drag move fails.
    pub rollback_failed_moves: bool,
}

/// Coordinates backend writes, store updates, and notifications.
pub struct MutationGateway<C, B> {
    crud: C,
    bus: Arc<B>,
    store: SharedStore,
    notices: SharedNotices,
    session: RwLock<Option<Session>>,
    ledger: Mutex<MutationLedger>,
    options: GatewayOptions,
}

impl<C: CrudClient, B: NotificationBus> MutationGateway<C, B> {
    #[must_use]
    pub fn new(
        crud: C,
        bus: Arc<B>,
        store: SharedStore,
        notices: SharedNotices,
        session: Option<Session>,
    ) -> Self {
        Self {
            crud,
            bus,
            store,
            notices,
            session: RwLock::new(session),
            ledger: Mutex::new(MutationLedger::new()),
            options: GatewayOptions::default(),
        }
    }

    #[must_use]
    pub const fn with_options(mut self, options: GatewayOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn session(&self) -> Option<Session> {
        self.session.read().clone()
    }

    pub fn sign_in(&self, session: Session) {
        tracing::info!(user = %session.display_name(), "signed in");
        *self.session.write() = Some(session);
    }

    /// Drops the session and empties the store.
    pub fn sign_out(&self) {
        *self.session.write() = None;
        self.store.lock().clear();
        tracing::info!("signed out");
    }

    /// Pending mutations plus recent settled ones, oldest first.
    #[must_use]
    pub fn mutations(&self) -> Vec<MutationRecord> {
        self.ledger.lock().records().into_iter().cloned().collect()
    }

    /// Mutations still waiting on the backend.
    #[must_use]
    pub fn pending_mutations(&self) -> usize {
        self.ledger.lock().pending().len()
    }

    /// Replaces the store contents with the backend's task list.
    ///
    /// # Errors
    ///
    /// [`MutationError::Auth`] without a session; network or server errors
    /// leave the store untouched.
    pub async fn fetch_all(&self) -> Result<usize, MutationError> {
        let session = self.require_session()?;
        match self.crud.list(&session).await {
            Ok(tasks) => {
                let count = tasks.len();
                self.store.lock().set_all(tasks);
                tracing::info!(count, "task list loaded");
                Ok(count)
            }
            Err(e) => {
                let err = MutationError::from(e);
                tracing::warn!(error = %err, "failed to load tasks");
                self.notices
                    .lock()
                    .error("Failed to load tasks", Some(err.to_string()));
                Err(err)
            }
        }
    }

    /// Persists a draft and adds the stored record.
    ///
    /// # Errors
    ///
    /// Auth and validation errors before any request; network and server
    /// errors from the backend. The store is unchanged on error.
    pub async fn create(&self, draft: Task) -> Result<Task, MutationError> {
        let session = self.require_session()?;
        self.validate(&draft)?;

        let id = self.begin(MutationKind::Create, draft.id.clone());
        match self.crud.create(&session, &draft).await {
            Ok(created) => {
                self.store.lock().add(created.clone());
                self.commit(id, MutationKind::Create, &created.id);
                self.notices.lock().success("Task created");
                self.announce(Notification::task_added(
                    session.display_name(),
                    created.title.clone(),
                ))
                .await;
                Ok(created)
            }
            Err(e) => Err(self.fail(id, MutationKind::Create, e)),
        }
    }

    /// Saves an edited task and replaces it in the store.
    ///
    /// # Errors
    ///
    /// As [`create`](Self::create), plus [`MutationError::NotPersisted`]
    /// for drafts.
    pub async fn update(&self, task: Task) -> Result<Task, MutationError> {
        let session = self.require_session()?;
        if task.is_draft() {
            return Err(MutationError::NotPersisted);
        }
        self.validate(&task)?;
        self.save(&session, MutationKind::Update, task, true).await
    }

    /// Changes only the status of a stored task (list view status select).
    ///
    /// Unlike [`update`](Self::update) this skips form validation: the task
    /// is whatever the backend last returned.
    ///
    /// # Errors
    ///
    /// Auth, not-persisted, network, and server errors.
    pub async fn change_status(&self, id: &TaskId, status: TaskStatus) -> Result<Task, MutationError> {
        let session = self.require_session()?;
        let Some(mut task) = self.store.lock().get(id).cloned() else {
            return Err(MutationError::NotPersisted);
        };
        task.status = status;
        self.save(&session, MutationKind::Update, task, true).await
    }

    /// Persists a cross-column drag that the board already applied.
    ///
    /// `from` is the status before the drag, used when rolling back.
    ///
    /// # Errors
    ///
    /// Auth, network, and server errors. The optimistic status stays in the
    /// store unless rollback is enabled.
    pub async fn persist_move(&self, task: Task, from: TaskStatus) -> Result<Task, MutationError> {
        let pending = self.begin_move(&task);
        self.settle_move(pending, task, from).await
    }

    /// Records a `Pending` move for a drag the board just applied.
    ///
    /// Call this before handing the save to another task so the ledger
    /// shows the move for the whole optimistic window.
    #[must_use]
    pub fn begin_move(&self, task: &Task) -> MutationId {
        self.begin(MutationKind::Move, task.id.clone())
    }

    /// Sends a move opened with [`begin_move`](Self::begin_move) and
    /// settles its ledger entry.
    ///
    /// # Errors
    ///
    /// As [`persist_move`](Self::persist_move).
    pub async fn settle_move(
        &self,
        pending: MutationId,
        task: Task,
        from: TaskStatus,
    ) -> Result<Task, MutationError> {
        let session = match self.require_session() {
            Ok(s) => s,
            Err(e) => {
                self.abandon(pending, MutationKind::Move);
                self.roll_back_move(&task, from);
                return Err(e);
            }
        };
        let moved_to = task.status;
        let result = self
            .send_update(pending, &session, MutationKind::Move, task.clone(), false)
            .await;
        if result.is_err() {
            tracing::warn!(task_id = %task.id, %from, to = %moved_to, "move not persisted");
            self.roll_back_move(&task, from);
        }
        result
    }

    /// Deletes a task and removes it from the store.
    ///
    /// # Errors
    ///
    /// Auth, not-persisted, network, and server errors. The task stays in
    /// the store on error.
    pub async fn delete(&self, task_id: &TaskId) -> Result<(), MutationError> {
        let session = self.require_session()?;
        if task_id.is_draft() {
            return Err(MutationError::NotPersisted);
        }
        let id = self.begin(MutationKind::Delete, task_id.clone());
        match self.crud.delete(&session, task_id).await {
            Ok(()) => {
                self.store.lock().remove(task_id);
                self.commit(id, MutationKind::Delete, task_id);
                self.notices.lock().success("Task deleted");
                self.announce(Notification::task_deleted(session.display_name()))
                    .await;
                Ok(())
            }
            Err(e) => Err(self.fail(id, MutationKind::Delete, e)),
        }
    }

    /// Deletes the task awaiting confirmation, if any.
    ///
    /// The confirmation reference is cleared whatever the outcome, unless it
    /// was pointed at another task in the meantime.
    ///
    /// # Errors
    ///
    /// As [`delete`](Self::delete).
    pub async fn confirm_delete(&self) -> Result<Option<TaskId>, MutationError> {
        let Some(task_id) = self.store.lock().pending_deletion().cloned() else {
            return Ok(None);
        };
        let result = self.delete(&task_id).await;
        {
            let mut store = self.store.lock();
            // A newer request made while the delete was in flight stays.
            if store.pending_deletion() == Some(&task_id) {
                store.clear_pending_deletion();
            }
        }
        result.map(|()| Some(task_id))
    }

    /// Submits the task in the edit form: creates drafts, updates the rest.
    ///
    /// Auth and validation failures keep the form so it can be corrected.
    /// After a request was attempted the form is cleared whether or not it
    /// succeeded. Returns `Ok(None)` when nothing is being edited.
    ///
    /// # Errors
    ///
    /// As [`create`](Self::create) / [`update`](Self::update).
    pub async fn submit_editing(&self) -> Result<Option<Task>, MutationError> {
        let Some(task) = self.store.lock().editing().cloned() else {
            return Ok(None);
        };
        let session = self.require_session()?;
        self.validate(&task)?;
        let result = if task.is_draft() {
            self.create(task).await
        } else {
            self.save(&session, MutationKind::Update, task, true).await
        };
        self.store.lock().clear_editing();
        result.map(Some)
    }

    // --- internals ---

    async fn save(
        &self,
        session: &Session,
        kind: MutationKind,
        task: Task,
        announce_title: bool,
    ) -> Result<Task, MutationError> {
        let id = self.begin(kind, task.id.clone());
        self.send_update(id, session, kind, task, announce_title).await
    }

    async fn send_update(
        &self,
        id: MutationId,
        session: &Session,
        kind: MutationKind,
        task: Task,
        announce_title: bool,
    ) -> Result<Task, MutationError> {
        match self.crud.update(session, &task).await {
            Ok(saved) => {
                self.store.lock().update(saved.clone());
                self.commit(id, kind, &saved.id);
                self.notices.lock().success("Task updated");
                let title = announce_title.then(|| saved.title.clone());
                self.announce(Notification::task_updated(session.display_name(), title))
                    .await;
                Ok(saved)
            }
            Err(e) => Err(self.fail(id, kind, e)),
        }
    }

    fn require_session(&self) -> Result<Session, MutationError> {
        self.session().ok_or_else(|| {
            tracing::warn!("mutation attempted without a session");
            self.notices
                .lock()
                .error("You need to sign in first", None);
            MutationError::Auth(AuthError)
        })
    }

    fn validate(&self, task: &Task) -> Result<(), MutationError> {
        task.validate().map_err(|e| {
            tracing::debug!(error = %e, "task failed validation");
            self.notices
                .lock()
                .error("Please fill in the required fields", Some(e.to_string()));
            MutationError::Validation(e)
        })
    }

    fn begin(&self, kind: MutationKind, task_id: TaskId) -> MutationId {
        let id = self.ledger.lock().begin(kind, task_id.clone());
        tracing::debug!(mutation = %id, %kind, task_id = %task_id, "mutation pending");
        id
    }

    fn commit(&self, id: MutationId, kind: MutationKind, task_id: &TaskId) {
        if let Err(e) = self.ledger.lock().settle(id, MutationState::Committed) {
            tracing::warn!(error = %e, "ledger out of sync");
        }
        tracing::info!(mutation = %id, %kind, task_id = %task_id, "mutation committed");
    }

    /// Settles an entry that never reached the backend.
    fn abandon(&self, id: MutationId, kind: MutationKind) {
        if let Err(e) = self.ledger.lock().settle(id, MutationState::Failed) {
            tracing::warn!(error = %e, "ledger out of sync");
        }
        tracing::debug!(mutation = %id, %kind, "mutation abandoned before sending");
    }

    fn fail(&self, id: MutationId, kind: MutationKind, err: CrudError) -> MutationError {
        if let Err(e) = self.ledger.lock().settle(id, MutationState::Failed) {
            tracing::warn!(error = %e, "ledger out of sync");
        }
        let err = MutationError::from(err);
        tracing::warn!(mutation = %id, %kind, error = %err, "mutation failed");
        let title = match kind {
            MutationKind::Create => "Failed to create task",
            MutationKind::Update | MutationKind::Move => "Failed to update task",
            MutationKind::Delete => "Failed to delete task",
        };
        self.notices.lock().error(title, Some(err.to_string()));
        err
    }

    fn roll_back_move(&self, task: &Task, from: TaskStatus) {
        if !MutationKind::Move
            .policy(self.options.rollback_failed_moves)
            .rollback_on_failure
        {
            return;
        }
        let mut store = self.store.lock();
        let Some(mut current) = store.get(&task.id).cloned() else {
            return;
        };
        if current.status != task.status {
            tracing::debug!(task_id = %task.id, "task moved again since, not rolling back");
            return;
        }
        current.status = from;
        store.update(current);
        drop(store);
        tracing::info!(task_id = %task.id, status = %from, "move rolled back");
    }

    async fn announce(&self, notification: Notification) {
        if let Err(e) = self.bus.publish(&notification).await {
            tracing::warn!(kind = %notification.kind, error = %e, "notification not published");
        }
    }
}
