//! The board screen: wires store, reconciler, gateway, and listener.
//!
//! A [`Dashboard`] is mounted once per signed-in session. Mounting attaches
//! the notification listener and loads the task list; unmounting detaches
//! the listener and closes the bus.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use taskboard_proto::task::{Task, TaskId, TaskStatus};

use crate::board::{BoardError, BoardReconciler, BoardView, DragSource, DropOutcome, DropTarget};
use crate::crud::CrudClient;
use crate::gateway::{GatewayOptions, MutationError, MutationGateway};
use crate::notice::{Notice, SharedNotices};
use crate::notify::listener::{NotificationFeed, NotificationListener};
use crate::notify::NotificationBus;
use crate::session::Session;
use crate::store::SharedStore;
use crate::view::ListQuery;

/// Result of releasing a dragged card.
#[derive(Debug)]
pub struct DropResult {
    pub outcome: DropOutcome,
    /// Background save of a cross-column move. `None` for anything else.
    pub persistence: Option<JoinHandle<Result<Task, MutationError>>>,
}

pub struct Dashboard<C, B> {
    store: SharedStore,
    notices: SharedNotices,
    board: Mutex<BoardReconciler>,
    gateway: Arc<MutationGateway<C, B>>,
    bus: Arc<B>,
    listener: Mutex<Option<NotificationListener>>,
}

impl<C, B> Dashboard<C, B>
where
    C: CrudClient + 'static,
    B: NotificationBus + 'static,
{
    #[must_use]
    pub fn new(
        crud: C,
        bus: Arc<B>,
        store: SharedStore,
        notices: SharedNotices,
        session: Option<Session>,
        options: GatewayOptions,
    ) -> Self {
        let gateway = MutationGateway::new(
            crud,
            Arc::clone(&bus),
            Arc::clone(&store),
            Arc::clone(&notices),
            session,
        )
        .with_options(options);
        Self {
            store,
            notices,
            board: Mutex::new(BoardReconciler::new()),
            gateway: Arc::new(gateway),
            bus,
            listener: Mutex::new(None),
        }
    }

    /// Attaches the listener (once) and loads the task list.
    ///
    /// # Errors
    ///
    /// Whatever [`MutationGateway::fetch_all`] returns. The listener stays
    /// attached either way.
    pub async fn mount(&self) -> Result<usize, MutationError> {
        {
            let mut listener = self.listener.lock();
            if listener.is_none() {
                *listener = Some(NotificationListener::attach(self.bus.as_ref(), &self.notices));
                tracing::debug!("notification listener attached");
            }
        }
        self.gateway.fetch_all().await
    }

    /// Detaches the listener and closes the bus.
    pub async fn unmount(&self) {
        let listener = self.listener.lock().take();
        if let Some(listener) = listener {
            listener.detach(self.bus.as_ref());
        }
        self.bus.close().await;
        tracing::debug!("dashboard unmounted");
    }

    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.listener.lock().is_some()
    }

    /// Opens a lossless stream of remote notifications, for consumers that
    /// must see every event rather than the visible notices.
    #[must_use]
    pub fn feed(&self) -> NotificationFeed {
        NotificationFeed::attach(self.bus.as_ref())
    }

    pub fn close_feed(&self, feed: NotificationFeed) {
        feed.detach(self.bus.as_ref());
    }

    #[must_use]
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    #[must_use]
    pub fn gateway(&self) -> &Arc<MutationGateway<C, B>> {
        &self.gateway
    }

    /// The three columns as currently presented.
    #[must_use]
    pub fn board(&self) -> BoardView {
        let store = self.store.lock();
        self.board.lock().view(&store)
    }

    /// Filtered and sorted list view.
    #[must_use]
    pub fn list(&self, query: &ListQuery) -> Vec<Task> {
        let store = self.store.lock();
        query.apply(store.list()).into_iter().cloned().collect()
    }

    /// Visible notices, newest first.
    #[must_use]
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().active()
    }

    /// Starts dragging a card.
    ///
    /// # Errors
    ///
    /// See [`BoardReconciler::begin_drag`].
    pub fn begin_drag(&self, source: DragSource) -> Result<(), BoardError> {
        let store = self.store.lock();
        self.board.lock().begin_drag(&store, source)
    }

    pub fn cancel_drag(&self) {
        self.board.lock().cancel();
    }

    /// Releases the dragged card over `target` (`None` = outside any column).
    ///
    /// A cross-column move is already visible in the store, and recorded as
    /// a pending mutation, when this returns; its save runs on the tokio
    /// runtime, so this must be called from within one.
    ///
    /// # Errors
    ///
    /// See [`BoardReconciler::drop_on`].
    pub fn drop_card(&self, target: Option<DropTarget>) -> Result<DropResult, BoardError> {
        let outcome = {
            let mut store = self.store.lock();
            self.board.lock().drop_on(&mut store, target)?
        };
        let persistence = match &outcome {
            DropOutcome::Moved { task, from, .. } => {
                let pending = self.gateway.begin_move(task);
                let gateway = Arc::clone(&self.gateway);
                let task = task.clone();
                let from = *from;
                Some(tokio::spawn(async move {
                    gateway.settle_move(pending, task, from).await
                }))
            }
            DropOutcome::Cancelled | DropOutcome::Unchanged | DropOutcome::Reordered { .. } => None,
        };
        Ok(DropResult {
            outcome,
            persistence,
        })
    }

    /// Status change from the list view. Not optimistic.
    ///
    /// # Errors
    ///
    /// See [`MutationGateway::change_status`].
    pub async fn set_status(&self, id: &TaskId, status: TaskStatus) -> Result<Task, MutationError> {
        self.gateway.change_status(id, status).await
    }

    /// Opens the edit form on a blank draft.
    pub fn open_new(&self) {
        self.store.lock().begin_new();
    }

    /// Opens the edit form on a copy of a stored task. Returns `false` if
    /// the task is unknown.
    pub fn open_edit(&self, id: &TaskId) -> bool {
        let mut store = self.store.lock();
        let Some(task) = store.get(id).cloned() else {
            return false;
        };
        store.begin_edit(task);
        true
    }

    /// Applies `f` to the task in the edit form, if one is open.
    pub fn edit(&self, f: impl FnOnce(&mut Task)) -> bool {
        self.store.lock().editing_mut().map(f).is_some()
    }

    pub fn close_editor(&self) {
        self.store.lock().clear_editing();
    }

    /// Submits the edit form.
    ///
    /// # Errors
    ///
    /// See [`MutationGateway::submit_editing`].
    pub async fn submit(&self) -> Result<Option<Task>, MutationError> {
        self.gateway.submit_editing().await
    }

    /// Asks for confirmation before deleting `id`.
    pub fn request_delete(&self, id: TaskId) {
        self.store.lock().request_delete(id);
    }

    pub fn cancel_delete(&self) {
        self.store.lock().clear_pending_deletion();
    }

    /// Deletes the task awaiting confirmation.
    ///
    /// # Errors
    ///
    /// See [`MutationGateway::confirm_delete`].
    pub async fn confirm_delete(&self) -> Result<Option<TaskId>, MutationError> {
        self.gateway.confirm_delete().await
    }

    /// Signs out, empties the store, and resets any drag in progress.
    pub fn sign_out(&self) {
        self.board.lock().cancel();
        self.gateway.sign_out();
    }
}
