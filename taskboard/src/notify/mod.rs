//! Live notification channel between board clients.
//!
//! Defines the [`NotificationBus`] trait. Implementations:
//! - [`memory::MemoryBus`]: in-process hub, for tests and single-process demos
//! - [`hub::HubBus`]: WebSocket client for the `taskboard-hub` server
//!
//! [`listener::NotificationListener`] turns incoming notifications into
//! notices.

pub mod hub;
pub mod listener;
pub mod memory;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use taskboard_proto::event::{EventKind, Notification};

/// Callback invoked for each matching notification.
pub type Handler = Arc<dyn Fn(&Notification) + Send + Sync>;

/// Token returned by [`NotificationBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Errors that can occur on the notification channel.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// The channel was closed locally or by the remote side.
    #[error("notification channel closed")]
    Closed,

    /// Connecting or the hello exchange took too long.
    #[error("notification hub timed out")]
    Timeout,

    /// The hub could not be reached.
    #[error("notification hub unreachable: {0}")]
    Unreachable(String),

    /// The hub refused the connection or a frame.
    #[error("notification hub rejected request: {0}")]
    Rejected(String),

    /// A frame could not be encoded or decoded.
    #[error(transparent)]
    Codec(#[from] taskboard_proto::codec::CodecError),

    /// Lower-level WebSocket failure.
    #[error("websocket error: {0}")]
    WebSocket(String),
}

/// Publish/subscribe channel for [`Notification`]s.
///
/// Publishing never delivers back to the publishing endpoint.
pub trait NotificationBus: Send + Sync {
    /// Registers `handler` for notifications of `kind`.
    fn subscribe(&self, kind: EventKind, handler: Handler) -> SubscriptionId;

    /// Removes a handler. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);

    /// Sends a notification to the other endpoints.
    fn publish(
        &self,
        notification: &Notification,
    ) -> impl std::future::Future<Output = Result<(), BusError>> + Send;

    /// Closes the endpoint. Further publishes fail with [`BusError::Closed`].
    fn close(&self) -> impl std::future::Future<Output = ()> + Send;

    /// Whether the endpoint can still publish.
    fn is_open(&self) -> bool;
}

/// Handler registry shared by the bus implementations.
#[derive(Default)]
pub struct Subscriptions {
    next_id: AtomicU64,
    entries: Mutex<Vec<(SubscriptionId, EventKind, Handler)>>,
}

impl Subscriptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, kind: EventKind, handler: Handler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.lock().push((id, kind, handler));
        id
    }

    pub fn remove(&self, id: SubscriptionId) {
        self.entries.lock().retain(|(sid, _, _)| *sid != id);
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Calls every handler registered for the notification's kind.
    ///
    /// Handlers run outside the registry lock, so they may subscribe or
    /// unsubscribe. Returns how many handlers ran.
    pub fn dispatch(&self, notification: &Notification) -> usize {
        let handlers: Vec<Handler> = self
            .entries
            .lock()
            .iter()
            .filter(|(_, kind, _)| *kind == notification.kind)
            .map(|(_, _, handler)| Arc::clone(handler))
            .collect();
        for handler in &handlers {
            handler(notification);
        }
        handlers.len()
    }
}

impl std::fmt::Debug for Subscriptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriptions")
            .field("len", &self.len())
            .finish()
    }
}
