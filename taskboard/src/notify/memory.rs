//! In-process notification hub.
//!
//! [`MemoryHub::connect`] hands out [`MemoryBus`] endpoints; publishing on
//! one endpoint dispatches synchronously to the handlers of every other open
//! endpoint.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use taskboard_proto::event::{EventKind, Notification};

use super::{BusError, Handler, NotificationBus, SubscriptionId, Subscriptions};

#[derive(Debug)]
struct Endpoint {
    id: u64,
    open: Arc<AtomicBool>,
    subscriptions: Arc<Subscriptions>,
}

#[derive(Debug, Default)]
struct HubInner {
    next_id: u64,
    endpoints: Vec<Endpoint>,
}

/// Shared in-memory fan-out point.
#[derive(Debug, Clone, Default)]
pub struct MemoryHub {
    inner: Arc<Mutex<HubInner>>,
}

impl MemoryHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new endpoint on this hub.
    #[must_use]
    pub fn connect(&self) -> MemoryBus {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        let open = Arc::new(AtomicBool::new(true));
        let subscriptions = Arc::new(Subscriptions::new());
        inner.endpoints.push(Endpoint {
            id,
            open: Arc::clone(&open),
            subscriptions: Arc::clone(&subscriptions),
        });
        drop(inner);
        MemoryBus {
            id,
            hub: self.clone(),
            open,
            subscriptions,
        }
    }

    /// Emits `user:login` to every open endpoint, as a server would when a
    /// user signs in.
    pub fn announce_login(&self, user_name: &str) {
        let notification = Notification::user_login(user_name, format!("{user_name} logged in"));
        self.fan_out(None, &notification);
    }

    /// Number of open endpoints.
    #[must_use]
    pub fn open_endpoints(&self) -> usize {
        self.inner
            .lock()
            .endpoints
            .iter()
            .filter(|e| e.open.load(Ordering::Relaxed))
            .count()
    }

    fn fan_out(&self, from: Option<u64>, notification: &Notification) -> usize {
        let targets: Vec<Arc<Subscriptions>> = self
            .inner
            .lock()
            .endpoints
            .iter()
            .filter(|e| Some(e.id) != from && e.open.load(Ordering::Relaxed))
            .map(|e| Arc::clone(&e.subscriptions))
            .collect();
        targets.iter().map(|s| s.dispatch(notification)).sum()
    }

    fn detach(&self, id: u64) {
        self.inner.lock().endpoints.retain(|e| e.id != id);
    }
}

/// One endpoint of a [`MemoryHub`].
#[derive(Debug)]
pub struct MemoryBus {
    id: u64,
    hub: MemoryHub,
    open: Arc<AtomicBool>,
    subscriptions: Arc<Subscriptions>,
}

impl MemoryBus {
    /// Handlers currently registered on this endpoint.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }
}

impl NotificationBus for MemoryBus {
    fn subscribe(&self, kind: EventKind, handler: Handler) -> SubscriptionId {
        self.subscriptions.add(kind, handler)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.subscriptions.remove(id);
    }

    async fn publish(&self, notification: &Notification) -> Result<(), BusError> {
        if !self.is_open() {
            return Err(BusError::Closed);
        }
        let delivered = self.hub.fan_out(Some(self.id), notification);
        tracing::debug!(kind = %notification.kind, delivered, "published in memory");
        Ok(())
    }

    async fn close(&self) {
        self.open.store(false, Ordering::Relaxed);
        self.subscriptions.clear();
        self.hub.detach(self.id);
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Relaxed)
    }
}
