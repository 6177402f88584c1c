//! Turns remote notifications into notices.
//!
//! The listener only informs the user that something changed elsewhere. It
//! has no store handle: board data is refreshed by the next fetch, never by
//! a notification.
//!
//! [`NotificationFeed`] is the lossless counterpart for consumers that
//! print every event, where the bounded notice queue would evict some.

use std::sync::Arc;

use taskboard_proto::event::{EventKind, Notification};
use tokio::sync::mpsc;

use super::{NotificationBus, SubscriptionId};
use crate::notice::{NoticeLevel, SharedNotices};

/// Handlers registered on a bus for every [`EventKind`].
#[derive(Debug)]
pub struct NotificationListener {
    subscriptions: Vec<SubscriptionId>,
}

impl NotificationListener {
    /// Subscribes to all event kinds on `bus`, routing each to `notices`.
    pub fn attach<B: NotificationBus>(bus: &B, notices: &SharedNotices) -> Self {
        let subscriptions = EventKind::ALL
            .into_iter()
            .map(|kind| {
                let notices = Arc::clone(notices);
                bus.subscribe(
                    kind,
                    Arc::new(move |n: &Notification| {
                        let (title, description) = render(n);
                        tracing::debug!(kind = %n.kind, user = %n.payload.user_name, "remote change");
                        notices.lock().show(NoticeLevel::Info, title, description);
                    }),
                )
            })
            .collect();
        Self { subscriptions }
    }

    /// Unregisters every handler from `bus`.
    pub fn detach<B: NotificationBus>(self, bus: &B) {
        for id in self.subscriptions {
            bus.unsubscribe(id);
        }
    }
}

/// Every notification received on a bus, in arrival order.
#[derive(Debug)]
pub struct NotificationFeed {
    receiver: mpsc::UnboundedReceiver<Notification>,
    subscriptions: Vec<SubscriptionId>,
}

impl NotificationFeed {
    /// Subscribes to all event kinds on `bus`.
    pub fn attach<B: NotificationBus>(bus: &B) -> Self {
        let (tx, receiver) = mpsc::unbounded_channel();
        let subscriptions = EventKind::ALL
            .into_iter()
            .map(|kind| {
                let tx = tx.clone();
                bus.subscribe(
                    kind,
                    Arc::new(move |n: &Notification| {
                        if tx.send(n.clone()).is_err() {
                            tracing::debug!(kind = %n.kind, "feed closed, notification dropped");
                        }
                    }),
                )
            })
            .collect();
        Self {
            receiver,
            subscriptions,
        }
    }

    /// Next notification. `None` once every handler is gone.
    pub async fn recv(&mut self) -> Option<Notification> {
        self.receiver.recv().await
    }

    /// Next notification if one is already queued.
    pub fn try_recv(&mut self) -> Option<Notification> {
        self.receiver.try_recv().ok()
    }

    /// Unregisters the feed's handlers from `bus`.
    pub fn detach<B: NotificationBus>(self, bus: &B) {
        for id in self.subscriptions {
            bus.unsubscribe(id);
        }
    }
}

/// Notice title and description for a notification.
#[must_use]
pub fn render(notification: &Notification) -> (String, Option<String>) {
    let user = &notification.payload.user_name;
    match notification.kind {
        EventKind::UserLogin => (
            "User logged in".to_string(),
            Some(
                notification
                    .payload
                    .message
                    .clone()
                    .unwrap_or_else(|| user.clone()),
            ),
        ),
        EventKind::TaskAdd => (format!("Task added by {user}"), notification.payload.title.clone()),
        EventKind::TaskUpdate => (
            format!("Task updated by {user}"),
            notification.payload.title.clone(),
        ),
        EventKind::TaskDelete => (format!("Task deleted by {user}"), None),
    }
}
