//! Transient user-facing notices (toasts).
//!
//! At most `limit` notices are visible; a new one pushes the oldest out.
//! Each notice expires on its own after the display duration. Expiry is
//! evaluated lazily against [`tokio::time::Instant`], so paused test clocks
//! drive it too.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Default number of notices shown at once.
pub const DEFAULT_NOTICE_LIMIT: usize = 1;

/// Default time a notice stays visible.
pub const DEFAULT_NOTICE_DURATION: Duration = Duration::from_millis(1500);

/// Handle shared by the gateway, the listener, and the renderer.
pub type SharedNotices = Arc<Mutex<NoticeQueue>>;

/// Monotonic notice identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NoticeId(u64);

/// Visual tone of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub id: NoticeId,
    pub level: NoticeLevel,
    pub title: String,
    pub description: Option<String>,
    pub expires_at: Instant,
}

/// Bounded queue of live notices, newest first.
#[derive(Debug)]
pub struct NoticeQueue {
    limit: usize,
    duration: Duration,
    next_id: u64,
    notices: VecDeque<Notice>,
}

impl Default for NoticeQueue {
    fn default() -> Self {
        Self::new(DEFAULT_NOTICE_LIMIT, DEFAULT_NOTICE_DURATION)
    }
}

impl NoticeQueue {
    /// Creates a queue. A zero `limit` is treated as one.
    #[must_use]
    pub fn new(limit: usize, duration: Duration) -> Self {
        Self {
            limit: limit.max(1),
            duration,
            next_id: 0,
            notices: VecDeque::new(),
        }
    }

    /// Wraps a queue in a [`SharedNotices`] handle.
    #[must_use]
    pub fn shared(limit: usize, duration: Duration) -> SharedNotices {
        Arc::new(Mutex::new(Self::new(limit, duration)))
    }

    /// Shows a notice, evicting the oldest beyond the limit.
    pub fn show(
        &mut self,
        level: NoticeLevel,
        title: impl Into<String>,
        description: Option<String>,
    ) -> NoticeId {
        self.next_id += 1;
        let id = NoticeId(self.next_id);
        self.notices.push_front(Notice {
            id,
            level,
            title: title.into(),
            description,
            expires_at: Instant::now() + self.duration,
        });
        self.notices.truncate(self.limit);
        id
    }

    pub fn success(&mut self, title: impl Into<String>) -> NoticeId {
        self.show(NoticeLevel::Success, title, None)
    }

    pub fn error(&mut self, title: impl Into<String>, description: Option<String>) -> NoticeId {
        self.show(NoticeLevel::Error, title, description)
    }

    /// Live notices, newest first. Expired ones are dropped.
    pub fn active(&mut self) -> Vec<Notice> {
        let now = Instant::now();
        self.notices.retain(|n| n.expires_at > now);
        self.notices.iter().cloned().collect()
    }

    /// Dismisses one notice early. Returns `false` if it was already gone.
    pub fn dismiss(&mut self, id: NoticeId) -> bool {
        let before = self.notices.len();
        self.notices.retain(|n| n.id != id);
        self.notices.len() != before
    }

    pub fn dismiss_all(&mut self) {
        self.notices.clear();
    }
}
