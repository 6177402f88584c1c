//! Live notification events exchanged between board clients.
//!
//! Notifications are advisory: they tell other users that something changed
//! but never carry the authoritative task state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::task::ParseEnumError;

/// The named channels a notification can be published on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// `user:login`
    #[serde(rename = "user:login")]
    UserLogin,
    /// `task:add`
    #[serde(rename = "task:add")]
    TaskAdd,
    /// `task:update`
    #[serde(rename = "task:update")]
    TaskUpdate,
    /// `task:delete`
    #[serde(rename = "task:delete")]
    TaskDelete,
}

impl EventKind {
    /// Every event kind, in the order listeners register for them.
    pub const ALL: [Self; 4] = [
        Self::UserLogin,
        Self::TaskAdd,
        Self::TaskUpdate,
        Self::TaskDelete,
    ];

    /// Channel name on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UserLogin => "user:login",
            Self::TaskAdd => "task:add",
            Self::TaskUpdate => "task:update",
            Self::TaskDelete => "task:delete",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ParseEnumError {
                kind: "event",
                value: s.to_string(),
            })
    }
}

/// Payload attached to a notification.
///
/// Task events carry the acting user's display name and, for add/update,
/// the task title. `user:login` carries a ready-made message instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    /// Display name of the user who caused the event.
    pub user_name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// A single notification: which channel, and what it says.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: EventKind,
    pub payload: NotificationPayload,
}

impl Notification {
    /// `task:add` with the task title.
    pub fn task_added(user_name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            kind: EventKind::TaskAdd,
            payload: NotificationPayload {
                user_name: user_name.into(),
                title: Some(title.into()),
                message: None,
            },
        }
    }

    /// `task:update`, optionally carrying the task title.
    pub fn task_updated(user_name: impl Into<String>, title: Option<String>) -> Self {
        Self {
            kind: EventKind::TaskUpdate,
            payload: NotificationPayload {
                user_name: user_name.into(),
                title,
                message: None,
            },
        }
    }

    /// `task:delete`; deletions never carry a title.
    pub fn task_deleted(user_name: impl Into<String>) -> Self {
        Self {
            kind: EventKind::TaskDelete,
            payload: NotificationPayload {
                user_name: user_name.into(),
                title: None,
                message: None,
            },
        }
    }

    /// `user:login` with a human-readable message.
    pub fn user_login(user_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: EventKind::UserLogin,
            payload: NotificationPayload {
                user_name: user_name.into(),
                title: None,
                message: Some(message.into()),
            },
        }
    }
}
