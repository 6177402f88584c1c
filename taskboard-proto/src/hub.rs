//! Wire protocol between board clients and the notification hub.
//!
//! A client opens a WebSocket, sends [`HubMessage::Hello`], and waits for
//! [`HubMessage::Welcome`]. From then on it may join scopes and publish
//! notifications; the hub delivers each publication to the other members
//! of the target scope.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::codec::{self, CodecError};
use crate::event::Notification;

/// A fan-out group on the hub.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    /// Every connected client. Joined implicitly on hello, cannot be left.
    #[default]
    Global,
    /// A named room, e.g. one board shared by a team.
    Room(String),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("global"),
            Self::Room(name) => write!(f, "room:{name}"),
        }
    }
}

/// Frames exchanged with the hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HubMessage {
    /// First frame from a client.
    Hello {
        /// Display name used in the `user:login` announcement.
        user_name: String,
    },

    /// Hub acknowledges a hello.
    Welcome {
        /// Connection id assigned by the hub.
        client_id: String,
    },

    /// Client asks to receive notifications published to `scope`.
    Join { scope: Scope },

    /// Client stops receiving notifications for `scope`.
    Leave { scope: Scope },

    /// Client publishes a notification to the other members of `scope`.
    Publish {
        scope: Scope,
        notification: Notification,
    },

    /// Hub forwards a publication.
    Deliver {
        /// Hub-assigned id of the publisher, or `"hub"` for hub-originated
        /// announcements.
        from: String,
        scope: Scope,
        notification: Notification,
    },

    /// Hub reports a rejected frame.
    Error {
        /// Human-readable error description.
        reason: String,
    },
}

/// Encodes a [`HubMessage`] for a binary frame.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if serialization fails.
pub fn encode(msg: &HubMessage) -> Result<Vec<u8>, CodecError> {
    codec::encode(msg)
}

/// Decodes a [`HubMessage`] from a binary frame.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] for malformed frames.
pub fn decode(bytes: &[u8]) -> Result<HubMessage, CodecError> {
    codec::decode(bytes)
}
