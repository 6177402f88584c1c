//! Scope membership for the hub.
//!
//! Tracks which connected clients receive publications for each [`Scope`].
//! Memberships are ephemeral and vanish when a client disconnects.

use std::collections::{HashMap, HashSet};

use taskboard_proto::hub::Scope;
use tokio::sync::RwLock;

/// Maximum number of rooms the hub will track at once.
const MAX_ROOMS: usize = 1000;

/// Errors from scope membership changes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScopeError {
    /// The global scope is joined on hello and left on disconnect only.
    #[error("the global scope cannot be left")]
    GlobalIsImplicit,
    /// Too many distinct rooms.
    #[error("room limit reached (max {MAX_ROOMS} rooms)")]
    CapacityReached,
    /// Room names must not be blank.
    #[error("room name must not be empty")]
    EmptyRoomName,
}

/// Client ids per scope.
#[derive(Debug, Default)]
pub struct ScopeRegistry {
    members: RwLock<HashMap<Scope, HashSet<String>>>,
}

impl ScopeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `client_id` to `scope`. Joining twice is harmless.
    ///
    /// # Errors
    ///
    /// [`ScopeError::EmptyRoomName`] or [`ScopeError::CapacityReached`].
    pub async fn join(&self, scope: &Scope, client_id: &str) -> Result<(), ScopeError> {
        if let Scope::Room(name) = scope
            && name.trim().is_empty()
        {
            return Err(ScopeError::EmptyRoomName);
        }
        let mut members = self.members.write().await;
        let rooms = members.keys().filter(|s| matches!(s, Scope::Room(_))).count();
        if matches!(scope, Scope::Room(_)) && !members.contains_key(scope) && rooms >= MAX_ROOMS {
            return Err(ScopeError::CapacityReached);
        }
        members
            .entry(scope.clone())
            .or_default()
            .insert(client_id.to_string());
        drop(members);
        Ok(())
    }

    /// Removes `client_id` from a room. Returns whether it was a member.
    ///
    /// # Errors
    ///
    /// [`ScopeError::GlobalIsImplicit`] for [`Scope::Global`].
    pub async fn leave(&self, scope: &Scope, client_id: &str) -> Result<bool, ScopeError> {
        if *scope == Scope::Global {
            return Err(ScopeError::GlobalIsImplicit);
        }
        let mut members = self.members.write().await;
        let Some(set) = members.get_mut(scope) else {
            return Ok(false);
        };
        let removed = set.remove(client_id);
        if set.is_empty() {
            members.remove(scope);
        }
        drop(members);
        Ok(removed)
    }

    /// Drops `client_id` from every scope, including global.
    pub async fn leave_all(&self, client_id: &str) {
        let mut members = self.members.write().await;
        members.retain(|_, set| {
            set.remove(client_id);
            !set.is_empty()
        });
    }

    /// Members of `scope`, in no particular order.
    pub async fn members(&self, scope: &Scope) -> Vec<String> {
        self.members
            .read()
            .await
            .get(scope)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of rooms with at least one member.
    pub async fn room_count(&self) -> usize {
        self.members
            .read()
            .await
            .keys()
            .filter(|s| matches!(s, Scope::Room(_)))
            .count()
    }
}
