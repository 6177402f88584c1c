//! Mutation bookkeeping: kinds, their policies, and lifecycle states.
//!
//! Every mutation the gateway starts is recorded as `Pending` and settles
//! exactly once, to `Committed` or `Failed`. Pending entries are kept until
//! they settle; settled ones only as a bounded history.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use taskboard_proto::task::TaskId;

/// What a mutation does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Create,
    Update,
    Delete,
    /// Status change from a cross-column drag.
    Move,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Move => "move",
        })
    }
}

/// How a kind of mutation interacts with the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationPolicy {
    /// Store changes before the backend confirms.
    pub optimistic: bool,
    /// Undo the optimistic change when the backend fails.
    pub rollback_on_failure: bool,
}

impl MutationKind {
    /// Policy for this kind. `rollback_moves` decides the one configurable
    /// cell: whether a failed move restores the previous status.
    #[must_use]
    pub const fn policy(self, rollback_moves: bool) -> MutationPolicy {
        match self {
            Self::Create | Self::Update | Self::Delete => MutationPolicy {
                optimistic: false,
                rollback_on_failure: false,
            },
            Self::Move => MutationPolicy {
                optimistic: true,
                rollback_on_failure: rollback_moves,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationState {
    Pending,
    Committed,
    Failed,
}

/// Identifier of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MutationId(u64);

impl fmt::Display for MutationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub id: MutationId,
    pub kind: MutationKind,
    /// Target task; a draft id for creates.
    pub task_id: TaskId,
    pub state: MutationState,
}

/// Raised when settling an entry that is unknown or already settled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("mutation {id} cannot move from {from:?} to {to:?}")]
pub struct TransitionError {
    pub id: MutationId,
    pub from: Option<MutationState>,
    pub to: MutationState,
}

/// Settled entries kept by [`MutationLedger::new`].
pub const DEFAULT_SETTLED_HISTORY: usize = 100;

/// Pending mutations plus the most recently settled ones.
#[derive(Debug)]
pub struct MutationLedger {
    next_id: u64,
    records: BTreeMap<MutationId, MutationRecord>,
    /// Settled ids, oldest first.
    settled: VecDeque<MutationId>,
    history: usize,
}

impl Default for MutationLedger {
    fn default() -> Self {
        Self::with_history(DEFAULT_SETTLED_HISTORY)
    }
}

impl MutationLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger that forgets settled entries beyond the newest `history`.
    #[must_use]
    pub const fn with_history(history: usize) -> Self {
        Self {
            next_id: 0,
            records: BTreeMap::new(),
            settled: VecDeque::new(),
            history,
        }
    }

    /// Opens a `Pending` entry.
    pub fn begin(&mut self, kind: MutationKind, task_id: TaskId) -> MutationId {
        self.next_id += 1;
        let id = MutationId(self.next_id);
        self.records.insert(
            id,
            MutationRecord {
                id,
                kind,
                task_id,
                state: MutationState::Pending,
            },
        );
        id
    }

    /// Settles a pending entry, evicting the oldest settled entry when the
    /// history is full.
    ///
    /// # Errors
    ///
    /// [`TransitionError`] if the entry is unknown (or already evicted),
    /// already settled, or `to` is `Pending`.
    pub fn settle(&mut self, id: MutationId, to: MutationState) -> Result<(), TransitionError> {
        let record = self.records.get_mut(&id);
        match record {
            Some(r) if r.state == MutationState::Pending && to != MutationState::Pending => {
                r.state = to;
                self.settled.push_back(id);
                while self.settled.len() > self.history {
                    if let Some(oldest) = self.settled.pop_front() {
                        self.records.remove(&oldest);
                    }
                }
                Ok(())
            }
            other => Err(TransitionError {
                id,
                from: other.map(|r| r.state),
                to,
            }),
        }
    }

    #[must_use]
    pub fn get(&self, id: MutationId) -> Option<&MutationRecord> {
        self.records.get(&id)
    }

    /// Entries still waiting on the backend.
    #[must_use]
    pub fn pending(&self) -> Vec<&MutationRecord> {
        self.in_state(MutationState::Pending)
    }

    #[must_use]
    pub fn in_state(&self, state: MutationState) -> Vec<&MutationRecord> {
        self.records.values().filter(|r| r.state == state).collect()
    }

    /// Retained entries, oldest first.
    #[must_use]
    pub fn records(&self) -> Vec<&MutationRecord> {
        self.records.values().collect()
    }
}
