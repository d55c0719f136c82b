//! Lifecycle state machine for records and fragments.
//!
//! # Invariants
//! - States change only through [`transition`].
//! - `Committed` always lands in `Saved`; dirtiness is re-applied afterwards
//!   as a separate `BecameDirty` event.

use serde::{Deserialize, Serialize};

/// Lifecycle state of one identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Known to the store, no data loaded or assigned yet.
    Empty,
    /// Created locally and never confirmed by a commit.
    Created,
    /// Matches the last canonical data.
    Saved,
    /// Has local modifications over canonical data.
    Updated,
}

impl LifecycleState {
    pub fn is_new(self) -> bool {
        self == Self::Created
    }

    pub fn is_updated(self) -> bool {
        self == Self::Updated
    }
}

/// Events fed into the lifecycle state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    /// Canonical data pushed into the identity.
    Loaded,
    /// Identity created locally.
    Created,
    /// First locally dirty attribute appeared.
    BecameDirty,
    /// Last locally dirty attribute disappeared.
    BecameClean,
    /// Pending commit confirmed.
    Committed,
    /// Pending commit rejected; dirty state is restored separately.
    Rejected,
    /// Local modifications discarded.
    RolledBack,
}

/// Transition table.
pub fn transition(state: LifecycleState, event: LifecycleEvent) -> LifecycleState {
    use LifecycleEvent as E;
    use LifecycleState as S;

    match (state, event) {
        (_, E::Committed) => S::Saved,
        (S::Empty, E::Created) => S::Created,
        (S::Empty, E::Loaded) => S::Saved,
        (S::Empty, E::BecameDirty) => S::Created,
        (S::Saved, E::BecameDirty) => S::Updated,
        (S::Updated, E::BecameClean) => S::Saved,
        (S::Updated, E::RolledBack) => S::Saved,
        (state, _) => state,
    }
}
