//! Identity handles for records and fragments.
//!
//! # Responsibility
//! - Define the opaque handle every record and fragment is addressed by.
//! - Define the registry contract used to mint and retire handles.
//!
//! # Invariants
//! - Identities are compared by value and are cheap to copy.
//! - A destroyed identity is never handed out again by a registry.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Opaque handle naming one record or fragment instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(Uuid);

impl Identity {
    /// Wraps an externally minted UUID.
    ///
    /// Used by hosts whose own identity registry already owns the UUID space.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Display for Identity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registry contract for minting and retiring identities.
///
/// The store calls `create_identity` for every record or fragment it creates
/// and `destroy_identity` once the identity has been unloaded.
pub trait IdentityRegistry {
    fn create_identity(&mut self, type_name: &str) -> Identity;
    fn destroy_identity(&mut self, identity: Identity);
}

/// Default registry backed by random v4 UUIDs.
///
/// Destroyed identities stay in the retired set for the registry's lifetime,
/// so memory grows by one UUID per unloaded record or fragment. Hosts that
/// unload without bound should supply their own registry.
#[derive(Debug, Default)]
pub struct UuidIdentityRegistry {
    live: HashSet<Identity>,
    retired: HashSet<Identity>,
}

impl UuidIdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether `identity` was minted here and not yet destroyed.
    pub fn is_live(&self, identity: Identity) -> bool {
        self.live.contains(&identity)
    }

    /// Returns whether `identity` has been destroyed.
    pub fn is_retired(&self, identity: Identity) -> bool {
        self.retired.contains(&identity)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn retired_count(&self) -> usize {
        self.retired.len()
    }
}

impl IdentityRegistry for UuidIdentityRegistry {
    fn create_identity(&mut self, _type_name: &str) -> Identity {
        loop {
            let candidate = Identity(Uuid::new_v4());
            if !self.live.contains(&candidate) && !self.retired.contains(&candidate) {
                self.live.insert(candidate);
                return candidate;
            }
        }
    }

    fn destroy_identity(&mut self, identity: Identity) {
        if self.live.remove(&identity) {
            self.retired.insert(identity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{IdentityRegistry, UuidIdentityRegistry};

    #[test]
    fn destroyed_identity_is_retired() {
        let mut registry = UuidIdentityRegistry::new();
        let first = registry.create_identity("name");
        let second = registry.create_identity("name");
        assert_ne!(first, second);
        assert_eq!(registry.live_count(), 2);

        registry.destroy_identity(first);
        assert!(!registry.is_live(first));
        assert!(registry.is_retired(first));
        assert!(registry.is_live(second));

        registry.destroy_identity(first);
        registry.destroy_identity(second);
        assert_eq!(registry.live_count(), 0);
        assert_eq!(registry.retired_count(), 2);
    }

    #[test]
    fn identity_serializes_as_plain_uuid() {
        let mut registry = UuidIdentityRegistry::new();
        let identity = registry.create_identity("name");
        let json = serde_json::to_value(identity).expect("identity should serialize");
        assert_eq!(json, serde_json::Value::String(identity.to_string()));
    }
}
