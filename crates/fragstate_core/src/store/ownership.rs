//! Ownership link table.
//!
//! # Invariants
//! - A fragment has at most one owner link.
//! - Links are only removed by unload.

use crate::model::identity::Identity;
use std::collections::HashMap;

/// Owner and attribute key a fragment is attached under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OwnershipLink {
    pub owner: Identity,
    pub key: String,
}

impl OwnershipLink {
    pub fn new(owner: Identity, key: impl Into<String>) -> Self {
        Self {
            owner,
            key: key.into(),
        }
    }

    fn matches(&self, owner: Identity, key: &str) -> bool {
        self.owner == owner && self.key == key
    }
}

#[derive(Debug, Default)]
pub(crate) struct OwnershipTable {
    links: HashMap<Identity, OwnershipLink>,
}

impl OwnershipTable {
    pub(crate) fn owner_of(&self, fragment: Identity) -> Option<&OwnershipLink> {
        self.links.get(&fragment)
    }

    /// Checks whether `fragment` may be attached under `owner.key`.
    ///
    /// Returns the conflicting link when a different owner already holds it.
    pub(crate) fn check(&self, fragment: Identity, owner: Identity, key: &str) -> Result<(), OwnershipLink> {
        match self.links.get(&fragment) {
            Some(existing) if !existing.matches(owner, key) => Err(existing.clone()),
            _ => Ok(()),
        }
    }

    /// Attaches `fragment` under `owner.key`. Re-linking to the same place is a no-op.
    pub(crate) fn link(&mut self, fragment: Identity, owner: Identity, key: &str) -> Result<(), OwnershipLink> {
        self.check(fragment, owner, key)?;
        self.links
            .entry(fragment)
            .or_insert_with(|| OwnershipLink::new(owner, key));
        Ok(())
    }

    pub(crate) fn unlink(&mut self, fragment: Identity) -> Option<OwnershipLink> {
        self.links.remove(&fragment)
    }

    /// Returns whether `candidate` is `identity` itself or one of its ancestors.
    pub(crate) fn is_self_or_ancestor(&self, candidate: Identity, identity: Identity) -> bool {
        let mut cursor = Some(identity);
        while let Some(current) = cursor {
            if current == candidate {
                return true;
            }
            cursor = self.links.get(&current).map(|link| link.owner);
        }
        false
    }

    /// Fragments owned by `owner` under any key, sorted for deterministic traversal.
    pub(crate) fn fragments_owned_by(&self, owner: Identity) -> Vec<Identity> {
        let mut fragments: Vec<Identity> = self
            .links
            .iter()
            .filter(|(_, link)| link.owner == owner)
            .map(|(fragment, _)| *fragment)
            .collect();
        fragments.sort();
        fragments
    }

    /// Fragments owned by `owner` under `key`, sorted.
    pub(crate) fn fragments_at(&self, owner: Identity, key: &str) -> Vec<Identity> {
        let mut fragments: Vec<Identity> = self
            .links
            .iter()
            .filter(|(_, link)| link.matches(owner, key))
            .map(|(fragment, _)| *fragment)
            .collect();
        fragments.sort();
        fragments
    }
}
