//! Dirty and reset propagation along ownership links.
//!
//! # Invariants
//! - Propagation walks from a fragment to its owner, one link at a time.
//! - A step stops once the owner already reflects the change, or once the
//!   owner no longer references the fragment.

use super::{StateStore, StoreResult};
use crate::behavior::behavior_for;
use crate::model::identity::Identity;
use log::debug;

impl StateStore {
    /// Marks each ancestor's owning key dirty after `id.key` became dirty.
    pub(crate) fn propagate_dirty(&mut self, id: Identity, key: &str) -> StoreResult<()> {
        let mut child = id;
        debug!(
            "event=dirty_propagate module=store status=start identity={} key={}",
            id, key
        );
        while let Some(link) = self.links.owner_of(child).cloned() {
            let Some(owner) = self.entries.get(&link.owner) else {
                break;
            };
            if owner.dirty.contains_key(&link.key) {
                break;
            }
            let Some(current) = owner.current(&link.key).cloned() else {
                break;
            };
            if !current.references(child) {
                break;
            }

            let owner_entry = self.entry_mut(link.owner)?;
            owner_entry.dirty.insert(link.key.clone(), current);
            owner_entry.sync_lifecycle();
            self.invalidate_projection(link.owner, &link.key);
            self.notify_change(link.owner, &link.key);
            child = link.owner;
        }
        Ok(())
    }

    /// Re-derives each ancestor's owning key after `id.key` became clean,
    /// clearing it where nothing else keeps it dirty.
    pub(crate) fn propagate_reset(&mut self, id: Identity, key: &str) -> StoreResult<()> {
        let mut child = id;
        debug!(
            "event=reset_propagate module=store status=start identity={} key={}",
            id, key
        );
        while let Some(link) = self.links.owner_of(child).cloned() {
            let Some(owner) = self.entries.get(&link.owner) else {
                break;
            };
            let Some(value) = owner.dirty.get(&link.key).cloned() else {
                break;
            };
            if !value.references(child) {
                break;
            }
            let definition = self.definition(link.owner, &link.key)?;
            let original = self.original_value(link.owner, &link.key)?;
            if behavior_for(definition.kind).is_dirty(self, &value, &original) {
                break;
            }

            let owner_entry = self.entry_mut(link.owner)?;
            owner_entry.dirty.remove(&link.key);
            owner_entry.sync_lifecycle();
            self.invalidate_projection(link.owner, &link.key);
            self.notify_change(link.owner, &link.key);
            child = link.owner;
        }
        Ok(())
    }
}
