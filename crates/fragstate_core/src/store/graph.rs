//! Record and fragment lifetime: creation, copying, unloading.

use super::entry::StateEntry;
use super::{StateStore, StoreResult};
use crate::config::OrphanPolicy;
use crate::model::identity::Identity;
use crate::model::lifecycle::LifecycleEvent;
use crate::model::value::Payload;
use log::{debug, info};

impl StateStore {
    /// Creates an empty, locally new record.
    pub fn create_record(&mut self, type_name: &str) -> StoreResult<Identity> {
        self.type_schema(type_name)?;
        let id = self.identities.create_identity(type_name);
        self.entries.insert(id, StateEntry::starting_with(type_name, LifecycleEvent::Created));
        debug!(
            "event=record_created module=store status=ok identity={} type={}",
            id, type_name
        );
        Ok(id)
    }

    /// Creates a record whose canonical state is `payload`.
    pub fn load_record(&mut self, type_name: &str, payload: &Payload) -> StoreResult<Identity> {
        self.validate_payload(type_name, payload, None)?;
        let id = self.identities.create_identity(type_name);
        self.entries.insert(id, StateEntry::starting_with(type_name, LifecycleEvent::Loaded));
        self.push_payload(id, payload, None)?;
        debug!(
            "event=record_loaded module=store status=ok identity={} type={}",
            id, type_name
        );
        Ok(id)
    }

    /// Creates a detached fragment whose attributes start out dirty.
    pub fn create_fragment(&mut self, type_name: &str, data: &Payload) -> StoreResult<Identity> {
        self.validate_payload(type_name, data, None)?;
        self.create_local_fragment(type_name, data, None)
    }

    /// Creates a detached fragment from the visible state of `source`.
    pub fn copy_fragment(&mut self, source: Identity) -> StoreResult<Identity> {
        let type_name = self.type_of(source)?.to_string();
        let snapshot = self.current_state(source)?;
        let copy = self.create_local_fragment(&type_name, &snapshot, None)?;
        debug!(
            "event=fragment_copied module=store status=ok source={} copy={}",
            source, copy
        );
        Ok(copy)
    }

    pub(crate) fn create_local_fragment(&mut self, type_name: &str, data: &Payload, skip_key: Option<&str>) -> StoreResult<Identity> {
        let id = self.identities.create_identity(type_name);
        self.entries.insert(id, StateEntry::starting_with(type_name, LifecycleEvent::Created));
        self.assign_payload(id, data, skip_key)?;
        Ok(id)
    }

    /// Creates a fragment with canonical `data`, linked under `owner.key`.
    pub(crate) fn create_canonical_fragment(
        &mut self,
        owner: Identity,
        key: &str,
        type_name: &str,
        data: &Payload,
        skip_key: Option<&str>,
    ) -> StoreResult<Identity> {
        let id = self.identities.create_identity(type_name);
        self.entries.insert(id, StateEntry::starting_with(type_name, LifecycleEvent::Loaded));
        self.link_fragment(id, owner, key)?;
        self.push_payload(id, data, skip_key)?;
        Ok(id)
    }

    /// Unloads the identity and, recursively, every fragment it owns.
    pub fn unload(&mut self, id: Identity) -> StoreResult<()> {
        self.entry(id)?;
        for fragment in self.links.fragments_owned_by(id) {
            if self.entries.contains_key(&fragment) {
                self.unload(fragment)?;
            } else {
                self.links.unlink(fragment);
            }
        }
        self.entries.remove(&id);
        self.links.unlink(id);
        self.projections.remove(&id);
        self.identities.destroy_identity(id);
        debug!("event=unloaded module=store status=ok identity={}", id);
        Ok(())
    }

    /// Unloads fragments linked under `owner.key` that no state map references.
    pub(crate) fn release_orphans(&mut self, owner: Identity, key: &str) -> StoreResult<()> {
        if self.options.orphan_policy == OrphanPolicy::Retain {
            return Ok(());
        }
        let entry = self.entry(owner)?;
        let referenced: Vec<Identity> = [
            entry.canonical.get(key),
            entry.dirty.get(key),
            entry.in_flight.get(key),
        ]
        .into_iter()
        .flatten()
        .flat_map(|value| value.fragment_ids())
        .collect();
        let orphans: Vec<Identity> = self
            .links
            .fragments_at(owner, key)
            .into_iter()
            .filter(|fragment| !referenced.contains(fragment))
            .collect();
        for fragment in orphans {
            if self.entries.contains_key(&fragment) {
                self.unload(fragment)?;
            } else {
                self.links.unlink(fragment);
            }
            info!(
                "event=fragment_released module=store status=ok owner={} key={} fragment={}",
                owner, key, fragment
            );
        }
        Ok(())
    }
}
