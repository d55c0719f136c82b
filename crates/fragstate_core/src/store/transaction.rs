//! Push, commit, rejection and rollback transitions.
//!
//! # Responsibility
//! - Merge server data into canonical state without clobbering local edits.
//! - Move dirty state in flight and resolve it on acknowledgement or rejection.
//! - Discard local edits on rollback.
//!
//! # Invariants
//! - Fragments commit, reject and roll back before their owners finish.
//! - Rollback never touches in-flight state.

use super::{StateStore, StoreError, StoreResult};
use crate::behavior::behavior_for;
use crate::model::identity::Identity;
use crate::model::lifecycle::LifecycleEvent;
use crate::model::value::{AttrValue, Payload};
use log::{debug, info, warn};
use std::collections::BTreeSet;

impl StateStore {
    /// Merges server data into canonical state.
    ///
    /// Dirty keys keep their local value; a dirty key that now equals the new
    /// canonical value becomes clean.
    pub fn push_data(&mut self, id: Identity, payload: &Payload) -> StoreResult<()> {
        let type_name = self.type_of(id)?.to_string();
        self.validate_payload(&type_name, payload, None)?;
        self.push_payload(id, payload, None)?;
        debug!(
            "event=data_pushed module=store status=ok identity={} keys={}",
            id,
            payload.len()
        );
        Ok(())
    }

    pub(crate) fn push_payload(&mut self, id: Identity, payload: &Payload, skip_key: Option<&str>) -> StoreResult<()> {
        for (key, data) in payload {
            if skip_key == Some(key.as_str()) {
                continue;
            }
            let definition = self.definition(id, key)?;
            let entry = self.entry(id)?;
            let before = entry.current(key).cloned();
            let canonical = entry.canonical.get(key).cloned();

            let merged = behavior_for(definition.kind).push_data(self, id, &definition, canonical.as_ref(), data)?;
            self.entry_mut(id)?.canonical.insert(key.clone(), merged);
            self.release_orphans(id, key)?;
            let became_clean = self.rederive_dirty(id, key)?;
            self.invalidate_projection(id, key);

            let after = self.entry(id)?.current(key).cloned();
            if became_clean || before != after {
                self.notify_change(id, key);
            }
            if became_clean {
                self.propagate_reset(id, key)?;
            }
        }
        let entry = self.entry_mut(id)?;
        entry.apply(LifecycleEvent::Loaded);
        entry.sync_lifecycle();
        Ok(())
    }

    /// Moves dirty state in flight, fragments first.
    ///
    /// Fails with `CommitInProgress` when the identity, or any fragment it is
    /// about to commit, already has a pending commit.
    pub fn will_commit(&mut self, id: Identity) -> StoreResult<()> {
        self.ensure_commit_ready(id)?;
        self.begin_commit(id)?;
        debug!(
            "event=commit_started module=store status=ok identity={}",
            id
        );
        Ok(())
    }

    fn ensure_commit_ready(&self, id: Identity) -> StoreResult<()> {
        let entry = self.entry(id)?;
        if !entry.in_flight.is_empty() {
            warn!(
                "event=commit_started module=store status=error identity={} reason=in_flight",
                id
            );
            return Err(StoreError::CommitInProgress(id));
        }
        for value in entry.dirty.values() {
            for fragment in value.fragment_ids() {
                self.ensure_commit_ready(fragment)?;
            }
        }
        Ok(())
    }

    pub(crate) fn begin_commit(&mut self, id: Identity) -> StoreResult<()> {
        let dirty: Vec<(String, AttrValue)> = self
            .entry(id)?
            .dirty
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        for (key, value) in &dirty {
            let definition = self.definition(id, key)?;
            behavior_for(definition.kind).will_commit(self, value)?;
        }
        let entry = self.entry_mut(id)?;
        entry.in_flight = std::mem::take(&mut entry.dirty);
        Ok(())
    }

    /// Resolves the pending commit, merging the optional server response.
    ///
    /// Keys absent from the response keep their committed value. Edits made
    /// while the commit was pending stay dirty.
    pub fn did_commit(&mut self, id: Identity, payload: Option<&Payload>) -> StoreResult<()> {
        let type_name = self.type_of(id)?.to_string();
        if let Some(payload) = payload {
            self.validate_payload(&type_name, payload, None)?;
        }
        self.commit_payload(id, payload, None)?;
        info!(
            "event=commit_acknowledged module=store status=ok identity={} with_payload={}",
            id,
            payload.is_some()
        );
        Ok(())
    }

    pub(crate) fn commit_payload(&mut self, id: Identity, payload: Option<&Payload>, skip_key: Option<&str>) -> StoreResult<()> {
        let definitions = self.definitions(id)?;
        let entry = self.entry(id)?;
        let before: Vec<Option<AttrValue>> = definitions
            .iter()
            .map(|definition| entry.current(&definition.key).cloned())
            .collect();
        let dirty_before: BTreeSet<String> = entry.dirty.keys().cloned().collect();

        for definition in &definitions {
            let key = definition.key.as_str();
            if skip_key == Some(key) {
                continue;
            }
            let committed = self.entry(id)?.original(key).cloned();
            let server = payload.and_then(|payload| payload.get(key));
            let behavior = behavior_for(definition.kind);
            let resolved = match (committed, server) {
                (None, None) => continue,
                (None, Some(data)) => behavior.push_data(self, id, definition, None, data)?,
                (Some(value), server) => behavior.did_commit(self, id, definition, &value, server)?,
            };
            self.entry_mut(id)?.canonical.insert(key.to_string(), resolved);
        }
        self.entry_mut(id)?.in_flight.clear();

        let mut became_clean = Vec::new();
        for definition in &definitions {
            self.release_orphans(id, &definition.key)?;
            if self.rederive_dirty(id, &definition.key)? {
                became_clean.push(definition.key.clone());
            }
        }
        let entry = self.entry_mut(id)?;
        entry.apply(LifecycleEvent::Committed);
        entry.sync_lifecycle();
        self.invalidate_projections(id);

        for (definition, before) in definitions.iter().zip(before) {
            let entry = self.entry(id)?;
            let after = entry.current(&definition.key);
            let flipped = dirty_before.contains(&definition.key) != entry.dirty.contains_key(&definition.key);
            if flipped || before.as_ref() != after {
                self.notify_change(id, &definition.key);
            }
        }
        for key in became_clean {
            self.propagate_reset(id, &key)?;
        }
        Ok(())
    }

    /// Returns in-flight state to dirty after the server refused a commit.
    ///
    /// A key edited again while the commit was pending keeps the newer edit.
    pub fn commit_rejected(&mut self, id: Identity) -> StoreResult<()> {
        let in_flight: Vec<(String, AttrValue)> = self
            .entry(id)?
            .in_flight
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        for (key, value) in &in_flight {
            let definition = self.definition(id, key)?;
            behavior_for(definition.kind).commit_was_rejected(self, value)?;
        }

        let entry = self.entry_mut(id)?;
        let mut changed = BTreeSet::new();
        for (key, value) in std::mem::take(&mut entry.in_flight) {
            if !entry.dirty.contains_key(&key) {
                entry.dirty.insert(key.clone(), value);
                changed.insert(key);
            }
        }
        entry.apply(LifecycleEvent::Rejected);

        let dirty_keys: Vec<String> = entry.dirty.keys().cloned().collect();
        let mut became_clean = Vec::new();
        for key in dirty_keys {
            if self.rederive_dirty(id, &key)? {
                changed.insert(key.clone());
                became_clean.push(key);
            }
        }
        self.entry_mut(id)?.sync_lifecycle();
        self.invalidate_projections(id);

        for key in &changed {
            self.notify_change(id, key);
        }
        for key in &changed {
            if self.entry(id)?.dirty.contains_key(key) {
                self.propagate_dirty(id, key)?;
            }
        }
        for key in became_clean {
            self.propagate_reset(id, &key)?;
        }
        warn!(
            "event=commit_rejected module=store status=ok identity={} restored={}",
            id,
            changed.len()
        );
        Ok(())
    }

    /// Discards every local edit, fragments included. Idempotent.
    ///
    /// Fragments attached by the discarded edits are released under the
    /// orphan policy.
    pub fn rollback(&mut self, id: Identity) -> StoreResult<()> {
        let keys: Vec<String> = self.entry(id)?.dirty.keys().cloned().collect();
        for key in &keys {
            let definition = self.definition(id, key)?;
            let original = self.original_value(id, key)?;
            behavior_for(definition.kind).rollback(self, &original)?;

            let entry = self.entry_mut(id)?;
            if entry.dirty.remove(key).is_some() {
                entry.sync_lifecycle();
                self.release_orphans(id, key)?;
                self.invalidate_projection(id, key);
                self.notify_change(id, key);
                self.propagate_reset(id, key)?;
            }
        }
        let entry = self.entry_mut(id)?;
        entry.sync_lifecycle();
        entry.apply(LifecycleEvent::RolledBack);
        if !keys.is_empty() {
            debug!(
                "event=rollback module=store status=ok identity={} keys={}",
                id,
                keys.len()
            );
        }
        Ok(())
    }

    /// Drops `id.key` from dirty when it no longer differs from its original.
    /// Returns whether the key became clean.
    pub(crate) fn rederive_dirty(&mut self, id: Identity, key: &str) -> StoreResult<bool> {
        let Some(value) = self.entry(id)?.dirty.get(key).cloned() else {
            return Ok(false);
        };
        let definition = self.definition(id, key)?;
        let original = self.original_value(id, key)?;
        if behavior_for(definition.kind).is_dirty(self, &value, &original) {
            return Ok(false);
        }
        let entry = self.entry_mut(id)?;
        entry.dirty.remove(key);
        entry.sync_lifecycle();
        Ok(true)
    }
}
