//! Host-facing attribute cache contract.
//!
//! # Responsibility
//! - Define the narrow surface record hosts and save orchestration depend on.
//! - Keep hosts decoupled from the concrete store type.

use crate::model::identity::Identity;
use crate::model::value::{AttrValue, Payload};
use crate::store::{ChangedAttributes, StateStore, StoreResult};

/// Attribute cache a record host is injected with.
pub trait AttributeCache {
    fn get_value(&mut self, id: Identity, key: &str) -> StoreResult<AttrValue>;
    fn set_value(&mut self, id: Identity, key: &str, value: AttrValue) -> StoreResult<()>;
    fn has_changed_attributes(&self, id: Identity) -> bool;
    fn changed_attributes(&self, id: Identity) -> StoreResult<ChangedAttributes>;
    /// Deep plain-data snapshot used to build save requests.
    fn current_state(&self, id: Identity) -> StoreResult<Payload>;
    fn type_of(&self, id: Identity) -> StoreResult<String>;
    fn will_commit(&mut self, id: Identity) -> StoreResult<()>;
    fn did_commit(&mut self, id: Identity, payload: Option<&Payload>) -> StoreResult<()>;
    fn commit_rejected(&mut self, id: Identity) -> StoreResult<()>;
    fn rollback(&mut self, id: Identity) -> StoreResult<()>;
    fn unload(&mut self, id: Identity) -> StoreResult<()>;
}

impl AttributeCache for StateStore {
    fn get_value(&mut self, id: Identity, key: &str) -> StoreResult<AttrValue> {
        StateStore::get_value(self, id, key)
    }

    fn set_value(&mut self, id: Identity, key: &str, value: AttrValue) -> StoreResult<()> {
        StateStore::set_value(self, id, key, value)
    }

    fn has_changed_attributes(&self, id: Identity) -> bool {
        StateStore::has_changed_attributes(self, id)
    }

    fn changed_attributes(&self, id: Identity) -> StoreResult<ChangedAttributes> {
        StateStore::changed_attributes(self, id)
    }

    fn current_state(&self, id: Identity) -> StoreResult<Payload> {
        StateStore::current_state(self, id)
    }

    fn type_of(&self, id: Identity) -> StoreResult<String> {
        StateStore::type_of(self, id).map(str::to_string)
    }

    fn will_commit(&mut self, id: Identity) -> StoreResult<()> {
        StateStore::will_commit(self, id)
    }

    fn did_commit(&mut self, id: Identity, payload: Option<&Payload>) -> StoreResult<()> {
        StateStore::did_commit(self, id, payload)
    }

    fn commit_rejected(&mut self, id: Identity) -> StoreResult<()> {
        StateStore::commit_rejected(self, id)
    }

    fn rollback(&mut self, id: Identity) -> StoreResult<()> {
        StateStore::rollback(self, id)
    }

    fn unload(&mut self, id: Identity) -> StoreResult<()> {
        StateStore::unload(self, id)
    }
}
